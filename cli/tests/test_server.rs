use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use pmusim_cli::pmu_server::serve;
use pmusim_core::ieee_c37_118::commands::{CommandFrame, CommandOptions};
use pmusim_core::ieee_c37_118::common::{FrameHeader, FrameType};
use pmusim_core::ieee_c37_118::config::StationConfig;
use pmusim_core::ieee_c37_118::random::ConstantSource;
use pmusim_core::ieee_c37_118::utils::validate_checksum;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};

const READ_TIMEOUT: Duration = Duration::from_secs(2);

async fn start_server(config: StationConfig, options: CommandOptions) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let station = Arc::new(config.validate().unwrap());
    tokio::spawn(async move {
        serve(listener, station, options, ConstantSource::default)
            .await
            .unwrap();
    });
    addr
}

// Reads exactly one frame using its FRAMESIZE field.
async fn read_frame(stream: &mut TcpStream) -> Vec<u8> {
    let mut frame = vec![0u8; 4];
    stream.read_exact(&mut frame).await.unwrap();
    let size = u16::from_be_bytes([frame[2], frame[3]]) as usize;
    frame.resize(size, 0);
    stream.read_exact(&mut frame[4..]).await.unwrap();
    frame
}

async fn expect_frame(stream: &mut TcpStream) -> Vec<u8> {
    timeout(READ_TIMEOUT, read_frame(stream))
        .await
        .expect("timed out waiting for a frame")
}

#[tokio::test]
async fn test_config_request_then_stream() {
    let addr = start_server(StationConfig::default(), CommandOptions::default()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(&CommandFrame::send_config_frame2(1).to_hex())
        .await
        .unwrap();

    let cfg = expect_frame(&mut stream).await;
    validate_checksum(&cfg).unwrap();
    let header = FrameHeader::from_hex(&cfg).unwrap();
    assert_eq!(header.frame_type, FrameType::Config2);
    assert_eq!(cfg.len(), 194);

    let mut last_soc = 0;
    for _ in 0..5 {
        let frame = expect_frame(&mut stream).await;
        validate_checksum(&frame).unwrap();
        let header = FrameHeader::from_hex(&frame).unwrap();
        assert_eq!(header.frame_type, FrameType::Data);
        assert_eq!(header.idcode, 1);
        assert_eq!(frame.len(), 66);
        let soc = u32::from_be_bytes([frame[6], frame[7], frame[8], frame[9]]);
        assert!(soc >= last_soc);
        last_soc = soc;
    }
}

#[tokio::test]
async fn test_turn_off_stops_stream() {
    let config = StationConfig::simulated(7734, "STOP TEST", 25, 2, 1);
    let addr = start_server(config, CommandOptions::default()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(&CommandFrame::turn_on_transmission(7734).to_hex())
        .await
        .unwrap();
    let frame = expect_frame(&mut stream).await;
    assert_eq!(frame.len(), 26 + 16 + 4);

    stream
        .write_all(&CommandFrame::turn_off_transmission(7734).to_hex())
        .await
        .unwrap();

    // Drain frames already in flight, then expect silence.
    while timeout(Duration::from_millis(200), read_frame(&mut stream))
        .await
        .is_ok()
    {}
    assert!(timeout(Duration::from_millis(300), read_frame(&mut stream))
        .await
        .is_err());
}

#[tokio::test]
async fn test_corrupt_command_is_ignored() {
    let addr = start_server(StationConfig::default(), CommandOptions::default()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let mut corrupt = CommandFrame::turn_on_transmission(1).to_hex();
    corrupt[9] ^= 0xFF;
    stream.write_all(&corrupt).await.unwrap();
    sleep(Duration::from_millis(100)).await;

    // Had the corrupt frame been accepted, data frames would arrive first.
    stream
        .write_all(&CommandFrame::with_code(1, 0x0055).to_hex())
        .await
        .unwrap();
    let first = expect_frame(&mut stream).await;
    assert_eq!(
        FrameHeader::from_hex(&first).unwrap().frame_type,
        FrameType::Config2
    );
}

#[tokio::test]
async fn test_next_client_after_disconnect() {
    let addr = start_server(StationConfig::default(), CommandOptions::permissive()).await;

    {
        let mut first = TcpStream::connect(addr).await.unwrap();
        first
            .write_all(&CommandFrame::turn_on_transmission(1).to_hex())
            .await
            .unwrap();
        expect_frame(&mut first).await;
    }

    let mut second = TcpStream::connect(addr).await.unwrap();
    second
        .write_all(&CommandFrame::send_config_frame2(1).to_hex())
        .await
        .unwrap();
    let cfg = expect_frame(&mut second).await;
    assert_eq!(
        FrameHeader::from_hex(&cfg).unwrap().frame_type,
        FrameType::Config2
    );
}

#[tokio::test]
async fn test_coalesced_commands_all_apply() {
    let addr = start_server(StationConfig::default(), CommandOptions::default()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let mut batch = CommandFrame::turn_off_transmission(1).to_hex();
    batch.extend(CommandFrame::send_config_frame2(1).to_hex());
    stream.write_all(&batch).await.unwrap();

    let cfg = expect_frame(&mut stream).await;
    assert_eq!(
        FrameHeader::from_hex(&cfg).unwrap().frame_type,
        FrameType::Config2
    );
    let data = expect_frame(&mut stream).await;
    assert_eq!(
        FrameHeader::from_hex(&data).unwrap().frame_type,
        FrameType::Data
    );
}

#[tokio::test]
async fn test_command_split_across_writes() {
    let addr = start_server(StationConfig::default(), CommandOptions::default()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let command = CommandFrame::send_config_frame2(1).to_hex();
    let (head, tail) = command.split_at(5);
    stream.write_all(head).await.unwrap();
    stream.flush().await.unwrap();
    sleep(Duration::from_millis(100)).await;
    stream.write_all(tail).await.unwrap();

    let cfg = expect_frame(&mut stream).await;
    validate_checksum(&cfg).unwrap();
    assert_eq!(
        FrameHeader::from_hex(&cfg).unwrap().frame_type,
        FrameType::Config2
    );
}
