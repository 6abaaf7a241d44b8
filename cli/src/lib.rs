//! TCP front end for the simulated PMU: environment settings and the session server.

pub mod pmu_server;
pub mod settings;
