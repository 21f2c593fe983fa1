//! Port traits for the engine's external collaborators.

pub mod config_port;
pub mod data_port;
pub mod execution_port;
pub mod indicator_port;
pub mod report_port;
