pub mod configuration;
pub use configuration::*;

pub mod controller;
pub mod error_handling;
pub mod output_sink;
pub mod process_supervision;
pub mod session_management;
pub mod status_reporting;
pub mod web_interface;
