pub mod collaborators;
pub mod config;
pub mod control;
pub mod engine_config;
pub mod errors;
pub mod init;
pub mod logging;
pub mod matrix;
pub mod orchestrator;
pub mod outline;
pub mod scanner;
pub mod util;
