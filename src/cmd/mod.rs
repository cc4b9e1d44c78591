//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module          | Commands handled                                   |
//! |-----------------|-----------------------------------------------------|
//! | `run`           | `Run`                                               |
//! | `project`       | `Init`, `Scan`, `Status`                            |
//! | `control`       | `Pause`, `Resume`, `Stop`, `Override`               |
//! | `config`        | `Config`                                            |

pub mod config;
pub mod control;
pub mod project;
pub mod run;

pub use config::cmd_config;
pub use control::{cmd_override, cmd_pause, cmd_resume, cmd_stop};
pub use project::{cmd_init, cmd_scan, cmd_status};
pub use run::run_orchestrator;
