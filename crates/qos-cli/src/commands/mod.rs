pub mod config;
pub mod replay;
pub mod utils;

pub use config::{handle_config_command, ConfigCommands};
pub use replay::{handle_replay_command, ReplayArgs};
