use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Replay error: {0}")]
    Replay(String),

    #[error("Error: {0}")]
    General(String),
}

impl From<std::io::Error> for CliError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(error: serde_json::Error) -> Self {
        Self::General(error.to_string())
    }
}

impl From<qos_core::QosError> for CliError {
    fn from(error: qos_core::QosError) -> Self {
        Self::Replay(error.to_string())
    }
}

pub type CliResult<T> = Result<T, CliError>;

pub fn print_success(message: &str) {
    println!("[SUCCESS] {message}");
}

pub fn print_error(message: &str) {
    eprintln!("[ERROR] {message}");
}

pub fn print_info(message: &str) {
    println!("[INFO] {message}");
}

/// Prints a titled section of pretty JSON.
pub fn print_json<T: serde::Serialize>(title: &str, value: &T) -> CliResult<()> {
    println!("\n[{title}]");
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
