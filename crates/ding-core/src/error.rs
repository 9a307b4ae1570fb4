use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Store I/O error")]
    Io(#[from] std::io::Error),

    #[error("Store serialization error")]
    Serde(#[from] serde_json::Error),

    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Ambiguous short ID. Did you mean one of these?")]
    AmbiguousId(Vec<(String, String)>), // Vec of (ID, Title)

    #[error("Timer error: {0}")]
    Timer(String),
}
