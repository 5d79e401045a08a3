//! Shared error type for the monitoring workspace

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Monitoring database could not be opened or queried
    #[error("Monitoring database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Root folder, config or field-log file access
    #[error("File access failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Parameter code absent from `chemical_parameters`
    #[error("Chemical parameter '{0}' not in catalogue")]
    UnknownParameter(String),

    /// `chemical_reference_values` holds no rows
    #[error("No chemical reference values found in database")]
    MissingReferenceValues,

    /// Domain name that cannot be parsed, or a domain the operation does not handle
    #[error("Unsupported survey domain: {0}")]
    UnsupportedDomain(String),

    /// Statement issued on a transaction after commit or rollback
    #[error("Transaction already finished: {0}")]
    TransactionFinished(&'static str),

    #[error("Failed to install tracing subscriber: {0}")]
    Logging(String),
}
