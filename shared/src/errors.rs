//! Shared error types for the test-generation pipeline

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Serialization failed: {message}")]
    SerializationError { message: String },

    #[error("Invalid configuration: {field} = {value}")]
    InvalidConfig { field: String, value: String },

    #[error("Invalid API model: {message}")]
    InvalidModel { message: String },
}

pub type SharedResult<T> = Result<T, SharedError>;
