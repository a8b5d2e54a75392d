//! Top-level error taxonomy. Per-module errors (`io::DecodeError`,
//! `store::StoreError`, ...) convert into this one at the CLI boundary.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("decode error: {0}")]
    Decode(#[from] crate::io::DecodeError),

    #[error("encode error: {0}")]
    Encode(#[from] crate::io::EncodeError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("model error: {0}")]
    Model(#[from] crate::learning::ModelError),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("operation cancelled")]
    OperationCancelled,
}

pub type Result<T> = std::result::Result<T, AppError>;
