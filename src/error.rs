use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use thiserror::Error;

pub use anyhow::Context;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error(transparent)]
    Chrono(#[from] chrono::ParseError),
    #[error(transparent)]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("config file {path}: {reason}")]
    Config { path: PathBuf, reason: String },
    #[error("authentication failed: {reason}")]
    Auth { reason: String },
    #[error("timed out after {0:?} waiting for the authorization code")]
    AuthCodeTimeout(Duration),
    #[error("no data available for {symbol} between {from} and {to}")]
    DataUnavailable {
        symbol: String,
        from: NaiveDate,
        to: NaiveDate,
    },
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn message<T: Into<String>>(msg: T) -> Self {
        AppError::Message(msg.into())
    }

    pub fn config<P: Into<PathBuf>, R: Into<String>>(path: P, reason: R) -> Self {
        AppError::Config {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn auth<R: Into<String>>(reason: R) -> Self {
        AppError::Auth {
            reason: reason.into(),
        }
    }
}
