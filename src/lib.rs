pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod records;
pub mod stream;

pub use error::{AppError, Result};
