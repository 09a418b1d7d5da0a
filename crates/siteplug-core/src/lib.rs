//! # siteplug-core
//!
//! Shared foundation for the Siteplug crates: [`AppError`], layered
//! configuration, bus/hook handles, and the persisted plugin record.

pub mod config;
pub mod error;
pub mod result;
pub mod types;

pub use error::{AppError, ErrorKind};
pub use result::AppResult;
