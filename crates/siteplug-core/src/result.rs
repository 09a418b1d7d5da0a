//! `Result` alias used by every fallible Siteplug API.

use crate::error::AppError;

pub type AppResult<T> = Result<T, AppError>;
