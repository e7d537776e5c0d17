//! Argument guards that fail fast with [`AppError::Argument`].

use crate::error::AppError;

/// Reject an empty string. Returns the value on success so calls can chain.
pub fn not_empty<'a>(name: &str, value: &'a str) -> Result<&'a str, AppError> {
    if value.is_empty() {
        return Err(AppError::Argument(format!("{name} must not be empty")));
    }
    Ok(value)
}

/// Reject an empty or whitespace-only string.
pub fn not_blank<'a>(name: &str, value: &'a str) -> Result<&'a str, AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Argument(format!("{name} must not be blank")));
    }
    Ok(value)
}

pub fn ensure(cond: bool, name: &str, message: &str) -> Result<(), AppError> {
    if cond {
        Ok(())
    } else {
        Err(AppError::Argument(format!("{name}: {message}")))
    }
}
