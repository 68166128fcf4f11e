// ============================================
// File: crates/aura-common/src/error.rs
// ============================================
//! # Common Error Types
//!
//! ## Creation Reason
//! Errors raised below the service layer that every crate can wrap: bad
//! caller input.
//!
//! ## Main Functionality
//! - `CommonError`: Base error enum wrapped by `CoreError`, `TransportError`
//!   and `ServerError`
//! - `Result<T>`: Type alias using `CommonError`
//!
//! ## ⚠️ Important Note for Next Developer
//! - Never include secrets (bootstrap tokens, challenges, private keys)
//!   in error messages
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

/// Common result type for operations that may fail.
pub type Result<T> = std::result::Result<T, CommonError>;

/// Errors shared across Aura crates.
///
/// # Example
/// ```
/// use aura_common::error::{CommonError, Result};
///
/// fn validate_version(version: &str) -> Result<()> {
///     if version.is_empty() {
///         return Err(CommonError::invalid_input("version", "cannot be empty"));
///     }
///     Ok(())
/// }
///
/// assert!(validate_version("").is_err());
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    /// A caller-supplied value was rejected.
    #[error("Invalid input for '{field}': {reason}")]
    InvalidInput {
        /// Name of the field or parameter
        field: String,
        /// Description of what's wrong
        reason: String,
    },
}

impl CommonError {
    /// Creates an `InvalidInput` error.
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
