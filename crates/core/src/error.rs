//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (field
/// validation, invariants, missing records). Storage failures belong to the
/// infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. empty name, oversize SKU).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested record was not found.
    #[error("{0} not found")]
    NotFound(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Stable, machine-readable code for callers that display or map errors.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "validation_error",
            DomainError::InvariantViolation(_) => "invariant_violation",
            DomainError::InvalidId(_) => "invalid_id",
            DomainError::NotFound(_) => "not_found",
        }
    }
}

/// Check that a trimmed text field is non-empty and at most `max_chars` long.
///
/// Returns the trimmed value.
pub fn require_text(field: &str, value: &str, max_chars: usize) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    let len = trimmed.chars().count();
    if len > max_chars {
        return Err(DomainError::validation(format!(
            "{field} must be at most {max_chars} characters (got {len})"
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_text_trims_and_bounds() {
        assert_eq!(require_text("name", "  Acme ", 10).unwrap(), "Acme");
        assert_eq!(
            require_text("name", "   ", 10).unwrap_err(),
            DomainError::validation("name cannot be empty")
        );
        assert!(matches!(
            require_text("sku", "ABCDEFGHIJKLMNOPQ", 16),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(DomainError::not_found("item").code(), "not_found");
        assert_eq!(DomainError::validation("x").code(), "validation_error");
        assert_eq!(DomainError::not_found("item").to_string(), "item not found");
    }
}
