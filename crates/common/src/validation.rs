//! Input validation utilities for configuration values and identifiers
//!
//! Every check returns an error instead of panicking so that callers can
//! surface bad input as a client error:
//! - Non-finite or out-of-range numeric settings
//! - Threshold tables that are not strictly ascending
//! - Identifiers that would escape an output directory

use anyhow::{anyhow, Result};

// ============================================================================
// CONSTANTS: Input Size Limits
// ============================================================================

/// Maximum length for resource IDs (source_id, upload id, etc.)
pub const MAX_ID_LENGTH: usize = 256;

// ============================================================================
// String Validation
// ============================================================================

/// Validate string length against a maximum
pub fn validate_length(value: &str, max_length: usize, field_name: &str) -> Result<()> {
    if value.len() > max_length {
        return Err(anyhow!(
            "{} exceeds maximum length of {} bytes (got {})",
            field_name,
            max_length,
            value.len()
        ));
    }
    Ok(())
}

/// Validate non-empty string
pub fn validate_non_empty(value: &str, field_name: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(anyhow!("{} cannot be empty", field_name));
    }
    Ok(())
}

/// Validate resource ID used to derive file names
pub fn validate_id(id: &str, field_name: &str) -> Result<()> {
    validate_non_empty(id, field_name)?;
    validate_length(id, MAX_ID_LENGTH, field_name)?;

    // Prevent path traversal in IDs
    if id.contains("..") || id.contains('/') || id.contains('\\') {
        return Err(anyhow!(
            "{} contains invalid characters (no path separators or '..' allowed)",
            field_name
        ));
    }

    Ok(())
}

// ============================================================================
// Numeric Validation
// ============================================================================

/// Validate that a float is neither NaN nor infinite
pub fn validate_finite(value: f64, field_name: &str) -> Result<()> {
    if !value.is_finite() {
        return Err(anyhow!("{} must be a finite number, got {}", field_name, value));
    }
    Ok(())
}

/// Validate finite value strictly greater than zero
pub fn validate_positive(value: f64, field_name: &str) -> Result<()> {
    validate_finite(value, field_name)?;
    if value <= 0.0 {
        return Err(anyhow!("{} must be greater than 0, got {}", field_name, value));
    }
    Ok(())
}

/// Validate value is within range
pub fn validate_range<T: PartialOrd + std::fmt::Display>(
    value: T,
    min: T,
    max: T,
    field_name: &str,
) -> Result<()> {
    // Written as a negated range test so NaN is rejected too
    if !(value >= min && value <= max) {
        return Err(anyhow!(
            "{} must be between {} and {}, got {}",
            field_name,
            min,
            max,
            value
        ));
    }
    Ok(())
}

/// Validate a threshold table: finite, non-negative and strictly ascending
pub fn validate_ascending(values: &[f64], field_name: &str) -> Result<()> {
    if values.is_empty() {
        return Err(anyhow!("{} cannot be empty", field_name));
    }

    for (i, value) in values.iter().enumerate() {
        validate_finite(*value, &format!("{}[{}]", field_name, i))?;
        if *value < 0.0 {
            return Err(anyhow!(
                "{}[{}] must not be negative, got {}",
                field_name,
                i,
                value
            ));
        }
    }

    if let Some(pair) = values.windows(2).find(|pair| pair[1] <= pair[0]) {
        return Err(anyhow!(
            "{} must be strictly ascending ({} is followed by {})",
            field_name,
            pair[0],
            pair[1]
        ));
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
