//! # Internal Reference Numbers
//!
//! Format: `INT-FAC-<year>-<5-digit sequence>`, e.g. `INT-FAC-2024-00042`.
//!
//! The sequence restarts every calendar year. Allocation itself (an atomic
//! counter row per prefix) lives in facture-db; this module only formats.

use crate::error::ValidationError;
use crate::validation::ValidationResult;

/// Largest sequence that fits in five digits.
pub const MAX_SEQUENCE: i64 = 99_999;

const PREFIX: &str = "INT-FAC-";

/// Counter key for a year: `INT-FAC-2024-`.
pub fn reference_prefix(year: i32) -> String {
    format!("{}{}-", PREFIX, year)
}

/// Formats an allocated sequence value.
///
/// ## Example
/// ```rust
/// use facture_core::sequence::format_reference;
///
/// assert_eq!(format_reference(2024, 42).unwrap(), "INT-FAC-2024-00042");
/// assert!(format_reference(2024, 100_000).is_err());
/// ```
pub fn format_reference(year: i32, sequence: i64) -> ValidationResult<String> {
    if !(1..=MAX_SEQUENCE).contains(&sequence) {
        return Err(ValidationError::OutOfRange {
            field: "internal_reference_number sequence".to_string(),
            min: 1,
            max: MAX_SEQUENCE,
        });
    }
    Ok(format!("{}{:05}", reference_prefix(year), sequence))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_per_year() {
        assert_eq!(reference_prefix(2024), "INT-FAC-2024-");
        assert_eq!(reference_prefix(2025), "INT-FAC-2025-");
    }

    #[test]
    fn test_format_pads_to_five_digits() {
        assert_eq!(format_reference(2024, 1).unwrap(), "INT-FAC-2024-00001");
        assert_eq!(format_reference(2024, 99_999).unwrap(), "INT-FAC-2024-99999");
        assert!(format_reference(2024, 0).is_err());
    }
}
