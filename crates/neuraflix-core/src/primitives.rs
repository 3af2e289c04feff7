//! # Fixed Constants
//!
//! Compile-time constants shared by the normalization, parsing and upsert
//! modules. They are immutable at runtime.

/// Placeholder the metadata source uses for a missing value.
pub const NOT_AVAILABLE: &str = "N/A";

/// Value stored when the source omits `Year` or `Genre`.
pub const UNKNOWN: &str = "Unknown";

/// Separator of the `Director` and `Actors` fields.
pub const PEOPLE_SEPARATOR: char = ',';

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length (bytes) of a title accepted by the pipeline.
///
/// Longer inputs are rejected before any network call is made.
pub const MAX_TITLE_LENGTH: usize = 512;

/// Maximum number of titles taken from one LLM response.
pub const MAX_EXTRACTED_TITLES: usize = 50;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_available_marker() {
        assert_eq!(NOT_AVAILABLE, "N/A");
    }
}
