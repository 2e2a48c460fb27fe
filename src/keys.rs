//! Storage key generation
//!
//! Object ids are the current wall-clock timestamp at millisecond
//! resolution, encoded through the Sqids alphabet (compact, reversible,
//! profanity-filtered). Keys are therefore human-scannable in roughly
//! chronological order without any counter or coordination. Two
//! generations within the same millisecond produce the same id; the
//! store resolves such races last-write-wins.

use sqids::Sqids;

use crate::errors::AppError;

/// Generates short unique object ids from the current timestamp
pub struct KeyGenerator {
    sqids: Sqids,
}

impl KeyGenerator {
    pub fn new() -> Self {
        Self {
            sqids: Sqids::default(),
        }
    }

    /// Generate a short id for a newly ingested object.
    pub fn generate(&self) -> Result<String, AppError> {
        let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
        self.encode(millis)
    }

    fn encode(&self, millis: u64) -> Result<String, AppError> {
        self.sqids
            .encode(&[millis])
            .map_err(|e| AppError::internal(format!("key encoding failed: {e}")))
    }
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Derive a file extension from a MIME content type.
///
/// Takes the subtype with any `;parameter` and `+`-structured suffix
/// stripped: `image/svg+xml` becomes `svg`, `image/png; foo=bar` becomes
/// `png`. Malformed input falls back to `bin`.
pub fn extension_for_content_type(content_type: &str) -> String {
    let essence = content_type.split(';').next().unwrap_or("").trim();
    let subtype = essence.rsplit('/').next().unwrap_or("");
    let extension = subtype.split('+').next().unwrap_or("");

    if extension.is_empty() {
        "bin".to_string()
    } else {
        extension.to_ascii_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_id_decodes_to_timestamp() {
        let generator = KeyGenerator::new();
        let millis = 1_700_000_000_123u64;

        let id = generator.encode(millis).unwrap();
        assert!(!id.is_empty());
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));

        let decoded = generator.sqids.decode(&id);
        assert_eq!(decoded, vec![millis]);
    }

    #[test]
    fn test_generate_is_nonempty() {
        let generator = KeyGenerator::new();
        let id = generator.generate().unwrap();
        assert!(!id.is_empty());
    }

    #[test]
    fn test_extension_strips_structured_suffix() {
        assert_eq!(extension_for_content_type("image/svg+xml"), "svg");
        assert_eq!(extension_for_content_type("image/png"), "png");
        assert_eq!(extension_for_content_type("image/jpeg"), "jpeg");
    }

    #[test]
    fn test_extension_strips_parameters() {
        assert_eq!(extension_for_content_type("image/png; charset=binary"), "png");
        assert_eq!(extension_for_content_type("IMAGE/WEBP"), "webp");
    }

    #[test]
    fn test_extension_fallback_for_malformed_input() {
        assert_eq!(extension_for_content_type(""), "bin");
        assert_eq!(extension_for_content_type("image/"), "bin");
        assert_eq!(extension_for_content_type("+"), "bin");
    }
}
