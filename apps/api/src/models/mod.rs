pub mod activity;
pub mod career;
pub mod learning;
pub mod skill;

/// Inclusive bounds for skill levels, progress and scores.
pub const LEVEL_MIN: i32 = 0;
pub const LEVEL_MAX: i32 = 100;

/// Rejects values outside 0–100. Used by every mutation before it touches storage.
pub fn validate_level(field: &str, value: i32) -> Result<(), String> {
    if (LEVEL_MIN..=LEVEL_MAX).contains(&value) {
        Ok(())
    } else {
        Err(format!(
            "{field} must be between {LEVEL_MIN} and {LEVEL_MAX}, got {value}"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_level_bounds() {
        assert!(validate_level("current_level", 0).is_ok());
        assert!(validate_level("current_level", 100).is_ok());
        assert!(validate_level("current_level", -1).is_err());
        assert!(validate_level("current_level", 101).is_err());
    }

    #[test]
    fn test_validate_level_message_names_field() {
        let err = validate_level("target_level", 150).unwrap_err();
        assert!(err.contains("target_level"));
        assert!(err.contains("150"));
    }
}
