//! Validation helpers for DTOs.

use validator::ValidationError;

/// Validates that a join code is 4 to 6 ASCII digits.
///
/// # Examples
///
/// ```ignore
/// validate_join_code("0421")   // Ok
/// validate_join_code("42")     // Err - too short
/// validate_join_code("12a4")   // Err - not a digit
/// ```
pub fn validate_join_code(code: &str) -> Result<(), ValidationError> {
    if !(4..=6).contains(&code.len()) {
        let mut err = ValidationError::new("join_code_length");
        err.message = Some(format!("Join code must be 4 to 6 digits (got {})", code.len()).into());
        return Err(err);
    }

    if !code.chars().all(|c| c.is_ascii_digit()) {
        let mut err = ValidationError::new("join_code_format");
        err.message = Some("Join code must contain only digits".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a question index is either absent or non-negative.
pub fn validate_question_index(index: Option<i32>) -> Result<(), ValidationError> {
    match index {
        Some(value) if value < 0 => {
            let mut err = ValidationError::new("question_index_range");
            err.message = Some(format!("Question index must be >= 0 (got {value})").into());
            Err(err)
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_join_code_valid() {
        assert!(validate_join_code("1000").is_ok());
        assert!(validate_join_code("00421").is_ok());
        assert!(validate_join_code("999999").is_ok());
    }

    #[test]
    fn test_validate_join_code_invalid_length() {
        assert!(validate_join_code("123").is_err()); // too short
        assert!(validate_join_code("1234567").is_err()); // too long
        assert!(validate_join_code("").is_err()); // empty
    }

    #[test]
    fn test_validate_join_code_invalid_format() {
        assert!(validate_join_code("12a4").is_err());
        assert!(validate_join_code("12 34").is_err());
        assert!(validate_join_code("-123").is_err());
        assert!(validate_join_code("１２３４").is_err()); // full-width digits
    }

    #[test]
    fn test_validate_question_index() {
        assert!(validate_question_index(None).is_ok());
        assert!(validate_question_index(Some(0)).is_ok());
        assert!(validate_question_index(Some(-1)).is_err());
    }
}
