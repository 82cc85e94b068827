use once_cell::sync::Lazy;
use regex::Regex;
use validator::ValidationError;

pub static POSTAL_CODE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9 -]{1,11}$").unwrap());

/// Rejects empty and whitespace-only strings.
pub fn required(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("required").with_message("This field is required.".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_is_missing() {
        assert!(required("").is_err());
        assert!(required(" \t").is_err());
        assert!(required("x").is_ok());
    }

    #[test]
    fn postal_codes() {
        for ok in ["10115", "SW1A 1AA", "K1A-0B1", "90210"] {
            assert!(POSTAL_CODE_REGEX.is_match(ok), "{ok}");
        }
        for bad in ["", "1", " 10115", "12345678901234", "10115;"] {
            assert!(!POSTAL_CODE_REGEX.is_match(bad), "{bad}");
        }
    }
}
