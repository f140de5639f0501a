use bigdecimal::BigDecimal;
use std::fmt;

pub const ACCOUNT_NUMBER_LEN: usize = 10;
pub const EXTERNAL_ACCOUNT_MAX_LEN: usize = 34;
pub const ACCOUNT_NAME_MAX_LEN: usize = 64;
pub const DESCRIPTION_MAX_LEN: usize = 140;
pub const RECIPIENT_NAME_MAX_LEN: usize = 100;
pub const EMAIL_MAX_LEN: usize = 254;
pub const ALLOWED_TRANSFER_KINDS: &[&str] = &["internal", "external"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.len() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

pub fn validate_enum(field: &'static str, value: &str, allowed: &[&str]) -> ValidationResult {
    if allowed.iter().all(|candidate| value != *candidate) {
        return Err(ValidationError::new(
            field,
            format!("must be one of: {}", allowed.join(", ")),
        ));
    }

    Ok(())
}

pub fn validate_account_number(field: &'static str, number: &str) -> ValidationResult {
    let number = sanitize_string(number);
    validate_required(field, &number)?;

    if number.len() != ACCOUNT_NUMBER_LEN {
        return Err(ValidationError::new(
            field,
            format!("must be exactly {} digits", ACCOUNT_NUMBER_LEN),
        ));
    }

    if !number.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(ValidationError::new(field, "must contain only digits"));
    }

    Ok(())
}

pub fn validate_email(email: &str) -> ValidationResult {
    let email = sanitize_string(email);
    validate_required("email", &email)?;
    validate_max_len("email", &email, EMAIL_MAX_LEN)?;

    let mut parts = email.splitn(2, '@');
    let local = parts.next().unwrap_or("");
    let domain = parts.next().unwrap_or("");
    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return Err(ValidationError::new("email", "must be a valid address"));
    }

    Ok(())
}

pub fn validate_positive_amount(amount: &BigDecimal) -> ValidationResult {
    if amount <= &BigDecimal::from(0) {
        return Err(ValidationError::new("amount", "must be greater than zero"));
    }

    Ok(())
}

/// Amounts are stored as NUMERIC(18,2); anything finer than cents is rejected
/// rather than silently rounded.
pub fn validate_amount_scale(amount: &BigDecimal) -> ValidationResult {
    let (_, scale) = amount.normalized().as_bigint_and_exponent();
    if scale > 2 {
        return Err(ValidationError::new(
            "amount",
            "must have at most two decimal places",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn validates_required_field() {
        assert!(validate_required("field", "value").is_ok());
        assert!(validate_required("field", "   ").is_err());
    }

    #[test]
    fn validates_max_len() {
        assert!(validate_max_len("field", "abc", 3).is_ok());
        assert!(validate_max_len("field", "abcd", 3).is_err());
    }

    #[test]
    fn validates_enum_values() {
        assert!(validate_enum("kind", "internal", ALLOWED_TRANSFER_KINDS).is_ok());
        assert!(validate_enum("kind", "wire", ALLOWED_TRANSFER_KINDS).is_err());
    }

    #[test]
    fn sanitizes_string() {
        assert_eq!(sanitize_string("  hello\tworld  "), "hello world");
        assert_eq!(sanitize_string("single"), "single");
        assert_eq!(sanitize_string(" \n "), "");
        assert_eq!(sanitize_string("ab\u{0000}cd\u{0007}"), "abcd");
    }

    #[test]
    fn validates_account_number() {
        assert!(validate_account_number("to_account", "1234567890").is_ok());
        assert!(validate_account_number("to_account", " 1234567890 ").is_ok());
        assert!(validate_account_number("to_account", "123456789").is_err());
        assert!(validate_account_number("to_account", "12345678901").is_err());
        assert!(validate_account_number("to_account", "12345abcde").is_err());
        assert!(validate_account_number("to_account", "").is_err());
    }

    #[test]
    fn validates_email() {
        assert!(validate_email("jo@example.com").is_ok());
        assert!(validate_email("jo@example").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("").is_err());
    }

    #[test]
    fn validates_positive_amount() {
        let positive = BigDecimal::from_str("1.23").expect("valid decimal");
        let zero = BigDecimal::from(0);
        let negative = BigDecimal::from(-1);

        assert!(validate_positive_amount(&positive).is_ok());
        assert!(validate_positive_amount(&zero).is_err());
        assert!(validate_positive_amount(&negative).is_err());
    }

    #[test]
    fn validates_amount_scale() {
        assert!(validate_amount_scale(&BigDecimal::from_str("10.50").unwrap()).is_ok());
        assert!(validate_amount_scale(&BigDecimal::from_str("10").unwrap()).is_ok());
        assert!(validate_amount_scale(&BigDecimal::from_str("10.505").unwrap()).is_err());
        // trailing zeros beyond cents are fine once normalized
        assert!(validate_amount_scale(&BigDecimal::from_str("10.5000").unwrap()).is_ok());
    }
}
