//! Input validation for API requests.
//!
//! Validators return `Result<(), String>` and are collected into a
//! field-error map with `ValidationErrorBuilder` before any persistence
//! or external call happens.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Loose email shape check; deliverability is proven by the
    /// confirmation-code flow, not by the regex.
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[^@\s]+@[^@\s]+\.[^@\s]+$"
    ).unwrap();

    /// Swedish personnummer: YYYYMMDD-XXXX or YYMMDD-XXXX, dash optional
    static ref PERSONNUMMER_REGEX: Regex = Regex::new(
        r"^(\d{8}|\d{6})-?\d{4}$"
    ).unwrap();

    /// Swedish postal code: five digits, optional interior space
    static ref POSTAL_CODE_REGEX: Regex = Regex::new(
        r"^\d{3} ?\d{2}$"
    ).unwrap();

    /// School year, e.g. "2025/2026"
    static ref SCHOOL_YEAR_REGEX: Regex = Regex::new(
        r"^\d{4}/\d{4}$"
    ).unwrap();
}

pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("E-postadress krävs".to_string());
    }
    if email.len() > 120 {
        return Err("E-postadressen är för lång".to_string());
    }
    if !EMAIL_REGEX.is_match(email) {
        return Err("Ogiltig e-postadress".to_string());
    }
    Ok(())
}

pub fn validate_required(value: &str, label: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{} krävs", label));
    }
    Ok(())
}

pub fn validate_max_len(value: &str, max: usize, label: &str) -> Result<(), String> {
    if value.chars().count() > max {
        return Err(format!("{} får vara högst {} tecken", label, max));
    }
    Ok(())
}

pub fn validate_personnummer(value: &str) -> Result<(), String> {
    if !PERSONNUMMER_REGEX.is_match(value) {
        return Err("Ogiltigt personnummer".to_string());
    }
    Ok(())
}

pub fn validate_postal_code(value: &str) -> Result<(), String> {
    if !POSTAL_CODE_REGEX.is_match(value) {
        return Err("Ogiltigt postnummer".to_string());
    }
    Ok(())
}

pub fn validate_school_year(value: &str) -> Result<(), String> {
    if !SCHOOL_YEAR_REGEX.is_match(value) {
        return Err("Ogiltigt läsår, förväntat format: 2025/2026".to_string());
    }
    Ok(())
}

/// Minimum password length for local accounts.
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.len() < 10 {
        return Err("Lösenordet måste vara minst 10 tecken".to_string());
    }
    if password.len() > 128 {
        return Err("Lösenordet är för långt".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(validate_email("parent@example.se").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("two@@example.se").is_err());
        assert!(validate_email("name@nodot").is_err());
    }

    #[test]
    fn personnummer_validation() {
        assert!(validate_personnummer("20150312-1234").is_ok());
        assert!(validate_personnummer("150312-1234").is_ok());
        assert!(validate_personnummer("201503121234").is_ok());
        assert!(validate_personnummer("12-34").is_err());
        assert!(validate_personnummer("abcdefgh-ijkl").is_err());
    }

    #[test]
    fn postal_code_validation() {
        assert!(validate_postal_code("417 05").is_ok());
        assert!(validate_postal_code("41705").is_ok());
        assert!(validate_postal_code("4170").is_err());
        assert!(validate_postal_code("SE-417").is_err());
    }

    #[test]
    fn school_year_validation() {
        assert!(validate_school_year("2025/2026").is_ok());
        assert!(validate_school_year("2025").is_err());
        assert!(validate_school_year("25/26").is_err());
    }

    #[test]
    fn password_validation() {
        assert!(validate_password("long enough pw").is_ok());
        assert!(validate_password("short").is_err());
    }
}
