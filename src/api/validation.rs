//! Input validation for API requests.
//!
//! Field validators return `Err(message)`; handlers collect them with
//! `ValidationErrorBuilder` from the `error` module.

use lazy_static::lazy_static;
use regex::Regex;

use crate::db::Role;

/// Minimum password length, inclusive
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length (argon2 input is bounded to keep hashing cheap)
pub const MAX_PASSWORD_LENGTH: usize = 128;

pub const MIN_PRODUCT_NAME_LENGTH: usize = 2;
pub const MAX_PRODUCT_NAME_LENGTH: usize = 15;

pub const MAX_CUSTOMER_NAME_LENGTH: usize = 100;

lazy_static! {
    /// Something, an @, something, a dot, something; no whitespace anywhere
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
}

/// Trim and lowercase an email address
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validate an already-normalized email address
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Validate a trimmed customer name
pub fn validate_customer_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Name is required".to_string());
    }

    if name.chars().count() > MAX_CUSTOMER_NAME_LENGTH {
        return Err(format!(
            "Name is too long (max {} characters)",
            MAX_CUSTOMER_NAME_LENGTH
        ));
    }

    Ok(())
}

/// Validate a trimmed password
pub fn validate_password(password: &str) -> Result<(), String> {
    let len = password.chars().count();

    if len < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        ));
    }

    if len > MAX_PASSWORD_LENGTH {
        return Err(format!(
            "Password is too long (max {} characters)",
            MAX_PASSWORD_LENGTH
        ));
    }

    Ok(())
}

/// Parse a role name
pub fn validate_role(role: &str) -> Result<Role, String> {
    role.parse::<Role>()
        .map_err(|_| "Invalid role. Must be one of: admin, user".to_string())
}

/// Validate a trimmed product name
pub fn validate_product_name(name: &str) -> Result<(), String> {
    let len = name.chars().count();

    if len == 0 {
        return Err("Product name is required".to_string());
    }

    if len < MIN_PRODUCT_NAME_LENGTH {
        return Err(format!(
            "Product name is too short (min {} characters)",
            MIN_PRODUCT_NAME_LENGTH
        ));
    }

    if len > MAX_PRODUCT_NAME_LENGTH {
        return Err(format!(
            "Product name is too long (max {} characters)",
            MAX_PRODUCT_NAME_LENGTH
        ));
    }

    Ok(())
}

/// Validate a strictly positive integer field (price, stock, amount)
pub fn validate_positive(value: i64, field: &str) -> Result<(), String> {
    if value < 1 {
        return Err(format!("{} must be a positive integer", field));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ana@Example.COM "), "ana@example.com");
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("ana@example.com").is_ok());
        assert!(validate_email("a.b+c@sub.example.org").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("ana").is_err());
        assert!(validate_email("ana@example").is_err());
        assert!(validate_email("ana @example.com").is_err());
        assert!(validate_email("ana@@example.com").is_err());
    }

    #[test]
    fn test_validate_password_boundary() {
        assert!(validate_password("1234567").is_err());
        assert!(validate_password("12345678").is_ok());
        assert!(validate_password(&"x".repeat(MAX_PASSWORD_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_customer_name() {
        assert!(validate_customer_name("Ana").is_ok());
        assert!(validate_customer_name("").is_err());
        assert!(validate_customer_name(&"n".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_role() {
        assert_eq!(validate_role("admin").unwrap(), Role::Admin);
        assert_eq!(validate_role("USER").unwrap(), Role::User);
        assert!(validate_role("root").is_err());
    }

    #[test]
    fn test_validate_product_name() {
        assert!(validate_product_name("Widget").is_ok());
        assert!(validate_product_name("ab").is_ok());
        assert!(validate_product_name(&"a".repeat(15)).is_ok());

        assert!(validate_product_name("").is_err());
        assert!(validate_product_name("a").is_err());
        assert!(validate_product_name(&"a".repeat(16)).is_err());
    }

    #[test]
    fn test_validate_positive() {
        assert!(validate_positive(1, "price").is_ok());
        assert!(validate_positive(0, "price").is_err());
        assert!(validate_positive(-5, "stock").is_err());
    }
}
