//! Typed validation pass over raw credential input.
//!
//! Raw request bodies (`LoginInput`, `RegisterInput`) are checked once and
//! converted into validated values; everything downstream works with those
//! and never re-checks shape. Failures carry the field they belong to.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::error::ValidationErrors;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Raw login body.
#[derive(Debug, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

/// Login input that passed the validation pass. The email is normalized.
#[derive(Debug, Clone)]
pub struct ValidLogin {
    pub email: String,
    pub password: String,
}

impl LoginInput {
    /// Shape check only: a well-formed email and a non-empty password. The
    /// registration length minimum is not re-applied on login.
    pub fn validate(self) -> Result<ValidLogin, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let email = normalize_email(&self.email);

        if !is_valid_email(&email) {
            errors.push("email", "Invalid email address");
        }
        if self.password.is_empty() {
            errors.push("password", "Password is required");
        }

        if errors.is_empty() {
            Ok(ValidLogin {
                email,
                password: self.password,
            })
        } else {
            Err(errors)
        }
    }
}

/// Raw registration body.
#[derive(Debug, Deserialize)]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Registration input that passed the validation pass.
#[derive(Debug, Clone)]
pub struct ValidRegistration {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl RegisterInput {
    pub fn validate(self) -> Result<ValidRegistration, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let email = normalize_email(&self.email);

        if self.name.len() < 4 {
            errors.push("name", "Name must be at least 4 characters");
        } else if self.name.len() > 30 {
            errors.push("name", "Name must be less than 30 characters");
        }
        if !is_valid_email(&email) {
            errors.push("email", "Invalid email address");
        }
        if self.password.len() < 8 {
            errors.push("password", "Password must be at least 8 characters");
        }

        // The match check only runs once the individual fields are sound,
        // and its failure belongs to the confirmation field.
        if errors.is_empty() && self.password != self.confirm_password {
            errors.push("confirm_password", "Passwords must match");
        }

        if errors.is_empty() {
            Ok(ValidRegistration {
                name: self.name,
                email,
                password: self.password,
            })
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn login(email: &str, password: &str) -> LoginInput {
        LoginInput {
            email: email.into(),
            password: password.into(),
        }
    }

    fn register(name: &str, email: &str, password: &str, confirm: &str) -> RegisterInput {
        RegisterInput {
            name: name.into(),
            email: email.into(),
            password: password.into(),
            confirm_password: confirm.into(),
        }
    }

    #[test]
    fn login_normalizes_email() {
        let valid = login("  Jane@Example.COM ", "secret123").validate().unwrap();
        assert_eq!(valid.email, "jane@example.com");
        assert_eq!(valid.password, "secret123");
    }

    #[test]
    fn login_rejects_bad_email_shape() {
        let errors = login("not-an-email", "secret123").validate().unwrap_err();
        assert_eq!(errors.fields(), vec!["email"]);
        assert_eq!(errors.0[0].message, "Invalid email address");
    }

    #[test]
    fn login_rejects_empty_password() {
        let errors = login("jane@example.com", "").validate().unwrap_err();
        assert_eq!(errors.fields(), vec!["password"]);
        assert_eq!(errors.0[0].message, "Password is required");
    }

    #[test]
    fn login_accepts_any_nonempty_password_shape() {
        assert!(login("jane@example.com", "short").validate().is_ok());
    }

    #[test]
    fn login_collects_all_field_errors() {
        let errors = login("nope", "").validate().unwrap_err();
        assert_eq!(errors.fields(), vec!["email", "password"]);
    }

    #[test]
    fn register_checks_name_bounds() {
        let errors = register("Jo", "jane@example.com", "secret123", "secret123")
            .validate()
            .unwrap_err();
        assert_eq!(errors.0[0].message, "Name must be at least 4 characters");

        let long_name = "x".repeat(31);
        let errors = register(&long_name, "jane@example.com", "secret123", "secret123")
            .validate()
            .unwrap_err();
        assert_eq!(errors.0[0].message, "Name must be less than 30 characters");
    }

    #[test]
    fn register_mismatch_lands_on_confirmation_field() {
        let errors = register("Jane Doe", "jane@example.com", "secret123", "secret124")
            .validate()
            .unwrap_err();
        assert_eq!(errors.fields(), vec!["confirm_password"]);
        assert_eq!(errors.0[0].message, "Passwords must match");
    }

    #[test]
    fn register_mismatch_is_not_reported_when_fields_are_broken() {
        // Mirror of the form-side behavior: the cross-field check waits for
        // the individual fields to be fixed first.
        let errors = register("Jane Doe", "jane@example.com", "short", "other")
            .validate()
            .unwrap_err();
        assert_eq!(errors.fields(), vec!["password"]);
    }

    #[test]
    fn register_accepts_and_normalizes() {
        let valid = register("Jane Doe", " Jane@Example.com", "secret123", "secret123")
            .validate()
            .unwrap();
        assert_eq!(valid.name, "Jane Doe");
        assert_eq!(valid.email, "jane@example.com");
    }

    #[test]
    fn email_regex_accepts_common_shapes() {
        assert!(is_valid_email("a@b.co"));
        assert!(is_valid_email("first.last+tag@sub.domain.org"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.com"));
        assert!(!is_valid_email(""));
    }
}
