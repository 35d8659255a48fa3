//! Login, registration and OAuth form validation.
//!
//! Forms are deserialized leniently (missing fields become empty strings) and
//! then checked with `validator`. A failed check produces a [`FormState`]
//! carrying field-level messages for re-rendering; a passing one produces the
//! normalised input for the backend call.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::borrow::Cow;
use std::collections::BTreeMap;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::models::Credentials;

pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_MAX_LEN: usize = 50;

static HTML_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^>]*>").expect("HTML tag pattern is valid"));

fn rule(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

fn email_without_spaces(email: &str) -> Result<(), ValidationError> {
    if email.contains(' ') {
        return Err(rule("email_spaces", "Email cannot contain spaces"));
    }
    Ok(())
}

fn provider_present(provider: &str) -> Result<(), ValidationError> {
    if provider.trim().is_empty() {
        return Err(rule("provider_required", "Provider is required"));
    }
    Ok(())
}

/// Registration password policy. Every rule is checked and each failure is
/// reported, in the order below.
fn password_rules(password: &str) -> Vec<ValidationError> {
    let length = password.chars().count();
    let mut failures = Vec::new();

    if length < PASSWORD_MIN_LEN {
        failures.push(rule(
            "password_too_short",
            "Password must be at least 8 characters long",
        ));
    }
    if length > PASSWORD_MAX_LEN {
        failures.push(rule(
            "password_too_long",
            "Password must not exceed 50 characters",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        failures.push(rule(
            "password_uppercase",
            "Password must contain at least one uppercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        failures.push(rule(
            "password_lowercase",
            "Password must contain at least one lowercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        failures.push(rule(
            "password_digit",
            "Password must contain at least one number",
        ));
    }
    if password.chars().all(|c| c.is_ascii_alphanumeric()) {
        failures.push(rule(
            "password_special",
            "Password must contain at least one special character",
        ));
    }
    if password.contains(' ') {
        failures.push(rule("password_spaces", "Password cannot contain spaces"));
    }
    failures
}

/// Trim, lowercase and strip markup from an email address.
pub fn normalize_email(email: &str) -> String {
    HTML_TAG
        .replace_all(&email.trim().to_lowercase(), "")
        .into_owned()
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct LoginForm {
    #[serde(default)]
    #[validate(
        email(message = "Please enter a valid email address"),
        length(max = 255, message = "Email must not exceed 255 characters"),
        custom(function = "email_without_spaces")
    )]
    pub email: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct RegisterForm {
    #[serde(default)]
    #[validate(
        email(message = "Please enter a valid email address"),
        length(max = 255, message = "Email must not exceed 255 characters"),
        custom(function = "email_without_spaces")
    )]
    pub email: String,

    #[serde(default)]
    pub password: String,

    #[serde(default)]
    #[validate(length(
        min = 8,
        message = "Password confirmation must be at least 8 characters long"
    ))]
    pub confirm_password: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct OAuthForm {
    #[serde(default)]
    #[validate(custom(function = "provider_present"))]
    pub provider: String,
}

/// Form values and messages to render back to the user.
///
/// Passwords are deliberately absent: they are never echoed into a page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState {
    pub email: String,
    pub errors: BTreeMap<String, Vec<String>>,
    /// Success message shown above the form.
    pub message: Option<String>,
    /// Form-wide failure not tied to a field.
    pub error: Option<String>,
}

impl FormState {
    pub fn with_email(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Self::default()
        }
    }

    pub fn from_validation(email: impl Into<String>, errors: &ValidationErrors) -> Self {
        let mut state = Self::with_email(email);
        for (field, field_errors) in errors.field_errors() {
            for err in field_errors.iter() {
                let message = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid {}", field));
                state.add_error(&field.to_string(), message);
            }
        }
        state
    }

    pub fn add_error(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn errors_for(&self, field: &str) -> &[String] {
        self.errors.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty() && self.error.is_none()
    }
}

impl LoginForm {
    pub fn into_credentials(self) -> Result<Credentials, FormState> {
        if let Err(errors) = self.validate() {
            return Err(FormState::from_validation(self.email.trim(), &errors));
        }

        Ok(Credentials {
            email: normalize_email(&self.email),
            password: self.password,
        })
    }
}

impl RegisterForm {
    /// Field rules plus the password policy and the confirmation match.
    /// The match is checked even when individual fields already failed.
    pub fn validate_schema(&self) -> Result<(), ValidationErrors> {
        let mut errors = self.validate().err().unwrap_or_else(ValidationErrors::new);

        for failure in password_rules(&self.password) {
            errors.add("password", failure);
        }
        if self.password != self.confirm_password {
            errors.add(
                "confirm_password",
                rule("password_mismatch", "Passwords do not match"),
            );
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn into_credentials(self) -> Result<Credentials, FormState> {
        if let Err(errors) = self.validate_schema() {
            return Err(FormState::from_validation(self.email.trim(), &errors));
        }

        Ok(Credentials {
            email: normalize_email(&self.email),
            password: self.password,
        })
    }
}

impl OAuthForm {
    pub fn into_provider(self) -> Result<String, FormState> {
        if let Err(errors) = self.validate() {
            return Err(FormState::from_validation("", &errors));
        }
        Ok(self.provider.trim().to_lowercase())
    }
}
