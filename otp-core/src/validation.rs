//! Form validation.
//!
//! Forms hold whatever the user typed. Submitting a form either yields the
//! normalized request that may be sent over the wire, or a map of field name
//! to the message that should be shown next to that field.

use crate::common::{CodeType, GenerateRequest, VerifyRequest};
use std::{borrow::Cow, collections::BTreeMap};
use validator::{Validate, ValidationError, ValidationErrors};

/// Shown when the email isn't a syntactically valid address
pub const INVALID_EMAIL: &str = "Invalid email address";
/// Shown when the code type isn't one of the known literals
pub const INVALID_CODE_TYPE: &str = "OTP type must be one of numeric, alphanumeric or alphabet";
/// Shown when the organization is left empty
pub const ORGANIZATION_REQUIRED: &str = "Organization name is required";
/// Shown when the subject is left empty
pub const SUBJECT_REQUIRED: &str = "Subject is required";
/// Shown when the code has the wrong length
pub const CODE_LENGTH: &str = "Your one-time password must be 6 characters.";
/// Shown when the code contains anything but letters and digits
pub const CODE_CHARACTERS: &str = "Your one-time password may only contain letters and digits.";

/// Raw input of the "generate" form
#[derive(Clone, Debug, PartialEq, Eq, Validate)]
pub struct GenerateForm {
    /// Email address to send the code to
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    /// One of `numeric`, `alphanumeric` or `alphabet`
    #[validate(custom = "known_code_type")]
    pub code_type: String,
    /// Organization name
    #[validate(length(min = 1, message = "Organization name is required"))]
    pub organization: String,
    /// Email subject
    #[validate(length(min = 1, message = "Subject is required"))]
    pub subject: String,
}

impl Default for GenerateForm {
    fn default() -> Self {
        Self {
            email: String::new(),
            code_type: CodeType::default().to_string(),
            organization: String::new(),
            subject: String::new(),
        }
    }
}

impl GenerateForm {
    /// Validate the form. Nothing is sent anywhere.
    pub fn submit(&self) -> Result<GenerateRequest, FieldErrors> {
        let normalized = Self {
            email: self.email.trim().to_string(),
            code_type: self.code_type.trim().to_string(),
            organization: self.organization.trim().to_string(),
            subject: self.subject.trim().to_string(),
        };

        normalized.validate()?;

        let code_type = normalized
            .code_type
            .parse()
            .map_err(|_| FieldErrors::single("code_type", INVALID_CODE_TYPE))?;

        Ok(GenerateRequest {
            email: normalized.email,
            code_type,
            organization: normalized.organization,
            subject: normalized.subject,
        })
    }
}

/// Raw input of the "verify" form.
///
/// The email isn't typed by the user, it's carried over from the
/// generate step (see [`FlowController::verify_form`](crate::flow::FlowController::verify_form)).
#[derive(Clone, Debug, Default, PartialEq, Eq, Validate)]
pub struct VerifyForm {
    /// The address the code was sent to
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    /// The code as typed by the user
    #[validate(length(
        min = 6,
        max = 6,
        message = "Your one-time password must be 6 characters."
    ))]
    #[validate(custom = "letters_and_digits")]
    pub code: String,
}

impl VerifyForm {
    /// Validate the form. Nothing is sent anywhere.
    pub fn submit(&self) -> Result<VerifyRequest, FieldErrors> {
        let normalized = Self {
            email: self.email.trim().to_string(),
            code: self.code.trim().to_string(),
        };

        normalized.validate()?;

        Ok(VerifyRequest {
            email: normalized.email,
            otp: normalized.code,
        })
    }
}

fn known_code_type(s: &str) -> Result<(), ValidationError> {
    s.parse::<CodeType>()
        .map(|_| ())
        .map_err(|_| with_message("code_type", INVALID_CODE_TYPE))
}

fn letters_and_digits(s: &str) -> Result<(), ValidationError> {
    if s.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(with_message("code_characters", CODE_CHARACTERS))
    }
}

fn with_message(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

/// Human readable validation failures, keyed by field name.
///
/// Only the first failure of each field is kept, that's all a form shows.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    fn single(field: &'static str, message: &str) -> Self {
        Self(BTreeMap::from([(field, message.to_string())]))
    }

    /// The message for a given field, if it failed
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Iterate over `(field, message)` pairs ordered by field name
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        self.0.iter().map(|(field, message)| (*field, message.as_str()))
    }

    /// Number of failed fields
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no field failed
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<ValidationErrors> for FieldErrors {
    fn from(errors: ValidationErrors) -> Self {
        let map = errors
            .field_errors()
            .into_iter()
            .filter_map(|(field, errs)| {
                let err = errs.first()?;
                let message = err
                    .message
                    .as_deref()
                    .map_or_else(|| err.code.to_string(), str::to_string);
                Some((field, message))
            })
            .collect();
        Self(map)
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, message) in self.iter() {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for FieldErrors {}
