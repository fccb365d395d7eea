//! Request and response data types exchanged with the remote OTP provider

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Path of the endpoint that generates a code and mails it out
pub const GENERATE_PATH: &str = "/api/otp/generate";

/// Path of the endpoint that checks a submitted code
pub const VERIFY_PATH: &str = "/api/otp/verify";

/// The alphabet the provider draws the code characters from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeType {
    /// Digits only
    #[default]
    Numeric,
    /// Digits and letters
    Alphanumeric,
    /// Letters only
    #[serde(rename = "alphabet", alias = "alphabetic")]
    Alphabetic,
}

impl CodeType {
    /// All code types, in the order they're offered to users
    pub const ALL: [CodeType; 3] = [Self::Numeric, Self::Alphanumeric, Self::Alphabetic];

    /// The literal used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::Alphanumeric => "alphanumeric",
            Self::Alphabetic => "alphabet",
        }
    }

    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Numeric => "Numeric",
            Self::Alphanumeric => "Alphanumeric",
            Self::Alphabetic => "Alphabet",
        }
    }
}

impl std::fmt::Display for CodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.as_str().fmt(f)
    }
}

/// Returned when parsing an unknown code type literal
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown OTP type {0:?}")]
pub struct UnknownCodeType(
    /// The literal that failed to parse
    pub String,
);

impl FromStr for CodeType {
    type Err = UnknownCodeType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "numeric" => Ok(Self::Numeric),
            "alphanumeric" => Ok(Self::Alphanumeric),
            "alphabet" | "alphabetic" => Ok(Self::Alphabetic),
            _ => Err(UnknownCodeType(s.to_string())),
        }
    }
}

/// Body of a code generation request.
///
/// Only ever constructed through validation, see
/// [`GenerateForm::submit`](crate::validation::GenerateForm::submit).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Where the provider should mail the code
    pub email: String,
    /// Which alphabet the code is drawn from
    #[serde(rename = "type")]
    pub code_type: CodeType,
    /// Organization name shown in the email
    pub organization: String,
    /// Subject line of the email
    pub subject: String,
}

/// Body of a code verification request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyRequest {
    /// The email address the code was sent to
    pub email: String,
    /// The code the user received
    pub otp: String,
}

/// Whatever the provider answered on success.
///
/// The flow only cares that a call succeeded, so the body is kept as raw JSON.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerAck(pub serde_json::Value);

impl ServerAck {
    /// Parse a response body. An empty body acknowledges with `null`.
    pub fn from_body(body: &[u8]) -> Result<Self, serde_json::Error> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(serde_json::Value::Null));
        }
        serde_json::from_slice(body).map(Self)
    }
}
