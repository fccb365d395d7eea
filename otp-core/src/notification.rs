//! Short-lived messages about the outcome of a submission

/// Whether an operation worked out
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationKind {
    /// The operation succeeded
    Success,
    /// The operation failed, the user may retry
    Error,
}

/// A transient message for the user.
///
/// Created per outcome, shown once, then dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    /// Success or error
    pub kind: NotificationKind,
    /// Optional headline
    pub title: Option<&'static str>,
    /// The message body
    pub description: &'static str,
    /// Label of a suggested follow-up action
    pub action: Option<&'static str>,
}

impl Notification {
    /// A code was generated and is on its way
    pub const CODE_SENT: Self = Self {
        kind: NotificationKind::Success,
        title: None,
        description: "OTP has been sent to your email!",
        action: None,
    };

    /// Requesting a code failed
    pub const CODE_REQUEST_FAILED: Self = Self {
        kind: NotificationKind::Error,
        title: Some("Failed to generate OTP."),
        description: "There was a problem with your request.",
        action: Some("Try again"),
    };

    /// The code was accepted
    pub const CODE_VERIFIED: Self = Self {
        kind: NotificationKind::Success,
        title: Some("OTP Verified"),
        description: "Your OTP has been verified successfully.",
        action: None,
    };

    /// The code was refused, or checking it failed
    pub const CODE_INVALID: Self = Self {
        kind: NotificationKind::Error,
        title: Some("Invalid OTP"),
        description: "Your OTP is invalid.",
        action: None,
    };

    /// Whether this reports a failure
    pub fn is_error(&self) -> bool {
        self.kind == NotificationKind::Error
    }
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.title {
            Some(title) => write!(f, "{title} {}", self.description),
            None => f.write_str(self.description),
        }
    }
}
