//! The seam between the flow and the remote OTP provider
use crate::common::{GenerateRequest, ServerAck, VerifyRequest};
use async_trait::async_trait;

/// Talks to the external service that generates, mails and checks codes.
///
/// Abstracted away, so the flow can run against the real HTTP API
/// or an in-memory test double. Implementations make exactly one attempt
/// per call.
#[async_trait]
pub trait OtpTransport: Send + Sync {
    /// Ask the provider to generate a code and mail it to `request.email`.
    async fn request_code(&self, request: &GenerateRequest) -> Result<ServerAck, TransportError>;

    /// Ask the provider whether `request.otp` is the current code for `request.email`.
    async fn verify_code(&self, request: &VerifyRequest) -> Result<ServerAck, TransportError>;
}

#[async_trait]
impl<T: OtpTransport + ?Sized> OtpTransport for &T {
    async fn request_code(&self, request: &GenerateRequest) -> Result<ServerAck, TransportError> {
        (**self).request_code(request).await
    }

    async fn verify_code(&self, request: &VerifyRequest) -> Result<ServerAck, TransportError> {
        (**self).verify_code(request).await
    }
}

/// Any failed call to the provider.
///
/// The variants only exist for diagnostics. Users are shown the same
/// message no matter which one occurred.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request never got a response
    #[error("request failed: {0:#}")]
    Network(#[source] anyhow::Error),
    /// The provider answered with a non-2xx status
    #[error("provider rejected request (status code {status}): {body}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body as sent by the provider
        body: String,
    },
    /// The provider answered 2xx with a body that isn't JSON
    #[error("malformed response body: {0}")]
    Malformed(#[from] serde_json::Error),
}
