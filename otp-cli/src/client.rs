//! HTTP implementation of the OTP provider transport
use crate::logging::{LogAndHandleErrorMiddleware, Rejection};
use async_trait::async_trait;
use otp_core::{
    common::{GenerateRequest, ServerAck, VerifyRequest, GENERATE_PATH, VERIFY_PATH},
    traits::{OtpTransport, TransportError},
};
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use serde::Serialize;
use url::Url;

/// Talks to the OTP provider's JSON API.
///
/// One POST per call, no retries, no caching.
#[derive(Debug, Clone)]
pub struct HttpOtpClient {
    client: ClientWithMiddleware,
    api_endpoint: Url,
}

impl HttpOtpClient {
    /// A client for the provider at `api_endpoint`
    pub fn new(api_endpoint: Url) -> Self {
        let client = ClientBuilder::new(Client::new())
            .with(LogAndHandleErrorMiddleware)
            .build();

        Self {
            client,
            api_endpoint,
        }
    }

    /// The base URL requests are sent to
    pub fn api_endpoint(&self) -> &Url {
        &self.api_endpoint
    }

    /// Join an API path onto the endpoint, keeping any path prefix it has
    fn url(&self, path: &str) -> Url {
        let mut url = self.api_endpoint.clone();
        let prefix = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{prefix}{path}"));
        url
    }

    async fn post(&self, path: &str, body: &impl Serialize) -> Result<ServerAck, TransportError> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::Network(e.into()))?;

        Ok(ServerAck::from_body(&bytes)?)
    }
}

#[async_trait]
impl OtpTransport for HttpOtpClient {
    async fn request_code(&self, request: &GenerateRequest) -> Result<ServerAck, TransportError> {
        self.post(GENERATE_PATH, request).await
    }

    async fn verify_code(&self, request: &VerifyRequest) -> Result<ServerAck, TransportError> {
        self.post(VERIFY_PATH, request).await
    }
}

fn transport_error(err: reqwest_middleware::Error) -> TransportError {
    match err {
        reqwest_middleware::Error::Middleware(e) => match e.downcast::<Rejection>() {
            Ok(rejection) => TransportError::Rejected {
                status: rejection.status.as_u16(),
                body: rejection.body,
            },
            Err(e) => TransportError::Network(e),
        },
        reqwest_middleware::Error::Reqwest(e) => TransportError::Network(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use otp_core::common::CodeType;
    use serde_json::json;
    use testresult::TestResult;
    use wiremock::{
        matchers::{body_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn profile() -> GenerateRequest {
        GenerateRequest {
            email: "a@b.com".to_string(),
            code_type: CodeType::Numeric,
            organization: "Acme".to_string(),
            subject: "Login".to_string(),
        }
    }

    fn client_for(server: &MockServer) -> Result<HttpOtpClient, url::ParseError> {
        Ok(HttpOtpClient::new(Url::parse(&server.uri())?))
    }

    #[test_log::test(tokio::test)]
    async fn test_request_code_posts_profile() -> TestResult {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/otp/generate"))
            .and(body_json(json!({
                "email": "a@b.com",
                "type": "numeric",
                "organization": "Acme",
                "subject": "Login",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "OTP sent" })))
            .expect(1)
            .mount(&server)
            .await;

        let ack = client_for(&server)?.request_code(&profile()).await?;

        assert_eq!(ack, ServerAck(json!({ "message": "OTP sent" })));

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_verify_code_posts_email_and_otp() -> TestResult {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/otp/verify"))
            .and(body_json(json!({ "email": "a@b.com", "otp": "123456" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let ack = client_for(&server)?
            .verify_code(&VerifyRequest {
                email: "a@b.com".to_string(),
                otp: "123456".to_string(),
            })
            .await?;

        assert_eq!(ack, ServerAck(serde_json::Value::Null));

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_rejection_passes_body_through() -> TestResult {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/otp/verify"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({ "error": "OTP expired" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let result = client_for(&server)?
            .verify_code(&VerifyRequest {
                email: "a@b.com".to_string(),
                otp: "123456".to_string(),
            })
            .await;

        assert_matches!(
            result,
            Err(TransportError::Rejected { status: 400, body }) if body.contains("OTP expired")
        );

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_server_error() -> TestResult {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let result = client_for(&server)?.request_code(&profile()).await;

        assert_matches!(result, Err(TransportError::Rejected { status: 503, .. }));

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_malformed_body() -> TestResult {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>hi</html>"))
            .mount(&server)
            .await;

        let result = client_for(&server)?.request_code(&profile()).await;

        assert_matches!(result, Err(TransportError::Malformed(_)));

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_unreachable_provider() -> TestResult {
        // Nothing listens on the discard port
        let client = HttpOtpClient::new(Url::parse("http://127.0.0.1:9")?);

        let result = client.request_code(&profile()).await;

        assert_matches!(result, Err(TransportError::Network(_)));

        Ok(())
    }

    #[test]
    fn test_endpoint_path_prefix_is_kept() -> TestResult {
        let client = HttpOtpClient::new(Url::parse("http://localhost:3000/otp-service/")?);

        assert_eq!(
            client.url(GENERATE_PATH).as_str(),
            "http://localhost:3000/otp-service/api/otp/generate"
        );

        let client = HttpOtpClient::new(Url::parse("http://localhost:3000")?);

        assert_eq!(
            client.url(VERIFY_PATH).as_str(),
            "http://localhost:3000/api/otp/verify"
        );

        Ok(())
    }
}
