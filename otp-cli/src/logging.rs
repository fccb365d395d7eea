use reqwest::{Request, Response, StatusCode};
use reqwest_middleware::{Middleware, Next};
use task_local_extensions::Extensions;

#[derive(Debug)]
pub(crate) struct LogAndHandleErrorMiddleware;

/// A 4xx or 5xx response, with the body already read out.
#[derive(Debug, thiserror::Error)]
#[error("{kind} error (status code {status}): {body}")]
pub(crate) struct Rejection {
    kind: &'static str,
    pub(crate) status: StatusCode,
    pub(crate) body: String,
}

#[async_trait::async_trait]
impl Middleware for LogAndHandleErrorMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        tracing::info!(
            url = %req.url(),
            method = %req.method(),
            "Running request"
        );
        let resp = next.run(req, extensions).await?;
        let status = resp.status();
        if status.is_client_error() || status.is_server_error() {
            let kind = if status.is_client_error() {
                "Client"
            } else {
                "Server"
            };
            let body = resp.text().await?;
            tracing::warn!(?status, %body, "{kind} error on response");
            Err(anyhow::Error::new(Rejection { kind, status, body }).into())
        } else {
            let content_length = resp.content_length();
            tracing::info!(?status, ?content_length, "Got response");
            Ok(resp)
        }
    }
}
