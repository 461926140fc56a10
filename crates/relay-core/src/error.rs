use std::net::SocketAddr;

use bytes::Bytes;
use http::{HeaderValue, Response, StatusCode, header::CONTENT_TYPE};
use http_body_util::{BodyExt, Full, combinators::BoxBody};
use ssh_core::{Endpoint, SshCoreError};
use thiserror::Error;

/// Body type of every response the relay produces.
pub type ResponseBody = BoxBody<Bytes, hyper::Error>;

/// Errors raised while relaying a request.
#[derive(Error, Debug)]
pub enum RelayError {
    /// No logical channel could be obtained (maps to 500)
    #[error("could not open tunnel channel to {target}: {source}")]
    ChannelOpen {
        target: String,
        #[source]
        source: SshCoreError,
    },

    /// The request could not be sent over the channel or no response came back (maps to 502)
    #[error("forwarding to {target} failed: {reason}")]
    Forward { target: String, reason: String },

    /// The listen address could not be bound
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for relay operations
pub type RelayResult<T> = Result<T, RelayError>;

impl RelayError {
    pub fn channel_open(target: &Endpoint, source: SshCoreError) -> Self {
        Self::ChannelOpen {
            target: target.to_string(),
            source,
        }
    }

    pub fn forward(target: &Endpoint, reason: impl std::fmt::Display) -> Self {
        Self::Forward {
            target: target.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::Forward { .. } => StatusCode::BAD_GATEWAY,
            RelayError::ChannelOpen { .. } | RelayError::Bind { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Plain-text error response carrying the error message.
    pub fn to_response(&self) -> Response<ResponseBody> {
        let body = Full::new(Bytes::from(self.to_string()))
            .map_err(|never| match never {})
            .boxed();
        let mut response = Response::new(body);
        *response.status_mut() = self.status();
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_text(response: Response<ResponseBody>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn channel_open_renders_as_500_with_reason() {
        let target = Endpoint::new("127.0.0.1", 8200);
        let err = RelayError::channel_open(&target, SshCoreError::channel_open(&target, "connect refused"));
        let response = err.to_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
        assert!(body_text(response).await.contains("connect refused"));
    }

    #[tokio::test]
    async fn forward_failure_renders_as_502() {
        let err = RelayError::forward(&Endpoint::new("127.0.0.1", 8200), "connection closed before message completed");
        let response = err.to_response();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            body_text(response).await,
            "forwarding to 127.0.0.1:8200 failed: connection closed before message completed"
        );
    }
}
