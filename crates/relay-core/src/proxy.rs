//! Forwards one request over one logical channel and streams the reply back.

use std::{
    pin::Pin,
    task::{Context, Poll},
};

use bytes::Bytes;
use http::{Request, Response, Uri, Version, uri::PathAndQuery};
use http_body::{Body, Frame, SizeHint};
use http_body_util::BodyExt;
use hyper::{body::Incoming, client::conn::http1};
use hyper_util::rt::TokioIo;
use ssh_core::{Endpoint, LogicalChannel};
use tokio::{sync::OwnedSemaphorePermit, task::JoinHandle};
use tracing::{debug, warn};

use crate::error::{RelayError, RelayResult, ResponseBody};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Owns a logical channel for the duration of one request.
#[derive(Debug)]
pub struct ChannelProxy {
    channel: LogicalChannel,
    permit: Option<OwnedSemaphorePermit>,
}

impl ChannelProxy {
    pub fn new(channel: LogicalChannel) -> Self {
        Self { channel, permit: None }
    }

    /// Hold an admission permit until the channel is released.
    pub fn with_permit(mut self, permit: Option<OwnedSemaphorePermit>) -> Self {
        self.permit = permit;
        self
    }

    /// Send `request` as HTTP/1.1 over the channel and return the tunneled response.
    ///
    /// Failures become a `502` text response; nothing is retried.
    pub async fn handle<B>(self, request: Request<B>) -> Response<ResponseBody>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let target = self.channel.target().clone();
        match self.forward(request).await {
            Ok(response) => {
                debug!(%target, status = %response.status(), "tunneled response received");
                response
            }
            Err(err) => {
                warn!(%target, error = %err, "forwarding over channel failed");
                err.to_response()
            }
        }
    }

    async fn forward<B>(self, request: Request<B>) -> RelayResult<Response<ResponseBody>>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let Self { channel, permit } = self;
        let target = channel.target().clone();
        let outbound = translate_request(request);

        let mut builder = http1::Builder::new();
        builder.preserve_header_case(true);
        let (mut sender, connection) = builder
            .handshake(TokioIo::new(channel))
            .await
            .map_err(|err| RelayError::forward(&target, err))?;
        let driver = tokio::spawn(async move {
            if let Err(err) = connection.await {
                debug!(error = %err, "tunneled connection ended with error");
            }
        });
        // From here on dropping the guard aborts the driver, which drops the channel.
        let guard = ChannelGuard {
            driver,
            _permit: permit,
            target,
        };

        let response = sender
            .send_request(outbound)
            .await
            .map_err(|err| RelayError::forward(&guard.target, err))?;
        let (parts, body) = response.into_parts();
        let body = RelayBody { inner: body, _guard: guard }.boxed();
        Ok(Response::from_parts(parts, body))
    }
}

/// Rebuild an inbound request for the tunneled endpoint.
///
/// Method, headers and body pass through untouched. The URI is reduced to
/// origin form and the version pinned to HTTP/1.1, which is what goes on the wire.
/// Extensions are kept so the inbound header casing is written back out as received.
pub fn translate_request<B>(request: Request<B>) -> Request<B> {
    let (mut parts, body) = request.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .cloned()
        .unwrap_or_else(|| PathAndQuery::from_static("/"));
    parts.uri = Uri::from(path_and_query);
    parts.version = Version::HTTP_11;
    Request::from_parts(parts, body)
}

/// Keeps the connection driver (and with it the channel) alive while the body streams.
struct ChannelGuard {
    driver: JoinHandle<()>,
    _permit: Option<OwnedSemaphorePermit>,
    target: Endpoint,
}

impl Drop for ChannelGuard {
    fn drop(&mut self) {
        self.driver.abort();
        debug!(target = %self.target, "request finished, releasing channel");
    }
}

struct RelayBody {
    inner: Incoming,
    _guard: ChannelGuard,
}

impl Body for RelayBody {
    type Data = Bytes;
    type Error = hyper::Error;

    fn poll_frame(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Pin::new(&mut self.inner).poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
