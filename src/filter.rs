//! Sender allowlist for callback endpoints.
//!
//! The gateway publishes the addresses its callbacks originate from;
//! everything else gets a 403 before the callback handler runs. The
//! check reads proxy-style headers first and falls back to the direct
//! peer address, comparing plain strings against the allowlist.
//!
//! Forwarding headers are client-controllable, so this is a best-effort
//! screen against stray traffic, not an authentication mechanism. The
//! callback signature check in [`crate::callback`] is what actually
//! authenticates a callback.

use axum::{body::Body, extract::ConnectInfo, response::Response};
use http::{HeaderMap, Request, StatusCode};
use std::convert::Infallible;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use thiserror::Error;
use tower::{Layer, Service};
use tracing::warn;

/// Headers consulted for the sender address, most specific first. The
/// first matching source wins; sources that are absent or empty are
/// skipped.
pub const SENDER_IP_HEADERS: [&str; 6] = [
    "X-Cluster-Client-IP",
    "X-Forwarded-For",
    "X-Forwarded",
    "Forwarded-For",
    "Forwarded",
    "Client-IP",
];

/// Address the gateway sends callbacks from.
pub const GATEWAY_CALLBACK_IP: &str = "5.196.121.217";

/// The callback sender did not match the allowlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("callback sender address is not in the allowlist")]
pub struct UnauthorizedSender;

/// Allowlist of sender addresses, compared as exact strings.
#[derive(Debug, Clone)]
pub struct SenderFilter {
    allowed: Arc<[String]>,
}

impl Default for SenderFilter {
    /// Allows only [`GATEWAY_CALLBACK_IP`].
    fn default() -> Self {
        Self::new([GATEWAY_CALLBACK_IP])
    }
}

impl SenderFilter {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    /// True when any non-empty candidate, header values in priority order
    /// and then the direct peer address, exactly matches the allowlist.
    /// With no usable candidate at all the sender is denied.
    pub fn is_allowed_sender(&self, headers: &HeaderMap, peer_addr: Option<IpAddr>) -> bool {
        for name in SENDER_IP_HEADERS {
            if let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) {
                if !value.is_empty() && self.contains(value) {
                    return true;
                }
            }
        }
        if let Some(addr) = peer_addr {
            if self.contains(&addr.to_string()) {
                return true;
            }
        }
        false
    }

    /// [`is_allowed_sender`](Self::is_allowed_sender) as a `Result`, for
    /// handlers that want to bail with `?`.
    pub fn check(
        &self,
        headers: &HeaderMap,
        peer_addr: Option<IpAddr>,
    ) -> Result<(), UnauthorizedSender> {
        if self.is_allowed_sender(headers, peer_addr) {
            Ok(())
        } else {
            Err(UnauthorizedSender)
        }
    }

    /// Tower layer enforcing this filter in front of a callback route.
    pub fn layer(&self) -> SenderFilterLayer {
        SenderFilterLayer {
            filter: self.clone(),
        }
    }

    fn contains(&self, candidate: &str) -> bool {
        self.allowed.iter().any(|ip| ip == candidate)
    }
}

/// Wraps a service so that disallowed senders get a 403 before the inner
/// service ever sees the request. The peer address is taken from the
/// [`ConnectInfo`] extension when the server provides one.
#[derive(Debug, Clone)]
pub struct SenderFilterLayer {
    filter: SenderFilter,
}

impl<S> Layer<S> for SenderFilterLayer {
    type Service = SenderFilterService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SenderFilterService {
            filter: self.filter.clone(),
            inner,
        }
    }
}

#[derive(Clone)]
pub struct SenderFilterService<S> {
    filter: SenderFilter,
    inner: S,
}

impl<S, B> Service<Request<B>> for SenderFilterService<S>
where
    S: Service<Request<B>, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let peer = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip());

        if self.filter.is_allowed_sender(req.headers(), peer) {
            let clone = self.inner.clone();
            let mut inner = std::mem::replace(&mut self.inner, clone);
            Box::pin(async move { inner.call(req).await })
        } else {
            warn!(peer = ?peer, "rejected callback from unauthorized sender");
            let response = Response::builder()
                .status(StatusCode::FORBIDDEN)
                .body(Body::from(UnauthorizedSender.to_string()))
                .expect("static response parts");
            Box::pin(async move { Ok(response) })
        }
    }
}
