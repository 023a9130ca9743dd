use crate::domain::{DialContext, DialError, HandshakeRequest, Rejection, Result};
use crate::ports::BoxedStream;
use http_body_util::Empty;
use hyper::body::Bytes;
use hyper::ext::ReasonPhrase;
use hyper::header::{HeaderName, HeaderValue, HOST, PROXY_AUTHORIZATION};
use hyper::{Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use std::io;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, trace};

/// Upper bound on the response header block read in explicit-header mode.
pub const MAX_RESPONSE_HEADER_SIZE: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Idle,
    RequestSent,
    AwaitingResponse,
    Established,
    Rejected,
    Failed,
}

/// Result of classifying the proxy's answer to CONNECT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Established,
    Rejected(Rejection),
    Failed(String),
}

impl Outcome {
    fn state(&self) -> HandshakeState {
        match self {
            Outcome::Established => HandshakeState::Established,
            Outcome::Rejected(_) => HandshakeState::Rejected,
            Outcome::Failed(_) => HandshakeState::Failed,
        }
    }

    pub fn into_result(self) -> Result<()> {
        match self {
            Outcome::Established => Ok(()),
            Outcome::Rejected(reason) => Err(DialError::Rejected(reason)),
            Outcome::Failed(detail) => Err(DialError::Failed(detail)),
        }
    }
}

/// Classifies the status token of a raw status line; `raw` is the whole response text.
pub fn classify_status_token(token: Option<&str>, raw: &str) -> Outcome {
    match token {
        Some("200") => Outcome::Established,
        Some("407") => Outcome::Rejected(Rejection::AuthRequired),
        Some("405") => Outcome::Rejected(Rejection::MethodNotAllowed),
        _ => Outcome::Failed(raw.to_string()),
    }
}

/// Classifies a parsed status. `reason` is the phrase sent on the wire, if any.
pub fn classify_status(status: StatusCode, reason: Option<&str>) -> Outcome {
    match status {
        StatusCode::OK => Outcome::Established,
        StatusCode::PROXY_AUTHENTICATION_REQUIRED => Outcome::Rejected(Rejection::AuthRequired),
        StatusCode::METHOD_NOT_ALLOWED => Outcome::Rejected(Rejection::MethodNotAllowed),
        status if status.is_server_error() => {
            let reason = reason.or(status.canonical_reason()).unwrap_or_default();
            Outcome::Failed(format!("{} {}", status.as_u16(), reason).trim_end().to_string())
        }
        status => Outcome::Failed(status.as_u16().to_string()),
    }
}

struct Progress<'a> {
    target: &'a str,
    state: HandshakeState,
}

impl<'a> Progress<'a> {
    fn new(target: &'a str) -> Self {
        Self {
            target,
            state: HandshakeState::Idle,
        }
    }

    fn advance(&mut self, next: HandshakeState) {
        trace!(target = %self.target, from = ?self.state, to = ?next, "connect handshake");
        self.state = next;
    }
}

/// Negotiates a CONNECT tunnel to `request.target` over `stream`.
///
/// `proxy` is the proxy address and only labels transport errors. On success the
/// returned stream is positioned right after the proxy's response header.
pub async fn shake_hand(
    stream: BoxedStream,
    request: &HandshakeRequest,
    proxy: &str,
    ctx: &DialContext,
) -> Result<BoxedStream> {
    if request.has_explicit_host() {
        raw_connect(stream, request, proxy, ctx).await
    } else {
        structured_connect(stream, request, proxy, ctx).await
    }
}

async fn raw_connect(
    mut stream: BoxedStream,
    request: &HandshakeRequest,
    proxy: &str,
    ctx: &DialContext,
) -> Result<BoxedStream> {
    let mut progress = Progress::new(&request.target);
    let payload = request.raw_request();

    ctx.run(async {
        stream
            .write_all(payload.as_bytes())
            .await
            .map_err(|e| DialError::transport(proxy, e))?;
        stream.flush().await.map_err(|e| DialError::transport(proxy, e))
    })
    .await?;
    progress.advance(HandshakeState::RequestSent);

    progress.advance(HandshakeState::AwaitingResponse);
    let header = ctx.run(read_response_header(&mut stream, proxy)).await?;
    let raw = String::from_utf8_lossy(&header);

    let status = raw.lines().next().and_then(|line| line.split(' ').nth(1));
    let outcome = classify_status_token(status, &raw);
    progress.advance(outcome.state());
    debug!(target = %request.target, proxy = %proxy, status = ?status, "raw connect answered");

    outcome.into_result()?;
    Ok(stream)
}

/// Reads through the blank line ending the header block and nothing past it.
/// Bare LF line endings are accepted.
async fn read_response_header(stream: &mut BoxedStream, proxy: &str) -> Result<Vec<u8>> {
    let mut header = Vec::with_capacity(256);
    while !(header.ends_with(b"\n\n") || header.ends_with(b"\n\r\n")) {
        if header.len() >= MAX_RESPONSE_HEADER_SIZE {
            return Err(DialError::Failed(format!(
                "response header exceeds {MAX_RESPONSE_HEADER_SIZE} bytes"
            )));
        }
        let byte = stream.read_u8().await.map_err(|e| DialError::transport(proxy, e))?;
        header.push(byte);
    }
    Ok(header)
}

fn build_request(request: &HandshakeRequest) -> Result<Request<Empty<Bytes>>> {
    let invalid = |e: &dyn std::fmt::Display| DialError::Configuration(format!("connect request: {e}"));

    let mut builder = Request::builder()
        .method(Method::CONNECT)
        .uri(request.target.as_str())
        .header(HOST, request.target.as_str())
        .header("Proxy-Connection", "Keep-Alive");

    for (key, value) in &request.headers {
        let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| invalid(&e))?;
        let value = HeaderValue::from_str(value).map_err(|e| invalid(&e))?;
        builder = builder.header(name, value);
    }
    if let Some(auth) = request.proxy_authorization() {
        builder = builder.header(PROXY_AUTHORIZATION, auth);
    }

    builder.body(Empty::<Bytes>::new()).map_err(|e| invalid(&e))
}

async fn structured_connect(
    stream: BoxedStream,
    request: &HandshakeRequest,
    proxy: &str,
    ctx: &DialContext,
) -> Result<BoxedStream> {
    let mut progress = Progress::new(&request.target);
    let mut connect = build_request(request)?;

    // hyper swallows 1xx heads; the first one decides the outcome
    let informational = Arc::new(Mutex::new(None::<StatusCode>));
    let seen = informational.clone();
    hyper::ext::on_informational(&mut connect, move |response| {
        if let Ok(mut first) = seen.lock() {
            first.get_or_insert(response.status());
        }
    });
    let first_informational = move || informational.lock().ok().and_then(|first| *first);

    let transport = |e: hyper::Error| DialError::transport(proxy, io::Error::other(e));

    let (mut sender, conn) = hyper::client::conn::http1::Builder::new()
        .title_case_headers(true)
        .handshake::<_, Empty<Bytes>>(TokioIo::new(stream))
        .await
        .map_err(transport)?;

    let target = request.target.clone();
    let driver = tokio::spawn(async move {
        if let Err(e) = conn.with_upgrades().await {
            debug!(target = %target, "connect driver stopped: {}", e);
        }
    });
    let driver_handle = driver.abort_handle();

    let negotiated = ctx
        .run(async {
            progress.advance(HandshakeState::RequestSent);
            let sent = sender.send_request(connect).await;
            progress.advance(HandshakeState::AwaitingResponse);

            if let Some(status) = first_informational() {
                let outcome = classify_status(status, None);
                progress.advance(outcome.state());
                debug!(target = %request.target, proxy = %proxy, status = %status, "connect answered");
                outcome.into_result()?;
            }
            let response = sent.map_err(transport)?;

            let reason = response
                .extensions()
                .get::<ReasonPhrase>()
                .and_then(|phrase| std::str::from_utf8(phrase.as_bytes()).ok())
                .map(str::to_string);
            let outcome = classify_status(response.status(), reason.as_deref());
            progress.advance(outcome.state());
            debug!(target = %request.target, proxy = %proxy, status = %response.status(), "connect answered");
            outcome.into_result()?;

            let upgraded = hyper::upgrade::on(response).await.map_err(transport)?;
            Ok(TokioIo::new(upgraded))
        })
        .await;

    match negotiated {
        Ok(upgraded) => Ok(Box::new(upgraded)),
        Err(e) => {
            driver_handle.abort();
            Err(e)
        }
    }
}
