//! HTTP/1.x message reading and writing over buffered streams.
//!
//! # Responsibilities
//! - Read a bounded head (start line + headers) line by line
//! - Parse the head with `httparse` into `http` types
//! - Decide body framing and buffer the body in memory
//! - Serialize messages back to the wire, re-framing chunked bodies
//!
//! # Design Decisions
//! - Head and body sizes are capped; exceeding a cap is a parse error
//! - Trailers of chunked bodies are consumed and dropped
//! - Interim (1xx) responses are consumed and dropped; only the final
//!   response is returned. A `101` is final and marks the stream closed
//! - `Content-Length` is dropped whenever chunked framing wins

use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{Method, StatusCode, Version};
use std::io;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::LimitsConfig;
use crate::http::message::{should_close, Framing, ProxyRequest, ProxyResponse};

/// Upper bound on the number of header fields in one message.
const MAX_HEADERS: usize = 128;

/// Upper bound on a single chunk-size or trailer line.
const MAX_CHUNK_LINE: u64 = 4096;

/// Errors raised while reading or writing a message.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("peer closed the connection")]
    Eof,
    #[error("peer closed the connection mid-message")]
    UnexpectedEof,
    #[error("header section larger than {0} bytes")]
    HeaderTooLarge(usize),
    #[error("body larger than {0} bytes")]
    BodyTooLarge(usize),
    #[error("malformed message: {0}")]
    Parse(#[from] httparse::Error),
    #[error("invalid header field {0:?}")]
    InvalidHeader(String),
    #[error("invalid content-length")]
    InvalidContentLength,
    #[error("unsupported transfer-encoding")]
    UnsupportedTransferEncoding,
    #[error("invalid chunked encoding")]
    InvalidChunk,
    #[error("io failed: {0}")]
    Io(#[from] io::Error),
}

impl CodecError {
    /// True for the clean end-of-stream case, which is not an error condition.
    pub fn is_eof(&self) -> bool {
        matches!(self, CodecError::Eof)
    }
}

/// Size limits applied while reading.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_header_bytes: usize,
    pub max_body_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self::from(&LimitsConfig::default())
    }
}

impl From<&LimitsConfig> for Limits {
    fn from(config: &LimitsConfig) -> Self {
        Self {
            max_header_bytes: config.max_header_bytes,
            max_body_bytes: config.max_body_bytes,
        }
    }
}

/// Read one complete request from a client stream.
///
/// Returns [`CodecError::Eof`] when the stream ends before the first byte.
pub async fn read_request<R>(reader: &mut R, limits: Limits) -> Result<ProxyRequest, CodecError>
where
    R: AsyncBufRead + Unpin,
{
    let head = read_head(reader, limits.max_header_bytes).await?;
    let (method, target, version, headers) = parse_request_head(&head)?;

    let mut headers = headers;
    let declared = declared_length(&headers)?;
    let framing = if let Some(chunked) = is_chunked(&headers)? {
        if !chunked {
            return Err(CodecError::UnsupportedTransferEncoding);
        }
        // Transfer-Encoding overrides Content-Length; never forward both.
        headers.remove(CONTENT_LENGTH);
        Framing::Chunked
    } else if declared.is_some() {
        Framing::Length
    } else {
        Framing::Empty
    };

    let body = read_body(reader, framing, declared, limits.max_body_bytes).await?;

    Ok(ProxyRequest {
        method,
        target,
        version,
        headers,
        body,
        framing,
    })
}

/// Read one complete response, framed according to the request that produced it.
pub async fn read_response<R>(
    reader: &mut R,
    method: &Method,
    limits: Limits,
) -> Result<ProxyResponse, CodecError>
where
    R: AsyncBufRead + Unpin,
{
    let (version, status, reason, mut headers) = loop {
        let head = match read_head(reader, limits.max_header_bytes).await {
            // A response was expected, so any close here is mid-exchange.
            Err(CodecError::Eof) => return Err(CodecError::UnexpectedEof),
            other => other?,
        };
        let parsed = parse_response_head(&head)?;
        let status = parsed.1;
        if status.is_informational() && status != StatusCode::SWITCHING_PROTOCOLS {
            tracing::trace!(status = status.as_u16(), "Skipping interim response");
            continue;
        }
        break parsed;
    };

    let declared = declared_length(&headers)?;
    let (framing, content_length) = if status == StatusCode::SWITCHING_PROTOCOLS
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
    {
        (Framing::Empty, 0)
    } else if *method == Method::HEAD {
        (Framing::Empty, declared.map_or(-1, |n| n as i64))
    } else if is_chunked(&headers)?.unwrap_or(false) {
        headers.remove(CONTENT_LENGTH);
        (Framing::Chunked, -1)
    } else if let Some(n) = declared {
        (Framing::Length, n as i64)
    } else {
        (Framing::UntilEof, -1)
    };

    let body = read_body(reader, framing, declared, limits.max_body_bytes).await?;
    // After 101 the stream no longer speaks HTTP/1.x; it cannot be reused.
    let close = framing == Framing::UntilEof
        || status == StatusCode::SWITCHING_PROTOCOLS
        || should_close(version, &headers);

    Ok(ProxyResponse {
        version,
        status,
        reason,
        headers,
        body,
        framing,
        content_length,
        close,
    })
}

/// Serialize a request. The caller flushes.
pub async fn write_request<W>(writer: &mut W, req: &ProxyRequest) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut out = Vec::with_capacity(256 + req.body.len());
    out.extend_from_slice(req.method.as_str().as_bytes());
    out.push(b' ');
    out.extend_from_slice(req.target.as_bytes());
    out.push(b' ');
    out.extend_from_slice(version_str(req.version).as_bytes());
    out.extend_from_slice(b"\r\n");
    encode_headers(&mut out, &req.headers);
    encode_body(&mut out, req.framing, &req.body);
    writer.write_all(&out).await
}

/// Serialize a response. The caller flushes.
pub async fn write_response<W>(writer: &mut W, resp: &ProxyResponse) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let reason = resp
        .reason
        .as_deref()
        .or_else(|| resp.status.canonical_reason())
        .unwrap_or("");

    let mut out = Vec::with_capacity(256 + resp.body.len());
    out.extend_from_slice(version_str(resp.version).as_bytes());
    out.push(b' ');
    out.extend_from_slice(resp.status.as_str().as_bytes());
    out.push(b' ');
    out.extend_from_slice(reason.as_bytes());
    out.extend_from_slice(b"\r\n");
    encode_headers(&mut out, &resp.headers);
    encode_body(&mut out, resp.framing, &resp.body);
    writer.write_all(&out).await
}

fn parse_request_head(head: &[u8]) -> Result<(Method, String, Version, HeaderMap), CodecError> {
    let mut slots = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut parsed = httparse::Request::new(&mut slots);
    if parsed.parse(head)?.is_partial() {
        return Err(CodecError::UnexpectedEof);
    }

    let method = Method::from_bytes(parsed.method.unwrap_or_default().as_bytes())
        .map_err(|_| CodecError::Parse(httparse::Error::Token))?;
    let target = parsed.path.unwrap_or("/").to_string();
    let version = map_version(parsed.version);
    let headers = collect_headers(parsed.headers)?;
    Ok((method, target, version, headers))
}

type ResponseHead = (Version, StatusCode, Option<String>, HeaderMap);

fn parse_response_head(head: &[u8]) -> Result<ResponseHead, CodecError> {
    let mut slots = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut parsed = httparse::Response::new(&mut slots);
    if parsed.parse(head)?.is_partial() {
        return Err(CodecError::UnexpectedEof);
    }

    let version = map_version(parsed.version);
    let status = StatusCode::from_u16(parsed.code.unwrap_or_default())
        .map_err(|_| CodecError::Parse(httparse::Error::Status))?;
    let reason = parsed
        .reason
        .filter(|r| !r.is_empty())
        .map(ToString::to_string);
    let headers = collect_headers(parsed.headers)?;
    Ok((version, status, reason, headers))
}

async fn read_head<R>(reader: &mut R, max: usize) -> Result<Vec<u8>, CodecError>
where
    R: AsyncBufRead + Unpin,
{
    let mut head = Vec::with_capacity(1024);
    loop {
        let remaining = max.saturating_sub(head.len());
        if remaining == 0 {
            return Err(CodecError::HeaderTooLarge(max));
        }

        let start = head.len();
        let n = (&mut *reader)
            .take(remaining as u64)
            .read_until(b'\n', &mut head)
            .await?;
        if n == 0 {
            return Err(if head.is_empty() {
                CodecError::Eof
            } else {
                CodecError::UnexpectedEof
            });
        }
        if !head.ends_with(b"\n") {
            return Err(if n == remaining {
                CodecError::HeaderTooLarge(max)
            } else {
                CodecError::UnexpectedEof
            });
        }

        let line = &head[start..];
        if line == b"\r\n" || line == b"\n" {
            if start == 0 {
                // stray empty line before the start line
                head.clear();
                continue;
            }
            return Ok(head);
        }
    }
}

async fn read_body<R>(
    reader: &mut R,
    framing: Framing,
    declared: Option<u64>,
    max: usize,
) -> Result<Bytes, CodecError>
where
    R: AsyncBufRead + Unpin,
{
    match framing {
        Framing::Empty => Ok(Bytes::new()),
        Framing::Length => {
            let len = declared.unwrap_or(0);
            if len > max as u64 {
                return Err(CodecError::BodyTooLarge(max));
            }
            let mut body = vec![0u8; len as usize];
            reader.read_exact(&mut body).await.map_err(eof_to_codec)?;
            Ok(body.into())
        }
        Framing::Chunked => read_chunked(reader, max).await,
        Framing::UntilEof => {
            let mut body = Vec::new();
            (&mut *reader)
                .take(max as u64 + 1)
                .read_to_end(&mut body)
                .await?;
            if body.len() > max {
                return Err(CodecError::BodyTooLarge(max));
            }
            Ok(body.into())
        }
    }
}

async fn read_chunked<R>(reader: &mut R, max: usize) -> Result<Bytes, CodecError>
where
    R: AsyncBufRead + Unpin,
{
    let mut body = Vec::new();
    let mut line = Vec::with_capacity(32);
    loop {
        read_chunk_line(reader, &mut line).await?;
        let size_field = line
            .split(|b| *b == b';')
            .next()
            .map(|s| s.trim_ascii())
            .unwrap_or_default();
        let size_str = std::str::from_utf8(size_field).map_err(|_| CodecError::InvalidChunk)?;
        let size = usize::from_str_radix(size_str, 16).map_err(|_| CodecError::InvalidChunk)?;

        if size == 0 {
            // trailer section, terminated by an empty line
            loop {
                read_chunk_line(reader, &mut line).await?;
                if line.trim_ascii().is_empty() {
                    return Ok(body.into());
                }
            }
        }

        if body.len().saturating_add(size) > max {
            return Err(CodecError::BodyTooLarge(max));
        }
        let start = body.len();
        body.resize(start + size, 0);
        reader
            .read_exact(&mut body[start..])
            .await
            .map_err(eof_to_codec)?;

        read_chunk_line(reader, &mut line).await?;
        if !line.trim_ascii().is_empty() {
            return Err(CodecError::InvalidChunk);
        }
    }
}

async fn read_chunk_line<R>(reader: &mut R, line: &mut Vec<u8>) -> Result<(), CodecError>
where
    R: AsyncBufRead + Unpin,
{
    line.clear();
    let n = (&mut *reader)
        .take(MAX_CHUNK_LINE)
        .read_until(b'\n', line)
        .await?;
    if n == 0 {
        return Err(CodecError::UnexpectedEof);
    }
    if !line.ends_with(b"\n") {
        return Err(CodecError::InvalidChunk);
    }
    Ok(())
}

fn eof_to_codec(e: io::Error) -> CodecError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        CodecError::UnexpectedEof
    } else {
        CodecError::Io(e)
    }
}

fn collect_headers(raw: &[httparse::Header<'_>]) -> Result<HeaderMap, CodecError> {
    let mut headers = HeaderMap::with_capacity(raw.len());
    for h in raw {
        let name = HeaderName::from_bytes(h.name.as_bytes())
            .map_err(|_| CodecError::InvalidHeader(h.name.to_string()))?;
        let value = HeaderValue::from_bytes(h.value)
            .map_err(|_| CodecError::InvalidHeader(h.name.to_string()))?;
        headers.append(name, value);
    }
    Ok(headers)
}

/// `Some(true)` when chunked is the final transfer coding, `Some(false)` for
/// any other transfer coding, `None` without the header.
fn is_chunked(headers: &HeaderMap) -> Result<Option<bool>, CodecError> {
    let mut last = None;
    for value in headers.get_all(TRANSFER_ENCODING) {
        let value = value
            .to_str()
            .map_err(|_| CodecError::UnsupportedTransferEncoding)?;
        if let Some(coding) = value.rsplit(',').map(str::trim).find(|c| !c.is_empty()) {
            last = Some(coding.eq_ignore_ascii_case("chunked"));
        }
    }
    Ok(last)
}

/// Parse `Content-Length`; repeated values must agree.
fn declared_length(headers: &HeaderMap) -> Result<Option<u64>, CodecError> {
    let mut length = None;
    for value in headers.get_all(CONTENT_LENGTH) {
        let text = value.to_str().map_err(|_| CodecError::InvalidContentLength)?;
        for part in text.split(',') {
            let n: u64 = part
                .trim()
                .parse()
                .map_err(|_| CodecError::InvalidContentLength)?;
            match length {
                Some(prev) if prev != n => return Err(CodecError::InvalidContentLength),
                _ => length = Some(n),
            }
        }
    }
    Ok(length)
}

fn map_version(minor: Option<u8>) -> Version {
    match minor {
        Some(0) => Version::HTTP_10,
        _ => Version::HTTP_11,
    }
}

fn version_str(version: Version) -> &'static str {
    if version == Version::HTTP_10 {
        "HTTP/1.0"
    } else {
        "HTTP/1.1"
    }
}

fn encode_headers(out: &mut Vec<u8>, headers: &HeaderMap) {
    for (name, value) in headers {
        out.extend_from_slice(name.as_str().as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");
}

fn encode_body(out: &mut Vec<u8>, framing: Framing, body: &[u8]) {
    match framing {
        Framing::Chunked => {
            if !body.is_empty() {
                out.extend_from_slice(format!("{:x}\r\n", body.len()).as_bytes());
                out.extend_from_slice(body);
                out.extend_from_slice(b"\r\n");
            }
            out.extend_from_slice(b"0\r\n\r\n");
        }
        _ => out.extend_from_slice(body),
    }
}
