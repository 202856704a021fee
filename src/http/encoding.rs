//! Response compression.
//!
//! # Responsibilities
//! - Pick one content coding from `Accept-Encoding`
//! - Wrap a response body (file stream or in-memory bytes) in that coding
//!
//! # Design Decisions
//! - Deliberately simple negotiation: `deflate` beats `gzip`, q-values are ignored
//! - `deflate` means the zlib-wrapped stream, as HTTP defines it
//! - Bodies are streamed through the encoder, never buffered whole

use axum::body::Body;
use axum::http::HeaderValue;
use async_compression::tokio::bufread::{GzipEncoder, ZlibEncoder};
use bytes::Bytes;
use tokio::io::{AsyncRead, BufReader};
use tokio_util::io::ReaderStream;

/// A content coding applied to a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Deflate,
    Gzip,
    Identity,
}

impl Encoding {
    /// Choose the coding for a request's `Accept-Encoding` value.
    pub fn negotiate(accept_encoding: Option<&str>) -> Self {
        let Some(accept) = accept_encoding else {
            return Self::Identity;
        };
        if accepts(accept, "deflate") {
            Self::Deflate
        } else if accepts(accept, "gzip") {
            Self::Gzip
        } else {
            Self::Identity
        }
    }

    /// `Content-Encoding` value, `None` for identity.
    pub fn header_value(self) -> Option<HeaderValue> {
        match self {
            Self::Deflate => Some(HeaderValue::from_static("deflate")),
            Self::Gzip => Some(HeaderValue::from_static("gzip")),
            Self::Identity => None,
        }
    }

    /// Stream `reader` through this coding.
    pub fn encode_reader<R>(self, reader: R) -> Body
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        match self {
            Self::Deflate => Body::from_stream(ReaderStream::new(ZlibEncoder::new(BufReader::new(reader)))),
            Self::Gzip => Body::from_stream(ReaderStream::new(GzipEncoder::new(BufReader::new(reader)))),
            Self::Identity => Body::from_stream(ReaderStream::new(reader)),
        }
    }

    /// Encode an in-memory body.
    pub fn encode_bytes(self, bytes: Bytes) -> Body {
        match self {
            Self::Identity => Body::from(bytes),
            coded => coded.encode_reader(std::io::Cursor::new(bytes)),
        }
    }
}

/// Whether `coding` appears as a whole token in an `Accept-Encoding` list.
fn accepts(accept: &str, coding: &str) -> bool {
    accept.split(',').any(|item| {
        let token = item.split(';').next().unwrap_or_default().trim();
        token.eq_ignore_ascii_case(coding)
    })
}
