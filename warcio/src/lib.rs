//! Tools for reading, writing, and working with WARC (Web ARChive) files.
//!
//! ## Background
//!
//! WARC files are used to store digital resources and related information, generally for archival
//! storage. They are most commonly used to store the results of web crawls, wherein a crawler
//! requests resources from any desired web server(s) while storing the request that was sent for
//! each resource, the corresponding response, metadata for each and optionally other related
//! information.
//!
//! The WARC file format is formalized in an international standard, ISO 28500, which to date has
//! two published versions: ISO 28500:2009 (WARC 1.0) and ISO 28500:2017 (WARC 1.1). Freely
//! available specifications are published by the IIPC at
//! <https://iipc.github.io/warc-specifications/>.
//!
//! ## WARC structure
//!
//! A WARC file is a simple concatenation of records. Each record has a format similar to an HTTP
//! message, consisting of a version declaration, a number of header fields, and any number of bytes
//! of data. A simple record representing an HTTP request might look like this:
//!
//! ```text
//! WARC/1.1
//! WARC-Type: request
//! WARC-Target-URI: https://example.com
//! Content-Type: application/http;msgtype=request
//! WARC-Record-ID: <urn:uuid:e061d11b-fb0a-4314-88c5-54e4870be701>
//! WARC-Date: 2021-08-24T23:19:14Z
//! Content-Length: 135
//!
//! GET /image/png HTTP/1.1
//! User-Agent: Wget/1.21.1
//! Accept: */*
//! Accept-Encoding: identity
//! Host: httpbin.org
//! Connection: Keep-Alive
//!
//!
//!
//! ```
//!
//! The portion of the record before `GET` is the record header, and the remainder is the record
//! block followed by two newlines (each of them `\r\n`) marking the end of the record.
//!
//! ## Library structure
//!
//! A [`Header`] holds the record version and its fields, and a [`Record`] pairs a header with
//! the record block. Files are read sequentially with a [`RecordReader`], which yields every
//! record together with the byte offset at which it starts and can recover from damaged
//! records when not operating in strict mode:
//!
//! ```no_run
//! use warcio::{RecordReader, ReadOptions};
//!
//! let mut reader = RecordReader::open("example.warc.gz", 0, ReadOptions::default())?;
//! while let Some(next) = reader.next() {
//!     match next {
//!         Ok((record, offset)) => println!("{} {}", offset, record.record_type().as_ref()),
//!         Err(e) if e.is_fatal() => return Err(e.into()),
//!         Err(e) => eprintln!("skipping damaged record: {}", e),
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
#[macro_use]
extern crate log;

use thiserror::Error;

pub mod compression;
mod header;
pub mod reader;
pub mod record;
#[cfg(test)]
mod tests;
mod version;

pub use compression::Compression;
pub use header::{FieldKind, FieldName, Header, RecordKind, RecordType};
pub use reader::{OpenError, ReadError, ReadOptions, RecordReader};
pub use record::{InvalidRecord, Record};
pub use version::Version;

/// Reasons it may be impossible to parse a WARC header.
#[derive(Debug, Error)]
pub enum HeaderParseError {
    /// The WARC/m.n signature marking the start of a record is not present or invalid.
    ///
    /// The contained value is a UTF-8 interpretation of the data that was attempted to be parsed.
    #[error("WARC signature missing or invalid (near \"{0}\")")]
    InvalidSignature(String),
    /// A header field was malformed.
    ///
    /// The contained value is the offset of the malformed field from the start of the header.
    #[error("header field at byte {0} is malformed")]
    MalformedField(usize),
    /// An I/O error occured while trying to read the input.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    /// The parser reached the end of the input before the end of the WARC header.
    #[error("input ended before end of header")]
    Truncated,
    /// No end of header was found within a reasonable number of bytes.
    #[error("header not terminated after {0} bytes")]
    TooLong(usize),
}

impl std::cmp::PartialEq for HeaderParseError {
    fn eq(&self, other: &Self) -> bool {
        use HeaderParseError::*;

        match (self, other) {
            (Truncated, Truncated) => true,
            (TooLong(x), TooLong(y)) => x == y,
            (MalformedField(x), MalformedField(y)) => x == y,
            (InvalidSignature(x), InvalidSignature(y)) => x == y,
            (IoError(e1), IoError(e2)) => e1.kind() == e2.kind(),
            (_, _) => false,
        }
    }
}

impl HeaderParseError {
    fn invalid_signature(sig_bytes: &[u8]) -> Self {
        HeaderParseError::InvalidSignature(String::from_utf8_lossy(sig_bytes).into_owned())
    }
}

/// WARC EBNF "separators" class
const SEPARATORS: &[u8] = b"()<>@,;:\\\"/[]?={} \t";

/// Returns `true` if a byte is in the WARC EBNF "CTL" class: ASCII 0-31 and DEL (127).
#[inline]
fn is_ctl(b: u8) -> bool {
    b < 0x20 || b == 0x7f
}

/// Returns `true` if a byte may appear in a `token`, such as a field name.
#[inline]
fn is_token_byte(b: u8) -> bool {
    b.is_ascii() && !is_ctl(b) && !SEPARATORS.contains(&b)
}
