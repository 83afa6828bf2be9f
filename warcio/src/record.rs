//! Operations on complete WARC records.
use std::io::{Error as IoError, ErrorKind, Result as IoResult, Write};

use thiserror::Error;

use crate::compression::{self, Compression};
use crate::header::{FieldKind, Header, RecordType};
use crate::HeaderParseError;

/// The bytes that must follow every record block.
pub(crate) const RECORD_TAIL: &[u8] = b"\r\n\r\n";

/// An error in reading a record from an input stream.
#[derive(Debug, Error)]
pub enum InvalidRecord {
    /// The header of the record was malformed.
    ///
    /// This may mean the input doesn't actually contain WARC records.
    #[error("record header is not valid: {0}")]
    InvalidHeader(#[source] HeaderParseError),
    /// The length of the payload could not be determined.
    ///
    /// Contained value is the contents of the Content-Length header.
    #[error("Content-Length is not a valid integer (contained bytes {0:?})")]
    UnknownLength(Option<Vec<u8>>),
    /// A field the standard requires of every record is absent.
    #[error("record has no {0} field")]
    MissingField(FieldKind),
    /// The record block was not followed by `CRLF CRLF`.
    #[error("missing record tail")]
    MissingTail,
    /// The input ended partway through a record.
    #[error("input ended within a record")]
    Truncated,
    /// Compressed input could not be decoded.
    #[error("compressed data is corrupt: {0}")]
    Corrupt(#[source] IoError),
    /// No plausible record start was found within the allowed number of bytes while recovering
    /// from an earlier error.
    #[error("no record boundary found in {0} bytes")]
    RecoveryLimit(u64),
    /// There was no record at all in the input.
    #[error("unexpected end of input")]
    EndOfStream,
    /// Other I/O error.
    #[error("I/O error: {0}")]
    IoError(#[source] IoError),
}

impl From<HeaderParseError> for InvalidRecord {
    fn from(e: HeaderParseError) -> Self {
        match e {
            HeaderParseError::IoError(e) => e.into(),
            HeaderParseError::Truncated => InvalidRecord::Truncated,
            e => InvalidRecord::InvalidHeader(e),
        }
    }
}

impl From<IoError> for InvalidRecord {
    fn from(e: IoError) -> Self {
        match e.kind() {
            ErrorKind::UnexpectedEof => InvalidRecord::Truncated,
            // The only source of these is a decompressor rejecting its input
            ErrorKind::InvalidData | ErrorKind::InvalidInput => InvalidRecord::Corrupt(e),
            _ => InvalidRecord::IoError(e),
        }
    }
}

/// A complete WARC record: its header and the block of data that followed it.
///
/// Records are read from files by a [`RecordReader`](crate::RecordReader), which holds the
/// whole block in memory. A record may also be constructed with [`Record::new`] and serialized
/// with [`Record::write_to`].
#[derive(Debug, Clone)]
pub struct Record {
    header: Header,
    record_type: RecordType,
    content: Vec<u8>,
    stored_len: Option<u64>,
}

// Where a record was read from has no bearing on its identity.
impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.header == other.header && self.content == other.content
    }
}

impl Eq for Record {}

impl Record {
    /// Construct a record from a header and block.
    ///
    /// The header's `Content-Length` is set to the length of `content`; all other fields are
    /// kept exactly as given.
    pub fn new(mut header: Header, content: Vec<u8>) -> Self {
        header.set_field(FieldKind::ContentLength, content.len().to_string());
        Self::from_parts(header, content)
    }

    /// Construct a record from an already-consistent header and block.
    pub(crate) fn from_parts(header: Header, content: Vec<u8>) -> Self {
        let record_type = header.warc_type().unwrap_or_else(RecordType::unknown);
        Record {
            header,
            record_type,
            content,
            stored_len: None,
        }
    }

    pub(crate) fn set_stored_len(&mut self, len: u64) {
        self.stored_len = Some(len);
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The record's type, resolved from its `WARC-Type` when it was constructed.
    ///
    /// A record without a type is [`RecordType::unknown`].
    pub fn record_type(&self) -> &RecordType {
        &self.record_type
    }

    /// Shorthand for [`Header::record_id`].
    pub fn record_id(&self) -> Option<&str> {
        self.header.record_id()
    }

    /// The record block.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Get the length of the record block.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        self.content.len() as u64
    }

    /// The number of bytes the record occupied in the file it was read from, if it was read
    /// from a file.
    ///
    /// For compressed files this is the size of the compressed member.
    pub fn stored_len(&self) -> Option<u64> {
        self.stored_len
    }

    pub fn into_parts(self) -> (Header, Vec<u8>) {
        (self.header, self.content)
    }

    /// Read a single record from an input stream.
    ///
    /// Violations are tolerated as by a lenient [`RecordReader`](crate::RecordReader), but no
    /// attempt is made to find another record if this one cannot be read. A successfully read
    /// record leaves the input immediately following it.
    pub fn read_from<R: std::io::BufRead>(
        reader: R,
        compression: Compression,
    ) -> Result<Self, InvalidRecord> {
        let options = crate::ReadOptions::default();
        let mut reader = crate::RecordReader::new(reader, compression, 0, options);
        match reader.next() {
            Some(Ok((record, _))) => Ok(record),
            Some(Err(e)) => Err(e.into_kind()),
            None => Err(InvalidRecord::EndOfStream),
        }
    }

    /// Serialize the record to `dest` with the given compression, returning `dest` once
    /// written.
    ///
    /// Compressed records are written as a complete gzip member, so several records written to
    /// the same output in sequence form a valid compressed WARC file.
    pub fn write_to<W: Write>(&self, dest: W, compression: Compression) -> IoResult<W> {
        let mut writer = compression::Writer::new(dest, compression);
        self.header.write_to(&mut writer)?;
        writer.write_all(&self.content)?;
        writer.write_all(RECORD_TAIL)?;
        writer.finish()
    }
}
