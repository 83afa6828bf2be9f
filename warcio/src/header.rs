//! WARC record header data structures.

use std::borrow::Borrow;
use std::io::{self, BufRead, Write};
use std::str;

use indexmap::map::IndexMap;

pub use fieldkind::FieldKind;
pub use fieldname::FieldName;
pub use recordkind::RecordKind;
pub use recordtype::RecordType;

use crate::version::Version;
use crate::{is_token_byte, HeaderParseError};

mod fieldkind;
mod fieldname;
mod recordkind;
mod recordtype;

// We use an IndexMap to preserve the read order of fields when writing them back out;
// std::collections::HashMap randomizes ordering. Every name present maps to at least one value.
type FieldMap = IndexMap<FieldName, Vec<Vec<u8>>>;

/// The largest header [`get_record_header`] will buffer before giving up.
///
/// Real headers are a few hundred bytes; anything this large is almost certainly not a WARC
/// header at all.
const MAX_HEADER_LEN: usize = 1 << 20;

/// The header of a WARC record.
///
/// Field values can be accessed using the [`get_field`](Self::get_field) family of functions, or
/// accessed in parsed form through specific methods such as
/// [`content_length`](Self::content_length). Field values can be modified using the
/// [`set_field`](Self::set_field) and [`add_field`](Self::add_field) methods, or fields can be
/// removed entirely with [`remove_field`](Self::remove_field).
///
/// Some fields (like `WARC-Concurrent-To`) may legitimately appear more than once in a header;
/// all values are retained in the order they were read and can be retrieved with
/// [`get_field_values`](Self::get_field_values).
///
/// ```
/// # use warcio::{Header, Version, FieldKind};
/// // Parse a header from bytes
/// let raw_header = b"\
/// WARC/1.1\r
/// WARC-Record-ID: <urn:uuid:b4beb26f-54c4-4277-8e23-51aa9fc4476d>\r
/// WARC-Date: 2021-08-05T06:22Z\r
/// WARC-Type: resource\r
/// Content-Length: 0\r
/// \r
/// ";
/// let (parsed_header, parsed_size) = Header::parse(raw_header).unwrap();
/// assert_eq!(parsed_size, raw_header.len());
///
/// // Construct a header from nothing
/// let mut synthetic_header = Header::new(Version::WARC1_1);
/// synthetic_header.set_field(FieldKind::RecordId,
///                            "<urn:uuid:b4beb26f-54c4-4277-8e23-51aa9fc4476d>");
/// synthetic_header.set_field(FieldKind::Date, "2021-08-05T06:22Z");
/// synthetic_header.set_field(FieldKind::Type, "resource");
/// synthetic_header.set_field(FieldKind::ContentLength, "0");
///
/// // Headers compare equal because they have the same version and fields
/// assert_eq!(parsed_header, synthetic_header);
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Header {
    version: Version,
    fields: FieldMap,
}

impl Header {
    pub fn new<V: Into<Version>>(version: V) -> Self {
        Header {
            version: version.into(),
            fields: Default::default(),
        }
    }

    /// Parse a header from bytes, returning the header and the number of bytes consumed.
    pub fn parse(mut bytes: &[u8]) -> Result<(Header, usize), HeaderParseError> {
        let (version_consumed, version) = Version::parse(bytes)?;
        bytes = &bytes[version_consumed..];

        let mut fields: FieldMap = Default::default();
        let mut headers_consumed = 0;
        loop {
            match bytes.get(..2) {
                Some([b'\r', b'\n']) => break,
                Some(_) => { /* Not end of headers, so probably a field */ }
                None => return Err(HeaderParseError::Truncated),
            }

            let (name, value, sz) = Self::parse_field(bytes)
                .map_err(|e| match e {
                    HeaderParseError::MalformedField(_) => {
                        HeaderParseError::MalformedField(version_consumed + headers_consumed)
                    }
                    e => e,
                })?;
            let name =
                str::from_utf8(name).expect("parse_field should only accept ASCII field names");
            trace!("Got header {}: {:?}", name, String::from_utf8_lossy(&value));
            fields.entry(name.into()).or_default().push(value);
            bytes = &bytes[sz..];
            headers_consumed += sz;
        }

        Ok((
            Header { version, fields },
            version_consumed + headers_consumed + 2,
        ))
    }

    /// Parse one `named-field` from the start of `bytes`, returning the name, the value (with
    /// folded lines joined) and the number of bytes consumed.
    pub(crate) fn parse_field(bytes: &[u8]) -> Result<(&[u8], Vec<u8>, usize), HeaderParseError> {
        if bytes.is_empty() {
            return Err(HeaderParseError::Truncated);
        }

        // field-name: at least one token, which is an ASCII value excluding CTL or SEPARATORS
        let name_end = match bytes.iter().position(|&b| !is_token_byte(b)) {
            Some(0) => return Err(HeaderParseError::MalformedField(0)),
            Some(i) => i,
            None => return Err(HeaderParseError::Truncated),
        };
        // literal colon must follow field-name
        if bytes[name_end] != b':' {
            return Err(HeaderParseError::MalformedField(0));
        }

        let mut chunk_start = name_end + 1;
        let mut value: Vec<u8> = vec![];
        let consumed = loop {
            // Trim leading whitespace
            chunk_start += match bytes[chunk_start..]
                .iter()
                .position(|&x| x != b' ' && x != b'\t')
            {
                None => return Err(HeaderParseError::Truncated),
                Some(idx) => idx,
            };

            // Take data until CRLF
            let chunk_end = match bytes[chunk_start..].windows(2).position(|s| s == b"\r\n") {
                Some(idx) => chunk_start + idx,
                None => return Err(HeaderParseError::Truncated),
            };
            if !value.is_empty() {
                value.push(b' ');
            }
            value.extend_from_slice(trim_trailing_lws(&bytes[chunk_start..chunk_end]));

            // Stop if the following byte after CRLF isn't LWS, otherwise continue since it's a
            // folded line.
            match bytes.get(chunk_end + 2) {
                Some(b' ') | Some(b'\t') => {
                    chunk_start = chunk_end + 2;
                    continue;
                }
                Some(_) => break chunk_end + 2,
                // Absent: can't tell
                None => return Err(HeaderParseError::Truncated),
            }
        };

        Ok((&bytes[..name_end], value, consumed))
    }

    /// Write the serialized header (version line, fields and the terminating blank line) to
    /// the given output.
    pub fn write_to<W: Write>(&self, mut dest: W) -> io::Result<()> {
        write!(dest, "{}\r\n", self.version)?;
        for (name, value) in self.iter_field_bytes() {
            dest.write_all(name.as_ref().as_bytes())?;
            dest.write_all(b": ")?;
            dest.write_all(value)?;
            dest.write_all(b"\r\n")?;
        }
        dest.write_all(b"\r\n")
    }

    /// Get the value of a header field as bytes, or None if no such header exists.
    ///
    /// If the field appears more than once, the first value is returned.
    ///
    /// ## URL translation
    ///
    /// For fields that are [defined to contain a bare URI by the
    /// specification](FieldName::value_is_bare_uri), this function will strip surrounding angle
    /// brackets from the value if the [WARC version](Version) of the record is less than 1.1
    /// and they are present. This hides the changed definition of a URL in the standard from
    /// version 1.1.
    pub fn get_field_bytes<F: Into<FieldName>>(&self, field: F) -> Option<&[u8]> {
        let field = field.into();
        let value = self.get_field_bytes_raw(&field)?;
        Some(self.unbracket(&field, value))
    }

    /// Get the value of a header field as bytes, without URL translation.
    pub fn get_field_bytes_raw<F: Borrow<FieldName>>(&self, field: F) -> Option<&[u8]> {
        self.fields
            .get(field.borrow())
            .and_then(|values| values.first())
            .map(Vec::as_slice)
    }

    /// Get the value of a header field, or None if it does not exist or is not a valid Rust string.
    ///
    /// This function transforms fields that are bare URIs in the same way as
    /// [`get_field_bytes`](Header::get_field_bytes).
    pub fn get_field<F: Into<FieldName>>(&self, field: F) -> Option<&str> {
        str::from_utf8(self.get_field_bytes(field)?).ok()
    }

    /// Get every value of a field, in the order they appeared in the header.
    ///
    /// Values that are not valid UTF-8 are skipped.
    pub fn get_field_values<F: Into<FieldName>>(&self, field: F) -> impl Iterator<Item = &str> {
        let field = field.into();
        let values = self.fields.get(&field).map(Vec::as_slice).unwrap_or(&[]);
        values
            .iter()
            .map(move |v| self.unbracket(&field, v))
            .filter_map(|v| str::from_utf8(v).ok())
    }

    fn unbracket<'a>(&self, field: &FieldName, value: &'a [u8]) -> &'a [u8] {
        if field.value_is_bare_uri()
            && self.version <= Version::WARC1_0
            && value.first() == Some(&b'<')
            && value.last() == Some(&b'>')
            && value.len() >= 2
        {
            return &value[1..value.len() - 1];
        }
        value
    }

    /// Return `true` if a field with the given name currently exists in this header.
    pub fn field_exists<F: Into<FieldName>>(&self, field: F) -> bool {
        self.fields.contains_key(&field.into())
    }

    /// Set the value of a header field, replacing all existing values and returning the first
    /// of them (if any).
    ///
    /// This function will panic if the provided name contains characters that are not
    /// permitted in `field-name` context. The value will have angle brackets added if
    /// the field value is a [bare URI](FieldName::value_is_bare_uri) and the record's WARC
    /// version is pre-1.1, performing the opposite transformation of
    /// [`get_field_bytes`](Header::get_field_bytes).
    pub fn set_field<N: Into<FieldName>, V: Into<Vec<u8>>>(
        &mut self,
        name: N,
        value: V,
    ) -> Option<Vec<u8>> {
        let name = name.into();
        let value = self.bracket(&name, value.into());
        self.fields
            .insert(name, vec![value])
            .and_then(|old| old.into_iter().next())
    }

    /// Append a value to a header field, keeping any values already present.
    pub fn add_field<N: Into<FieldName>, V: Into<Vec<u8>>>(&mut self, name: N, value: V) {
        let name = name.into();
        let value = self.bracket(&name, value.into());
        self.fields.entry(name).or_default().push(value);
    }

    fn bracket(&self, name: &FieldName, mut value: Vec<u8>) -> Vec<u8> {
        let name_str: &str = name.as_ref();
        assert!(
            !name_str.is_empty() && name_str.bytes().all(is_token_byte),
            "field name {:?} contains illegal characters",
            name
        );

        if name.value_is_bare_uri() && self.version < Version::WARC1_1 {
            value.reserve_exact(2);
            value.insert(0, b'<');
            value.push(b'>');
        }
        value
    }

    /// Remove every value of a field, returning them if the field was present.
    pub fn remove_field<N: Borrow<FieldName>>(&mut self, name: N) -> Option<Vec<Vec<u8>>> {
        self.fields.shift_remove(name.borrow())
    }

    /// Get an iterator over the fields in this header.
    ///
    /// A field with several values is yielded once per value. In comparison to
    /// [`get_field_bytes`](Self::get_field_bytes), the values yielded by this iterator are the
    /// raw values to be read or written from a serialized record, including angle brackets
    /// or not for values which are [bare URIs](FieldName::value_is_bare_uri) based on
    /// the WARC version.
    pub fn iter_field_bytes(&self) -> impl Iterator<Item = (&FieldName, &[u8])> {
        self.fields
            .iter()
            .flat_map(|(k, values)| values.iter().map(move |v| (k, v.as_slice())))
    }

    /// Get the WARC version of this record.
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Get the [`WARC-Record-ID`](FieldKind::RecordId) field value.
    ///
    /// `WARC-Record-ID` is a mandatory field, but in the interest of parsing leniency a header
    /// is not required to contain it. An empty value is treated as absent.
    pub fn record_id(&self) -> Option<&str> {
        self.get_field(FieldKind::RecordId).filter(|id| !id.is_empty())
    }

    /// Get the record `Content-Length`, if valid.
    ///
    /// If not present or not parseable as an integer, returns None.
    pub fn content_length(&self) -> Option<u64> {
        let s = self.get_field(FieldKind::ContentLength)?;
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        s.parse().ok()
    }

    /// Get the [`WARC-Date`](FieldKind::Date) field value.
    pub fn warc_date(&self) -> Option<&str> {
        self.get_field(FieldKind::Date)
    }

    /// Get the [`WARC-Date`](FieldKind::Date) field value, parsed as a `DateTime`.
    ///
    /// Returns `None` if the field is missing or is not a valid RFC 3339 timestamp. The WARC
    /// format requires UTC (`YYYY-MM-DDThh:mm:ssZ`), but other zone offsets are accepted and
    /// converted. Fractional seconds are permitted.
    #[cfg(feature = "chrono")]
    pub fn warc_date_parsed(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        use chrono::{DateTime, Utc};
        let s = self.warc_date()?;
        match DateTime::parse_from_rfc3339(s) {
            Ok(dt) => Some(dt.with_timezone(&Utc)),
            Err(e) => {
                debug!("WARC-Date {:?} is not a valid timestamp: {}", s, e);
                None
            }
        }
    }

    /// Get the [`WARC-Type`](FieldKind::Type) of the record.
    ///
    /// The WARC specification non-exhaustively defines a number of record types which are
    /// enumerated by [`RecordKind`]; other values are returned as [`RecordType::Other`].
    pub fn warc_type(&self) -> Option<RecordType> {
        self.get_field(FieldKind::Type).map(RecordType::from)
    }

    /// Get the [`WARC-Target-URI`](FieldKind::TargetURI) field value.
    pub fn target_uri(&self) -> Option<&str> {
        self.get_field(FieldKind::TargetURI)
    }
}

fn trim_trailing_lws(mut bytes: &[u8]) -> &[u8] {
    while let Some((&last, rest)) = bytes.split_last() {
        if last != b' ' && last != b'\t' {
            break;
        }
        bytes = rest;
    }
    bytes
}

/// Parse a WARC record header out of the provided `BufRead`.
///
/// Consumes the bytes that are parsed, leaving the reader at the beginning of the record block.
/// On error, returns every byte that was consumed from the input alongside the error so a caller
/// can push them back and resume scanning from where the header started.
pub(crate) fn get_record_header<R: BufRead>(
    mut reader: R,
) -> Result<Header, (HeaderParseError, Vec<u8>)> {
    enum FirstChanceOutcome {
        Success(usize, Header),
        KeepLooking(Vec<u8>),
    }

    // First-chance: without copying anything, operating only from the input's buffer
    let outcome = {
        let buf = reader.fill_buf().map_err(|e| (e.into(), vec![]))?;
        if buf.is_empty() {
            return Err((HeaderParseError::Truncated, vec![]));
        }
        // Weird split of parse and consume here is necessary because buf
        // is borrowed from the reader so we can't consume until we no
        // longer hold a reference to the buffer.
        match Header::parse(buf) {
            Ok((parsed, n)) => FirstChanceOutcome::Success(n, parsed),
            Err(HeaderParseError::Truncated) => {
                // Copy the input we've already searched into a buffer to continue past it
                FirstChanceOutcome::KeepLooking(buf.into())
            }
            Err(e) => return Err((e, vec![])),
        }
    };

    let mut owned_buf = match outcome {
        FirstChanceOutcome::Success(sz, header) => {
            trace!("Found complete header in buffer, {} bytes", sz);
            reader.consume(sz);
            return Ok(header);
        }
        FirstChanceOutcome::KeepLooking(buf) => {
            reader.consume(buf.len());
            buf
        }
    };
    trace!(
        "First-chance read unsuccessful yielding {} bytes",
        owned_buf.len()
    );

    // Second chance: copy out of the reader's buffer until a complete header is held, then give
    // back whatever followed it.
    loop {
        // Tracks the number of bytes we've read that definitely aren't a complete header
        let bytes_consumed = owned_buf.len();
        if bytes_consumed > MAX_HEADER_LEN {
            return Err((HeaderParseError::TooLong(bytes_consumed), owned_buf));
        }
        // Grab some data out of the reader and copy into the owned buffer
        match reader.fill_buf() {
            Ok(buf) => owned_buf.extend_from_slice(buf),
            Err(e) => return Err((e.into(), owned_buf)),
        }
        let n_new = owned_buf.len() - bytes_consumed;
        if n_new == 0 {
            // Read returned 0 bytes
            return Err((HeaderParseError::Truncated, owned_buf));
        }

        // Try to parse what we have buffered
        match Header::parse(&owned_buf) {
            Ok((parsed, n)) => {
                reader.consume(n - bytes_consumed);
                return Ok(parsed);
            }
            Err(HeaderParseError::Truncated) => reader.consume(n_new),
            Err(e) => {
                reader.consume(n_new);
                return Err((e, owned_buf));
            }
        }
    }
}
