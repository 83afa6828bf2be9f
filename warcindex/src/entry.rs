//! CDX entries: the flat, encoding-independent description of one indexed record.
use std::borrow::Cow;
use std::num::ParseIntError;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use warcio::{FieldKind, Record, RecordKind};

use crate::surt;
use crate::writer::WriteError;

/// The MIME type given to revisit records in place of the type of their content.
pub const REVISIT_MIME: &str = "warc/revisit";

/// One entry in a CDX index.
///
/// Every field is named by the short string used in all of the index encodings and by
/// [filters](crate::filter::Filter); see [`CdxEntry::FIELDS`]. String fields are empty when
/// the indexed record had no corresponding value.
///
/// Entries are also protobuf messages, which is how they are stored in binary indexes and the
/// [persisted store](crate::store::CdxStore).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, prost::Message)]
#[serde(default)]
pub struct CdxEntry {
    /// SURT-canonicalized target URI.
    #[prost(string, tag = "1")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ssu: String,
    /// Capture timestamp, `yyyyMMddhhmmss`.
    #[prost(string, tag = "2")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sts: String,
    /// Original target URI.
    #[prost(string, tag = "3")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub uri: String,
    #[prost(string, tag = "4")]
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub record_type: String,
    /// MIME type of the captured resource.
    #[prost(string, tag = "5")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub mct: String,
    /// HTTP status code.
    #[prost(string, tag = "6")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub hsc: String,
    /// Payload digest.
    #[prost(string, tag = "7")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub dig: String,
    /// Length of the record as stored, or 0 if unknown.
    #[prost(uint64, tag = "8")]
    #[serde(skip_serializing_if = "is_zero")]
    pub rle: u64,
    #[prost(string, tag = "9")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub rid: String,
    /// Locator, `warcfile:<fnm>#<off>`.
    #[prost(string, tag = "10")]
    #[serde(rename = "ref", skip_serializing_if = "String::is_empty")]
    pub locator: String,
    /// Name of the file containing the record.
    #[prost(string, tag = "11")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub fnm: String,
    /// Offset of the record in its file.
    #[prost(uint64, tag = "12")]
    pub off: u64,
    /// Declared `Content-Length` of the record.
    #[prost(uint64, tag = "13")]
    pub cle: u64,
    /// For revisits, URI of the original capture.
    #[prost(string, tag = "14")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub rou: String,
    /// For revisits, date of the original capture.
    #[prost(string, tag = "15")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub rod: String,
    /// For revisits, record ID of the original capture.
    #[prost(string, tag = "16")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub roi: String,
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

/// Reads the value of one field of an entry as a string.
pub type Accessor = for<'a> fn(&'a CdxEntry) -> Cow<'a, str>;

mod accessors {
    use super::CdxEntry;
    use std::borrow::Cow;

    macro_rules! borrowed {
        ($($name:ident),*) => {
            $(
                pub fn $name(e: &CdxEntry) -> Cow<'_, str> {
                    Cow::Borrowed(&e.$name)
                }
            )*
        };
    }

    macro_rules! numeric {
        ($($name:ident),*) => {
            $(
                pub fn $name(e: &CdxEntry) -> Cow<'_, str> {
                    Cow::Owned(e.$name.to_string())
                }
            )*
        };
    }

    borrowed!(ssu, sts, uri, record_type, mct, hsc, dig, rid, locator, fnm, rou, rod, roi);
    numeric!(off, cle);

    pub fn rle(e: &CdxEntry) -> Cow<'_, str> {
        if e.rle == 0 {
            Cow::Borrowed("")
        } else {
            Cow::Owned(e.rle.to_string())
        }
    }
}

/// Problems decoding an entry from one of the line-based index formats.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("expected {expected} fields but found {found}")]
    FieldCount { expected: usize, found: usize },
    #[error("field {field} is not a valid number: {source}")]
    Number {
        field: &'static str,
        #[source]
        source: ParseIntError,
    },
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl CdxEntry {
    /// The name of every field and the function that reads it, in CDXJ output order.
    ///
    /// Names are case-sensitive.
    pub const FIELDS: &'static [(&'static str, Accessor)] = &[
        ("ssu", accessors::ssu),
        ("sts", accessors::sts),
        ("uri", accessors::uri),
        ("type", accessors::record_type),
        ("mct", accessors::mct),
        ("hsc", accessors::hsc),
        ("dig", accessors::dig),
        ("rle", accessors::rle),
        ("rid", accessors::rid),
        ("ref", accessors::locator),
        ("fnm", accessors::fnm),
        ("off", accessors::off),
        ("cle", accessors::cle),
        ("rou", accessors::rou),
        ("rod", accessors::rod),
        ("roi", accessors::roi),
    ];

    /// Get the value of the named field, or `None` if the name is unknown or the value is
    /// absent.
    ///
    /// Empty strings are absent, as is a zero `rle`.
    pub fn field(&self, name: &str) -> Option<Cow<'_, str>> {
        let (_, accessor) = Self::FIELDS.iter().find(|(n, _)| *n == name)?;
        let value = accessor(self);
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }

    /// Describe a record located at `offset` in the file named `file_name`.
    ///
    /// Fails if the record has no `WARC-Record-ID`.
    pub fn from_record(record: &Record, file_name: &str, offset: u64) -> Result<Self, WriteError> {
        let header = record.header();
        let rid = header
            .record_id()
            .ok_or(WriteError::MissingField {
                field: "WARC-Record-ID",
                offset,
            })?
            .to_owned();
        let uri = header.target_uri().unwrap_or_default().to_owned();
        let is_revisit = record.record_type() == &RecordKind::Revisit;

        let http = HttpSummary::sniff(record);
        let mct = if is_revisit {
            REVISIT_MIME.to_owned()
        } else {
            http.as_ref()
                .and_then(|h| h.content_type.clone())
                .or_else(|| header.get_field(FieldKind::ContentType).map(mime_essence))
                .unwrap_or_default()
        };

        Ok(CdxEntry {
            ssu: surt::canonicalize(&uri),
            sts: timestamp14(record),
            uri,
            record_type: record.record_type().as_ref().to_owned(),
            mct,
            hsc: http.map(|h| h.status.to_string()).unwrap_or_default(),
            dig: payload_digest(record),
            rle: record.stored_len().unwrap_or(0),
            rid,
            locator: locator(file_name, offset),
            fnm: file_name.to_owned(),
            off: offset,
            cle: header.content_length().unwrap_or_else(|| record.len()),
            rou: field_string(record, FieldKind::RefersToTargetURI),
            rod: field_string(record, FieldKind::RefersToDate),
            roi: field_string(record, FieldKind::RefersTo),
        })
    }

    /// Decode an entry from a line of a CDXJ index.
    ///
    /// Keys in the JSON object that are not entry fields are ignored.
    pub fn from_cdxj_line(line: &str) -> Result<Self, DecodeError> {
        let line = line.trim_end_matches(|c| c == '\r' || c == '\n');
        let mut parts = line.splitn(3, ' ');
        let (ssu, sts, json) = match (parts.next(), parts.next(), parts.next()) {
            (Some(ssu), Some(sts), Some(json)) => (ssu, sts, json),
            _ => {
                return Err(DecodeError::FieldCount {
                    expected: 3,
                    found: line.split(' ').count(),
                })
            }
        };

        let mut entry: CdxEntry = serde_json::from_str(json)?;
        if entry.ssu.is_empty() {
            entry.ssu = ssu.to_owned();
        }
        if entry.sts.is_empty() {
            entry.sts = sts.to_owned();
        }
        if entry.locator.is_empty() && !entry.fnm.is_empty() {
            entry.locator = locator(&entry.fnm, entry.off);
        }
        Ok(entry)
    }

    /// Decode an entry from a line of a legacy CDX index as written by
    /// [`CdxLegacy`](crate::writer::CdxLegacy).
    ///
    /// The record type is not stored in these indexes, so it is inferred from the MIME type:
    /// only responses and revisits are written to them.
    pub fn from_legacy_line(line: &str) -> Result<Self, DecodeError> {
        const FIELD_COUNT: usize = 12;
        let line = line.trim_end_matches(|c| c == '\r' || c == '\n');
        let raw: Vec<&str> = line.split(' ').collect();
        if raw.len() != FIELD_COUNT {
            return Err(DecodeError::FieldCount {
                expected: FIELD_COUNT,
                found: raw.len(),
            });
        }
        let values: Vec<String> = raw.into_iter().map(unescape_legacy).collect();
        let number = |field: &'static str, value: &str| -> Result<u64, DecodeError> {
            if value.is_empty() {
                return Ok(0);
            }
            value
                .parse()
                .map_err(|source| DecodeError::Number { field, source })
        };

        // N b a m s k r M S V g u
        let mut values = values.into_iter();
        let mut next = || values.next().unwrap_or_default();
        let ssu = next();
        let sts = next();
        let uri = next();
        let mct = next();
        let hsc = next();
        let dig = next();
        let _redirect = next();
        let _meta = next();
        let rle = number("rle", &next())?;
        let off = number("off", &next())?;
        let fnm = next();
        let rid = next();

        let record_type = if mct == REVISIT_MIME {
            RecordKind::Revisit
        } else {
            RecordKind::Response
        };
        Ok(CdxEntry {
            ssu,
            sts,
            uri,
            record_type: record_type.as_ref().to_owned(),
            mct,
            hsc,
            dig,
            rle,
            rid,
            locator: locator(&fnm, off),
            fnm,
            off,
            ..Default::default()
        })
    }

    /// Format the entry as a line of a CDXJ index, without a line terminator.
    pub fn to_cdxj_line(&self) -> Result<String, serde_json::Error> {
        Ok(format!(
            "{} {} {}",
            self.ssu,
            self.sts,
            serde_json::to_string(self)?
        ))
    }
}

/// Format the locator of a record.
pub fn locator(file_name: &str, offset: u64) -> String {
    format!("warcfile:{}#{}", file_name, offset)
}

fn field_string(record: &Record, field: FieldKind) -> String {
    record
        .header()
        .get_field(field)
        .unwrap_or_default()
        .to_owned()
}

/// Get the type and subtype of a MIME type, discarding parameters.
fn mime_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Format the record date as 14 digits, `yyyyMMddhhmmss`.
fn timestamp14(record: &Record) -> String {
    if let Some(date) = record.header().warc_date_parsed() {
        return date.format("%Y%m%d%H%M%S").to_string();
    }
    // Not a valid timestamp, but the digits are probably still in the right order
    let digits: String = record
        .header()
        .warc_date()
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_digit)
        .take(14)
        .collect();
    if !digits.is_empty() {
        debug!("Using digits {:?} of unparseable WARC-Date", digits);
    }
    digits
}

fn payload_digest(record: &Record) -> String {
    let header = record.header();
    let digest = header
        .get_field(FieldKind::PayloadDigest)
        .or_else(|| header.get_field(FieldKind::BlockDigest))
        .unwrap_or_default();
    match digest.split_once(':') {
        Some((algorithm, value)) if algorithm.eq_ignore_ascii_case("sha1") => value.to_owned(),
        _ => digest.to_owned(),
    }
}

/// The parts of an HTTP response that are indexed.
struct HttpSummary {
    status: u16,
    content_type: Option<String>,
}

impl HttpSummary {
    /// Parse the HTTP response held in a response or revisit record, if there is one.
    fn sniff(record: &Record) -> Option<Self> {
        match record.record_type().kind() {
            Some(RecordKind::Response) | Some(RecordKind::Revisit) => {}
            _ => return None,
        }
        let content_type = record.header().get_field(FieldKind::ContentType)?;
        if !mime_essence(content_type).starts_with("application/http") {
            return None;
        }

        let mut headers = [httparse::EMPTY_HEADER; 64];
        let mut response = httparse::Response::new(&mut headers);
        match response.parse(record.content()) {
            Ok(httparse::Status::Complete(_)) => {}
            // Revisits may hold a truncated response; the status line is all that's required
            Ok(httparse::Status::Partial) if response.code.is_some() => {}
            Ok(httparse::Status::Partial) => return None,
            Err(e) => {
                debug!(
                    "Unable to parse HTTP response in record {:?}: {}",
                    record.record_id(),
                    e
                );
                return None;
            }
        }

        let content_type = response
            .headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case("content-type"))
            .and_then(|h| std::str::from_utf8(h.value).ok())
            .map(mime_essence);
        Some(HttpSummary {
            status: response.code?,
            content_type,
        })
    }
}

/// Written in place of an empty value in legacy CDX lines.
const LEGACY_EMPTY: &str = "-";
/// Written in place of a value that is exactly [`LEGACY_EMPTY`].
const LEGACY_DASH: &str = "%2D";

/// Append `value` to a legacy CDX line.
///
/// Only the characters that would break the line into fields are escaped. Values are usually
/// URIs that are already percent-encoded, and existing escapes are left as they are.
fn escape_legacy(value: &str, out: &mut String) {
    match value {
        "" => out.push_str(LEGACY_EMPTY),
        LEGACY_EMPTY => out.push_str(LEGACY_DASH),
        _ => {
            for c in value.chars() {
                match c {
                    ' ' => out.push_str("%20"),
                    '\t' => out.push_str("%09"),
                    '\n' => out.push_str("%0A"),
                    '\r' => out.push_str("%0D"),
                    c => out.push(c),
                }
            }
        }
    }
}

/// Read a value from a legacy CDX line, which is taken verbatim apart from the placeholders
/// written by [`escape_legacy`].
fn unescape_legacy(value: &str) -> String {
    match value {
        LEGACY_EMPTY => String::new(),
        LEGACY_DASH => LEGACY_EMPTY.to_owned(),
        _ => value.to_owned(),
    }
}

impl CdxEntry {
    /// Format the entry as a line of a legacy CDX index, without a line terminator.
    ///
    /// Fields are those of the header written by [`CdxLegacy`](crate::writer::CdxLegacy).
    pub fn to_legacy_line(&self) -> String {
        let rle = self.rle.to_string();
        let off = self.off.to_string();
        let fields: [&str; 12] = [
            &self.ssu, &self.sts, &self.uri, &self.mct, &self.hsc, &self.dig, "", "", &rle, &off,
            &self.fnm, &self.rid,
        ];

        let mut line = String::new();
        for (i, value) in fields.iter().enumerate() {
            if i > 0 {
                line.push(' ');
            }
            escape_legacy(value, &mut line);
        }
        line
    }
}
