use std::cmp::Ordering;
use std::convert::TryFrom;
use std::fmt;
use std::hash::{Hash, Hasher};

use uncased::AsUncased;

use crate::RecordKind;

/// The kind of a single WARC record.
///
/// Every record is specified to have a type in its [`WARC-Type`](crate::FieldKind::Type) field.
/// This enumeration provides variants for those specified in the WARC standard and allows
/// representation of others as might be used by extensions to the core WARC format or future
/// versions.
///
/// Parsed values are case-insensitive and normalize to the standard capitalization, but
/// [unknown](RecordType::Other) values preserve case when parsed. A record that has no type at
/// all is described by [`RecordType::unknown`].
///
/// ```
/// # use warcio::{RecordType, RecordKind};
/// let response_type = RecordType::from("Response");
///
/// assert_eq!(response_type, RecordKind::Response);
/// assert_eq!(response_type.as_ref(), "response");
/// assert_eq!(RecordType::from("x-custom"), RecordType::Other("x-custom".into()));
/// ```
#[derive(Debug, Clone)]
pub enum RecordType {
    /// A known (standardized) record type.
    Known(RecordKind),
    /// Any unrecognized record type.
    ///
    /// Software *shall* skip records of unknown type, which may be defined in future versions
    /// of the file format.
    Other(Box<str>),
}

impl RecordType {
    /// The tag used for records whose `WARC-Type` is missing.
    pub const UNKNOWN: &'static str = "unknown";

    /// The type of a record that does not declare one.
    pub fn unknown() -> Self {
        RecordType::Other(Self::UNKNOWN.into())
    }

    /// Returns the standardized kind of this type, if it is one.
    pub fn kind(&self) -> Option<RecordKind> {
        match self {
            RecordType::Known(k) => Some(*k),
            RecordType::Other(_) => None,
        }
    }
}

impl AsRef<str> for RecordType {
    fn as_ref(&self) -> &str {
        match self {
            RecordType::Known(x) => x.as_ref(),
            RecordType::Other(s) => s,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<&str> for RecordType {
    fn from(s: &str) -> Self {
        match RecordKind::try_from(s) {
            Ok(x) => RecordType::Known(x),
            Err(_) => RecordType::Other(s.into()),
        }
    }
}

impl From<String> for RecordType {
    fn from(s: String) -> Self {
        match RecordKind::try_from(s.as_str()) {
            Ok(x) => RecordType::Known(x),
            Err(_) => RecordType::Other(s.into_boxed_str()),
        }
    }
}

impl From<RecordKind> for RecordType {
    fn from(kind: RecordKind) -> Self {
        RecordType::Known(kind)
    }
}

impl PartialEq for RecordType {
    fn eq(&self, other: &Self) -> bool {
        self.as_ref().as_uncased() == other.as_ref().as_uncased()
    }
}

impl PartialEq<RecordKind> for RecordType {
    fn eq(&self, other: &RecordKind) -> bool {
        match self {
            RecordType::Known(k) => k == other,
            RecordType::Other(s) => s.as_uncased() == other.as_ref().as_uncased(),
        }
    }
}

impl PartialEq<str> for RecordType {
    fn eq(&self, other: &str) -> bool {
        self.as_ref().as_uncased() == other.as_uncased()
    }
}

impl PartialEq<&str> for RecordType {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

impl Eq for RecordType {}

impl Hash for RecordType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_ref().as_uncased().hash(state)
    }
}

impl PartialOrd for RecordType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RecordType {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_ref().as_uncased().cmp(other.as_ref().as_uncased())
    }
}
