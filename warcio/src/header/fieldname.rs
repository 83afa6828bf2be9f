use std::borrow::Borrow;
use std::cmp::Ordering;
use std::convert::TryFrom;
use std::fmt;
use std::hash::{Hash, Hasher};

use uncased::{AsUncased, UncasedStr};

use crate::FieldKind;

/// The name of a WARC header field.
///
/// Field names are case-insensitive strings made up of one or more ASCII characters excluding
/// control characters (values 0-31 and 127) and separators (`()<>@,;:\"/[]?={} \t`). A `FieldName`
/// can be constructed from arbitrary input using the `From<&str>` impl, or a
/// variant may be directly constructed. A string representation of a parsed name can be obtained
/// through `AsRef<str>`.
///
/// Comparison, ordering, and hashing of field names is always case-insensitive, and the standard
/// variants normalize their case to those used by the standard. Unrecognized values will preserve
/// case when converted to strings but still compare case-insensitively.
///
/// ```
/// # use warcio::{FieldName, FieldKind};
/// let id = FieldKind::RecordId;
/// // Conversion from string via From
/// let parsed_id: FieldName = "warc-record-id".into();
///
/// assert_eq!(id, parsed_id);
/// // Input was cased differently: standard name has been normalized
/// assert_eq!("WARC-Record-ID", parsed_id.as_ref());
/// // Only comparison of FieldNames is case-insensitive, a string is not
/// assert_eq!(parsed_id, FieldName::from("wArC-ReCoRd-Id"));
/// assert_ne!(parsed_id.as_ref(), "wArC-ReCoRd-Id");
/// ```
#[derive(Debug, Clone)]
pub enum FieldName {
    /// A standardized field name.
    Known(FieldKind),
    /// Any unrecognized field name.
    ///
    /// The WARC format permits arbitrarily-named extension fields, and specifies that software
    /// *shall* ignore fields with unrecognized names. This variant allows their representation and
    /// processing but does not ascribe any particular meaning to unrecognized names.
    Other(Box<str>),
}

impl AsRef<str> for FieldName {
    fn as_ref(&self) -> &str {
        match self {
            FieldName::Known(x) => x.as_ref(),
            FieldName::Other(s) => s,
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<&str> for FieldName {
    fn from(s: &str) -> Self {
        match FieldKind::try_from(s) {
            Ok(x) => FieldName::Known(x),
            Err(_) => FieldName::Other(s.into()),
        }
    }
}

impl From<String> for FieldName {
    fn from(s: String) -> Self {
        match FieldKind::try_from(s.as_str()) {
            Ok(x) => FieldName::Known(x),
            Err(_) => FieldName::Other(s.into_boxed_str()),
        }
    }
}

impl From<FieldKind> for FieldName {
    fn from(k: FieldKind) -> Self {
        FieldName::Known(k)
    }
}

impl From<&FieldName> for FieldName {
    fn from(name: &FieldName) -> Self {
        name.clone()
    }
}

impl FieldName {
    /// Returns `true` if a field's value consists of a bare URI.
    ///
    /// While earlier versions of the standard define a URI as `"<" <'URI' per RFC3986> ">"`
    /// (surrounded by angle brackets), WARC 1.1 removes the angle brackets from the grammar
    /// describing a URI and explicitly adds them to some (but not all) fields. This returns
    /// `true` for those fields that do not have angle brackets in a WARC 1.1 record but do in
    /// earlier versions.
    ///
    /// Field values are transformed as necessary when accessed through a
    /// [`Header`](crate::Header), so users will rarely need this directly.
    pub fn value_is_bare_uri(&self) -> bool {
        match self {
            FieldName::Known(kind) => kind.value_is_bare_uri(),
            FieldName::Other(_) => false,
        }
    }
}

impl Borrow<UncasedStr> for FieldName {
    fn borrow(&self) -> &UncasedStr {
        self.as_ref().as_uncased()
    }
}

// Implementing Borrow requires the same semantics between the borrowed and original versions,
// so Eq, Ord and Hash are implemented in terms of the case-insensitive field name.
impl PartialEq for FieldName {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldName::Known(l), FieldName::Known(r)) => l == r,
            _ => self.as_ref().as_uncased() == other.as_ref().as_uncased(),
        }
    }
}

impl Eq for FieldName {}

impl PartialOrd for FieldName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FieldName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_ref().as_uncased().cmp(other.as_ref().as_uncased())
    }
}

impl Hash for FieldName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_ref().as_uncased().hash(state)
    }
}

impl PartialEq<FieldKind> for FieldName {
    fn eq(&self, other: &FieldKind) -> bool {
        match self {
            FieldName::Known(k) => k == other,
            FieldName::Other(s) => s.as_uncased() == other.as_ref().as_uncased(),
        }
    }
}
