use std::fmt;
use std::str;

use crate::HeaderParseError;

/// The version of a WARC record.
///
/// Versions 0.9, 1.0 and 1.1 are all well-known, corresponding to the IIPC draft
/// WARC specification, ISO 28500 and ISO 28500:2016, respectively. Those well-known
/// versions can be conveniently referred to with associated constants like
/// [`WARC1_0`](Self::WARC1_0) and [`WARC1_1`](Self::WARC1_1).
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub struct Version {
    /// The integer part of the version number.
    ///
    /// In '12.345', this is 12.
    pub major: u32,
    /// The fractional part of the version number.
    ///
    /// In '12.345', this is 345.
    pub minor: u32,
}

impl Version {
    /// WARC 1.0, as specified by ISO 28500:2009.
    pub const WARC1_0: Self = Version { major: 1, minor: 0 };
    /// WARC 1.1, as specified by ISO 28500:2017.
    pub const WARC1_1: Self = Version { major: 1, minor: 1 };

    /// The bytes every version line (and so every record) begins with.
    pub const SIGNATURE: &'static [u8] = b"WARC/";

    /// Parse the version line of a record from a buffer, returning the number of bytes
    /// consumed and the parsed version.
    ///
    /// ```
    /// # use warcio::Version;
    /// let buf = b"WARC/1.0\r\n\
    ///             <more here>";
    /// assert_eq!(
    ///     Version::parse(&buf[..]),
    ///     Ok((10, Version::WARC1_0))
    /// );
    /// ```
    pub fn parse(bytes: &[u8]) -> Result<(usize, Version), HeaderParseError> {
        let sig_len = Self::SIGNATURE.len();
        if bytes.len() < sig_len {
            return if Self::SIGNATURE.starts_with(bytes) {
                Err(HeaderParseError::Truncated)
            } else {
                Err(HeaderParseError::invalid_signature(bytes))
            };
        }
        if !bytes.starts_with(Self::SIGNATURE) {
            return Err(HeaderParseError::invalid_signature(&bytes[..sig_len]));
        }

        // Something like "WARC/1.1\r\n" is expected, so a line longer than this is garbage
        // rather than a version we haven't finished reading yet.
        const MAX_LINE: usize = 32;
        let line_end = match bytes.windows(2).position(|x| x == b"\r\n") {
            Some(i) => i,
            None if bytes.len() < MAX_LINE => return Err(HeaderParseError::Truncated),
            None => return Err(HeaderParseError::invalid_signature(&bytes[..MAX_LINE])),
        };
        let line = &bytes[..line_end];

        let number = &line[sig_len..];
        let dot = match number.iter().position(|&x| x == b'.') {
            Some(i) => i,
            None => return Err(HeaderParseError::invalid_signature(line)),
        };
        let major = parse_component(&number[..dot]).ok_or_else(|| HeaderParseError::invalid_signature(line))?;
        let minor = parse_component(&number[dot + 1..]).ok_or_else(|| HeaderParseError::invalid_signature(line))?;

        Ok((line_end + 2, Version { major, minor }))
    }
}

/// Parse one dotted component of a version number, which must be all ASCII digits.
fn parse_component(bytes: &[u8]) -> Option<u32> {
    if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    str::from_utf8(bytes).ok()?.parse().ok()
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "WARC/{}.{}", self.major, self.minor)
    }
}

/// Construct a Version with parts from a tuple of integers.
impl From<(u32, u32)> for Version {
    fn from((major, minor): (u32, u32)) -> Self {
        Version { major, minor }
    }
}
