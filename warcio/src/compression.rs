//! Handling of record compression.
//!
//! WARC files can be compressed, but the structure of the compressed data must be managed
//! to ensure a record can be accessed without decompressing every previous one in a file
//! (which may contain many records).
//!
//! Records are individually compressed, each as its own gzip member, so that the file offset
//! of a member is enough for a reader to decode the record it holds. An index of member offsets
//! (such as a CDX file) therefore allows random access into a compressed file.

use std::io::{Result as IoResult, Write};
use std::path::Path;

use flate2::write::GzEncoder;

use crate::Version;

/// The bytes every gzip member begins with: the two magic bytes and the DEFLATE method.
pub const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b, 0x08];

/// The supported methods of compressing a single [`Record`](crate::Record).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Compression {
    /// Uncompressed data
    None,
    /// `gzip` compression, one member per record.
    Gzip,
}

impl Compression {
    /// Return the best guess of compression to be used for a file with the given name.
    ///
    /// A file that may be present is not accessed in any way; only the path is used to guess based
    /// on the name.
    ///
    /// ```
    /// # use warcio::Compression;
    /// assert_eq!(Compression::guess_for_filename("test.warc.gz"), Compression::Gzip);
    /// assert_eq!(Compression::guess_for_filename("test.warc"), Compression::None);
    /// ```
    pub fn guess_for_filename<P: AsRef<Path>>(path: P) -> Compression {
        match path.as_ref().extension() {
            Some(ext) if ext == "gz" => Compression::Gzip,
            _ => Compression::None,
        }
    }

    /// The byte sequence found at the start of every record stored with this compression.
    ///
    /// A reader that has lost its place in a file can scan for this to find a plausible
    /// place to resume.
    pub fn record_signature(self) -> &'static [u8] {
        match self {
            Compression::None => Version::SIGNATURE,
            Compression::Gzip => GZIP_MAGIC,
        }
    }
}

/// Writes to an output stream with specified [`Compression`].
pub enum Writer<W: Write> {
    Plain(W),
    Gzip(GzEncoder<W>),
}

impl<W: Write> Writer<W> {
    /// Construct a writer to the given adapter with the given compression mode.
    pub fn new(dest: W, mode: Compression) -> Self {
        match mode {
            Compression::None => Self::Plain(dest),
            Compression::Gzip => Self::Gzip(GzEncoder::new(dest, flate2::Compression::best())),
        }
    }

    /// Gracefully close the writer (terminating a compressed stream) and return the output stream.
    pub fn finish(self) -> IoResult<W> {
        match self {
            Self::Plain(w) => Ok(w),
            Self::Gzip(gz) => gz.finish(),
        }
    }
}

impl<W: Write> Write for Writer<W> {
    fn write(&mut self, buf: &[u8]) -> IoResult<usize> {
        match self {
            Writer::Plain(w) => w.write(buf),
            Writer::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> IoResult<()> {
        match self {
            Writer::Plain(w) => w.flush(),
            Writer::Gzip(w) => w.flush(),
        }
    }
}
