//! Writing CDX indexes.
//!
//! Every index format is a [`CdxWriter`]. A writer is [initialized](CdxWriter::init) once,
//! given records one at a time along with the location they were read from, and finally
//! [closed](CdxWriter::close). [`open_writer`] constructs the writer for a format given by name.
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;
use warcio::{Record, RecordKind};

use crate::filter::FilterParseError;
use crate::store::StoreError;

mod cdx;
mod cdxj;
mod cdxpb;
mod db;
mod output;

pub use cdx::CdxLegacy;
pub use cdxj::CdxJ;
pub use cdxpb::CdxPb;
pub use db::CdxDb;
pub use output::Destination;

/// A sink for index entries.
pub trait CdxWriter: Send {
    /// Prepare the destination, writing any preamble the format requires.
    ///
    /// Calling `init` on a writer that is already initialized does nothing.
    fn init(&mut self) -> Result<(), WriteError>;

    /// Write the entry for `record`, which was read from `file_name` at `offset`.
    ///
    /// Records that the format does not index are skipped without error. A failure to index one
    /// record does not prevent writing others.
    fn write(&mut self, record: &Record, file_name: &str, offset: u64) -> Result<(), WriteError>;

    /// Flush and release the destination.
    ///
    /// Closing a writer more than once has no further effect.
    fn close(&mut self) -> Result<(), WriteError>;
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("index writer has not been initialized")]
    NotInitialized,
    #[error("index writer has already been closed")]
    Closed,
    /// The record cannot be indexed because it lacks a required field.
    #[error("record at offset {offset} has no {field} field")]
    MissingField { field: &'static str, offset: u64 },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode entry as JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("index store error: {0}")]
    Store(#[from] StoreError),
}

/// Invalid indexing configuration, detected before any input or output is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown index format {0:?}")]
    UnknownFormat(String),
    #[error("invalid filter: {0}")]
    Filter(#[from] FilterParseError),
}

/// The supported index formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Space-separated legacy CDX lines.
    Cdx,
    /// CDXJ: sort key, timestamp and a JSON object per line.
    CdxJ,
    /// Length-delimited protobuf messages.
    CdxPb,
    /// The persisted [`CdxStore`](crate::store::CdxStore).
    Db,
}

impl Format {
    pub const NAMES: &'static [&'static str] = &["cdx", "cdxj", "cdxpb", "db"];

    pub fn name(self) -> &'static str {
        match self {
            Format::Cdx => "cdx",
            Format::CdxJ => "cdxj",
            Format::CdxPb => "cdxpb",
            Format::Db => "db",
        }
    }
}

impl FromStr for Format {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "cdx" => Format::Cdx,
            "cdxj" => Format::CdxJ,
            "cdxpb" => Format::CdxPb,
            "db" => Format::Db,
            _ => return Err(ConfigError::UnknownFormat(s.to_owned())),
        })
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Options for [`open_writer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexOptions {
    /// Name of the index format.
    pub format: String,
    /// File to write a line or binary index to. Standard output is used if not set.
    pub output: Option<PathBuf>,
    /// Directory of the persisted store, for the `db` format.
    pub db_dir: PathBuf,
}

impl Default for IndexOptions {
    fn default() -> Self {
        IndexOptions {
            format: Format::CdxJ.name().to_owned(),
            output: None,
            db_dir: PathBuf::from("cdx.db"),
        }
    }
}

/// Construct an uninitialized writer as described by `options`.
pub fn open_writer(options: &IndexOptions) -> Result<Box<dyn CdxWriter>, ConfigError> {
    let format: Format = options.format.parse()?;
    let destination = || match options.output {
        Some(ref path) => Destination::File(path.clone()),
        None => Destination::Stdout,
    };

    debug!("Opening {} index writer", format);
    let writer: Box<dyn CdxWriter> = match format {
        Format::Cdx => Box::new(CdxLegacy::new(destination())),
        Format::CdxJ => Box::new(CdxJ::new(destination())),
        Format::CdxPb => Box::new(CdxPb::new(destination())),
        Format::Db => Box::new(CdxDb::new(options.db_dir.clone())),
    };
    Ok(writer)
}

/// Determine whether a record describes a capture, and so belongs in an index.
fn is_capture(record: &Record) -> bool {
    if record.record_type() == &RecordKind::Info {
        debug!("Not indexing warcinfo record {:?}", record.record_id());
        false
    } else {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::{open_writer, ConfigError, Format, IndexOptions};

    #[test]
    fn format_names_are_exact() {
        for &name in Format::NAMES {
            let format: Format = name.parse().unwrap();
            assert_eq!(format.to_string(), name);
        }
        assert!(matches!(
            "CDXJ".parse::<Format>(),
            Err(ConfigError::UnknownFormat(ref s)) if s == "CDXJ"
        ));
    }

    #[test]
    fn unknown_format_is_rejected_before_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.cdx");
        let options = IndexOptions {
            format: "parquet".into(),
            output: Some(output.clone()),
            db_dir: dir.path().join("db"),
        };

        assert!(matches!(
            open_writer(&options),
            Err(ConfigError::UnknownFormat(_))
        ));
        assert!(!output.exists());
        assert!(!options.db_dir.exists());
    }
}
