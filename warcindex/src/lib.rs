//! Building and querying CDX indexes of WARC files.
//!
//! A CDX index holds one [entry](CdxEntry) per captured record in a set of WARC files, giving
//! the record's target URI, capture time, type and so on, and the location from which the record
//! can be read again. Indexes are sorted by the [SURT](surt) form of each URI so that captures of
//! a site or path sort together.
//!
//! Records are read with [`warcio::RecordReader`] and handed to a [`CdxWriter`], which encodes
//! them in one of several [formats](Format):
//!
//! ```no_run
//! use warcindex::{index_records, open_writer, Counters, IndexOptions};
//! use warcio::{ReadOptions, RecordReader};
//!
//! let mut writer = open_writer(&IndexOptions::default())?;
//! writer.init()?;
//! let mut reader = RecordReader::open("example.warc.gz", 0, ReadOptions::default())?;
//! let mut counters = Counters::default();
//! index_records(&mut reader, "example.warc.gz", writer.as_mut(), &mut counters, |_| {})?;
//! writer.close()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Entries written to the persisted [`CdxStore`] can later be retrieved and selected with a
//! [`FilterSet`].
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;

pub mod entry;
pub mod filter;
mod index;
pub mod store;
pub mod surt;
pub mod writer;

pub use entry::CdxEntry;
pub use filter::{Filter, FilterParseError, FilterSet};
pub use index::{index_records, Counters, IndexError};
pub use store::{CdxStore, StoreError};
pub use writer::{open_writer, CdxWriter, ConfigError, Format, IndexOptions, WriteError};
