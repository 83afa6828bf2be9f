//! Driving a [`RecordReader`] into a [`CdxWriter`].
use std::io::BufRead;

use thiserror::Error;
use warcio::{ReadError, RecordReader};

use crate::writer::{CdxWriter, WriteError};

/// Running totals for an indexing run, owned by whoever is driving it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counters {
    /// Records successfully read.
    pub records: u64,
    /// Records the writer refused to index.
    pub rejected: u64,
    /// Non-fatal errors encountered while reading.
    pub read_errors: u64,
}

/// An error that stopped indexing.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("{0}")]
    Read(#[source] ReadError),
    #[error("writing index failed at offset {offset}: {source}")]
    Write {
        offset: u64,
        #[source]
        source: WriteError,
    },
}

/// Read every record from `reader` and write it to `writer`, calling `progress` after each.
///
/// Errors the reader recovers from and records the writer rejects are logged and counted,
/// and indexing continues. The writer must already be initialized; it is not closed.
pub fn index_records<R, F>(
    reader: &mut RecordReader<R>,
    file_name: &str,
    writer: &mut dyn CdxWriter,
    counters: &mut Counters,
    mut progress: F,
) -> Result<(), IndexError>
where
    R: BufRead,
    F: FnMut(&Counters),
{
    for next in reader {
        match next {
            Ok((record, offset)) => {
                counters.records += 1;
                match writer.write(&record, file_name, offset) {
                    Ok(()) => {}
                    Err(e @ WriteError::MissingField { .. }) => {
                        warn!("Not indexing record in {}: {}", file_name, e);
                        counters.rejected += 1;
                    }
                    Err(source) => return Err(IndexError::Write { offset, source }),
                }
            }
            Err(e) if e.is_fatal() => return Err(IndexError::Read(e)),
            Err(e) => {
                warn!("Skipping damaged record in {}: {}", file_name, e);
                counters.read_errors += 1;
            }
        }
        progress(counters);
    }
    Ok(())
}
