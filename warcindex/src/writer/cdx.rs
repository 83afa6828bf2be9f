use std::io::Write;

use warcio::{Record, RecordKind};

use super::output::{Destination, Output};
use super::{is_capture, CdxWriter, WriteError};
use crate::entry::CdxEntry;

/// The header line of a legacy CDX file, naming the fields on each following line.
pub const CDX_HEADER: &str = " CDX N b a m s k r M S V g u";

/// Writes legacy space-separated CDX.
///
/// Only responses and revisits are indexed. See [`CdxEntry::to_legacy_line`] for the format of
/// each line.
pub struct CdxLegacy {
    out: Output,
}

impl CdxLegacy {
    pub fn new(destination: Destination) -> Self {
        CdxLegacy {
            out: Output::new(destination),
        }
    }
}

impl CdxWriter for CdxLegacy {
    fn init(&mut self) -> Result<(), WriteError> {
        if self.out.open()? {
            writeln!(self.out.get()?, "{}", CDX_HEADER)?;
        }
        Ok(())
    }

    fn write(&mut self, record: &Record, file_name: &str, offset: u64) -> Result<(), WriteError> {
        self.out.check()?;
        if !is_capture(record) {
            return Ok(());
        }
        let kind = record.record_type();
        if kind != &RecordKind::Response && kind != &RecordKind::Revisit {
            trace!("Legacy CDX skips {} record at {}", kind, offset);
            return Ok(());
        }

        let entry = CdxEntry::from_record(record, file_name, offset)?;
        writeln!(self.out.get()?, "{}", entry.to_legacy_line())?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), WriteError> {
        self.out.close()
    }
}
