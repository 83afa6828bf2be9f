use std::io::Write;

use warcio::Record;

use super::output::{Destination, Output};
use super::{is_capture, CdxWriter, WriteError};
use crate::entry::CdxEntry;

/// Writes CDXJ, one `<ssu> <sts> <json>` line per record.
pub struct CdxJ {
    out: Output,
}

impl CdxJ {
    pub fn new(destination: Destination) -> Self {
        CdxJ {
            out: Output::new(destination),
        }
    }
}

impl CdxWriter for CdxJ {
    fn init(&mut self) -> Result<(), WriteError> {
        self.out.open().map(|_| ())
    }

    fn write(&mut self, record: &Record, file_name: &str, offset: u64) -> Result<(), WriteError> {
        self.out.check()?;
        if !is_capture(record) {
            return Ok(());
        }

        let line = CdxEntry::from_record(record, file_name, offset)?.to_cdxj_line()?;
        writeln!(self.out.get()?, "{}", line)?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), WriteError> {
        self.out.close()
    }
}
