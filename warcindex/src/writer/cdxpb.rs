use std::io::Write;

use prost::Message;
use warcio::Record;

use super::output::{Destination, Output};
use super::{is_capture, CdxWriter, WriteError};
use crate::entry::CdxEntry;

/// Writes entries as a stream of varint length-delimited protobuf messages.
///
/// A stream is read back by repeatedly calling [`CdxEntry::decode_length_delimited`].
pub struct CdxPb {
    out: Output,
}

impl CdxPb {
    pub fn new(destination: Destination) -> Self {
        CdxPb {
            out: Output::new(destination),
        }
    }
}

impl CdxWriter for CdxPb {
    fn init(&mut self) -> Result<(), WriteError> {
        self.out.open().map(|_| ())
    }

    fn write(&mut self, record: &Record, file_name: &str, offset: u64) -> Result<(), WriteError> {
        self.out.check()?;
        if !is_capture(record) {
            return Ok(());
        }

        let entry = CdxEntry::from_record(record, file_name, offset)?;
        self.out
            .get()?
            .write_all(&entry.encode_length_delimited_to_vec())?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), WriteError> {
        self.out.close()
    }
}
