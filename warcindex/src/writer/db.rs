use std::path::PathBuf;
use std::sync::Arc;

use warcio::Record;

use super::{is_capture, CdxWriter, WriteError};
use crate::entry::CdxEntry;
use crate::store::CdxStore;

enum State {
    Pending,
    Open(Arc<CdxStore>),
    Closed,
}

/// Writes entries to a persisted [`CdxStore`].
pub struct CdxDb {
    dir: PathBuf,
    store: Option<Arc<CdxStore>>,
    state: State,
}

impl CdxDb {
    /// Construct a writer for the store in `dir`, which is opened or created on
    /// [`init`](CdxWriter::init).
    pub fn new(dir: PathBuf) -> Self {
        CdxDb {
            dir,
            store: None,
            state: State::Pending,
        }
    }

    /// Construct a writer for a store that is already open.
    pub fn with_store(store: Arc<CdxStore>) -> Self {
        CdxDb {
            dir: store.path().to_owned(),
            store: Some(store),
            state: State::Pending,
        }
    }
}

impl CdxWriter for CdxDb {
    fn init(&mut self) -> Result<(), WriteError> {
        match self.state {
            State::Open(_) => return Ok(()),
            State::Closed => return Err(WriteError::Closed),
            State::Pending => {}
        }

        let store = match self.store.take() {
            Some(store) => store,
            None => Arc::new(CdxStore::open(&self.dir)?),
        };
        self.state = State::Open(store);
        Ok(())
    }

    fn write(&mut self, record: &Record, file_name: &str, offset: u64) -> Result<(), WriteError> {
        let store = match self.state {
            State::Open(ref store) => store,
            State::Pending => return Err(WriteError::NotInitialized),
            State::Closed => return Err(WriteError::Closed),
        };
        if !is_capture(record) {
            return Ok(());
        }

        let entry = CdxEntry::from_record(record, file_name, offset)?;
        store.put(&entry)?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), WriteError> {
        if let State::Open(_) = std::mem::replace(&mut self.state, State::Closed) {
            debug!("Closed index store {:?}", self.dir);
        }
        Ok(())
    }
}
