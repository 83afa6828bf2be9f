use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::mem;
use std::path::PathBuf;

use super::WriteError;

/// Where a line or binary index is written.
pub enum Destination {
    Stdout,
    /// A new file, which must not already exist.
    File(PathBuf),
    /// Any other output.
    Writer(Box<dyn Write + Send>),
}

type Sink = BufWriter<Box<dyn Write + Send>>;

enum State {
    Pending(Destination),
    Open(Sink),
    Closed,
}

/// The lifecycle of a writer's output stream, shared by the stream formats.
pub(super) struct Output {
    state: State,
}

impl Output {
    pub fn new(destination: Destination) -> Self {
        Output {
            state: State::Pending(destination),
        }
    }

    /// Open the destination, returning `true` if it was not already open.
    ///
    /// If the destination cannot be opened, the output is closed.
    pub fn open(&mut self) -> Result<bool, WriteError> {
        let destination = match mem::replace(&mut self.state, State::Closed) {
            State::Pending(destination) => destination,
            State::Closed => return Err(WriteError::Closed),
            open => {
                self.state = open;
                return Ok(false);
            }
        };

        let sink: Box<dyn Write + Send> = match destination {
            Destination::Stdout => Box::new(io::stdout()),
            Destination::File(path) => {
                debug!("Creating index file {:?}", path);
                Box::new(OpenOptions::new().write(true).create_new(true).open(&path)?)
            }
            Destination::Writer(w) => w,
        };
        self.state = State::Open(BufWriter::new(sink));
        Ok(true)
    }

    pub fn get(&mut self) -> Result<&mut Sink, WriteError> {
        match self.state {
            State::Open(ref mut sink) => Ok(sink),
            State::Pending(_) => Err(WriteError::NotInitialized),
            State::Closed => Err(WriteError::Closed),
        }
    }

    /// Check that the output is open without borrowing it.
    pub fn check(&self) -> Result<(), WriteError> {
        match self.state {
            State::Open(_) => Ok(()),
            State::Pending(_) => Err(WriteError::NotInitialized),
            State::Closed => Err(WriteError::Closed),
        }
    }

    pub fn close(&mut self) -> Result<(), WriteError> {
        if let State::Open(mut sink) = mem::replace(&mut self.state, State::Closed) {
            sink.flush()?;
        }
        Ok(())
    }
}
