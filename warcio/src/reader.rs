//! Sequential reading of records from WARC files.
//!
//! A [`RecordReader`] pulls one [`Record`] at a time from an input stream, reporting the byte
//! offset at which each record begins. Offsets are positions in the stream as stored, so for
//! compressed files they refer to the start of the gzip member containing a record; such an
//! offset can be passed back to [`RecordReader::open`] to resume reading at that record.
//!
//! Damaged input is handled according to [`ReadOptions`]. In strict mode the first problem
//! ends iteration, while lenient readers report the problem and then skip ahead to the next
//! plausible record boundary.
use std::cmp;
use std::fs::File;
use std::io::{self, BufRead, BufReader as StdBufReader, Read, Seek, SeekFrom};
use std::iter::FusedIterator;
use std::path::{Path, PathBuf};

use buf_redux::{BufReader, Buffer};
use flate2::bufread::GzDecoder;
use thiserror::Error;

use crate::header::{get_record_header, FieldKind, Header};
use crate::record::{InvalidRecord, Record, RECORD_TAIL};
use crate::{Compression, HeaderParseError};

/// Size of the buffers used for reading files and decompressed data.
const BUFFER_SIZE: usize = 64 << 10;

/// The largest allocation made up front for a record block.
///
/// Blocks larger than this grow as they are read, so a bogus `Content-Length` cannot cause a
/// huge allocation before any data has been seen.
const PREALLOC_LIMIT: u64 = 1 << 20;

/// Options controlling how a [`RecordReader`] deals with invalid input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// If `true`, any violation of the record format is a fatal error.
    ///
    /// Otherwise problems are reported once and the reader tries to continue with the next
    /// record, and some violations (such as missing mandatory fields or a missing record tail)
    /// are only logged.
    pub strict: bool,
    /// The maximum number of bytes a lenient reader will skip while looking for the next record
    /// after an error.
    pub max_skip: u64,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions {
            strict: false,
            max_skip: 64 << 20,
        }
    }
}

impl ReadOptions {
    /// Default options, except in strict mode.
    pub fn strict() -> Self {
        ReadOptions {
            strict: true,
            ..Default::default()
        }
    }
}

/// Failure to open a file for reading.
#[derive(Debug, Error)]
#[error("unable to open {}: {source}", .path.display())]
pub struct OpenError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// An error encountered by a [`RecordReader`].
#[derive(Debug, Error)]
#[error("record {record} at offset {offset}: {kind}")]
pub struct ReadError {
    /// Offset in the input of the record that could not be read.
    pub offset: u64,
    /// Zero-based index of the record that could not be read, equal to the number of records
    /// successfully read before it.
    pub record: u64,
    #[source]
    pub kind: InvalidRecord,
    fatal: bool,
}

impl ReadError {
    /// Returns `true` if the reader will not yield anything following this error.
    pub fn is_fatal(&self) -> bool {
        self.fatal
    }

    pub fn into_kind(self) -> InvalidRecord {
        self.kind
    }
}

/// The states of a [`RecordReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// At a position where a record is expected to begin.
    Positioned,
    /// In the middle of reading a record.
    Reading,
    /// Following a damaged record; the next read scans for a record boundary first.
    Recovering {
        /// Skip a byte before scanning, because the input is still at the start of the
        /// damaged record.
        skip_first: bool,
    },
    /// The input is used up, or the reader has been closed.
    Exhausted,
    /// A fatal error was returned; nothing more will be read.
    Failed,
}

/// Reads records in sequence from an input stream.
///
/// Each item yielded is a record and the offset at which it began, or an error. Iteration ends
/// (returning `None`) at the end of the input, after a fatal error, or once the reader has been
/// [closed](Self::close).
///
/// ```
/// # use warcio::{Compression, Header, ReadOptions, Record, RecordReader, Version};
/// let mut header = Header::new(Version::WARC1_1);
/// header.set_field("WARC-Type", "resource");
/// header.set_field("WARC-Record-ID", "<urn:uuid:00000000-0000-0000-0000-000000000001>");
/// header.set_field("WARC-Date", "2021-08-05T06:22:00Z");
/// let file = Record::new(header, b"hello".to_vec())
///     .write_to(Vec::new(), Compression::None)?;
///
/// let mut reader = RecordReader::new(&file[..], Compression::None, 0, ReadOptions::strict());
/// let (record, offset) = reader.next().expect("one record")?;
/// assert_eq!(offset, 0);
/// assert_eq!(record.content(), b"hello");
/// assert!(reader.next().is_none());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct RecordReader<R> {
    input: Option<Tracked<R>>,
    compression: Compression,
    options: ReadOptions,
    state: State,
    records_read: u64,
    /// Buffer for decompressed data, reused across records.
    buffer: Option<Buffer>,
}

impl RecordReader<StdBufReader<File>> {
    /// Open the file at `path` and prepare to read records from it starting at `start_offset`.
    ///
    /// The compression of the file is [guessed from its name](Compression::guess_for_filename).
    pub fn open<P: AsRef<Path>>(
        path: P,
        start_offset: u64,
        options: ReadOptions,
    ) -> Result<Self, OpenError> {
        let path = path.as_ref();
        let open = || -> io::Result<File> {
            let mut file = File::open(path)?;
            if start_offset > 0 {
                file.seek(SeekFrom::Start(start_offset))?;
            }
            Ok(file)
        };
        let file = open().map_err(|source| OpenError {
            path: path.to_owned(),
            source,
        })?;

        let compression = Compression::guess_for_filename(path);
        debug!(
            "Reading {} from offset {} with compression {:?}",
            path.display(),
            start_offset,
            compression
        );
        Ok(Self::new(
            StdBufReader::with_capacity(BUFFER_SIZE, file),
            compression,
            start_offset,
            options,
        ))
    }
}

impl<R: BufRead> RecordReader<R> {
    /// Read records from `input`, which is assumed to be positioned `start_offset` bytes into
    /// a file.
    pub fn new(input: R, compression: Compression, start_offset: u64, options: ReadOptions) -> Self {
        RecordReader {
            input: Some(Tracked::new(input, start_offset)),
            compression,
            options,
            state: State::Positioned,
            records_read: 0,
            buffer: None,
        }
    }

    /// The number of records successfully read so far.
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// The current position of the reader in its input.
    ///
    /// Following a successfully read record this is the offset of whatever follows it. Returns
    /// `None` if the reader has been closed.
    pub fn position(&self) -> Option<u64> {
        self.input.as_ref().map(Tracked::position)
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Release the underlying input.
    ///
    /// This may be called at any time, including after an error and more than once. Once closed
    /// the reader yields nothing more.
    pub fn close(&mut self) {
        if self.input.take().is_some() {
            trace!("Closed reader after {} records", self.records_read);
        }
        self.state = State::Exhausted;
    }

    fn error(&mut self, offset: u64, kind: InvalidRecord, fatal: bool) -> ReadError {
        let fatal = fatal
            || self.options.strict
            || matches!(
                kind,
                InvalidRecord::IoError(_) | InvalidRecord::RecoveryLimit(_)
            );
        if fatal {
            self.state = State::Failed;
        }
        ReadError {
            offset,
            record: self.records_read,
            kind,
            fatal,
        }
    }

    /// Scan forward for the next byte sequence that looks like the start of a record, leaving
    /// the input positioned at it.
    fn recover(&mut self, skip_first: bool) -> Result<(), ReadError> {
        let signature = self.compression.record_signature();
        let max_skip = self.options.max_skip;
        let input = match self.input.as_mut() {
            Some(input) => input,
            None => return Ok(()),
        };
        let start = input.position();

        let mut matched = 0;
        let mut skip = skip_first;
        let outcome = loop {
            let base = input.position() - start;
            let buf = match input.fill_buf() {
                Ok([]) => break Ok(false),
                Ok(buf) => buf,
                Err(e) => break Err(InvalidRecord::IoError(e)),
            };

            let mut consumed = 0;
            let mut found = false;
            for &b in buf {
                consumed += 1;
                if skip {
                    skip = false;
                    continue;
                }
                if b == signature[matched] {
                    matched += 1;
                } else {
                    matched = if b == signature[0] { 1 } else { 0 };
                }
                if matched == signature.len() {
                    found = true;
                    break;
                }
                if base + consumed as u64 - matched as u64 > max_skip {
                    break;
                }
            }
            input.consume(consumed);

            if found {
                input.unread(signature);
                break Ok(true);
            }
            if input.position() - start - matched as u64 > max_skip {
                break Err(InvalidRecord::RecoveryLimit(max_skip));
            }
        };

        let position = input.position();
        match outcome {
            Ok(true) => {
                warn!(
                    "Skipped {} bytes to possible record at offset {}",
                    position - start,
                    position
                );
                self.state = State::Positioned;
                Ok(())
            }
            Ok(false) => {
                warn!(
                    "Skipped {} bytes to end of input without finding another record",
                    position - start
                );
                self.state = State::Exhausted;
                Ok(())
            }
            Err(kind) => Err(self.error(position, kind, true)),
        }
    }

    fn read_record(&mut self) -> Result<(Record, bool), Failure> {
        let strict = self.options.strict;
        let input = match self.input.as_mut() {
            Some(input) => input,
            None => return Err(InvalidRecord::EndOfStream.into()),
        };

        match self.compression {
            Compression::None => read_plain(input, strict),
            Compression::Gzip => {
                let mut buffer = self
                    .buffer
                    .take()
                    .unwrap_or_else(|| Buffer::with_capacity(BUFFER_SIZE));
                buffer.clear();
                let mut decoder = BufReader::with_buffer(buffer, GzDecoder::new(&mut *input));
                let result = read_member(&mut decoder, strict);
                let (_, buffer) = decoder.into_inner_with_buffer();
                self.buffer = Some(buffer);
                result
            }
        }
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = Result<(Record, u64), ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.state {
                State::Exhausted | State::Failed => return None,
                State::Recovering { skip_first } => {
                    if let Err(e) = self.recover(skip_first) {
                        return Some(Err(e));
                    }
                }
                State::Positioned | State::Reading => break,
            }
        }

        let input = self.input.as_mut()?;
        let start = input.position();
        match input.fill_buf().map(|buf| buf.is_empty()) {
            Ok(true) => {
                trace!("End of input at offset {}", start);
                self.state = State::Exhausted;
                return None;
            }
            Ok(false) => {}
            Err(e) => return Some(Err(self.error(start, InvalidRecord::IoError(e), true))),
        }

        self.state = State::Reading;
        match self.read_record() {
            Ok((mut record, tail_ok)) => {
                let end = self.input.as_ref().map_or(start, Tracked::position);
                record.set_stored_len(end - start);
                trace!(
                    "Read {} record at offset {} ({} bytes)",
                    record.record_type(),
                    start,
                    end - start
                );
                self.records_read += 1;
                self.state = if tail_ok || self.compression == Compression::Gzip {
                    State::Positioned
                } else {
                    State::Recovering { skip_first: false }
                };
                Some(Ok((record, start)))
            }
            Err(Failure { kind, at_boundary }) => {
                let err = self.error(start, kind, false);
                if !err.is_fatal() {
                    self.state = if at_boundary {
                        State::Positioned
                    } else {
                        let position = self.input.as_ref().map(Tracked::position);
                        State::Recovering {
                            skip_first: position == Some(start),
                        }
                    };
                }
                Some(Err(err))
            }
        }
    }
}

impl<R: BufRead> FusedIterator for RecordReader<R> {}

/// A failure to read a record.
struct Failure {
    kind: InvalidRecord,
    /// The input is known to be at the end of the damaged record, so no scanning is needed to
    /// find the next one.
    at_boundary: bool,
}

impl From<InvalidRecord> for Failure {
    fn from(kind: InvalidRecord) -> Self {
        Failure {
            kind,
            at_boundary: false,
        }
    }
}

impl From<io::Error> for Failure {
    fn from(e: io::Error) -> Self {
        InvalidRecord::from(e).into()
    }
}

impl From<HeaderParseError> for Failure {
    fn from(e: HeaderParseError) -> Self {
        InvalidRecord::from(e).into()
    }
}

fn read_plain<R: BufRead>(input: &mut Tracked<R>, strict: bool) -> Result<(Record, bool), Failure> {
    let header = match get_record_header(&mut *input) {
        Ok(header) => header,
        Err((e, consumed)) => {
            input.unread(&consumed);
            return Err(e.into());
        }
    };
    let len = check_header(&header, strict)?;
    let content = match read_content(&mut *input, len)? {
        Ok(content) => content,
        Err(partial) => {
            // Whatever the block ran into may hold further records
            input.unread(&partial);
            return Err(InvalidRecord::Truncated.into());
        }
    };

    let tail_ok = match read_tail(&mut *input)? {
        Ok(()) => true,
        Err(found) => {
            input.unread(&found);
            if !strict && !ends_cleanly(&found) {
                // The declared length is wrong, so the block may have swallowed the start of
                // the next record.
                input.unread(&content);
                return Err(InvalidRecord::MissingTail.into());
            }
            tail_missing(&found, strict)?;
            false
        }
    };
    Ok((Record::from_parts(header, content), tail_ok))
}

/// Determine whether the bytes found in place of a record tail are consistent with the block
/// having had its declared length: a short run of line breaks followed by the end of input or
/// the start of another record.
fn ends_cleanly(found: &[u8]) -> bool {
    let rest = match found.iter().position(|&b| b != b'\r' && b != b'\n') {
        Some(i) => &found[i..],
        None => return true,
    };
    b"WARC/".starts_with(rest)
}

/// Read the record in a single gzip member, leaving the input at the end of the member.
fn read_member<B: BufRead>(decoder: &mut B, strict: bool) -> Result<(Record, bool), Failure> {
    let header = match get_record_header(&mut *decoder) {
        Ok(header) => header,
        Err((e, _)) => {
            let kind = InvalidRecord::from(e);
            // A header that fails to parse came out of a member that decompressed correctly,
            // so the member's end is the place to continue. Otherwise the member is damaged.
            let at_boundary = matches!(kind, InvalidRecord::InvalidHeader(_))
                && io::copy(decoder, &mut io::sink()).is_ok();
            return Err(Failure { kind, at_boundary });
        }
    };
    let len = match check_header(&header, strict) {
        Ok(len) => len,
        Err(kind) => {
            // The member holds a bad record but may itself be fine, in which case whatever
            // follows it is the place to continue.
            let at_boundary = io::copy(decoder, &mut io::sink()).is_ok();
            return Err(Failure { kind, at_boundary });
        }
    };
    let content = read_content(&mut *decoder, len)?.map_err(|_| InvalidRecord::Truncated)?;
    let tail_ok = match read_tail(&mut *decoder)? {
        Ok(()) => true,
        Err(found) => {
            tail_missing(&found, strict)?;
            false
        }
    };

    let extra = io::copy(decoder, &mut io::sink())?;
    if extra > 0 {
        warn!(
            "Ignoring {} bytes following record in the same gzip member",
            extra
        );
    }
    Ok((Record::from_parts(header, content), tail_ok))
}

/// Validate a header, returning the length of the block that follows it.
fn check_header(header: &Header, strict: bool) -> Result<u64, InvalidRecord> {
    let len = header.content_length().ok_or_else(|| {
        InvalidRecord::UnknownLength(
            header
                .get_field_bytes(FieldKind::ContentLength)
                .map(<[u8]>::to_vec),
        )
    })?;

    for &field in &[FieldKind::RecordId, FieldKind::Type, FieldKind::Date] {
        let present = header
            .get_field_bytes(field)
            .map_or(false, |value| !value.is_empty());
        if !present {
            if strict {
                return Err(InvalidRecord::MissingField(field));
            }
            warn!("Record has no {} field", field);
        }
    }
    Ok(len)
}

/// Read a record block of `len` bytes, returning what was read instead if the input ends first.
fn read_content<B: Read>(input: B, len: u64) -> io::Result<Result<Vec<u8>, Vec<u8>>> {
    let mut content = Vec::with_capacity(cmp::min(len, PREALLOC_LIMIT) as usize);
    let n = input.take(len).read_to_end(&mut content)?;
    if (n as u64) < len {
        trace!("Record block ended after {} of {} bytes", n, len);
        return Ok(Err(content));
    }
    Ok(Ok(content))
}

/// Read the record tail, returning the bytes that were found instead if it is not present.
fn read_tail<B: Read>(mut input: B) -> io::Result<Result<(), Vec<u8>>> {
    let mut buf = [0u8; 4];
    let mut n = 0;
    while n < buf.len() {
        match input.read(&mut buf[n..]) {
            Ok(0) => break,
            Ok(k) => n += k,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    if &buf[..n] == RECORD_TAIL {
        Ok(Ok(()))
    } else {
        Ok(Err(buf[..n].to_vec()))
    }
}

fn tail_missing(found: &[u8], strict: bool) -> Result<(), InvalidRecord> {
    if strict {
        return Err(InvalidRecord::MissingTail);
    }
    warn!(
        "Record tail missing, found {:?} instead",
        String::from_utf8_lossy(found)
    );
    Ok(())
}

/// A reader that counts the bytes consumed from it and allows bytes to be pushed back.
struct Tracked<R> {
    inner: R,
    /// Bytes to be served before any more are read from `inner`.
    pushback: Vec<u8>,
    pushback_pos: usize,
    position: u64,
}

impl<R> Tracked<R> {
    fn new(inner: R, position: u64) -> Self {
        Tracked {
            inner,
            pushback: Vec::new(),
            pushback_pos: 0,
            position,
        }
    }

    fn position(&self) -> u64 {
        self.position
    }

    /// Return bytes to the input, so they will be read again next.
    ///
    /// The bytes must be exactly those most recently consumed.
    fn unread(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        debug_assert!(bytes.len() as u64 <= self.position);
        let mut pushback = Vec::with_capacity(bytes.len() + self.pushback.len() - self.pushback_pos);
        pushback.extend_from_slice(bytes);
        pushback.extend_from_slice(&self.pushback[self.pushback_pos..]);
        self.pushback = pushback;
        self.pushback_pos = 0;
        self.position -= bytes.len() as u64;
    }
}

impl<R: BufRead> Read for Tracked<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = {
            let available = self.fill_buf()?;
            let n = cmp::min(available.len(), buf.len());
            buf[..n].copy_from_slice(&available[..n]);
            n
        };
        self.consume(n);
        Ok(n)
    }
}

impl<R: BufRead> BufRead for Tracked<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.pushback_pos < self.pushback.len() {
            return Ok(&self.pushback[self.pushback_pos..]);
        }
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        if self.pushback_pos < self.pushback.len() {
            debug_assert!(amt <= self.pushback.len() - self.pushback_pos);
            self.pushback_pos += amt;
            if self.pushback_pos >= self.pushback.len() {
                self.pushback.clear();
                self.pushback_pos = 0;
            }
        } else {
            self.inner.consume(amt);
        }
        self.position += amt as u64;
    }
}
