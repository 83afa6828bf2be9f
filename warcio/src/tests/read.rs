use std::cell::Cell;
use std::io::{self, BufRead, Read};
use std::rc::Rc;

use pretty_assertions::assert_eq;

use crate::reader::State;
use crate::{
    Compression, FieldKind, Header, InvalidRecord, ReadError, ReadOptions, Record, RecordKind,
    RecordReader, Version,
};

pub(super) fn test_record(n: u32, kind: &str, uri: &str, body: &[u8]) -> Record {
    let mut header = Header::new(Version::WARC1_1);
    header.set_field(FieldKind::Type, kind);
    header.set_field(
        FieldKind::RecordId,
        format!("<urn:uuid:00000000-0000-0000-0000-{:012}>", n),
    );
    header.set_field(FieldKind::Date, "2021-08-05T06:22:13Z");
    header.set_field(FieldKind::TargetURI, uri);
    Record::new(header, body.to_vec())
}

fn sample_records() -> Vec<Record> {
    vec![
        test_record(1, "warcinfo", "", b"software: tests\r\n"),
        test_record(2, "request", "http://example.com/", b"GET / HTTP/1.1\r\n\r\n"),
        test_record(
            3,
            "response",
            "http://example.com/",
            b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\nhello",
        ),
    ]
}

/// Serialize records, returning the file contents and the offset of each record.
pub(super) fn build_file(records: &[Record], compression: Compression) -> (Vec<u8>, Vec<u64>) {
    let mut file = Vec::new();
    let mut offsets = Vec::new();
    for record in records {
        offsets.push(file.len() as u64);
        file = record.write_to(file, compression).unwrap();
    }
    (file, offsets)
}

fn read_all<R: BufRead>(reader: &mut RecordReader<R>) -> Vec<Result<(Record, u64), ReadError>> {
    reader.by_ref().collect()
}

#[test]
fn yields_every_record_with_its_offset() {
    for &compression in &[Compression::None, Compression::Gzip] {
        let records = sample_records();
        let (file, offsets) = build_file(&records, compression);

        let mut reader = RecordReader::new(&file[..], compression, 0, ReadOptions::strict());
        let mut seen = vec![];
        for result in reader.by_ref() {
            let (record, offset) = result.expect("records should be valid");
            seen.push(offset);
            let i = seen.len() - 1;
            assert_eq!(record, records[i]);
            let end = offsets.get(i + 1).copied().unwrap_or(file.len() as u64);
            assert_eq!(record.stored_len(), Some(end - offset));
        }

        assert_eq!(seen, offsets);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(reader.records_read(), 3);
        assert_eq!(reader.position(), Some(file.len() as u64));
        assert_eq!(reader.state(), State::Exhausted);
        assert!(reader.next().is_none(), "exhausted reader yielded again");
    }
}

#[test]
fn resumes_at_any_yielded_offset() {
    for &compression in &[Compression::None, Compression::Gzip] {
        let records = sample_records();
        let (file, offsets) = build_file(&records, compression);

        for (i, &offset) in offsets.iter().enumerate() {
            let mut reader = RecordReader::new(
                &file[offset as usize..],
                compression,
                offset,
                ReadOptions::strict(),
            );
            let (record, at) = reader.next().unwrap().unwrap();
            assert_eq!(at, offset);
            assert_eq!(record.record_id(), records[i].record_id());
        }
    }
}

#[test]
fn opens_files_by_name() {
    let records = sample_records();
    let (file, offsets) = build_file(&records, Compression::Gzip);
    let mut tempfile = tempfile::Builder::new()
        .suffix(".warc.gz")
        .tempfile()
        .unwrap();
    io::Write::write_all(&mut tempfile, &file).unwrap();

    let mut reader = RecordReader::open(tempfile.path(), offsets[2], ReadOptions::strict())
        .expect("failed to open file");
    let (record, offset) = reader.next().unwrap().unwrap();
    assert_eq!(offset, offsets[2]);
    assert_eq!(record.record_type(), &RecordKind::Response);
    assert!(reader.next().is_none());

    let missing = tempfile.path().with_extension("missing");
    let err = match RecordReader::open(&missing, 0, ReadOptions::default()) {
        Err(e) => e,
        Ok(_) => panic!("opened a file that does not exist"),
    };
    assert_eq!(err.path, missing);
    assert_eq!(err.source.kind(), io::ErrorKind::NotFound);
}

#[test]
fn empty_input_has_no_records() {
    let mut reader = RecordReader::new(&b""[..], Compression::None, 0, ReadOptions::strict());
    assert!(reader.next().is_none());
    assert_eq!(reader.records_read(), 0);
}

#[test]
fn offsets_count_from_start_offset() {
    let (file, offsets) = build_file(&sample_records(), Compression::None);
    let mut reader = RecordReader::new(&file[..], Compression::None, 1000, ReadOptions::strict());
    let seen: Vec<u64> = reader.by_ref().map(|r| r.unwrap().1).collect();
    assert_eq!(
        seen,
        offsets.iter().map(|o| o + 1000).collect::<Vec<_>>()
    );
}

fn truncated_file() -> (Vec<u8>, Vec<u64>) {
    let (mut file, offsets) = build_file(&sample_records(), Compression::None);
    file.truncate(file.len() - 10);
    (file, offsets)
}

#[test]
fn lenient_truncated_final_record() {
    let (file, offsets) = truncated_file();
    let mut reader = RecordReader::new(&file[..], Compression::None, 0, ReadOptions::default());
    let results = read_all(&mut reader);

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().1, offsets[0]);
    assert_eq!(results[1].as_ref().unwrap().1, offsets[1]);
    let err = results[2].as_ref().unwrap_err();
    assert!(matches!(err.kind, InvalidRecord::Truncated), "{:?}", err);
    assert_eq!(err.offset, offsets[2]);
    assert_eq!(err.record, 2);
    assert!(!err.is_fatal());
    assert_eq!(reader.state(), State::Exhausted);
}

/// Input that panics if read from once `armed` is set.
struct Tripwire<'a> {
    data: &'a [u8],
    armed: Rc<Cell<bool>>,
}

impl Read for Tripwire<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        assert!(!self.armed.get(), "input was read after a fatal error");
        self.data.read(buf)
    }
}

impl BufRead for Tripwire<'_> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        assert!(!self.armed.get(), "input was read after a fatal error");
        Ok(self.data)
    }

    fn consume(&mut self, amt: usize) {
        self.data = &self.data[amt..];
    }
}

#[test]
fn strict_truncated_final_record() {
    let (file, offsets) = truncated_file();
    let armed = Rc::new(Cell::new(false));
    let input = Tripwire {
        data: &file,
        armed: armed.clone(),
    };
    let mut reader = RecordReader::new(input, Compression::None, 0, ReadOptions::strict());

    assert_eq!(reader.next().unwrap().unwrap().1, offsets[0]);
    assert_eq!(reader.next().unwrap().unwrap().1, offsets[1]);
    let err = reader.next().unwrap().unwrap_err();
    assert!(matches!(err.kind, InvalidRecord::Truncated), "{:?}", err);
    assert!(err.is_fatal());
    assert_eq!(reader.state(), State::Failed);

    armed.set(true);
    assert!(reader.next().is_none());
    assert!(reader.next().is_none());
}

#[test]
fn lenient_skips_garbage_between_records() {
    let records = sample_records();
    let mut file = records[0].write_to(Vec::new(), Compression::None).unwrap();
    let garbage_at = file.len() as u64;
    file.extend_from_slice(b"garbage bytes\r\n");
    let second_at = file.len() as u64;
    let file = records[1].write_to(file, Compression::None).unwrap();

    let mut reader = RecordReader::new(&file[..], Compression::None, 0, ReadOptions::default());
    let results = read_all(&mut reader);
    assert_eq!(results.len(), 3);

    assert_eq!(results[0].as_ref().unwrap().1, 0);
    let err = results[1].as_ref().unwrap_err();
    assert!(matches!(err.kind, InvalidRecord::InvalidHeader(_)), "{:?}", err);
    assert_eq!(err.offset, garbage_at);
    assert!(!err.is_fatal());
    let (record, offset) = results[2].as_ref().unwrap();
    assert_eq!(*offset, second_at);
    assert_eq!(record, &records[1]);

    // Strict readers stop at the garbage
    let mut reader = RecordReader::new(&file[..], Compression::None, 0, ReadOptions::strict());
    let results = read_all(&mut reader);
    assert_eq!(results.len(), 2);
    assert!(results[1].as_ref().unwrap_err().is_fatal());
}

#[test]
fn missing_tail_is_tolerated_when_lenient() {
    let records = sample_records();
    let mut file = records[1].write_to(Vec::new(), Compression::None).unwrap();
    file.truncate(file.len() - 4);
    let second_at = file.len() as u64;
    let file = records[2].write_to(file, Compression::None).unwrap();

    let mut reader = RecordReader::new(&file[..], Compression::None, 0, ReadOptions::default());
    let results = read_all(&mut reader);
    assert_eq!(results.len(), 2, "{:?}", results);
    let (first, _) = results[0].as_ref().unwrap();
    assert_eq!(first.content(), records[1].content());
    assert_eq!(first.stored_len(), Some(second_at));
    assert_eq!(results[1].as_ref().unwrap().1, second_at);

    let mut reader = RecordReader::new(&file[..], Compression::None, 0, ReadOptions::strict());
    let err = reader.next().unwrap().unwrap_err();
    assert!(matches!(err.kind, InvalidRecord::MissingTail), "{:?}", err);
    assert!(err.is_fatal());
    assert!(reader.next().is_none());
}

/// Rewrite the first record's `Content-Length` in an uncompressed file.
fn with_first_length(file: &[u8], declared: usize, replacement: usize) -> Vec<u8> {
    let from = format!("Content-Length: {}\r\n", declared);
    let to = format!("Content-Length: {}\r\n", replacement);
    let at = file
        .windows(from.len())
        .position(|w| w == from.as_bytes())
        .expect("file has no Content-Length");
    let mut out = file[..at].to_vec();
    out.extend_from_slice(to.as_bytes());
    out.extend_from_slice(&file[at + from.len()..]);
    out
}

#[test]
fn overlong_block_does_not_hide_following_records() {
    let records = sample_records();
    let (file, offsets) = build_file(&records, Compression::None);
    let declared = records[0].content().len();
    assert_eq!(declared, 17);
    // Runs into the header of the second record, but not to the end of input
    let file = with_first_length(&file, declared, 40);

    let mut reader = RecordReader::new(&file[..], Compression::None, 0, ReadOptions::default());
    let results = read_all(&mut reader);
    assert_eq!(results.len(), 3, "{:?}", results);

    let err = results[0].as_ref().unwrap_err();
    assert!(matches!(err.kind, InvalidRecord::MissingTail), "{:?}", err);
    assert_eq!(err.offset, 0);
    assert!(!err.is_fatal());
    for (result, i) in results[1..].iter().zip(1..) {
        let (record, offset) = result.as_ref().unwrap();
        assert_eq!(*offset, offsets[i]);
        assert_eq!(record, &records[i]);
    }

    let mut reader = RecordReader::new(&file[..], Compression::None, 0, ReadOptions::strict());
    let err = reader.next().unwrap().unwrap_err();
    assert!(matches!(err.kind, InvalidRecord::MissingTail), "{:?}", err);
    assert!(err.is_fatal());
    assert!(reader.next().is_none());
}

#[test]
fn block_running_past_end_of_input_is_rescanned() {
    let records = sample_records();
    let (file, offsets) = build_file(&records, Compression::None);
    let file = with_first_length(&file, records[0].content().len(), 9000);
    // The rewritten length has two more digits
    let shift = 2;

    let mut reader = RecordReader::new(&file[..], Compression::None, 0, ReadOptions::default());
    let results = read_all(&mut reader);
    assert_eq!(results.len(), 3, "{:?}", results);

    let err = results[0].as_ref().unwrap_err();
    assert!(matches!(err.kind, InvalidRecord::Truncated), "{:?}", err);
    assert!(!err.is_fatal());
    let seen: Vec<u64> = results[1..]
        .iter()
        .map(|r| r.as_ref().unwrap().1)
        .collect();
    assert_eq!(seen, [offsets[1] + shift, offsets[2] + shift]);
    assert_eq!(reader.records_read(), 2);
}

#[test]
fn mandatory_fields_only_required_when_strict() {
    let mut header = Header::new(Version::WARC1_1);
    header.set_field(FieldKind::Type, "resource");
    header.set_field(FieldKind::RecordId, "<urn:uuid:1>");
    let file = Record::new(header, b"data".to_vec())
        .write_to(Vec::new(), Compression::None)
        .unwrap();

    let mut reader = RecordReader::new(&file[..], Compression::None, 0, ReadOptions::strict());
    let err = reader.next().unwrap().unwrap_err();
    assert!(
        matches!(err.kind, InvalidRecord::MissingField(FieldKind::Date)),
        "{:?}",
        err
    );

    let mut reader = RecordReader::new(&file[..], Compression::None, 0, ReadOptions::default());
    let (record, _) = reader.next().unwrap().unwrap();
    assert_eq!(record.content(), b"data");
    assert!(reader.next().is_none());
}

#[test]
fn record_without_type_is_unknown() {
    let mut header = Header::new(Version::WARC1_1);
    header.set_field(FieldKind::RecordId, "<urn:uuid:1>");
    let file = Record::new(header, vec![])
        .write_to(Vec::new(), Compression::None)
        .unwrap();

    let mut reader = RecordReader::new(&file[..], Compression::None, 0, ReadOptions::default());
    let (record, _) = reader.next().unwrap().unwrap();
    assert_eq!(record.record_type().as_ref(), "unknown");
    assert_eq!(record.record_type().kind(), None);
}

#[test]
fn invalid_content_length_is_reported() {
    let file = b"WARC/1.1\r\n\
                     WARC-Type: resource\r\n\
                     Content-Length: abc\r\n\
                     \r\n\
                     whatever\r\n\r\n"
        .to_vec();
    let second_at = file.len() as u64;
    let file = sample_records()[2]
        .write_to(file, Compression::None)
        .unwrap();

    let mut reader = RecordReader::new(&file[..], Compression::None, 0, ReadOptions::default());
    let err = reader.next().unwrap().unwrap_err();
    match err.kind {
        InvalidRecord::UnknownLength(Some(ref value)) => assert_eq!(value, b"abc"),
        ref other => panic!("unexpected error {:?}", other),
    }
    assert!(!err.is_fatal());

    let (record, offset) = reader.next().unwrap().unwrap();
    assert_eq!(offset, second_at);
    assert_eq!(record.record_type(), &RecordKind::Response);
    assert!(reader.next().is_none());
}

#[test]
fn recovery_is_bounded() {
    let records = sample_records();
    let mut file = records[0].write_to(Vec::new(), Compression::None).unwrap();
    file.extend(std::iter::repeat(b'x').take(100));
    let file = records[1].write_to(file, Compression::None).unwrap();

    let options = ReadOptions {
        max_skip: 16,
        ..ReadOptions::default()
    };
    let mut reader = RecordReader::new(&file[..], Compression::None, 0, options);
    let results = read_all(&mut reader);

    assert_eq!(results.len(), 3, "{:?}", results);
    assert!(results[0].is_ok());
    assert!(!results[1].as_ref().unwrap_err().is_fatal());
    let err = results[2].as_ref().unwrap_err();
    assert!(matches!(err.kind, InvalidRecord::RecoveryLimit(16)), "{:?}", err);
    assert!(err.is_fatal());
    assert_eq!(reader.state(), State::Failed);
}

#[test]
fn gzip_recovers_at_next_member() {
    let records = sample_records();
    let mut file = records[0].write_to(Vec::new(), Compression::Gzip).unwrap();
    let garbage_at = file.len() as u64;
    file.extend_from_slice(b"this is not a gzip member");
    let second_at = file.len() as u64;
    let file = records[1].write_to(file, Compression::Gzip).unwrap();

    let mut reader = RecordReader::new(&file[..], Compression::Gzip, 0, ReadOptions::default());
    let results = read_all(&mut reader);
    assert_eq!(results.len(), 3, "{:?}", results);

    let err = results[1].as_ref().unwrap_err();
    assert_eq!(err.offset, garbage_at);
    assert!(matches!(err.kind, InvalidRecord::Corrupt(_)), "{:?}", err);
    let (record, offset) = results[2].as_ref().unwrap();
    assert_eq!(*offset, second_at);
    assert_eq!(record, &records[1]);
}

#[test]
fn gzip_member_with_bad_record_is_skipped_whole() {
    let records = sample_records();
    let bad = b"WARC/1.1\r\nContent-Length: nope\r\n\r\n";
    let mut file = records[0].write_to(Vec::new(), Compression::Gzip).unwrap();
    let mut gz = crate::compression::Writer::new(file, Compression::Gzip);
    io::Write::write_all(&mut gz, bad).unwrap();
    file = gz.finish().unwrap();
    let third_at = file.len() as u64;
    let file = records[2].write_to(file, Compression::Gzip).unwrap();

    let mut reader = RecordReader::new(&file[..], Compression::Gzip, 0, ReadOptions::default());
    let results = read_all(&mut reader);
    assert_eq!(results.len(), 3, "{:?}", results);
    assert!(matches!(
        results[1].as_ref().unwrap_err().kind,
        InvalidRecord::UnknownLength(_)
    ));
    assert_eq!(results[2].as_ref().unwrap().1, third_at);
}

#[test]
fn gzip_member_with_bad_header_is_skipped_whole() {
    let records = sample_records();
    let mut file = records[0].write_to(Vec::new(), Compression::Gzip).unwrap();
    let bad_at = file.len() as u64;
    let mut gz = crate::compression::Writer::new(file, Compression::Gzip);
    io::Write::write_all(&mut gz, b"not a WARC header\r\n\r\nWARC/1.1 and more\r\n").unwrap();
    file = gz.finish().unwrap();
    let third_at = file.len() as u64;
    let file = records[2].write_to(file, Compression::Gzip).unwrap();

    let mut reader = RecordReader::new(&file[..], Compression::Gzip, 0, ReadOptions::default());
    assert!(reader.next().unwrap().is_ok());
    let err = reader.next().unwrap().unwrap_err();
    assert!(matches!(err.kind, InvalidRecord::InvalidHeader(_)), "{:?}", err);
    assert_eq!(err.offset, bad_at);
    assert_eq!(reader.state(), State::Positioned);
    assert_eq!(reader.position(), Some(third_at));
    assert_eq!(reader.next().unwrap().unwrap().1, third_at);
    assert!(reader.next().is_none());
}

#[test]
fn close_is_idempotent() {
    let (file, _) = build_file(&sample_records(), Compression::None);
    let mut reader = RecordReader::new(&file[..], Compression::None, 0, ReadOptions::default());
    assert!(reader.next().is_some());

    reader.close();
    reader.close();
    assert_eq!(reader.position(), None);
    assert!(reader.next().is_none());
    assert_eq!(reader.records_read(), 1);
}

#[test]
fn reads_warc_1_0_bare_uris() {
    let text = b"WARC/1.0\r\n\
                 WARC-Type: response\r\n\
                 WARC-Record-ID: <urn:uuid:1>\r\n\
                 WARC-Date: 2006-09-19T17:20:24Z\r\n\
                 WARC-Target-URI: <http://www.archive.org/images/logoc.jpg>\r\n\
                 Content-Length: 2\r\n\
                 \r\n\
                 ok\r\n\r\n";

    let record = Record::read_from(&text[..], Compression::None).unwrap();
    assert_eq!(record.header().version(), &Version::WARC1_0);
    assert_eq!(
        record.header().target_uri(),
        Some("http://www.archive.org/images/logoc.jpg")
    );
    assert_eq!(record.content(), b"ok");
}

#[test]
fn read_from_empty_input_is_end_of_stream() {
    assert!(matches!(
        Record::read_from(&b""[..], Compression::None),
        Err(InvalidRecord::EndOfStream)
    ));
}
