use pretty_assertions::assert_eq;

use crate::header::get_record_header;
use crate::{FieldKind, Header, HeaderParseError, Version};

mod read;

#[test]
fn can_read_record_header() {
    let header = b"WARC/1.0\r\n\
                   Warc-Type: testdata\r\n\
                   Content-Length: 6\r\n\
                   X-Multiline-Test:lol \r\n  multiline headers\r\n\
                   \r\n";

    let mut expected = Header::new(Version::WARC1_0);
    expected.set_field("warc-type", "testdata");
    expected.set_field("content-length", "6");
    expected.set_field("x-multiline-test", "lol multiline headers");

    assert_eq!(
        get_record_header(&header[..])
            .map_err(|(e, _)| e)
            .expect("Should be valid"),
        expected
    );
}

#[test]
fn extra_buffering_works() {
    use std::io::{self, Result};
    /// A type to probe the buffering behavior of `get_record_header`.
    ///
    /// On each `fill_buf` call it transitions to the next state, and
    /// after two it is in the terminal state.
    #[derive(Debug, PartialEq)]
    enum DoubleBuffer<'a> {
        /// Nothing read yet.
        Start(&'a [u8], &'a [u8]),
        /// One whole buffer read.
        Second(&'a [u8]),
        /// Both buffers read, with n bytes left unread from the second.
        Done(usize),
    }
    // Only because BufRead: Read
    impl<'a> io::Read for DoubleBuffer<'a> {
        fn read(&mut self, _: &mut [u8]) -> Result<usize> {
            unimplemented!();
        }
    }
    impl<'a> io::BufRead for DoubleBuffer<'a> {
        fn fill_buf(&mut self) -> Result<&[u8]> {
            match self {
                &mut DoubleBuffer::Start(fst, _) => Ok(fst),
                &mut DoubleBuffer::Second(snd) => Ok(snd),
                &mut DoubleBuffer::Done(_) => panic!("Should not fill after snd"),
            }
        }

        fn consume(&mut self, amt: usize) {
            let next = match *self {
                DoubleBuffer::Start(fst, snd) => {
                    assert_eq!(amt, fst.len());
                    DoubleBuffer::Second(snd)
                }
                DoubleBuffer::Second(snd) => DoubleBuffer::Done(snd.len() - amt),
                DoubleBuffer::Done(_) => panic!("Should not consume after snd"),
            };
            *self = next;
        }
    }

    let mut reader = DoubleBuffer::Start(
        b"WARC/1.0\r\n\
          X-First-Header: yes\r\n\
          X-Second-Header:yes\r\n\
          \r",
        // Header termination spans two buffers
        // to catch potential errors there.
        b"\nIGNORED_DATA",
    );
    get_record_header(&mut reader)
        .map_err(|(e, _)| e)
        .expect("failed to parse valid header");
    assert_eq!(reader, DoubleBuffer::Done(12));
}

#[test]
fn truncated_header_returns_consumed_input() {
    const BYTES: &[u8] = b"WARC/1.1\r\n\
                           WARC-Type: testdata\r\n\r";

    let (err, consumed) = get_record_header(BYTES).expect_err("header should be incomplete");
    assert_eq!(err, HeaderParseError::Truncated);
    assert_eq!(consumed, BYTES);
}

#[test]
fn invalid_fields_are_invalid() {
    assert_eq!(
        Header::parse_field(b"This is not a valid field\r\n\r\n"),
        Err(HeaderParseError::MalformedField(0))
    );
    assert_eq!(
        Header::parse_field(b"X-Invalid-UTF-8\xFF: yes\r\n\r\n"),
        Err(HeaderParseError::MalformedField(0))
    );

    // The reported offset is that of the bad field within the whole header
    assert_eq!(
        Header::parse(b"WARC/1.1\r\nContent-Length: 0\r\nbogus\r\n\r\n"),
        Err(HeaderParseError::MalformedField(29))
    );
}

#[test]
fn header_parse_consumes_full() {
    // "WARC/1.1" CRLF (=version)
    // named-field CRLF (=warc-fields)
    // CRLF
    let text = b"\
        WARC/1.1\r\n\
        Content-Length: 123\r\n\
        \r\n\
    ";

    let (header, sz) = Header::parse(&text[..]).expect("Parse should succeed");
    assert_eq!(sz, text.len());
    let mut test_header = Header::new(Version::WARC1_1);
    test_header.set_field(FieldKind::ContentLength, "123");
    assert_eq!(header, test_header);
    assert_eq!(header.content_length(), Some(123));
}

#[test]
fn content_length_must_be_digits() {
    let mut header = Header::new(Version::WARC1_1);
    for bad in &["", "-1", "+5", "12a", " 7"] {
        header.set_field(FieldKind::ContentLength, *bad);
        assert_eq!(header.content_length(), None, "{:?} was accepted", bad);
    }
    header.set_field(FieldKind::ContentLength, "0");
    assert_eq!(header.content_length(), Some(0));
}

#[test]
fn header_adjusts_bare_uri_brackets() {
    let mut header = Header::new(Version::WARC1_0);
    header.set_field(FieldKind::TargetURI, "http://example.com");

    assert_eq!(
        header.get_field(FieldKind::TargetURI),
        Some("http://example.com")
    );
    assert_eq!(
        header.get_field_bytes_raw(FieldKind::TargetURI.into_name()),
        Some(&b"<http://example.com>"[..])
    );

    let mut header = Header::new(Version::WARC1_1);
    header.set_field(FieldKind::TargetURI, "http://example.com");
    assert_eq!(
        header.get_field_bytes_raw(FieldKind::TargetURI.into_name()),
        Some(&b"http://example.com"[..])
    );

    // Record IDs are bracketed in every version
    let (header, _) = Header::parse(
        b"WARC/1.0\r\n\
          WARC-Record-ID: <urn:uuid:1>\r\n\
          WARC-Target-URI: <http://example.com/>\r\n\
          \r\n",
    )
    .unwrap();
    assert_eq!(header.record_id(), Some("<urn:uuid:1>"));
    assert_eq!(header.target_uri(), Some("http://example.com/"));
}

#[test]
fn repeated_fields_keep_every_value() {
    let text = b"WARC/1.1\r\n\
                 WARC-Type: metadata\r\n\
                 WARC-Concurrent-To: <urn:uuid:1>\r\n\
                 warc-concurrent-to: <urn:uuid:2>\r\n\
                 Content-Length: 0\r\n\
                 \r\n";
    let (mut header, _) = Header::parse(&text[..]).unwrap();

    assert_eq!(
        header.get_field_values(FieldKind::ConcurrentTo).collect::<Vec<_>>(),
        vec!["<urn:uuid:1>", "<urn:uuid:2>"]
    );
    assert_eq!(header.get_field(FieldKind::ConcurrentTo), Some("<urn:uuid:1>"));

    header.add_field(FieldKind::ConcurrentTo, "<urn:uuid:3>");
    assert_eq!(header.get_field_values(FieldKind::ConcurrentTo).count(), 3);

    // Writing gives every value its own line, with the name normalized
    let mut written = Vec::new();
    header.write_to(&mut written).unwrap();
    assert_eq!(
        String::from_utf8(written).unwrap(),
        "WARC/1.1\r\n\
         WARC-Type: metadata\r\n\
         WARC-Concurrent-To: <urn:uuid:1>\r\n\
         WARC-Concurrent-To: <urn:uuid:2>\r\n\
         WARC-Concurrent-To: <urn:uuid:3>\r\n\
         Content-Length: 0\r\n\
         \r\n"
    );

    assert_eq!(
        header.remove_field(FieldKind::ConcurrentTo.into_name()).map(|v| v.len()),
        Some(3)
    );
    assert!(!header.field_exists(FieldKind::ConcurrentTo));
}

#[cfg(feature = "chrono")]
#[test]
fn warc_date_parses() {
    let mut header = Header::new(Version::WARC1_1);
    header.set_field(FieldKind::Date, "2021-08-05T06:22:13Z");
    assert_eq!(
        header.warc_date_parsed().map(|date| date.to_rfc3339()),
        Some("2021-08-05T06:22:13+00:00".to_string())
    );

    header.set_field(FieldKind::Date, "yesterday");
    assert_eq!(header.warc_date_parsed(), None);
}
