use std::fmt;

use crate::FieldName;

/// Standardized values for [field names](FieldName).
///
/// Each variant converts to its canonical spelling through `AsRef<str>`, and a name can be
/// recognized case-insensitively through `TryFrom<&str>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// `WARC-Record-ID`: a globally unique identifier for a record.
    ///
    /// Mandatory. Values are a URI delimited by angle brackets, commonly a UUID URN such as
    /// `<urn:uuid:f81d4fae-7dec-11d0-a765-00a0c91e6bf6>`.
    RecordId,
    /// `Content-Length`: the number of octets in a record block.
    ///
    /// Mandatory, and the only field a reader needs to find the end of a record.
    ContentLength,
    /// `WARC-Date`: the instant that capture of a record began, as a UTC W3C-ISO8601 timestamp
    /// like `2018-01-28T13:33:12Z`.
    Date,
    /// `WARC-Type`: the type of a record, corresponding to a [`RecordType`](crate::RecordType).
    Type,
    /// `Content-Type`: the MIME type of a record's block.
    ///
    /// HTTP messages are usually stored with `application/http;msgtype=response` or
    /// `application/http;msgtype=request`.
    ContentType,
    /// `WARC-Concurrent-To`: the [`RecordId`](Self::RecordId) of records created as part of the
    /// same capture event. May be repeated.
    ConcurrentTo,
    /// `WARC-Block-Digest`: a `labelled-digest` (`algorithm ":" digest-value`) of the record block.
    BlockDigest,
    /// `WARC-Payload-Digest`: a `labelled-digest` of a record's payload.
    ///
    /// For HTTP records the payload is the entity body, excluding HTTP headers. The digest may
    /// describe data that is not present in the block at all, such as for revisit records.
    PayloadDigest,
    /// `WARC-IP-Address`: the IP address that was contacted to retrieve record content.
    IpAddress,
    /// `WARC-Refers-To`: the record ID of a record for which this record holds additional
    /// content, such as the original capture a revisit stands in for.
    RefersTo,
    /// `WARC-Refers-To-Target-URI`: the [`TargetURI`](Self::TargetURI) of the record referred to
    /// by [`RefersTo`](Self::RefersTo).
    RefersToTargetURI,
    /// `WARC-Refers-To-Date`: the [`Date`](Self::Date) of the record referred to by
    /// [`RefersTo`](Self::RefersTo).
    RefersToDate,
    /// `WARC-Target-URI`: the original URI that provided the record content.
    TargetURI,
    /// `WARC-Truncated`: the reason a record holds a truncated version of the original resource
    /// (`length`, `time`, `disconnect` or `unspecified`).
    Truncated,
    /// `WARC-Warcinfo-ID`: the ID of the warcinfo record associated with this record.
    InfoID,
    /// `WARC-Filename`: the name of the file containing a warcinfo record.
    Filename,
    /// `WARC-Profile`: the URI describing how a revisit record was created.
    Profile,
    /// `WARC-Identified-Payload-Type`: the content type found by inspecting a record payload.
    IdentifiedPayloadType,
    /// `WARC-Segment-Number`: the ordering of the current record in a sequence of segments.
    SegmentNumber,
    /// `WARC-Segment-Origin-ID`: the ID of the starting record in a series of segments.
    SegmentOriginID,
    /// `WARC-Segment-Total-Length`: the total length of concatenated segment blocks.
    SegmentTotalLength,
}

impl FieldKind {
    pub fn into_name(self) -> FieldName {
        FieldName::Known(self)
    }

    /// Returns `true` if this field's value is a URI that WARC 1.1 writes without angle
    /// brackets but earlier versions write with them.
    pub(crate) fn value_is_bare_uri(self) -> bool {
        use FieldKind::*;
        match self {
            TargetURI | RefersToTargetURI | Profile => true,
            // Types that include angle brackets regardless of WARC version: "<" uri ">"
            RecordId | ConcurrentTo | RefersTo | InfoID | SegmentOriginID => false,
            // Types that don't contain URIs
            ContentLength
            | Date
            | Type
            | ContentType
            | BlockDigest
            | PayloadDigest
            | IpAddress
            | RefersToDate
            | Truncated
            | Filename
            | IdentifiedPayloadType
            | SegmentNumber
            | SegmentTotalLength => false,
        }
    }
}

include!(concat!(env!("OUT_DIR"), "/field_kind_conversions.rs"));

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl PartialEq<FieldName> for FieldKind {
    fn eq(&self, other: &FieldName) -> bool {
        other == self
    }
}
