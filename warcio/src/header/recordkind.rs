use uncased::AsUncased;

/// Standardized values for [record types](crate::RecordType).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecordKind {
    /// `warcinfo`: describes the records that follow this one.
    ///
    /// An info record describes the records following itself through the end of the current input
    /// or until the next info record, usually with `application/warc-fields` content naming the
    /// tool that wrote the file.
    Info,
    /// `response`: a complete scheme-specific response to some request, such as a full HTTP
    /// response including headers.
    Response,
    /// `resource`: a resource without full protocol response information.
    Resource,
    /// `request`: a complete scheme-specific request.
    Request,
    /// `metadata`: content created to further describe, explain or accompany a resource.
    Metadata,
    /// `revisit`: revisitation of content that was already archived.
    ///
    /// Revisit records usually truncate their block and point at the original capture through
    /// [`WARC-Refers-To`](crate::FieldKind::RefersTo) and related fields.
    Revisit,
    /// `conversion`: an alternative version of another record's content.
    Conversion,
    /// `continuation`: additional data to be appended to a prior block of a segmented record.
    Continuation,
}

include!(concat!(env!("OUT_DIR"), "/record_kind_conversions.rs"));

impl PartialEq<str> for RecordKind {
    fn eq(&self, other: &str) -> bool {
        self.as_ref().as_uncased() == other.as_uncased()
    }
}

impl PartialEq<&str> for RecordKind {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}
