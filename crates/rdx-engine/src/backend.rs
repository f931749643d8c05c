//! Rendering backend seam
//!
//! A backend parses a document into text segments, finds literal occurrences
//! inside them, and writes a new document with replacements applied.

use rdx_core::{RdxError, RdxResult};

use crate::pdf::PdfBackend;
use crate::text::TextBackend;

/// A literal occurrence: byte range `[start, end)` within one text segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Occurrence {
    pub segment: usize,
    pub start: usize,
    pub end: usize,
}

impl Occurrence {
    pub fn overlaps(&self, other: &Occurrence) -> bool {
        self.segment == other.segment && self.start < other.end && other.start < self.end
    }
}

#[derive(Debug, Clone)]
pub struct Replacement {
    pub at: Occurrence,
    pub text: String,
}

/// Extractable text of a document, one entry per backend segment.
#[derive(Debug, Clone)]
pub struct TextSegment {
    /// 1-based page number
    pub page: u32,
    pub text: String,
}

/// A parsed document, ready for search and one commit.
pub trait RenderedDocument: Send {
    /// All non-overlapping occurrences of `literal`, left to right per segment.
    fn find_occurrences(&self, literal: &str) -> Vec<Occurrence>;

    /// Text available to the extraction collaborator.
    fn segments(&self) -> Vec<TextSegment>;

    /// Apply every replacement and serialize the new document.
    ///
    /// Either the full document is produced or an error is returned.
    fn replace_and_commit(self: Box<Self>, replacements: Vec<Replacement>) -> RdxResult<Vec<u8>>;
}

pub trait DocumentBackend: Send + Sync {
    fn media_type(&self) -> &'static str;

    fn open(&self, bytes: &[u8]) -> RdxResult<Box<dyn RenderedDocument>>;
}

pub const MEDIA_PDF: &str = "application/pdf";
pub const MEDIA_TEXT: &str = "text/plain";

/// Accepted upload types, by file extension (case-insensitive).
pub fn media_type_for_filename(filename: &str) -> Option<&'static str> {
    let ext = std::path::Path::new(filename)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some(MEDIA_PDF),
        "txt" => Some(MEDIA_TEXT),
        _ => None,
    }
}

pub fn backend_for_media_type(media_type: &str) -> RdxResult<Box<dyn DocumentBackend>> {
    match media_type {
        MEDIA_PDF => Ok(Box::new(PdfBackend)),
        MEDIA_TEXT => Ok(Box::new(TextBackend)),
        other => Err(RdxError::Validation(format!(
            "unsupported document type: {other}"
        ))),
    }
}

/// Non-overlapping occurrences of `needle` in `haystack`, left to right.
pub(crate) fn find_all(haystack: &[u8], needle: &[u8]) -> Vec<(usize, usize)> {
    let mut found = Vec::new();
    if needle.is_empty() || needle.len() > haystack.len() {
        return found;
    }
    let mut i = 0;
    while i + needle.len() <= haystack.len() {
        if &haystack[i..i + needle.len()] == needle {
            found.push((i, i + needle.len()));
            i += needle.len();
        } else {
            i += 1;
        }
    }
    found
}

/// Splice `edits` (`(start, end, replacement)`) into `buf`.
///
/// Edits must be in range and pairwise disjoint.
pub(crate) fn splice(buf: &[u8], mut edits: Vec<(usize, usize, &[u8])>) -> RdxResult<Vec<u8>> {
    edits.sort_by_key(|(start, _, _)| *start);

    let mut out = Vec::with_capacity(buf.len());
    let mut cursor = 0;
    for (start, end, text) in edits {
        if start < cursor || end < start || end > buf.len() {
            return Err(RdxError::Dependency(format!(
                "replacement range {start}..{end} is out of bounds or overlapping"
            )));
        }
        out.extend_from_slice(&buf[cursor..start]);
        out.extend_from_slice(text);
        cursor = end;
    }
    out.extend_from_slice(&buf[cursor..]);
    Ok(out)
}
