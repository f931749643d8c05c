//! PDF backend (lopdf)
//!
//! Segments are the string operands of the text-showing operators in each
//! page content stream and in every Form XObject a page draws with `Do`,
//! nested forms included:
//! ```text
//! (text) Tj      (text) '      aw ac (text) "      [(te) -20 (xt)] TJ
//! ```
//! Replacements rewrite the string operands in place, re-encode the touched
//! content streams and prune objects no page references any more, so the
//! original stream bytes do not survive in the saved file. A form shared by
//! several pages is indexed once, under the first page that draws it. A value
//! split across two operands is not found, and annotation appearance streams
//! are not searched.

use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use rdx_core::{RdxError, RdxResult};

use crate::backend::{
    find_all, splice, DocumentBackend, Occurrence, RenderedDocument, Replacement, TextSegment,
    MEDIA_PDF,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct PdfBackend;

impl DocumentBackend for PdfBackend {
    fn media_type(&self) -> &'static str {
        MEDIA_PDF
    }

    fn open(&self, bytes: &[u8]) -> RdxResult<Box<dyn RenderedDocument>> {
        let doc = Document::load_mem(bytes).map_err(pdf_err("PDF parse failed"))?;

        let mut index = StreamIndex::default();
        let mut seen_forms = BTreeSet::new();
        for (page_no, page_id) in doc.get_pages() {
            let raw = doc
                .get_page_content(page_id)
                .map_err(pdf_err("reading page content"))?;
            let content = Content::decode(&raw).map_err(pdf_err("decoding page content"))?;
            index.push(page_no, StreamOwner::Page(page_id), content);

            let mut forms = Vec::new();
            for resources in inherited_resources(&doc, page_id) {
                collect_forms(&doc, resources, 0, &mut seen_forms, &mut forms);
            }
            for form_id in forms {
                index.push(page_no, StreamOwner::Form(form_id), form_content(&doc, form_id)?);
            }
        }

        debug!(
            streams = index.streams.len(),
            forms = seen_forms.len(),
            segments = index.segments.len(),
            "PDF text segments indexed"
        );

        Ok(Box::new(RenderedPdf {
            doc,
            streams: index.streams,
            segments: index.segments,
        }))
    }
}

fn pdf_err(context: &'static str) -> impl Fn(lopdf::Error) -> RdxError {
    move |e| RdxError::Dependency(format!("{context}: {e}"))
}

/// Position of a string inside an operation's operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    /// `operands[i]` is the string
    Operand(usize),
    /// `operands[0]` is a `TJ` array and `items[i]` is the string
    ArrayItem(usize),
}

struct PdfSegment {
    page_no: u32,
    stream_idx: usize,
    op_idx: usize,
    slot: Slot,
    bytes: Vec<u8>,
}

/// Object a decoded content stream is written back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamOwner {
    /// Page content, possibly split over several stream objects
    Page(ObjectId),
    /// Form XObject stream
    Form(ObjectId),
}

struct ContentStream {
    owner: StreamOwner,
    content: Content,
}

#[derive(Default)]
struct StreamIndex {
    streams: Vec<ContentStream>,
    segments: Vec<PdfSegment>,
}

impl StreamIndex {
    fn push(&mut self, page_no: u32, owner: StreamOwner, content: Content) {
        let stream_idx = self.streams.len();
        for (op_idx, op) in content.operations.iter().enumerate() {
            for (slot, bytes) in text_operands(&op.operator, &op.operands) {
                self.segments.push(PdfSegment {
                    page_no,
                    stream_idx,
                    op_idx,
                    slot,
                    bytes,
                });
            }
        }
        self.streams.push(ContentStream { owner, content });
    }
}

struct RenderedPdf {
    doc: Document,
    streams: Vec<ContentStream>,
    segments: Vec<PdfSegment>,
}

/// Forms nested deeper than this are not searched.
const MAX_FORM_DEPTH: usize = 32;
/// Bound on the `Parent` chain walked for inherited resources.
const MAX_TREE_DEPTH: usize = 64;

fn resolve_dict<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a lopdf::Dictionary> {
    doc.dereference(object).ok()?.1.as_dict().ok()
}

/// `Resources` dictionaries of a page and of the page tree nodes above it.
fn inherited_resources(doc: &Document, page_id: ObjectId) -> Vec<&lopdf::Dictionary> {
    let mut found = Vec::new();
    let mut node = doc.get_dictionary(page_id).ok();
    let mut depth = 0;
    while let Some(dict) = node {
        if let Some(resources) = dict.get(b"Resources").ok().and_then(|o| resolve_dict(doc, o)) {
            found.push(resources);
        }
        depth += 1;
        if depth > MAX_TREE_DEPTH {
            break;
        }
        node = dict
            .get(b"Parent")
            .and_then(Object::as_reference)
            .and_then(|id| doc.get_dictionary(id))
            .ok();
    }
    found
}

/// Form XObjects reachable from `resources`, each at most once across calls.
fn collect_forms(
    doc: &Document,
    resources: &lopdf::Dictionary,
    depth: usize,
    seen: &mut BTreeSet<ObjectId>,
    out: &mut Vec<ObjectId>,
) {
    if depth > MAX_FORM_DEPTH {
        return;
    }
    let xobjects = match resources.get(b"XObject").ok().and_then(|o| resolve_dict(doc, o)) {
        Some(xobjects) => xobjects,
        None => return,
    };
    for (_, entry) in xobjects.iter() {
        let id = match entry.as_reference() {
            Ok(id) => id,
            Err(_) => continue,
        };
        let stream = match doc.get_object(id).and_then(Object::as_stream) {
            Ok(stream) => stream,
            Err(_) => continue,
        };
        if stream.dict.get(b"Subtype").and_then(Object::as_name).ok() != Some(&b"Form"[..]) {
            continue;
        }
        if !seen.insert(id) {
            continue;
        }
        out.push(id);
        if let Some(nested) = stream
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|o| resolve_dict(doc, o))
        {
            collect_forms(doc, nested, depth + 1, seen, out);
        }
    }
}

fn form_content(doc: &Document, id: ObjectId) -> RdxResult<Content> {
    let stream = doc
        .get_object(id)
        .and_then(Object::as_stream)
        .map_err(pdf_err("reading form XObject"))?;
    let raw = if stream.dict.has(b"Filter") {
        stream
            .decompressed_content()
            .map_err(pdf_err("decompressing form XObject"))?
    } else {
        stream.content.clone()
    };
    Content::decode(&raw).map_err(pdf_err("decoding form XObject"))
}

fn text_operands(operator: &str, operands: &[Object]) -> Vec<(Slot, Vec<u8>)> {
    let string_at = |i: usize| match operands.get(i) {
        Some(Object::String(bytes, _)) => vec![(Slot::Operand(i), bytes.clone())],
        _ => Vec::new(),
    };
    match operator {
        "Tj" | "'" => string_at(0),
        "\"" => string_at(2),
        "TJ" => match operands.first() {
            Some(Object::Array(items)) => items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| match item {
                    Object::String(bytes, _) => Some((Slot::ArrayItem(i), bytes.clone())),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn string_slot_mut<'a>(operands: &'a mut [Object], slot: Slot) -> Option<&'a mut Vec<u8>> {
    let target = match slot {
        Slot::Operand(i) => operands.get_mut(i)?,
        Slot::ArrayItem(i) => match operands.first_mut()? {
            Object::Array(items) => items.get_mut(i)?,
            _ => return None,
        },
    };
    match target {
        Object::String(bytes, _) => Some(bytes),
        _ => None,
    }
}

impl RenderedDocument for RenderedPdf {
    fn find_occurrences(&self, literal: &str) -> Vec<Occurrence> {
        self.segments
            .iter()
            .enumerate()
            .flat_map(|(segment, seg)| {
                find_all(&seg.bytes, literal.as_bytes())
                    .into_iter()
                    .map(move |(start, end)| Occurrence {
                        segment,
                        start,
                        end,
                    })
            })
            .collect()
    }

    fn segments(&self) -> Vec<TextSegment> {
        self.segments
            .iter()
            .map(|seg| TextSegment {
                page: seg.page_no,
                text: String::from_utf8_lossy(&seg.bytes).into_owned(),
            })
            .collect()
    }

    fn replace_and_commit(self: Box<Self>, replacements: Vec<Replacement>) -> RdxResult<Vec<u8>> {
        let RenderedPdf {
            mut doc,
            mut streams,
            segments,
        } = *self;

        let mut by_segment: BTreeMap<usize, Vec<&Replacement>> = BTreeMap::new();
        for r in &replacements {
            by_segment.entry(r.at.segment).or_default().push(r);
        }

        let mut touched = Vec::new();
        for (segment, reps) in by_segment {
            let seg = segments.get(segment).ok_or_else(|| {
                RdxError::Dependency(format!("replacement targets unknown segment {segment}"))
            })?;
            let edits = reps
                .iter()
                .map(|r| (r.at.start, r.at.end, r.text.as_bytes()))
                .collect();
            let rewritten = splice(&seg.bytes, edits)?;

            let stream = &mut streams[seg.stream_idx];
            let op = stream.content.operations.get_mut(seg.op_idx).ok_or_else(|| {
                RdxError::Dependency("content operation vanished".to_string())
            })?;
            let slot = string_slot_mut(&mut op.operands, seg.slot).ok_or_else(|| {
                RdxError::Dependency("text operand vanished".to_string())
            })?;
            *slot = rewritten;

            if !touched.contains(&seg.stream_idx) {
                touched.push(seg.stream_idx);
            }
        }

        for stream_idx in touched {
            let stream = &streams[stream_idx];
            let encoded = stream
                .content
                .encode()
                .map_err(pdf_err("encoding content stream"))?;
            match stream.owner {
                StreamOwner::Page(page_id) => doc
                    .change_page_content(page_id, encoded)
                    .map_err(pdf_err("replacing page content"))?,
                StreamOwner::Form(form_id) => doc
                    .get_object_mut(form_id)
                    .and_then(Object::as_stream_mut)
                    .map_err(pdf_err("replacing form content"))?
                    .set_plain_content(encoded),
            }
        }

        // Old content streams are unreferenced now; drop them so their text
        // is not carried into the output.
        doc.prune_objects();
        doc.compress();

        let mut out = Vec::new();
        doc.save_to(&mut out)
            .map_err(|e| RdxError::Dependency(format!("writing PDF: {e}")))?;
        Ok(out)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{pdf_with_form, pdf_with_pages, plain_bytes, shown_text};
    use super::*;

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            PdfBackend.open(b"definitely not a pdf"),
            Err(RdxError::Dependency(_))
        ));
    }

    #[test]
    fn test_segments_per_page() {
        let pdf = pdf_with_pages(&[&["Name: Jane Roe"], &["SSN 555-12-3456", "Phone none"]]);
        let doc = PdfBackend.open(&pdf).unwrap();
        let segments = doc.segments();

        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].page, 1);
        assert_eq!(segments[1].page, 2);
        assert_eq!(segments[1].text, "SSN 555-12-3456");
    }

    #[test]
    fn test_replace_across_pages() {
        let pdf = pdf_with_pages(&[&["SSN 555-12-3456"], &["again 555-12-3456 here"]]);
        let doc = PdfBackend.open(&pdf).unwrap();
        let occ = doc.find_occurrences("555-12-3456");
        assert_eq!(occ.len(), 2);

        let out = doc
            .replace_and_commit(
                occ.into_iter()
                    .map(|at| Replacement {
                        at,
                        text: "[FIELD-001:ssn]".into(),
                    })
                    .collect(),
            )
            .unwrap();

        assert_eq!(
            shown_text(&out),
            vec!["SSN [FIELD-001:ssn]", "again [FIELD-001:ssn] here"]
        );
    }

    #[test]
    fn test_tj_array_items() {
        let ops = vec![Object::Array(vec![
            Object::string_literal("Jane"),
            Object::Integer(-250),
            Object::string_literal("Roe"),
        ])];
        let found = text_operands("TJ", &ops);
        assert_eq!(found.len(), 2);
        assert_eq!(found[1].0, Slot::ArrayItem(2));
        assert_eq!(found[1].1, b"Roe".to_vec());
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn test_form_xobject_segments() {
        let pdf = pdf_with_form(
            &[&["Page one"], &["Page two"]],
            &["Form SSN 555-12-3456", "Nested 555-12-3456"],
        );
        let doc = PdfBackend.open(&pdf).unwrap();
        let texts: Vec<_> = doc.segments().into_iter().map(|s| (s.page, s.text)).collect();

        // The form is shared by both pages but indexed once, under page 1.
        assert_eq!(
            texts,
            vec![
                (1, "Page one".to_string()),
                (1, "Form SSN 555-12-3456".to_string()),
                (1, "Nested 555-12-3456".to_string()),
                (2, "Page two".to_string()),
            ]
        );
    }

    #[test]
    fn test_replace_inside_form_xobjects() {
        let pdf = pdf_with_form(
            &[&["Page SSN 555-12-3456"]],
            &["Form SSN 555-12-3456", "Nested 555-12-3456"],
        );
        assert!(contains(&plain_bytes(&pdf), b"555-12-3456"));

        let doc = PdfBackend.open(&pdf).unwrap();
        let occ = doc.find_occurrences("555-12-3456");
        assert_eq!(occ.len(), 3);
        let out = doc
            .replace_and_commit(
                occ.into_iter()
                    .map(|at| Replacement {
                        at,
                        text: "[FIELD-001:ssn]".into(),
                    })
                    .collect(),
            )
            .unwrap();

        let plain = plain_bytes(&out);
        assert!(!contains(&plain, b"555-12-3456"));
        assert!(!contains(&out, b"555-12-3456"));

        let reopened = PdfBackend.open(&out).unwrap();
        assert_eq!(reopened.find_occurrences("[FIELD-001:ssn]").len(), 3);
        assert_eq!(shown_text(&out), vec!["Page SSN [FIELD-001:ssn]"]);
    }
}
