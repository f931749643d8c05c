//! Plain-text backend: UTF-8 bytes, one segment, byte-exact round trip

use rdx_core::{RdxError, RdxResult};

use crate::backend::{
    find_all, splice, DocumentBackend, Occurrence, RenderedDocument, Replacement, TextSegment,
    MEDIA_TEXT,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct TextBackend;

impl DocumentBackend for TextBackend {
    fn media_type(&self) -> &'static str {
        MEDIA_TEXT
    }

    fn open(&self, bytes: &[u8]) -> RdxResult<Box<dyn RenderedDocument>> {
        std::str::from_utf8(bytes)
            .map_err(|e| RdxError::Validation(format!("text document is not UTF-8: {e}")))?;
        Ok(Box::new(RenderedText {
            content: bytes.to_vec(),
        }))
    }
}

struct RenderedText {
    content: Vec<u8>,
}

impl RenderedDocument for RenderedText {
    fn find_occurrences(&self, literal: &str) -> Vec<Occurrence> {
        find_all(&self.content, literal.as_bytes())
            .into_iter()
            .map(|(start, end)| Occurrence {
                segment: 0,
                start,
                end,
            })
            .collect()
    }

    fn segments(&self) -> Vec<TextSegment> {
        vec![TextSegment {
            page: 1,
            text: String::from_utf8_lossy(&self.content).into_owned(),
        }]
    }

    fn replace_and_commit(self: Box<Self>, replacements: Vec<Replacement>) -> RdxResult<Vec<u8>> {
        let edits = replacements
            .iter()
            .map(|r| (r.at.start, r.at.end, r.text.as_bytes()))
            .collect();
        splice(&self.content, edits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_utf8() {
        assert!(matches!(
            TextBackend.open(&[0xff, 0xfe, 0x00]),
            Err(RdxError::Validation(_))
        ));
    }

    #[test]
    fn test_find_and_replace() {
        let doc = TextBackend.open("SSN: 555-12-3456.".as_bytes()).unwrap();
        let occ = doc.find_occurrences("555-12-3456");
        assert_eq!(
            occ,
            vec![Occurrence {
                segment: 0,
                start: 5,
                end: 16
            }]
        );

        let out = doc
            .replace_and_commit(vec![Replacement {
                at: occ[0],
                text: "[FIELD-001:ssn]".into(),
            }])
            .unwrap();
        assert_eq!(out, b"SSN: [FIELD-001:ssn].");
    }

    #[test]
    fn test_multibyte_offsets() {
        let doc = TextBackend.open("Név: Zoë Ünal".as_bytes()).unwrap();
        let occ = doc.find_occurrences("Zoë");
        assert_eq!(occ.len(), 1);
        let out = doc
            .replace_and_commit(vec![Replacement {
                at: occ[0],
                text: "X".into(),
            }])
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Név: X Ünal");
    }

    #[test]
    fn test_commit_without_replacements_is_identity() {
        let src = "nothing to see\nhere\n";
        let doc = TextBackend.open(src.as_bytes()).unwrap();
        assert_eq!(doc.replace_and_commit(vec![]).unwrap(), src.as_bytes());
    }
}
