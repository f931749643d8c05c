//! Substitution protocol
//!
//! Both directions are the same operation over a rendered document: a set of
//! `(literal, replacement)` targets, searched in the ORIGINAL document and
//! applied in one commit. Longer literals claim their spans first; an
//! occurrence overlapping a claimed span is skipped, so "John" never splits
//! "John Smith" and no value is ever matched inside an inserted marker.

use rdx_core::types::SensitiveField;
use rdx_core::{RdxError, RdxResult};
use rdx_crypto::{placeholder_id, placeholder_marker, EncryptionMetadata};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

use crate::backend::{Occurrence, RenderedDocument, Replacement};

/// One literal to replace everywhere, tagged with its placeholder id.
#[derive(Clone)]
pub struct Substitution {
    pub id: String,
    pub literal: String,
    pub replacement: String,
}

// Either side may be a plaintext value.
impl fmt::Debug for Substitution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Substitution")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Replacements made per placeholder id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubstitutionReport {
    pub counts: BTreeMap<String, usize>,
    /// Placeholder ids with no occurrence in the document
    pub unmatched: Vec<String>,
}

impl SubstitutionReport {
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn count(&self, id: &str) -> usize {
        self.counts.get(id).copied().unwrap_or(0)
    }
}

/// Targets for the redact direction: every field value becomes its marker.
pub fn redact_targets(fields: &[SensitiveField]) -> Vec<Substitution> {
    fields
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let id = placeholder_id(i);
            let replacement = placeholder_marker(&id, &field.field_type);
            Substitution {
                id,
                literal: field.original_value.clone(),
                replacement,
            }
        })
        .collect()
}

/// Targets for the restore direction: every marker becomes its decrypted value.
pub fn restore_targets(
    metadata: &EncryptionMetadata,
    decrypted: &BTreeMap<String, String>,
) -> RdxResult<Vec<Substitution>> {
    decrypted
        .iter()
        .map(|(id, value)| {
            let marker = metadata
                .marker(id)
                .ok_or(RdxError::InvalidPasskeyOrCorruptedData)?;
            Ok::<_, RdxError>(Substitution {
                id: id.clone(),
                literal: marker,
                replacement: value.clone(),
            })
        })
        .collect()
}

/// Replace every target in `doc` and commit.
///
/// A target with zero occurrences is not an error; it is listed in
/// [`SubstitutionReport::unmatched`].
pub fn substitute(
    doc: Box<dyn RenderedDocument>,
    targets: &[Substitution],
) -> RdxResult<(Vec<u8>, SubstitutionReport)> {
    if let Some(empty) = targets.iter().find(|t| t.literal.is_empty()) {
        return Err(RdxError::Validation(format!(
            "substitution target {} is empty",
            empty.id
        )));
    }

    let mut order: Vec<&Substitution> = targets.iter().collect();
    order.sort_by_key(|t| Reverse(t.literal.len()));

    let mut claimed: Vec<Occurrence> = Vec::new();
    let mut replacements = Vec::new();
    let mut report = SubstitutionReport::default();

    for target in order {
        let mut count = 0;
        for at in doc.find_occurrences(&target.literal) {
            if claimed.iter().any(|c| c.overlaps(&at)) {
                continue;
            }
            claimed.push(at);
            replacements.push(Replacement {
                at,
                text: target.replacement.clone(),
            });
            count += 1;
        }

        debug!(placeholder = %target.id, occurrences = count, "substitution target located");
        if count == 0 {
            warn!(placeholder = %target.id, "no occurrence found in document");
            report.unmatched.push(target.id.clone());
        }
        report.counts.insert(target.id.clone(), count);
    }

    report.unmatched.sort();
    let out = doc.replace_and_commit(replacements)?;
    Ok((out, report))
}


#[cfg(test)]
mod proptest_suite {
    use super::*;
    use crate::backend::DocumentBackend;
    use crate::text::TextBackend;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn no_literal_survives(
            filler in prop::collection::vec("[a-z ]{0,8}", 1..8),
            value in "[0-9]{3}-[0-9]{2}-[0-9]{4}",
        ) {
            let src = filler.join(&value);
            let expected = src.matches(value.as_str()).count();
            let doc = TextBackend.open(src.as_bytes()).unwrap();
            let targets = [Substitution {
                id: "FIELD-001".into(),
                literal: value.clone(),
                replacement: "[FIELD-001:ssn]".into(),
            }];
            let (out, report) = substitute(doc, &targets).unwrap();
            let out = String::from_utf8(out).unwrap();

            prop_assert!(!out.contains(value.as_str()));
            prop_assert_eq!(report.count("FIELD-001"), expected);
            prop_assert_eq!(out.matches("[FIELD-001:ssn]").count(), expected);
        }
    }
}
