//! Sensitive field extraction
//!
//! [`FieldExtractor`] is the seam for detection collaborators. The built-in
//! [`PatternExtractor`] runs a fixed table of regular expressions over the
//! backend's text segments.

use rdx_core::types::{FieldLocation, SensitiveField};
use rdx_core::{RdxError, RdxResult};
use regex::Regex;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::backend::TextSegment;

pub trait FieldExtractor: Send + Sync {
    fn extract(&self, segments: &[TextSegment]) -> RdxResult<Vec<SensitiveField>>;
}

pub const PATTERN_DETECTION: &str = "regex_pattern";

/// (type, pattern, confidence)
const PATTERNS: &[(&str, &str, f32)] = &[
    ("ssn", r"\b\d{3}-\d{2}-\d{4}\b|\b\d{9}\b", 0.95),
    (
        "phone",
        r"\b(?:\+?1[-.\s]?)?\(?[0-9]{3}\)?[-.\s]?[0-9]{3}[-.\s]?[0-9]{4}\b",
        0.85,
    ),
    (
        "email",
        r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
        0.95,
    ),
    ("credit-card", r"\b(?:\d{4}[-\s]?){3}\d{4}\b", 0.90),
    (
        "date-of-birth",
        r"\b(?:0[1-9]|1[0-2])[/-](?:0[1-9]|[12]\d|3[01])[/-](?:19|20)\d{2}\b",
        0.75,
    ),
    ("zip-code", r"\b\d{5}(?:-\d{4})?\b", 0.70),
    ("ip-address", r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}\b", 0.80),
    ("passport", r"\b[A-Z]{1,2}[0-9]{6,9}\b", 0.85),
    ("driver-license", r"\b[A-Z]{1,2}[0-9]{6,12}\b", 0.80),
];

pub struct PatternExtractor {
    patterns: Vec<(&'static str, Regex, f32)>,
    min_confidence: f32,
}

impl PatternExtractor {
    pub fn new(min_confidence: f32) -> RdxResult<Self> {
        let patterns = PATTERNS
            .iter()
            .map(|(field_type, pattern, confidence)| {
                let regex = Regex::new(pattern).map_err(|e| {
                    RdxError::Config(format!("invalid pattern for {field_type}: {e}"))
                })?;
                Ok::<_, RdxError>((*field_type, regex, *confidence))
            })
            .collect::<RdxResult<Vec<_>>>()?;

        Ok(Self {
            patterns,
            min_confidence,
        })
    }

    pub fn min_confidence(&self) -> f32 {
        self.min_confidence
    }
}

impl FieldExtractor for PatternExtractor {
    fn extract(&self, segments: &[TextSegment]) -> RdxResult<Vec<SensitiveField>> {
        let mut seen: HashSet<(&str, String)> = HashSet::new();
        let mut fields = Vec::new();

        for (field_type, regex, confidence) in &self.patterns {
            let (field_type, confidence) = (*field_type, *confidence);
            if confidence < self.min_confidence {
                continue;
            }
            for segment in segments {
                for m in regex.find_iter(&segment.text) {
                    let value = m.as_str();
                    if !seen.insert((field_type, value.to_string())) {
                        continue;
                    }
                    let start = segment.text[..m.start()].chars().count();
                    fields.push(SensitiveField {
                        field_type: field_type.to_string(),
                        original_value: value.to_string(),
                        masked_preview: mask_value(field_type, value),
                        confidence,
                        location: FieldLocation {
                            page: segment.page,
                            start,
                            end: start + value.chars().count(),
                            bbox: None,
                        },
                        detection_method: PATTERN_DETECTION.to_string(),
                    });
                }
            }
            debug!(field_type, total = fields.len(), "pattern applied");
        }

        info!(
            segments = segments.len(),
            fields = fields.len(),
            "field extraction complete"
        );
        Ok(fields)
    }
}

/// Display-safe rendering of a detected value.
pub fn mask_value(field_type: &str, value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let tail = |n: usize| -> String { chars[chars.len().saturating_sub(n)..].iter().collect() };

    match field_type {
        "ssn" if chars.len() >= 4 => format!("***-**-{}", tail(4)),
        "phone" if chars.len() >= 4 => format!("***-***-{}", tail(4)),
        "credit-card" if chars.len() >= 4 => format!("****-****-****-{}", tail(4)),
        "email" => match value.split_once('@') {
            Some((user, domain)) if user.chars().count() > 2 => {
                let head: String = user.chars().take(2).collect();
                format!("{head}***@{domain}")
            }
            Some((_, domain)) => format!("***@{domain}"),
            None => "***".to_string(),
        },
        _ if chars.len() > 4 => {
            let head: String = chars[..2].iter().collect();
            format!("{head}***{}", tail(2))
        }
        _ => "***".to_string(),
    }
}
