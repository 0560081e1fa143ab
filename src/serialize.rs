//! Highlight persistence
//!
//! Converts the registry to and from `HighlightDescriptor`s. Restoring is
//! best-effort: each descriptor stands alone, and one that no longer fits
//! the document is skipped and reported without affecting the rest.

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::{HighlightError, Result};
use crate::path::{self, Anchor};
use crate::range::{Boundary, HighlightRange, RangeError};
use crate::registry::{HighlightId, RangeRegistry};

/// Portable form of one highlight
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightDescriptor {
    pub start_container: String,
    pub start_offset: usize,
    pub end_container: String,
    pub end_offset: usize,
    /// Text covered when the highlight was saved; informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Endpoint {
    Start,
    End,
}

/// Why a descriptor was not restored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SkipReason {
    /// The container path matches nothing in the document
    UnresolvableEndpoint { endpoint: Endpoint },
    /// The offset is past the end of the resolved container
    InvalidOffset { offset: usize, length: usize },
    /// The end resolves before the start
    InvertedRange,
    /// Start and end resolve to the same point
    Collapsed,
    /// An endpoint resolves outside the anchor element
    OutsideAnchor,
    InvalidRange { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedDescriptor {
    /// Position in the input
    pub index: usize,
    pub reason: SkipReason,
}

/// Outcome of a restore
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreReport {
    pub total: usize,
    pub restored: Vec<HighlightId>,
    pub skipped: Vec<SkippedDescriptor>,
}

impl RestoreReport {
    pub fn restored_count(&self) -> usize {
        self.restored.len()
    }

    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Describe one range relative to `anchor`
pub fn describe(
    range: &HighlightRange,
    document: &Document,
    anchor: &Anchor,
    capture_text: bool,
) -> std::result::Result<HighlightDescriptor, path::PathError> {
    let start = range.start();
    let end = range.end();
    Ok(HighlightDescriptor {
        start_container: path::encode(document, start.node, anchor)?.into_string(),
        start_offset: start.offset,
        end_container: path::encode(document, end.node, anchor)?.into_string(),
        end_offset: end.offset,
        text: capture_text.then(|| range.text(document)),
    })
}

/// Describe every active highlight, in registry order
pub fn serialize(
    registry: &RangeRegistry,
    document: &Document,
    anchor: &Anchor,
    capture_text: bool,
) -> Vec<HighlightDescriptor> {
    registry
        .iter()
        .filter(|(_, range)| !range.is_collapsed())
        .filter_map(|(id, range)| match describe(range, document, anchor, capture_text) {
            Ok(descriptor) => Some(descriptor),
            Err(e) => {
                tracing::warn!(%id, error = %e, "highlight cannot be serialized");
                None
            }
        })
        .collect()
}

/// Rebuild a range from a descriptor
///
/// Both endpoints must land inside `anchor`; anything else could not be
/// serialized again.
pub fn restore_range(
    descriptor: &HighlightDescriptor,
    document: &Document,
    anchor: &Anchor,
) -> std::result::Result<HighlightRange, SkipReason> {
    let start = path::decode(&descriptor.start_container, document)
        .ok_or(SkipReason::UnresolvableEndpoint { endpoint: Endpoint::Start })?;
    let end = path::decode(&descriptor.end_container, document)
        .ok_or(SkipReason::UnresolvableEndpoint { endpoint: Endpoint::End })?;

    let range = HighlightRange::new(
        document,
        Boundary::new(start, descriptor.start_offset),
        Boundary::new(end, descriptor.end_offset),
    )
    .map_err(|e| match e {
        RangeError::OffsetOutOfBounds { offset, length } => {
            SkipReason::InvalidOffset { offset, length }
        }
        RangeError::Inverted => SkipReason::InvertedRange,
        other => SkipReason::InvalidRange {
            message: other.to_string(),
        },
    })?;

    if !range.is_within(document, anchor.node()) {
        return Err(SkipReason::OutsideAnchor);
    }
    if range.is_collapsed() {
        return Err(SkipReason::Collapsed);
    }
    Ok(range)
}

/// Restore descriptors into `registry`, in input order
pub fn deserialize(
    descriptors: &[HighlightDescriptor],
    document: &Document,
    anchor: &Anchor,
    registry: &mut RangeRegistry,
    replace_existing: bool,
) -> RestoreReport {
    if replace_existing {
        registry.clear();
    }

    let mut report = RestoreReport {
        total: descriptors.len(),
        ..RestoreReport::default()
    };

    for (index, descriptor) in descriptors.iter().enumerate() {
        let outcome = restore_range(descriptor, document, anchor)
            .and_then(|range| registry.add(range).ok_or(SkipReason::Collapsed));
        match outcome {
            Ok(id) => report.restored.push(id),
            Err(reason) => {
                tracing::warn!(
                    index,
                    ?reason,
                    container = %descriptor.start_container,
                    "skipping highlight"
                );
                report.skipped.push(SkippedDescriptor { index, reason });
            }
        }
    }

    tracing::info!(
        restored = report.restored.len(),
        total = report.total,
        "restored highlights"
    );
    report
}

/// Encode descriptors as a JSON array
pub fn to_json(descriptors: &[HighlightDescriptor]) -> Result<String> {
    Ok(serde_json::to_string(descriptors)?)
}

/// Decode a JSON array of descriptors
pub fn from_json(text: &str) -> Result<Vec<HighlightDescriptor>> {
    serde_json::from_str(text).map_err(|e| HighlightError::MalformedInput(e.to_string()))
}
