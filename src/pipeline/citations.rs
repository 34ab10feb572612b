//! Zotero citations.
//!
//! Zotero's "Switch word processors" export turns every live citation into
//! a hyperlink to zotero.org whose visible text is the marker
//! `ITEM CSL_CITATION` followed by the CSL-JSON payload. This stage parses
//! that payload and replaces the link text with `<ref>` markup built from
//! the wiki's `{{Zotero}}` template. The export also prepends a notice
//! paragraph pair and appends a preferences paragraph; those are removed.

use crate::document::{wrap_block, Node};
use crate::error::ConversionWarning;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

const CITATION_MARKER: &str = "ITEM CSL_CITATION";
const TRANSFER_NOTICE: &str = "ZOTERO_TRANSFER_DOCUMENT";
const PREFERENCES_NOTICE: &str = "DOCUMENT_PREFERENCES";

/// One cited item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationPayload {
    pub group_id: String,
    pub item_id: String,
    pub prefix: Option<String>,
    pub locator: Option<String>,
    pub suffix: Option<String>,
}

impl CitationPayload {
    /// `{{Zotero|group=G|id=I|prefix=..|locator=..|suffix=..}}`, optional
    /// fields only when present.
    pub fn to_template(&self) -> String {
        let mut out = format!("{{{{Zotero|group={}|id={}", self.group_id, self.item_id);
        for (key, value) in [
            ("prefix", &self.prefix),
            ("locator", &self.locator),
            ("suffix", &self.suffix),
        ] {
            if let Some(value) = value {
                out.push_str(&format!("|{key}={value}"));
            }
        }
        out.push_str("}}");
        out
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CslCitation {
    citation_items: Vec<CslItem>,
}

#[derive(Deserialize)]
struct CslItem {
    #[serde(default)]
    uris: Vec<String>,
    #[serde(default)]
    prefix: Option<Value>,
    #[serde(default)]
    locator: Option<Value>,
    #[serde(default)]
    suffix: Option<Value>,
}

/// Parse the text of a citation link (marker included) into its items.
pub fn parse_citation(text: &str) -> Result<Vec<CitationPayload>, String> {
    let json = text
        .strip_prefix(CITATION_MARKER)
        .ok_or_else(|| format!("text does not start with {CITATION_MARKER}"))?
        .trim();
    let citation: CslCitation =
        serde_json::from_str(json).map_err(|e| format!("invalid CSL JSON: {e}"))?;
    if citation.citation_items.is_empty() {
        return Err("citation has no items".to_string());
    }

    citation
        .citation_items
        .into_iter()
        .map(|item| {
            let uri = item
                .uris
                .first()
                .ok_or_else(|| "citation item has no URI".to_string())?;
            let (group_id, item_id) = parse_item_uri(uri)?;
            Ok(CitationPayload {
                group_id,
                item_id,
                prefix: field_text(item.prefix),
                locator: field_text(item.locator),
                suffix: field_text(item.suffix),
            })
        })
        .collect()
}

/// `http://zotero.org/groups/2183860/items/UF2HZUAK` → (`2183860`, `UF2HZUAK`)
fn parse_item_uri(uri: &str) -> Result<(String, String), String> {
    let parts: Vec<&str> = uri.split('/').collect();
    match parts.as_slice() {
        [_, _, _, "groups", group, "items", item, ..] if !group.is_empty() && !item.is_empty() => {
            Ok((group.to_string(), item.to_string()))
        }
        _ => Err(format!("'{uri}' is not a group item URI")),
    }
}

/// Non-empty string or number; anything else counts as absent.
fn field_text(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Delete the notice paragraphs the Zotero export inserts.
///
/// If the first paragraph reads exactly `ZOTERO_TRANSFER_DOCUMENT`, it and
/// the paragraph after it are removed. Every paragraph starting with
/// `DOCUMENT_PREFERENCES` is removed wherever it sits.
pub fn remove_transfer_notices(body: &mut Vec<Node>) {
    if let Some(first) = body.iter().position(|n| matches!(n, Node::Paragraph { .. })) {
        if body[first].plain_text() == TRANSFER_NOTICE {
            body.remove(first);
            if let Some(next) = body[first..]
                .iter()
                .position(|n| matches!(n, Node::Paragraph { .. }))
            {
                body.remove(first + next);
            }
            debug!("Removed citation transfer notice");
        }
    }
    remove_preferences(body);
}

fn remove_preferences(nodes: &mut Vec<Node>) {
    nodes.retain(|n| {
        !(matches!(n, Node::Paragraph { .. }) && n.plain_text().starts_with(PREFERENCES_NOTICE))
    });
    for node in nodes.iter_mut() {
        if let Some(children) = node.children_mut() {
            remove_preferences(children);
        }
    }
}

/// Rewrite every citation link in place.
///
/// Links that carry the marker but not a usable payload are left unchanged
/// and reported.
pub fn resolve_citations(body: &mut [Node]) -> Vec<ConversionWarning> {
    let mut warnings = Vec::new();

    for node in body.iter_mut() {
        node.walk_mut(&mut |n| {
            let Node::Link {
                href,
                text,
                is_citation,
            } = n
            else {
                return;
            };
            if !href.as_deref().is_some_and(|h| h.contains("zotero")) {
                return;
            }
            let flat = wrap_block(text);
            if !flat.starts_with(CITATION_MARKER) {
                return;
            }

            match parse_citation(&flat) {
                Ok(items) => {
                    let refs: Vec<String> = items.iter().map(CitationPayload::to_template).collect();
                    *text = format!("<ref>{}</ref>", refs.join("; "));
                    *href = None;
                    *is_citation = true;
                }
                Err(detail) => {
                    warn!("Citation link left unchanged: {}", detail);
                    warnings.push(ConversionWarning::UnparsableCitation { detail });
                }
            }
        });
    }

    warnings
}
