//! XML-V1 flattening: provider-facing payloads.
//!
//! Placeholders become tag-like markers an LLM or MT engine preserves:
//! - standalone → `<xN/>`
//! - begin/end pair → `<xN>…</xN>` (nesting tracked with an open-tag stack)
//! - end with no open begin → `<xN/>`
//! - standalone with a sample → `<xN>sample</xN>`, collapsed on extraction
//!
//! Text is entity-escaped on the way out and unescaped on the way in.

use crate::error::KernelError;
use crate::part::{NormalizedString, Part, PhType, Placeholder};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Marker key → placeholder.
///
/// Keys are `xN` for standalone (and sampled) markers, `bxN` / `exN` for
/// the two halves of pair `N`.
pub type XmlPhMap = BTreeMap<String, Placeholder>;

pub fn escape_xml_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// `&amp;` is resolved last so `&amp;lt;` yields `&lt;`, not `<`.
pub fn unescape_xml_text(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"<x(?P<sa>\d+)\s*/>|<x(?P<open>\d+)>|</x(?P<close>\d+)>")
            .expect("xml-v1 marker regex must compile")
    })
}

/// Flatten to XML-V1 text and its marker map.
pub fn flatten_xml(ns: &NormalizedString) -> (String, XmlPhMap) {
    let mut out = String::new();
    let mut ph_map = XmlPhMap::new();
    let mut open_tags: Vec<usize> = Vec::new();
    let mut idx = 0usize;

    for part in ns.parts() {
        let ph = match part {
            Part::Text(text) => {
                out.push_str(&escape_xml_text(text));
                continue;
            }
            Part::Placeholder(ph) => ph,
        };
        idx += 1;
        match ph.t {
            PhType::BeginTag => {
                open_tags.push(idx);
                out.push_str(&format!("<x{idx}>"));
                ph_map.insert(format!("bx{idx}"), ph.clone());
            }
            PhType::EndTag => match open_tags.pop() {
                Some(open_idx) => {
                    out.push_str(&format!("</x{open_idx}>"));
                    ph_map.insert(format!("ex{open_idx}"), ph.clone());
                }
                None => {
                    out.push_str(&format!("<x{idx}/>"));
                    ph_map.insert(format!("x{idx}"), ph.clone());
                }
            },
            PhType::Standalone => {
                match ph.s.as_deref() {
                    Some(sample) => out.push_str(&format!(
                        "<x{idx}>{}</x{idx}>",
                        escape_xml_text(sample)
                    )),
                    None => out.push_str(&format!("<x{idx}/>")),
                }
                ph_map.insert(format!("x{idx}"), ph.clone());
            }
        }
    }
    (out, ph_map)
}

/// Reconstruct a normalized string from XML-V1 text.
pub fn extract_xml(s: &str, ph_map: &XmlPhMap) -> Result<NormalizedString, KernelError> {
    let mut parts = Vec::new();
    let mut pos = 0;

    while let Some(caps) = marker_re().captures_at(s, pos) {
        let Some(whole) = caps.get(0) else {
            break;
        };
        if whole.start() > pos {
            parts.push(Part::text(unescape_xml_text(&s[pos..whole.start()])));
        }
        pos = whole.end();

        if let Some(n) = caps.name("sa") {
            let key = format!("x{}", n.as_str());
            parts.push(Part::Placeholder(lookup(ph_map, &key)?));
        } else if let Some(n) = caps.name("open") {
            let sampled = format!("x{}", n.as_str());
            match ph_map.get(&sampled) {
                Some(ph) if !ph_map.contains_key(&format!("bx{}", n.as_str())) => {
                    let close = format!("</x{}>", n.as_str());
                    let Some(rel_end) = s[pos..].find(&close) else {
                        return Err(KernelError::UnterminatedMarker(whole.as_str().to_string()));
                    };
                    let content = &s[pos..pos + rel_end];
                    if content.starts_with(char::is_whitespace) {
                        parts.push(Part::text(" "));
                    }
                    parts.push(Part::Placeholder(ph.clone()));
                    if content.len() > 1 && content.ends_with(char::is_whitespace) {
                        parts.push(Part::text(" "));
                    }
                    pos += rel_end + close.len();
                }
                _ => {
                    let key = format!("bx{}", n.as_str());
                    parts.push(Part::Placeholder(lookup(ph_map, &key)?));
                }
            }
        } else if let Some(n) = caps.name("close") {
            let key = format!("ex{}", n.as_str());
            parts.push(Part::Placeholder(lookup(ph_map, &key)?));
        }
    }
    if pos < s.len() {
        parts.push(Part::text(unescape_xml_text(&s[pos..])));
    }
    Ok(NormalizedString::new(parts))
}

fn lookup(ph_map: &XmlPhMap, key: &str) -> Result<Placeholder, KernelError> {
    ph_map
        .get(key)
        .cloned()
        .ok_or_else(|| KernelError::UnknownPlaceholder(key.to_string()))
}
