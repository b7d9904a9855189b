//! Linear-V1 and ordinal flattening.
//!
//! Linear-V1 mangles each placeholder as `idx_type_frag` inside `{{…}}`:
//! - `idx`: `a..y` for the first 25 placeholders, then `z1`, `z2`, …
//! - `type`: `bx`, `ex` or `x`
//! - `frag`: first `[0-9A-Za-z_]+` run of the raw value (may be empty)
//!
//! The mangled form is used for hashing, persistence and compatibility
//! signatures. Ordinal flattening drops everything but the type.

use crate::error::KernelError;
use crate::part::{NormalizedString, Part, Placeholder};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Mangled signature → placeholder (with `v1` stamped).
pub type PhMap = BTreeMap<String, Placeholder>;

/// Index prefix for the `n`-th placeholder (1-based).
pub fn placeholder_index(n: usize) -> String {
    if (1..=25).contains(&n) {
        char::from(b'a' + (n as u8 - 1)).to_string()
    } else {
        format!("z{}", n.saturating_sub(25))
    }
}

fn fragment(value: &str) -> &str {
    fragment_re().find(value).map_or("", |m| m.as_str())
}

fn fragment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[0-9A-Za-z_]+").expect("fragment regex must compile"))
}

fn mangled_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{(?P<ph>(?:[a-y]|z\d+)_(?:x|bx|ex)_[0-9A-Za-z_]*)\}\}")
            .expect("linear-v1 regex must compile")
    })
}

/// Flatten to the Linear-V1 string and its placeholder map.
pub fn flatten_linear(ns: &NormalizedString) -> (String, PhMap) {
    let mut out = String::new();
    let mut ph_map = PhMap::new();
    let mut idx = 0usize;
    for part in ns.parts() {
        match part {
            Part::Text(text) => out.push_str(text),
            Part::Placeholder(ph) => {
                idx += 1;
                let mangled = format!(
                    "{}_{}_{}",
                    placeholder_index(idx),
                    ph.t.as_str(),
                    fragment(&ph.v)
                );
                out.push_str("{{");
                out.push_str(&mangled);
                out.push_str("}}");
                ph_map.insert(
                    mangled.clone(),
                    Placeholder {
                        v1: Some(mangled),
                        ..ph.clone()
                    },
                );
            }
        }
    }
    (out, ph_map)
}

/// Reconstruct a normalized string from Linear-V1 text.
///
/// Every `{{…}}` reference must be present in `ph_map`; an unknown one is a
/// hard error for this string.
pub fn extract_linear(s: &str, ph_map: &PhMap) -> Result<NormalizedString, KernelError> {
    let mut parts = Vec::new();
    let mut pos = 0;
    for caps in mangled_re().captures_iter(s) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.name("ph")) else {
            continue;
        };
        if whole.start() > pos {
            parts.push(Part::text(&s[pos..whole.start()]));
        }
        let ph = ph_map
            .get(name.as_str())
            .ok_or_else(|| KernelError::UnknownPlaceholder(name.as_str().to_string()))?;
        parts.push(Part::Placeholder(ph.clone()));
        pos = whole.end();
    }
    if pos < s.len() {
        parts.push(Part::text(&s[pos..]));
    }
    Ok(NormalizedString::new(parts))
}

/// Flatten keeping only placeholder types: the identity-bearing shape.
pub fn flatten_ordinal(ns: &NormalizedString) -> String {
    let mut out = String::new();
    for part in ns.parts() {
        match part {
            Part::Text(text) => out.push_str(text),
            Part::Placeholder(ph) => {
                out.push_str("{{");
                out.push_str(ph.t.as_str());
                out.push_str("}}");
            }
        }
    }
    out
}

/// Strip the descriptive suffix: `a_x_name` → `a_x`.
pub fn minify_signature(v1: &str) -> &str {
    match v1.match_indices('_').nth(1) {
        Some((cut, _)) => &v1[..cut],
        None => v1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::part::{PhType, Placeholder};

    #[test]
    fn worked_example_flattens_and_extracts() {
        let ns = NormalizedString::new(vec![
            Placeholder::standalone("<b/>").into(),
            Part::text("Hello"),
        ]);
        let (flat, ph_map) = flatten_linear(&ns);
        assert_eq!(flat, "{{a_x_b}}Hello");
        let entry = ph_map.get("a_x_b").expect("mangled entry");
        assert_eq!(entry.t, PhType::Standalone);
        assert_eq!(entry.v, "<b/>");
        assert_eq!(entry.v1.as_deref(), Some("a_x_b"));

        let back = extract_linear(&flat, &ph_map).expect("extract");
        assert_eq!(back.without_signatures(), ns);
    }

    #[test]
    fn index_switches_to_z_after_y() {
        assert_eq!(placeholder_index(1), "a");
        assert_eq!(placeholder_index(25), "y");
        assert_eq!(placeholder_index(26), "z1");
        assert_eq!(placeholder_index(27), "z2");
    }

    #[test]
    fn many_placeholders_round_trip() {
        let mut parts = Vec::new();
        for i in 0..30 {
            parts.push(Part::text(format!("w{i} ")));
            parts.push(Placeholder::standalone(format!("{{p{i}}}")).into());
        }
        let ns = NormalizedString::new(parts);
        let (flat, ph_map) = flatten_linear(&ns);
        assert!(flat.contains("{{z5_x_p29}}"));
        let back = extract_linear(&flat, &ph_map).expect("extract");
        assert_eq!(back.without_signatures(), ns);
    }

    #[test]
    fn unknown_reference_is_an_error() {
        let err = extract_linear("Hi {{b_x_name}}", &PhMap::new()).expect_err("must fail");
        assert_eq!(err, KernelError::UnknownPlaceholder("b_x_name".to_string()));
    }

    #[test]
    fn ordinal_ignores_placeholder_values() {
        let a = NormalizedString::new(vec![Part::text("Hi "), Placeholder::standalone("{a}").into()]);
        let b = NormalizedString::new(vec![Part::text("Hi "), Placeholder::standalone("%s").into()]);
        assert_eq!(flatten_ordinal(&a), "Hi {{x}}");
        assert_eq!(flatten_ordinal(&a), flatten_ordinal(&b));
    }

    #[test]
    fn minify_drops_descriptive_suffix() {
        assert_eq!(minify_signature("a_x_b"), "a_x");
        assert_eq!(minify_signature("z3_bx_some_name"), "z3_bx");
        assert_eq!(minify_signature("c_ex_"), "c_ex");
    }
}
