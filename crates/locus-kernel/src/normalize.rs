//! Decoding raw strings into normalized strings, and rendering them back.
//!
//! Decoding starts from a single text run and applies an ordered list of
//! decoders. After each pass adjacent text runs are consolidated. Flags
//! reported by decoders on the placeholders they emit are collected into a
//! flags set and removed from the parts.

use crate::part::{NormalizedString, Part, consolidate};
use std::collections::BTreeSet;

/// Flags reported by decoders while normalizing one string.
pub type Flags = BTreeSet<String>;

/// A single decoding pass over a sequence of parts.
pub trait Decoder: Send + Sync {
    fn name(&self) -> &str;

    fn decode(&self, parts: Vec<Part>) -> Vec<Part>;

    /// Flag reported when a text-to-text pass changes anything.
    fn text_flag(&self) -> Option<&str> {
        None
    }
}

/// Inverse of a decoder for text runs: escape text for the target format.
pub trait TextEncoder: Send + Sync {
    fn encode(&self, text: &str) -> String;
}

/// Run `raw` through `decoders` in order.
pub fn normalize(raw: &str, decoders: &[&dyn Decoder]) -> (NormalizedString, Flags) {
    let mut parts = consolidate([Part::text(raw)]);
    let mut flags = Flags::new();
    for decoder in decoders {
        match decoder.text_flag() {
            Some(flag) => {
                let decoded = consolidate(decoder.decode(parts.clone()));
                if decoded != parts {
                    flags.insert(flag.to_string());
                }
                parts = decoded;
            }
            None => parts = consolidate(decoder.decode(parts)),
        }
    }

    for part in &mut parts {
        if let Part::Placeholder(ph) = part
            && let Some(flag) = ph.flag.take()
        {
            flags.insert(flag);
        }
    }
    (NormalizedString::new(parts), flags)
}

/// Render a normalized string back into the raw format.
///
/// Text runs go through `encoders` in order; placeholders emit their raw
/// value untouched.
pub fn to_raw(ns: &NormalizedString, encoders: &[&dyn TextEncoder]) -> String {
    let mut out = String::new();
    for part in ns.parts() {
        match part {
            Part::Text(text) => {
                let mut encoded = text.clone();
                for encoder in encoders {
                    encoded = encoder.encode(&encoded);
                }
                out.push_str(&encoded);
            }
            Part::Placeholder(ph) => out.push_str(&ph.v),
        }
    }
    out
}

/// Apply `f` to every text run, leaving placeholders untouched.
pub fn map_text_parts(parts: Vec<Part>, mut f: impl FnMut(&str) -> Vec<Part>) -> Vec<Part> {
    let mut out = Vec::with_capacity(parts.len());
    for part in parts {
        match part {
            Part::Text(text) => out.extend(f(&text)),
            ph => out.push(ph),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoders::{RegexDecoder, brace_decoder, xml_tag_decoder};
    use crate::part::{PhType, Placeholder};

    #[test]
    fn decoders_apply_in_order_and_consolidate() {
        let tags = xml_tag_decoder().expect("xml decoder");
        let braces = brace_decoder().expect("brace decoder");
        let (ns, flags) = normalize("Hi <b>{name}</b>!", &[&tags, &braces]);
        assert!(flags.is_empty());
        let types: Vec<Option<PhType>> = ns
            .parts()
            .iter()
            .map(|p| p.as_placeholder().map(|ph| ph.t))
            .collect();
        assert_eq!(
            types,
            vec![
                None,
                Some(PhType::BeginTag),
                Some(PhType::Standalone),
                Some(PhType::EndTag),
                None,
            ]
        );
    }

    #[test]
    fn flags_are_collected_and_cleared() {
        let decoder = RegexDecoder::standalone("icu", r"\{\w+, plural,[^}]*\}")
            .expect("icu decoder")
            .flagged("icuPlural");
        let (ns, flags) = normalize("{n, plural, one} items", &[&decoder]);
        assert!(flags.contains("icuPlural"));
        assert!(ns.placeholders().all(|ph| ph.flag.is_none()));
    }

    #[test]
    fn text_decoders_flag_only_when_they_change_something() {
        let entities = crate::decoders::XmlEntityDecoder;
        let (ns, flags) = normalize("Fish &amp; chips", &[&entities]);
        assert!(flags.contains("xmlEntities"));
        assert_eq!(ns, NormalizedString::plain("Fish & chips"));

        let (_, flags) = normalize("Fish and chips", &[&entities]);
        assert!(flags.is_empty());
    }

    #[test]
    fn to_raw_emits_raw_placeholder_values() {
        struct Upper;
        impl TextEncoder for Upper {
            fn encode(&self, text: &str) -> String {
                text.to_uppercase()
            }
        }
        let ns = NormalizedString::new(vec![
            Part::text("hi "),
            Placeholder::standalone("{name}").into(),
        ]);
        assert_eq!(to_raw(&ns, &[&Upper]), "HI {name}");
    }

    #[test]
    fn empty_input_yields_empty_string() {
        let (ns, _) = normalize("", &[]);
        assert!(ns.is_empty());
    }
}
