//! Parts and normalized strings.
//!
//! A normalized string is an ordered sequence of text runs and placeholder
//! records. On the wire, text runs are plain JSON strings and placeholders
//! are objects: `["Hello ", {"t":"x","v":"{name}"}]`.

use serde::{Deserialize, Serialize};

/// Placeholder type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PhType {
    /// Opening half of a paired tag (`<b>`).
    #[serde(rename = "bx")]
    BeginTag,
    /// Closing half of a paired tag (`</b>`).
    #[serde(rename = "ex")]
    EndTag,
    /// Self-contained placeholder (`<br/>`, `{count}`, `%s`).
    #[serde(rename = "x")]
    Standalone,
}

impl PhType {
    /// Short tag used by every flattened representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PhType::BeginTag => "bx",
            PhType::EndTag => "ex",
            PhType::Standalone => "x",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "bx" => Some(PhType::BeginTag),
            "ex" => Some(PhType::EndTag),
            "x" => Some(PhType::Standalone),
            _ => None,
        }
    }
}

/// A placeholder record inside a normalized string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placeholder {
    pub t: PhType,
    /// Canonical raw value, emitted verbatim when rendering a target.
    pub v: String,
    /// Human-readable sample shown to translators instead of `v`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<String>,
    /// Linear-V1 signature assigned by `flatten_linear`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v1: Option<String>,
    /// Flag reported by the decoder that produced this placeholder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag: Option<String>,
}

impl Placeholder {
    pub fn new(t: PhType, v: impl Into<String>) -> Self {
        Self {
            t,
            v: v.into(),
            s: None,
            v1: None,
            flag: None,
        }
    }

    pub fn standalone(v: impl Into<String>) -> Self {
        Self::new(PhType::Standalone, v)
    }

    pub fn begin(v: impl Into<String>) -> Self {
        Self::new(PhType::BeginTag, v)
    }

    pub fn end(v: impl Into<String>) -> Self {
        Self::new(PhType::EndTag, v)
    }

    pub fn with_sample(mut self, sample: impl Into<String>) -> Self {
        self.s = Some(sample.into());
        self
    }

    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flag = Some(flag.into());
        self
    }
}

/// One element of a normalized string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text(String),
    Placeholder(Placeholder),
}

impl Part {
    pub fn text(s: impl Into<String>) -> Self {
        Part::Text(s.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text(s) => Some(s),
            Part::Placeholder(_) => None,
        }
    }

    pub fn as_placeholder(&self) -> Option<&Placeholder> {
        match self {
            Part::Placeholder(ph) => Some(ph),
            Part::Text(_) => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Part::Text(_))
    }
}

impl From<Placeholder> for Part {
    fn from(ph: Placeholder) -> Self {
        Part::Placeholder(ph)
    }
}

impl From<&str> for Part {
    fn from(s: &str) -> Self {
        Part::Text(s.to_string())
    }
}

/// Merge adjacent text runs and drop empty ones.
pub fn consolidate(parts: impl IntoIterator<Item = Part>) -> Vec<Part> {
    let mut out: Vec<Part> = Vec::new();
    for part in parts {
        match part {
            Part::Text(text) if text.is_empty() => {}
            Part::Text(text) => {
                if let Some(Part::Text(last)) = out.last_mut() {
                    last.push_str(&text);
                } else {
                    out.push(Part::Text(text));
                }
            }
            ph @ Part::Placeholder(_) => out.push(ph),
        }
    }
    out
}

/// Ordered, consolidated sequence of parts.
///
/// Invariant: no two consecutive text parts and no empty text part. Every
/// constructor (including deserialization) consolidates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Part>", into = "Vec<Part>")]
pub struct NormalizedString(Vec<Part>);

impl NormalizedString {
    pub fn new(parts: impl IntoIterator<Item = Part>) -> Self {
        Self(consolidate(parts))
    }

    /// A string with no placeholders.
    pub fn plain(text: impl Into<String>) -> Self {
        Self::new([Part::Text(text.into())])
    }

    pub fn parts(&self) -> &[Part] {
        &self.0
    }

    pub fn into_parts(self) -> Vec<Part> {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &Placeholder> {
        self.0.iter().filter_map(Part::as_placeholder)
    }

    pub fn placeholder_count(&self) -> usize {
        self.placeholders().count()
    }

    /// Characters a provider will have to read: text runs plus samples (or
    /// raw values) of placeholders.
    pub fn char_len(&self) -> usize {
        self.0
            .iter()
            .map(|part| match part {
                Part::Text(text) => text.chars().count(),
                Part::Placeholder(ph) => ph.s.as_deref().unwrap_or(&ph.v).chars().count(),
            })
            .sum()
    }

    /// Copy with every Linear-V1 signature removed.
    ///
    /// Extraction always stamps `v1`; comparisons against a freshly decoded
    /// string go through this.
    pub fn without_signatures(&self) -> Self {
        Self(
            self.0
                .iter()
                .map(|part| match part {
                    Part::Placeholder(ph) => Part::Placeholder(Placeholder {
                        v1: None,
                        ..ph.clone()
                    }),
                    text => text.clone(),
                })
                .collect(),
        )
    }

    /// Attach samples to placeholders whose raw value has one.
    pub fn with_samples(mut self, sample_for: impl Fn(&str) -> Option<String>) -> Self {
        for part in &mut self.0 {
            if let Part::Placeholder(ph) = part
                && ph.s.is_none()
            {
                ph.s = sample_for(&ph.v);
            }
        }
        self
    }
}

impl From<Vec<Part>> for NormalizedString {
    fn from(parts: Vec<Part>) -> Self {
        Self::new(parts)
    }
}

impl From<NormalizedString> for Vec<Part> {
    fn from(ns: NormalizedString) -> Self {
        ns.0
    }
}

impl FromIterator<Part> for NormalizedString {
    fn from_iter<I: IntoIterator<Item = Part>>(iter: I) -> Self {
        Self::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consolidate_merges_adjacent_text_and_drops_empty_runs() {
        let parts = consolidate(vec![
            Part::text("Hello"),
            Part::text(""),
            Part::text(", "),
            Placeholder::standalone("{name}").into(),
            Part::text(""),
        ]);
        assert_eq!(
            parts,
            vec![
                Part::text("Hello, "),
                Part::Placeholder(Placeholder::standalone("{name}")),
            ]
        );
    }

    #[test]
    fn deserialization_restores_invariant() {
        let raw = r#"["a", "b", {"t":"x","v":"<br/>"}, "c"]"#;
        let ns: NormalizedString = serde_json::from_str(raw).expect("must parse");
        assert_eq!(ns.parts().len(), 3);
        assert_eq!(ns.parts()[0], Part::text("ab"));
    }

    #[test]
    fn wire_shape_uses_short_type_tags() {
        let ns = NormalizedString::new(vec![
            Placeholder::begin("<b>").into(),
            Part::text("bold"),
            Placeholder::end("</b>").into(),
        ]);
        let value = serde_json::to_value(&ns).expect("must serialize");
        assert_eq!(
            value,
            serde_json::json!([{"t":"bx","v":"<b>"}, "bold", {"t":"ex","v":"</b>"}])
        );
    }

    #[test]
    fn char_len_prefers_samples() {
        let ns = NormalizedString::new(vec![
            Part::text("Hi "),
            Placeholder::standalone("{user_display_name}")
                .with_sample("Bob")
                .into(),
        ]);
        assert_eq!(ns.char_len(), 6);
    }
}
