//! Built-in decoders and encoders shared by format filters.
//!
//! Format filters compose these into an ordered decoder list. Every decoder
//! only rewrites text runs; placeholders produced by an earlier pass are
//! never reopened.

use crate::error::KernelError;
use crate::normalize::{Decoder, TextEncoder, map_text_parts};
use crate::part::{Part, PhType, Placeholder};
use regex::{Captures, Regex};

type PartMaker = Box<dyn Fn(&Captures<'_>) -> Part + Send + Sync>;

/// Decoder turning every regex match inside a text run into one part.
pub struct RegexDecoder {
    name: String,
    regex: Regex,
    make: PartMaker,
    flag: Option<String>,
}

impl RegexDecoder {
    /// Build a decoder from a pattern and a part factory.
    pub fn new(
        name: impl Into<String>,
        pattern: &str,
        make: impl Fn(&Captures<'_>) -> Part + Send + Sync + 'static,
    ) -> Result<Self, KernelError> {
        let name = name.into();
        let regex = Regex::new(pattern).map_err(|e| KernelError::InvalidPattern {
            decoder: name.clone(),
            message: e.to_string(),
        })?;
        Ok(Self {
            name,
            regex,
            make: Box::new(make),
            flag: None,
        })
    }

    /// Every match becomes a placeholder of type `t` carrying the match.
    pub fn placeholder(name: impl Into<String>, pattern: &str, t: PhType) -> Result<Self, KernelError> {
        Self::new(name, pattern, move |caps| {
            Part::Placeholder(Placeholder::new(t, &caps[0]))
        })
    }

    pub fn standalone(name: impl Into<String>, pattern: &str) -> Result<Self, KernelError> {
        Self::placeholder(name, pattern, PhType::Standalone)
    }

    /// Report `flag` on every placeholder this decoder emits.
    pub fn flagged(mut self, flag: impl Into<String>) -> Self {
        self.flag = Some(flag.into());
        self
    }
}

impl Decoder for RegexDecoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn decode(&self, parts: Vec<Part>) -> Vec<Part> {
        map_text_parts(parts, |text| {
            let mut out = Vec::new();
            let mut pos = 0;
            for caps in self.regex.captures_iter(text) {
                let Some(whole) = caps.get(0) else {
                    continue;
                };
                if whole.start() > pos {
                    out.push(Part::text(&text[pos..whole.start()]));
                }
                let mut part = (self.make)(&caps);
                if let (Part::Placeholder(ph), Some(flag)) = (&mut part, &self.flag) {
                    ph.flag = Some(flag.clone());
                }
                out.push(part);
                pos = whole.end();
            }
            if pos < text.len() {
                out.push(Part::text(&text[pos..]));
            }
            out
        })
    }
}

impl std::fmt::Debug for RegexDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegexDecoder")
            .field("name", &self.name)
            .field("regex", &self.regex.as_str())
            .field("flag", &self.flag)
            .finish()
    }
}

/// XML/HTML tags: `<b>` opens, `</b>` closes, `<br/>` stands alone.
pub fn xml_tag_decoder() -> Result<RegexDecoder, KernelError> {
    RegexDecoder::new(
        "xmlTag",
        r"<(?P<close>/)?[A-Za-z][\w:.-]*(?:\s[^<>]*?)?(?P<selfclose>/)?>",
        |caps| {
            let t = if caps.name("close").is_some() {
                PhType::EndTag
            } else if caps.name("selfclose").is_some() {
                PhType::Standalone
            } else {
                PhType::BeginTag
            };
            Part::Placeholder(Placeholder::new(t, &caps[0]))
        },
    )
}

/// `{name}` and `{{name}}` interpolation markers.
pub fn brace_decoder() -> Result<RegexDecoder, KernelError> {
    RegexDecoder::standalone("brace", r"\{\{[^{}]*\}\}|\{[^{}]*\}")
}

/// printf-style conversions: `%s`, `%d`, `%1$s`, `%.2f`, `%@`.
pub fn printf_decoder() -> Result<RegexDecoder, KernelError> {
    RegexDecoder::standalone(
        "printf",
        r"%(?:\d+\$)?[-+0#]*\d*(?:\.\d+)?(?:hh|h|ll|l|L|q|j|z|t)?[diouxXeEfFgGaAcsp@]",
    )
}

/// Literal newlines become standalone placeholders so providers keep them.
pub fn newline_decoder() -> Result<RegexDecoder, KernelError> {
    RegexDecoder::new("newline", r"\r?\n", |caps| {
        Part::Placeholder(Placeholder::standalone(&caps[0]).with_sample("\u{21b5}"))
    })
}

/// Text-to-text decoder resolving the five predefined XML entities.
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlEntityDecoder;

impl Decoder for XmlEntityDecoder {
    fn name(&self) -> &str {
        "xmlEntity"
    }

    fn text_flag(&self) -> Option<&str> {
        Some("xmlEntities")
    }

    fn decode(&self, parts: Vec<Part>) -> Vec<Part> {
        // `&amp;` last, so `&amp;lt;` decodes to `&lt;` and no further.
        map_text_parts(parts, |text| {
            let decoded = text
                .replace("&lt;", "<")
                .replace("&gt;", ">")
                .replace("&quot;", "\"")
                .replace("&apos;", "'")
                .replace("&amp;", "&");
            vec![Part::text(decoded)]
        })
    }
}

/// Inverse of [`XmlEntityDecoder`] for text runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlEntityEncoder;

impl TextEncoder for XmlEntityEncoder {
    fn encode(&self, text: &str) -> String {
        text.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{normalize, to_raw};

    fn types(parts: &[Part]) -> Vec<String> {
        parts
            .iter()
            .map(|p| match p {
                Part::Text(t) => format!("text:{t}"),
                Part::Placeholder(ph) => format!("{}:{}", ph.t.as_str(), ph.v),
            })
            .collect()
    }

    #[test]
    fn xml_tag_decoder_classifies_tags() {
        let (ns, _) = normalize(
            r#"Click <a href="/x">here</a><br/>"#,
            &[&xml_tag_decoder().expect("xml decoder")],
        );
        assert_eq!(
            types(ns.parts()),
            vec![
                "text:Click ".to_string(),
                r#"bx:<a href="/x">"#.to_string(),
                "text:here".to_string(),
                "ex:</a>".to_string(),
                "x:<br/>".to_string(),
            ]
        );
    }

    #[test]
    fn printf_decoder_ignores_literal_percent_words() {
        let (ns, _) = normalize("50% done, %1$s left (%d)", &[&printf_decoder().expect("printf decoder")]);
        let values: Vec<&str> = ns.placeholders().map(|ph| ph.v.as_str()).collect();
        assert_eq!(values, vec!["%1$s", "%d"]);
    }

    #[test]
    fn brace_decoder_handles_double_braces() {
        let (ns, _) = normalize("{{count}} of {total}", &[&brace_decoder().expect("brace decoder")]);
        let values: Vec<&str> = ns.placeholders().map(|ph| ph.v.as_str()).collect();
        assert_eq!(values, vec!["{{count}}", "{total}"]);
    }

    #[test]
    fn xml_entities_round_trip_through_encoder() {
        let (ns, _) = normalize("Tom &amp; Jerry &lt;3", &[&XmlEntityDecoder]);
        assert_eq!(ns.parts(), &[Part::text("Tom & Jerry <3")]);
        assert_eq!(to_raw(&ns, &[&XmlEntityEncoder]), "Tom &amp; Jerry &lt;3");
    }

    #[test]
    fn escaped_entities_decode_once() {
        let (ns, _) = normalize("&amp;lt;b&amp;gt; &quot;x&quot;", &[&XmlEntityDecoder]);
        assert_eq!(ns.parts(), &[Part::text("&lt;b&gt; \"x\"")]);
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        let err = RegexDecoder::standalone("broken", r"\{(unclosed").expect_err("must not compile");
        assert!(matches!(err, KernelError::InvalidPattern { ref decoder, .. } if decoder == "broken"));
    }

    #[test]
    fn newline_decoder_carries_sample() {
        let (ns, _) = normalize("a\nb", &[&newline_decoder().expect("newline decoder")]);
        let ph = ns.placeholders().next().expect("newline placeholder");
        assert_eq!(ph.v, "\n");
        assert!(ph.s.is_some());
    }
}
