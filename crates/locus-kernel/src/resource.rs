//! Resource filter contract.
//!
//! Concrete formats (i18next JSON, `.properties`, `.strings`, …) live in
//! their own crates and implement [`ResourceFilter`]. The kernel only turns
//! their segments into source translation units.

use crate::error::KernelError;
use crate::normalize::{Decoder, normalize};
use crate::tu::{Notes, TranslationUnit};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One translatable string extracted from a resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub sid: String,
    #[serde(rename = "str")]
    pub text: String,
    /// Message format hint (`icu`, `printf`, …).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mf: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<Notes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plural_form: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedResource {
    pub segments: Vec<Segment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subresources: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Copy)]
pub struct ParseRequest<'a> {
    pub resource: &'a str,
    pub is_source: bool,
    pub source_plural_forms: &'a [String],
    pub target_plural_forms: &'a [String],
}

#[derive(Debug, Clone, Copy)]
pub struct TranslateRequest<'a> {
    pub resource: &'a str,
    pub source_plural_forms: &'a [String],
    pub target_plural_forms: &'a [String],
}

/// A resource format plugin.
pub trait ResourceFilter: Send + Sync {
    fn parse_resource(&self, request: ParseRequest<'_>) -> Result<ParsedResource, KernelError>;

    /// Render a translated resource. `translator(sid, str)` returns `None`
    /// for strings with no translation; the filter decides whether to drop
    /// them or fall back. `Ok(None)` means nothing to write.
    fn translate_resource(
        &self,
        request: TranslateRequest<'_>,
        translator: &dyn Fn(&str, &str) -> Option<String>,
    ) -> Result<Option<String>, KernelError>;
}

/// Normalize segments of one resource into source TUs.
pub fn segments_to_tus(
    rid: &str,
    prj: Option<&str>,
    segments: &[Segment],
    decoders: &[&dyn Decoder],
) -> Vec<TranslationUnit> {
    segments
        .iter()
        .map(|segment| {
            let (nsrc, flags) = normalize(&segment.text, decoders);
            if !flags.is_empty() {
                tracing::debug!(rid, sid = %segment.sid, ?flags, "decoder flags");
            }
            let nsrc = match segment.notes.as_ref() {
                Some(notes) if !notes.ph.is_empty() => nsrc.with_samples(|v| {
                    notes.ph.get(v).and_then(|note| note.sample.clone())
                }),
                _ => nsrc,
            };
            let mut tu = TranslationUnit::new_source(rid, segment.sid.clone(), nsrc);
            tu.prj = prj.map(str::to_string);
            tu.notes = segment.notes.clone();
            tu.is_suffix_pluralized = segment.plural_form.is_some();
            tu
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoders::brace_decoder;
    use crate::tu::PhNote;
    use std::collections::BTreeMap;

    /// `key=value` lines; good enough to exercise the contract.
    struct KeyValueFilter;

    impl ResourceFilter for KeyValueFilter {
        fn parse_resource(&self, request: ParseRequest<'_>) -> Result<ParsedResource, KernelError> {
            let mut segments = Vec::new();
            for line in request.resource.lines().filter(|l| !l.trim().is_empty()) {
                let (sid, text) = line
                    .split_once('=')
                    .ok_or_else(|| KernelError::Resource(format!("bad line: {line}")))?;
                segments.push(Segment {
                    sid: sid.trim().to_string(),
                    text: text.trim().to_string(),
                    ..Segment::default()
                });
            }
            Ok(ParsedResource {
                segments,
                subresources: None,
            })
        }

        fn translate_resource(
            &self,
            request: TranslateRequest<'_>,
            translator: &dyn Fn(&str, &str) -> Option<String>,
        ) -> Result<Option<String>, KernelError> {
            let parsed = self.parse_resource(ParseRequest {
                resource: request.resource,
                is_source: true,
                source_plural_forms: request.source_plural_forms,
                target_plural_forms: request.target_plural_forms,
            })?;
            let lines: Vec<String> = parsed
                .segments
                .iter()
                .filter_map(|s| translator(&s.sid, &s.text).map(|t| format!("{}={t}", s.sid)))
                .collect();
            Ok((!lines.is_empty()).then(|| lines.join("\n")))
        }
    }

    #[test]
    fn segments_become_addressed_source_tus() {
        let parsed = KeyValueFilter
            .parse_resource(ParseRequest {
                resource: "greeting=Hello {name}\nbye=Bye",
                is_source: true,
                source_plural_forms: &[],
                target_plural_forms: &[],
            })
            .expect("parse");
        let braces = brace_decoder().expect("brace decoder");
        let tus = segments_to_tus("app.properties", Some("web"), &parsed.segments, &[&braces]);
        assert_eq!(tus.len(), 2);
        assert_eq!(tus[0].nsrc.placeholder_count(), 1);
        assert_eq!(tus[0].prj.as_deref(), Some("web"));
        assert_eq!(
            tus[0].guid,
            crate::guid::guid("app.properties", "greeting", &tus[0].nsrc)
        );
    }

    #[test]
    fn plural_forms_and_samples_carry_over() {
        let mut ph = BTreeMap::new();
        ph.insert(
            "{n}".to_string(),
            PhNote {
                sample: Some("3".to_string()),
                desc: None,
            },
        );
        let segment = Segment {
            sid: "items_one".to_string(),
            text: "{n} item".to_string(),
            notes: Some(Notes {
                desc: Some("cart".to_string()),
                ph,
            }),
            plural_form: Some("one".to_string()),
            ..Segment::default()
        };
        let braces = brace_decoder().expect("brace decoder");
        let tus = segments_to_tus("r", None, &[segment], &[&braces]);
        assert!(tus[0].is_suffix_pluralized);
        let sample = tus[0].nsrc.placeholders().next().and_then(|ph| ph.s.clone());
        assert_eq!(sample.as_deref(), Some("3"));
    }

    #[test]
    fn translate_resource_uses_translator() {
        let out = KeyValueFilter
            .translate_resource(
                TranslateRequest {
                    resource: "a=Hello\nb=World",
                    source_plural_forms: &[],
                    target_plural_forms: &[],
                },
                &|sid, _| (sid == "a").then(|| "Bonjour".to_string()),
            )
            .expect("translate");
        assert_eq!(out.as_deref(), Some("a=Bonjour"));
    }
}
