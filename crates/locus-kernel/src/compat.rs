//! Placeholder compatibility between a source and a translation.
//!
//! A translation is usable only if every placeholder it carries can be
//! traced back to the source, either by its minified Linear-V1 signature
//! (`idx_type`) or by its literal raw value, and it carries exactly as many
//! placeholders as the source.

use crate::linear::{flatten_linear, minify_signature};
use crate::part::{NormalizedString, Placeholder};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Resolves translated placeholders against one source string.
#[derive(Debug, Clone, Default)]
pub struct PhMatcher {
    signatures: HashMap<String, Placeholder>,
    literals: HashSet<String>,
}

impl PhMatcher {
    pub fn new(nsrc: &NormalizedString) -> Self {
        let (_, ph_map) = flatten_linear(nsrc);
        let mut signatures = HashMap::new();
        let mut literals = HashSet::new();
        for (mangled, ph) in ph_map {
            literals.insert(ph.v.clone());
            signatures.insert(minify_signature(&mangled).to_string(), ph);
        }
        Self {
            signatures,
            literals,
        }
    }

    /// The source placeholder `ph` corresponds to, if any.
    pub fn resolve<'a>(&'a self, ph: &'a Placeholder) -> Option<&'a Placeholder> {
        if let Some(v1) = ph.v1.as_deref()
            && let Some(source) = self.signatures.get(minify_signature(v1))
        {
            return Some(source);
        }
        self.literals.contains(&ph.v).then_some(ph)
    }
}

/// Whether `ntgt` is a valid translation shape for `nsrc`.
pub fn compatible(nsrc: &NormalizedString, ntgt: &NormalizedString) -> bool {
    let matcher = PhMatcher::new(nsrc);
    if ntgt.placeholders().any(|ph| matcher.resolve(ph).is_none()) {
        return false;
    }
    nsrc.placeholder_count() == ntgt.placeholder_count()
}

/// [`compatible`] over raw wire values; anything but two arrays of parts is
/// incompatible.
pub fn compatible_json(nsrc: &Value, ntgt: &Value) -> bool {
    if !nsrc.is_array() || !ntgt.is_array() {
        return false;
    }
    let (Ok(nsrc), Ok(ntgt)) = (
        serde_json::from_value::<NormalizedString>(nsrc.clone()),
        serde_json::from_value::<NormalizedString>(ntgt.clone()),
    ) else {
        return false;
    };
    compatible(&nsrc, &ntgt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::part::Part;
    use serde_json::json;

    fn src() -> NormalizedString {
        NormalizedString::new(vec![
            Part::text("Hello "),
            Placeholder::standalone("{name}").into(),
            Part::text(", you have "),
            Placeholder::standalone("{count}").into(),
        ])
    }

    #[test]
    fn literal_values_resolve() {
        let tgt = NormalizedString::new(vec![
            Placeholder::standalone("{count}").into(),
            Part::text(" pour "),
            Placeholder::standalone("{name}").into(),
        ]);
        assert!(compatible(&src(), &tgt));
    }

    #[test]
    fn signatures_resolve_even_when_values_differ() {
        let mut renamed = Placeholder::standalone("{renamed}");
        renamed.v1 = Some("a_x_renamed".to_string());
        let tgt = NormalizedString::new(vec![
            renamed.into(),
            Part::text(" "),
            Placeholder::standalone("{count}").into(),
        ]);
        assert!(compatible(&src(), &tgt));
    }

    #[test]
    fn unknown_placeholder_is_incompatible() {
        let tgt = NormalizedString::new(vec![
            Placeholder::standalone("{name}").into(),
            Placeholder::standalone("{other}").into(),
        ]);
        assert!(!compatible(&src(), &tgt));
    }

    #[test]
    fn duplicated_placeholder_fails_count_check() {
        let tgt = NormalizedString::new(vec![
            Placeholder::standalone("{name}").into(),
            Placeholder::standalone("{name}").into(),
            Placeholder::standalone("{count}").into(),
        ]);
        assert!(!compatible(&src(), &tgt));
    }

    #[test]
    fn dropped_placeholder_fails_count_check() {
        let tgt = NormalizedString::new(vec![Placeholder::standalone("{name}").into()]);
        assert!(!compatible(&src(), &tgt));
    }

    #[test]
    fn json_non_arrays_are_incompatible() {
        assert!(!compatible_json(&json!("Hello"), &json!(["Hello"])));
        assert!(!compatible_json(&json!(["Hello"]), &json!(null)));
        assert!(compatible_json(&json!(["Hello"]), &json!(["Bonjour"])));
    }
}
