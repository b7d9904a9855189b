//! Content addressing for translation units.
//!
//! A TU's guid is a pure function of resource id, segment id and the
//! ordinal shape of its normalized source. Placeholder naming does not
//! participate: renaming `{user}` to `{name}` keeps existing translations,
//! while changing text or placeholder types forces re-translation.

use crate::linear::flatten_ordinal;
use crate::part::NormalizedString;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

/// Length of every guid: base64url (unpadded) of a SHA-256 digest.
pub const GUID_LENGTH: usize = 43;

/// Hash arbitrary content into a guid-shaped identifier.
pub fn generate_guid(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Deterministic TU guid from `(rid, sid, nsrc)`.
pub fn guid(rid: &str, sid: &str, nsrc: &NormalizedString) -> String {
    generate_guid(&format!("{rid}|{sid}|{}", flatten_ordinal(nsrc)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::part::{Part, Placeholder};

    fn hello(ph: &str) -> NormalizedString {
        NormalizedString::new(vec![Part::text("Hello "), Placeholder::standalone(ph).into()])
    }

    #[test]
    fn guid_is_deterministic_and_fixed_length() {
        let a = guid("res/app.json", "greeting", &hello("{name}"));
        let b = guid("res/app.json", "greeting", &hello("{name}"));
        assert_eq!(a, b);
        assert_eq!(a.len(), GUID_LENGTH);
        assert!(!a.contains('+') && !a.contains('/') && !a.contains('='));
    }

    #[test]
    fn placeholder_naming_does_not_change_guid() {
        assert_eq!(
            guid("r", "s", &hello("{name}")),
            guid("r", "s", &hello("{user}"))
        );
    }

    #[test]
    fn text_type_rid_and_sid_changes_do() {
        let base = guid("r", "s", &hello("{name}"));
        let retyped = NormalizedString::new(vec![
            Part::text("Hello "),
            Placeholder::begin("<b>").into(),
        ]);
        assert_ne!(base, guid("r", "s", &retyped));
        assert_ne!(base, guid("r", "s", &NormalizedString::plain("Hello ")));
        assert_ne!(base, guid("r2", "s", &hello("{name}")));
        assert_ne!(base, guid("r", "s2", &hello("{name}")));
    }
}
