use std::borrow::Cow;

use unicode_normalization::{is_nfc_quick, IsNormalized, UnicodeNormalization};

/// Canonical composed (NFC) form of `text`.
///
/// Filenames coming from macOS are usually decomposed (NFD) while the same
/// Hangul typed into a config file is composed, so every identifier that
/// enters from outside goes through here before it is compared.
pub fn nfc(text: &str) -> Cow<'_, str> {
    match is_nfc_quick(text.chars()) {
        IsNormalized::Yes => Cow::Borrowed(text),
        _ => Cow::Owned(text.nfc().collect()),
    }
}

/// Owned NFC form.
pub fn nfc_string(text: &str) -> String {
    nfc(text).into_owned()
}

/// NFC form, lower-cased. Used for extensions and alias lookups.
pub fn nfc_lower(text: &str) -> String {
    nfc(text).to_lowercase()
}
