// src/normalize.rs
//! Deterministic text canonicalization used by all detectors.
//!
//! Two levels:
//! - `normalize_full`: lowercase, entity-decode, strip punctuation, collapse
//!   whitespace. Feeds the duplicate hash, where "Excelente!!" and
//!   "excelente" must collide.
//! - `normalize_light`: lowercase, entity-decode, collapse whitespace only.
//!   Feeds lexical scoring, where punctuation-adjacent words must survive.
//!
//! Both are total: any input (including empty) yields a valid string, and the
//! same input yields the same output on every worker and every run.

use once_cell::sync::OnceCell;
use regex::Regex;

fn re_whitespace() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

fn re_punct() -> &'static Regex {
    // Anything that is not a letter, digit or whitespace. `(?u)` keeps
    // accented vowels (á, é, ñ, ...) intact.
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?u)[^\w\s]").unwrap())
}

/// Shared first stage: decode HTML entities, lowercase, normalize curly
/// quotes to their ASCII forms.
fn decode_and_lowercase(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s).to_string();
    decoded
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .to_lowercase()
}

/// Full normalization for duplicate hashing: lowercase, strip punctuation,
/// collapse consecutive whitespace to single spaces, trim.
pub fn normalize_full(s: &str) -> String {
    let out = decode_and_lowercase(s);
    let out = re_punct().replace_all(&out, " ");
    let out = re_whitespace().replace_all(&out, " ");
    out.trim().to_string()
}

/// Light normalization for lexical scoring: lowercase, collapse whitespace,
/// trim. Punctuation is preserved.
pub fn normalize_light(s: &str) -> String {
    let out = decode_and_lowercase(s);
    let out = re_whitespace().replace_all(&out, " ");
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_collapses_ws_and_strips_punct() {
        let s = "  Excelente,&nbsp;&nbsp; servicio!!!  ";
        assert_eq!(normalize_full(s), "excelente servicio");
    }

    #[test]
    fn light_keeps_punctuation() {
        let s = "Muy  BUENO, la verdad.";
        assert_eq!(normalize_light(s), "muy bueno, la verdad.");
    }

    #[test]
    fn accented_letters_survive_full() {
        assert_eq!(normalize_full("¡Atención rápida!"), "atención rápida");
    }

    #[test]
    fn empty_and_blank_input() {
        assert_eq!(normalize_full(""), "");
        assert_eq!(normalize_full("   \t\n "), "");
        assert_eq!(normalize_light(""), "");
    }

    #[test]
    fn deterministic() {
        let s = "El precio es  MUY caro…";
        assert_eq!(normalize_full(s), normalize_full(s));
        assert_eq!(normalize_light(s), normalize_light(s));
    }

    #[test]
    fn curly_quotes_become_ascii() {
        assert_eq!(normalize_light("dijo \u{201C}genial\u{201D}"), "dijo \"genial\"");
    }
}
