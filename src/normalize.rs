//! Text normalization shared by the scorer, the collector and the existence resolver.
//!
//! Every function here is total: empty input yields an empty result, nothing panics
//! on odd Unicode, and there is no state between calls.

use any_ascii::any_ascii;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Re-release and edition annotations dropped before tokenizing (applied in order,
/// on lowercased text).
pub static NOISE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // Bracketed notes: "(2011 Remaster)", "[Deluxe Edition]", "(Radio Edit)", "(feat. X)"
        Regex::new(r"\s*[\(\[][^\)\]]*(?:remaster|deluxe|edition|radio\s+edit|feat\.?\s|ft\.\s|featuring\s)[^\)\]]*[\)\]]").unwrap(),
        // Dash suffix: "- Remastered 2009", "- 2001 Digital Remaster", "- Radio Edit"
        Regex::new(r"\s+[-–—]\s+(?:\d{4}\s+)?(?:digital\s+)?(?:remaster(?:ed)?|radio\s+edit)(?:\s+\d{4})?(?:\s+version)?\s*$").unwrap(),
        // Bare markers left anywhere else
        Regex::new(r"\b(?:remastered|remaster|deluxe|radio\s+edit)\b").unwrap(),
    ]
});

/// Separators between credited artists: "&", ",", and the word "and".
pub static ARTIST_SEPARATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*(?:&|,|\band\b)\s*").unwrap()
});

/// Parenthesized span including the parens.
pub static PAREN_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^()]*\)").unwrap());

/// Regex to collapse multiple whitespace into single space
pub static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());

/// Separator recognised by the dash-based title transforms.
const DASH_SEPARATOR: &str = " - ";

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Check if a character is a Unicode combining mark (diacritical mark).
/// Used to filter out accents during normalization.
pub fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0xFE20..=0xFE2F)
}

/// Fold Unicode text to ASCII by applying NFKD decomposition and removing combining marks.
/// e.g., "Beyoncé" → "beyonce", "naïve" → "naive"
pub fn fold_to_ascii(s: &str) -> String {
    let stripped: String = s.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    // Transliterate any remaining non-ASCII (Cyrillic, Hebrew, CJK, etc.)
    any_ascii(&stripped).to_lowercase()
}

/// Straighten curly quotes and turn spaced en/em dashes into " - ".
pub fn normalize_punctuation(s: &str) -> String {
    s.replace(['\u{2018}', '\u{2019}', '\u{00B4}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace('\u{00A0}', " ")
        .replace(" \u{2013} ", DASH_SEPARATOR)
        .replace(" \u{2014} ", DASH_SEPARATOR)
}

fn collapse_spaces(s: &str) -> String {
    MULTI_SPACE.replace_all(s, " ").trim().to_string()
}

// ============================================================================
// NORMALIZATION FUNCTIONS
// ============================================================================

/// Break text into lowercase alphanumeric tokens with edition noise removed.
///
/// "Meteora (Remastered)" → ["meteora"], "Don't Stop Me Now" → ["dont", "stop", "me", "now"]
pub fn tokenize(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let mut cleaned = normalize_punctuation(text).to_lowercase();
    for pattern in NOISE_PATTERNS.iter() {
        cleaned = pattern.replace_all(&cleaned, " ").to_string();
    }

    fold_to_ascii(&cleaned)
        .split_whitespace()
        .map(|word| word.chars().filter(|c| c.is_ascii_alphanumeric()).collect::<String>())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Rewrite a title into a looser query form. Case is preserved.
///
/// Transforms run in a fixed order: `stop_at_dash` truncates at the first " - ",
/// `fix_dash_to_paren` turns a two-part "A - B" into "A (B)", and
/// `remove_in_brackets` deletes every parenthesized span.
pub fn normalize_title(
    text: &str,
    remove_in_brackets: bool,
    fix_dash_to_paren: bool,
    stop_at_dash: bool,
) -> String {
    let mut result = normalize_punctuation(text);

    if stop_at_dash {
        if let Some(pos) = result.find(DASH_SEPARATOR) {
            result.truncate(pos);
        }
    }

    if fix_dash_to_paren {
        let parts: Vec<&str> = result.split(DASH_SEPARATOR).collect();
        if parts.len() == 2 && !parts[0].trim().is_empty() && !parts[1].trim().is_empty() {
            result = format!("{} ({})", parts[0].trim(), parts[1].trim());
        }
    }

    if remove_in_brackets {
        // Repeat so nested spans collapse from the inside out
        while PAREN_SPAN.is_match(&result) {
            result = PAREN_SPAN.replace_all(&result, " ").to_string();
        }
    }

    collapse_spaces(&result)
}

/// Fold a single artist name for equality tests.
pub fn normalize_artist(name: &str) -> String {
    collapse_spaces(&fold_to_ascii(&normalize_punctuation(name)))
}

/// Split a raw artist credit into lowercase artist names.
///
/// "Simon & Garfunkel" → ["simon", "garfunkel"]. A leading "X / Y" credit keeps
/// only the segment after the slash; an unspaced slash is part of the name.
pub fn split_artists(raw: &str) -> Vec<String> {
    let credit = match raw.split_once(" / ") {
        Some((_, rest)) => rest,
        None => raw,
    };

    ARTIST_SEPARATOR
        .split(credit)
        .map(normalize_artist)
        .filter(|name| !name.is_empty())
        .collect()
}

/// Flatten a list of credits (each possibly holding several artists) into names.
pub fn split_all_artists<S: AsRef<str>>(credits: &[S]) -> Vec<String> {
    credits.iter().flat_map(|c| split_artists(c.as_ref())).collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_basic() {
        assert_eq!(tokenize("Don't Stop Me Now"), vec!["dont", "stop", "me", "now"]);
        assert_eq!(tokenize("  Hello,   World! "), vec!["hello", "world"]);
        assert!(tokenize("").is_empty());
        assert!(tokenize("   ").is_empty());
        assert!(tokenize("!!! ---").is_empty());
    }

    #[test]
    fn test_tokenize_strips_edition_noise() {
        assert_eq!(tokenize("Meteora (Remastered)"), vec!["meteora"]);
        assert_eq!(tokenize("Abbey Road [2019 Deluxe Edition]"), vec!["abbey", "road"]);
        assert_eq!(tokenize("Heroes - 2017 Remaster"), vec!["heroes"]);
        assert_eq!(tokenize("Song - Radio Edit"), vec!["song"]);
        assert_eq!(tokenize("Tune (feat. Someone Else)"), vec!["tune"]);
    }

    #[test]
    fn test_tokenize_keeps_other_annotations() {
        assert_eq!(tokenize("Song (Live)"), vec!["song", "live"]);
        assert_eq!(
            tokenize("Song - From the Motion Picture"),
            vec!["song", "from", "the", "motion", "picture"]
        );
    }

    #[test]
    fn test_tokenize_folds_diacritics() {
        assert_eq!(tokenize("Jóga"), vec!["joga"]);
        assert_eq!(tokenize("Motörhead"), vec!["motorhead"]);
    }

    #[test]
    fn test_fold_to_ascii() {
        assert_eq!(fold_to_ascii("Björk"), "bjork");
        assert_eq!(fold_to_ascii("Beyoncé"), "beyonce");
    }

    #[test]
    fn test_normalize_title_dash_to_paren() {
        assert_eq!(
            normalize_title("Paradise - From 'Original'", false, true, false),
            "Paradise (From 'Original')"
        );
        assert_eq!(
            normalize_title("Song - From the Motion Picture", false, true, false),
            "Song (From the Motion Picture)"
        );
        // Three parts are left alone
        assert_eq!(normalize_title("A - B - C", false, true, false), "A - B - C");
        // No dash, nothing to do
        assert_eq!(normalize_title("Plain Title", false, true, false), "Plain Title");
    }

    #[test]
    fn test_normalize_title_stop_at_dash() {
        assert_eq!(normalize_title("Heroes - 2017 Remaster", false, false, true), "Heroes");
        assert_eq!(normalize_title("No Dash Here", false, false, true), "No Dash Here");
        assert_eq!(normalize_title("Song \u{2013} Live", false, false, true), "Song");
    }

    #[test]
    fn test_normalize_title_remove_in_brackets() {
        assert_eq!(normalize_title("Song (Live) (Remix)", true, false, false), "Song");
        assert_eq!(normalize_title("Song (feat. A (B))", true, false, false), "Song");
        assert_eq!(normalize_title("A - B", true, true, false), "A");
    }

    #[test]
    fn test_normalize_title_empty() {
        assert_eq!(normalize_title("", true, true, true), "");
        assert_eq!(normalize_title("   ", false, false, false), "");
    }

    #[test]
    fn test_split_artists_separators() {
        assert_eq!(split_artists("Simon & Garfunkel"), vec!["simon", "garfunkel"]);
        assert_eq!(split_artists("A, B and C"), vec!["a", "b", "c"]);
        assert_eq!(split_artists("Linkin Park"), vec!["linkin park"]);
        // "and" only splits as a whole word
        assert_eq!(split_artists("Brandy"), vec!["brandy"]);
    }

    #[test]
    fn test_split_artists_slash_collaboration() {
        assert_eq!(split_artists("Various Artists / Sigur Rós"), vec!["sigur ros"]);
        assert_eq!(split_artists("X / Y & Z"), vec!["y", "z"]);
        assert_eq!(split_artists("AC/DC"), vec!["ac/dc"]);
    }

    #[test]
    fn test_split_artists_empty() {
        assert!(split_artists("").is_empty());
        assert!(split_artists(" & , ").is_empty());
        assert!(split_all_artists::<&str>(&[]).is_empty());
    }
}
