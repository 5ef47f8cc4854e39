use std::time::{SystemTime, UNIX_EPOCH};

use unicode_normalization::UnicodeNormalization;

/// Longest name (in bytes, all ASCII by then) `sanitize_name` will return.
pub const MAX_NAME_LEN: usize = 40;

/// Returned when nothing usable survives sanitization.
pub const UNNAMED: &str = "unnamed";

/// Get current Unix timestamp in milliseconds
pub fn get_timestamp() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

/// Turn arbitrary scraped text into a name that is safe as a single path component.
///
/// German umlauts and `ß` become digraphs, other accented letters lose their
/// marks, reserved characters, whitespace, `.,;+` and control codes become `_`,
/// and whatever non-ASCII is left is dropped. Underscore runs are collapsed and
/// trimmed, the result is capped at [`MAX_NAME_LEN`], and an empty result turns
/// into [`UNNAMED`]. Already sanitized names come back unchanged.
pub fn sanitize_name(name: Option<&str>) -> String {
    let Some(name) = name else {
        return UNNAMED.to_string();
    };

    // Compose first so decomposed umlauts hit the digraph table too.
    let mut expanded = String::with_capacity(name.len());
    for c in name.nfc() {
        match c {
            'ä' => expanded.push_str("ae"),
            'ö' => expanded.push_str("oe"),
            'ü' => expanded.push_str("ue"),
            'Ä' => expanded.push_str("Ae"),
            'Ö' => expanded.push_str("Oe"),
            'Ü' => expanded.push_str("Ue"),
            'ß' => expanded.push_str("ss"),
            _ => expanded.push(c),
        }
    }

    let mut out = String::with_capacity(expanded.len());
    for c in expanded.nfd() {
        let c = if is_replaced(c) { '_' } else { c };
        if !c.is_ascii() {
            continue;
        }
        if c == '_' && (out.is_empty() || out.ends_with('_')) {
            continue;
        }
        out.push(c);
    }

    out.truncate(MAX_NAME_LEN);
    let trimmed = out.trim_matches('_');

    if trimmed.is_empty() {
        UNNAMED.to_string()
    } else {
        trimmed.to_string()
    }
}

fn is_replaced(c: char) -> bool {
    matches!(
        c,
        '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' | '.' | ',' | ';' | '+'
    ) || c.is_whitespace()
        || c.is_control()
}

/// Split a filename at its last `.` into (basename, extension).
///
/// The extension keeps only ASCII alphanumerics; when there is no dot or
/// nothing survives, it defaults to `pdf`.
pub fn split_extension(filename: &str) -> (&str, String) {
    let (base, ext) = match filename.rfind('.') {
        Some(idx) => (&filename[..idx], &filename[idx + 1..]),
        None => (filename, ""),
    };

    let ext: String = ext.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    if ext.is_empty() || ext.eq_ignore_ascii_case("pdf") {
        (base, "pdf".to_string())
    } else {
        (base, ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp() {
        let ts = get_timestamp();
        assert!(ts > 1_700_000_000_000); // Sanity check
    }

    #[test]
    fn test_sanitize_reserved_characters() {
        let out = sanitize_name(Some(r#"a<b>c:d"e/f\g|h?i*j"#));
        assert_eq!(out, "a_b_c_d_e_f_g_h_i_j");
        for c in ['<', '>', ':', '"', '/', '\\', '|', '?', '*'] {
            assert!(!out.contains(c));
        }
    }

    #[test]
    fn test_sanitize_whitespace_and_punctuation() {
        assert_eq!(sanitize_name(Some("  Lecture  1.2, part;3 + 4  ")), "Lecture_1_2_part_3_4");
        assert_eq!(sanitize_name(Some("tab\there\nnewline")), "tab_here_newline");
    }

    #[test]
    fn test_sanitize_control_codes() {
        assert_eq!(sanitize_name(Some("a\u{0}b\u{1f}c\u{85}d")), "a_b_c_d");
    }

    #[test]
    fn test_sanitize_umlauts_and_accents() {
        assert_eq!(sanitize_name(Some("Übung Größe")), "Uebung_Groesse");
        assert_eq!(sanitize_name(Some("Prüfung")), "Pruefung");
        // decomposed input
        assert_eq!(sanitize_name(Some("Pru\u{308}fung")), "Pruefung");
        assert_eq!(sanitize_name(Some("Café résumé")), "Cafe_resume");
    }

    #[test]
    fn test_sanitize_strips_other_non_ascii() {
        assert_eq!(sanitize_name(Some("Notes € 2024")), "Notes_2024");
        assert_eq!(sanitize_name(Some("日本語")), UNNAMED);
    }

    #[test]
    fn test_sanitize_empty_and_missing() {
        assert_eq!(sanitize_name(Some("")), UNNAMED);
        assert_eq!(sanitize_name(None), UNNAMED);
        assert_eq!(sanitize_name(Some("___...///")), UNNAMED);
    }

    #[test]
    fn test_sanitize_truncates_after_cleanup() {
        let long = "word ".repeat(30);
        let out = sanitize_name(Some(&long));
        assert!(out.len() <= MAX_NAME_LEN);
        assert!(!out.starts_with('_') && !out.ends_with('_'));
        assert_eq!(out, "word_word_word_word_word_word_word_word");

        // umlaut expansion counts towards the limit, not the raw input
        let umlauts = "ä".repeat(30);
        assert_eq!(sanitize_name(Some(&umlauts)).len(), MAX_NAME_LEN);
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let long = "x".repeat(100);
        let inputs = [
            "Intro to Systems - WISE 23/24",
            "Übungsblatt 3: Lösungen (final).pdf",
            "  __weird__  name__ ",
            "a\u{0}b",
            "",
            long.as_str(),
            "Café; ok + more, stuff",
        ];
        for input in inputs {
            let once = sanitize_name(Some(input));
            assert_eq!(sanitize_name(Some(&once)), once, "input: {input:?}");
        }
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("Slides.PDF"), ("Slides", "pdf".to_string()));
        assert_eq!(split_extension("archive.tar.gz"), ("archive.tar", "gz".to_string()));
        assert_eq!(split_extension("README"), ("README", "pdf".to_string()));
        assert_eq!(split_extension("odd.?"), ("odd", "pdf".to_string()));
        assert_eq!(split_extension("Sheet.Docx"), ("Sheet", "Docx".to_string()));
    }
}
