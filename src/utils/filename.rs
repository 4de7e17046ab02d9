//! Dataset-name to storage-key sanitization.
//!
//! Downstream pipeline stages cross-reference raw files by this name, so the
//! mapping must be deterministic: the same dataset name always yields the
//! same stored filename.

use std::sync::OnceLock;

use regex::Regex;

const MAX_LEN: usize = 100;

fn strip_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s-]").expect("valid regex"))
}

fn whitespace_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"))
}

/// Converts a dataset display name into a valid storage key: non-word
/// characters stripped, whitespace runs collapsed to `_`, truncated to 100
/// characters.
pub fn sanitize_filename(name: &str) -> String {
    let stripped = strip_pattern().replace_all(name, "");
    let collapsed = whitespace_pattern().replace_all(&stripped, "_");
    collapsed.chars().take(MAX_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_punctuation_and_collapses_whitespace() {
        assert_eq!(
            sanitize_filename("Calidad del aire: PM2.5 (promedio diario)"),
            "Calidad_del_aire_PM25_promedio_diario"
        );
    }

    #[test]
    fn keeps_accented_letters_and_hyphens() {
        assert_eq!(
            sanitize_filename("Estaciones meteorológicas - región sur"),
            "Estaciones_meteorológicas_-_región_sur"
        );
    }

    #[test]
    fn is_deterministic_and_idempotent() {
        let name = "Emisiones de CO2, por sector  (2020)";
        let once = sanitize_filename(name);
        assert_eq!(once, sanitize_filename(name));
        assert_eq!(once, sanitize_filename(&once));
    }

    #[test]
    fn truncates_to_one_hundred_chars() {
        let long = "á".repeat(500);
        assert_eq!(sanitize_filename(&long).chars().count(), 100);
    }

    #[test]
    fn distinct_names_may_collide() {
        // Tolerated; the catalog loader flags these up front.
        assert_eq!(
            sanitize_filename("Aire  PM10"),
            sanitize_filename("Aire PM10!")
        );
    }
}
