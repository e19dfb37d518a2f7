//! Mint year extraction from noisy OCR text

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// Whole-word years 1700-2199
static YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(1[7-9][0-9]{2}|20[0-9]{2}|21[0-9]{2})\b").expect("valid year regex"));

/// Year-like digit runs 1870-1969, matched anywhere
static PARTIAL_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(18[7-9][0-9]|19[0-3][0-9]|194[0-9]|195[0-9]|196[0-9])").expect("valid partial year regex")
});

/// Whitespace sitting between two digits
static SPLIT_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9])\s+([0-9])").expect("valid split digit regex"));

/// Which strategy produced a year
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearSource {
    Direct,
    Corrected,
    Partial,
}

/// Map characters OCR commonly reads in place of digits
pub fn correct_confusions(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'o' => '0',
            'l' => '1',
            'b' => '8',
            'g' | 'q' => '9',
            's' => '5',
            'z' => '2',
            other => other,
        })
        .flat_map(char::to_uppercase)
        .map(|c| match c {
            'O' => '0',
            'I' | '|' => '1',
            'B' => '8',
            'S' => '5',
            'Z' => '2',
            other => other,
        })
        .collect()
}

/// Join digits that OCR separated with spaces
fn collapse_digit_gaps(text: &str) -> String {
    let mut current = text.to_string();
    // Overlapping pairs ("1 8 7") need more than one pass
    loop {
        let next = SPLIT_DIGITS.replace_all(&current, "$1$2").into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

fn first_year(pattern: &Regex, text: &str) -> Option<u16> {
    pattern
        .captures_iter(text)
        .find_map(|caps| caps.get(1).and_then(|m| m.as_str().parse().ok()))
}

/// Extracts a plausible mint year, first matching strategy wins
#[derive(Debug, Default, Clone, Copy)]
pub struct YearResolver;

impl YearResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, text: &str) -> Option<u16> {
        self.resolve_with_source(text).map(|(year, _)| year)
    }

    pub fn resolve_with_source(&self, text: &str) -> Option<(u16, YearSource)> {
        if let Some(year) = first_year(&YEAR, text) {
            return Some((year, YearSource::Direct));
        }

        let corrected = correct_confusions(text);
        if let Some(year) = first_year(&YEAR, &corrected) {
            debug!("Year {} found after confusion correction", year);
            return Some((year, YearSource::Corrected));
        }

        let collapsed = collapse_digit_gaps(&corrected);
        if let Some(year) = first_year(&YEAR, &collapsed) {
            debug!("Year {} found after joining split digits", year);
            return Some((year, YearSource::Corrected));
        }

        let partial = first_year(&PARTIAL_YEAR, text).or_else(|| first_year(&PARTIAL_YEAR, &collapsed));
        if let Some(year) = partial {
            debug!("Year {} found by partial match", year);
            return Some((year, YearSource::Partial));
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(text: &str) -> Option<u16> {
        YearResolver::new().resolve(text)
    }

    #[test]
    fn test_direct_year() {
        assert_eq!(resolve("LIBERTY 1921 E PLURIBUS"), Some(1921));
        assert_eq!(
            YearResolver::new().resolve_with_source("1964"),
            Some((1964, YearSource::Direct))
        );
    }

    #[test]
    fn test_first_match_wins() {
        assert_eq!(resolve("1943 2001"), Some(1943));
    }

    #[test]
    fn test_non_ascii_digits_ignored() {
        assert_eq!(
            YearResolver::new().resolve_with_source("19\u{0662}\u{0661} 1921"),
            Some((1921, YearSource::Direct))
        );
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert_eq!(resolve("1699"), None);
        assert_eq!(resolve("2200"), None);
    }

    #[test]
    fn test_split_letter_digits() {
        assert_eq!(resolve("O O 1  8  7  8"), Some(1878));
    }

    #[test]
    fn test_confusion_correction() {
        assert_eq!(
            YearResolver::new().resolve_with_source("I9S4"),
            Some((1954, YearSource::Corrected))
        );
        assert_eq!(resolve("l9b2"), Some(1982));
        assert_eq!(resolve("19q7"), Some(1997));
    }

    #[test]
    fn test_partial_match_inside_digit_run() {
        assert_eq!(
            YearResolver::new().resolve_with_source("0018850"),
            Some((1885, YearSource::Partial))
        );
    }

    #[test]
    fn test_no_digits_is_none() {
        assert_eq!(resolve("IN GOD WE TRUST"), None);
        assert_eq!(resolve(""), None);
    }

    #[test]
    fn test_correct_confusions_table() {
        assert_eq!(correct_confusions("Ol|bgqsz"), "01189952");
    }
}
