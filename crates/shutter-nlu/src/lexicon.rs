//! Fixed word lists used by the extractor.

/// Place names recognized regardless of surrounding words. Longer names
/// come first so "North America" wins over "America".
pub const PLACES: &[&str] = &[
    "North America",
    "South America",
    "New York",
    "San Francisco",
    "Los Angeles",
    "Hong Kong",
    "New Zealand",
    "United Kingdom",
    "Europe",
    "Asia",
    "Africa",
    "America",
    "Australia",
    "Antarctica",
    "Iceland",
    "Norway",
    "Sweden",
    "France",
    "Spain",
    "Portugal",
    "Italy",
    "Greece",
    "Germany",
    "Austria",
    "Switzerland",
    "Japan",
    "China",
    "India",
    "Mexico",
    "Canada",
    "Brazil",
    "Peru",
    "Egypt",
    "Morocco",
    "Scotland",
    "Ireland",
    "California",
    "Hawaii",
    "Alaska",
    "Paris",
    "London",
    "Rome",
    "Venice",
    "Florence",
    "Barcelona",
    "Madrid",
    "Lisbon",
    "Berlin",
    "Vienna",
    "Prague",
    "Amsterdam",
    "Copenhagen",
    "Reykjavik",
    "Tokyo",
    "Kyoto",
    "Sydney",
    "Alps",
    "Yosemite",
];

pub const MONTHS: &[&str] = &[
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

pub const WEEKDAYS: &[&str] = &[
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

pub const SEASONS: &[&str] = &["spring", "summer", "autumn", "fall", "winter"];

/// Words that never name a keyword on their own.
pub const STOPWORDS: &[&str] = &[
    "a", "about", "all", "an", "and", "any", "are", "as", "at", "be", "both", "by", "each",
    "every", "few", "find", "for", "from", "get", "in", "into", "is", "it", "its", "last",
    "latest", "me", "more", "most", "my", "new", "of", "old", "on", "only", "or", "other",
    "our", "recent", "show", "some", "that", "the", "their", "them", "these", "this", "those",
    "to", "what", "which", "with", "your", "first", "just", "tag", "move", "search",
];

/// Units that turn "last 30" into a date phrase rather than a quantity.
pub const TIME_UNITS: &[&str] = &[
    "day", "days", "week", "weeks", "month", "months", "year", "years",
];

pub const NUMBER_WORDS: &[(&str, u32)] = &[
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
    ("eleven", 11),
    ("twelve", 12),
    ("twenty", 20),
];

/// Canonical spelling of a known place, matched case-insensitively.
pub fn place(name: &str) -> Option<&'static str> {
    PLACES.iter().copied().find(|p| p.eq_ignore_ascii_case(name))
}

pub fn is_stopword(word: &str) -> bool {
    let lower = word.to_ascii_lowercase();
    STOPWORDS.contains(&lower.as_str())
}

/// Month number (1-12) for a full or three-letter month name.
pub fn month_number(word: &str) -> Option<u32> {
    let lower = word.to_ascii_lowercase();
    MONTHS
        .iter()
        .position(|m| *m == lower || (lower.len() == 3 && m.starts_with(lower.as_str())))
        .map(|i| i as u32 + 1)
}

/// Calendar words that look like proper nouns but are not names.
pub fn is_calendar_word(word: &str) -> bool {
    let lower = word.to_ascii_lowercase();
    MONTHS.contains(&lower.as_str())
        || WEEKDAYS.contains(&lower.as_str())
        || SEASONS.contains(&lower.as_str())
}

pub fn parse_count(word: &str) -> Option<u32> {
    if let Ok(n) = word.parse::<u32>() {
        return Some(n);
    }
    let lower = word.to_ascii_lowercase();
    NUMBER_WORDS
        .iter()
        .find(|(w, _)| *w == lower)
        .map(|(_, n)| *n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_place_is_case_insensitive() {
        assert_eq!(place("europe"), Some("Europe"));
        assert_eq!(place("new york"), Some("New York"));
        assert_eq!(place("Atlantis"), None);
    }

    #[test]
    fn test_month_number() {
        assert_eq!(month_number("June"), Some(6));
        assert_eq!(month_number("dec"), Some(12));
        assert_eq!(month_number("mar"), Some(3));
        assert_eq!(month_number("summer"), None);
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("5"), Some(5));
        assert_eq!(parse_count("five"), Some(5));
        assert_eq!(parse_count("many"), None);
    }
}
