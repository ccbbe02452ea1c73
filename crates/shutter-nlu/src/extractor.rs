//! Lexical Feature Extractor
//!
//! Pulls typed candidate values out of raw utterance text using regex
//! patterns and fixed word lists:
//!
//! 1. Date expressions (absolute and relative, see [`crate::dates`])
//! 2. Locations from a gazetteer and from capitalized words after "from", "in", "at"
//! 3. Keyword lists: quoted strings, "tagged x, y and z", comma lists, "sunset photos"
//! 4. Proper-noun sequences as candidate person names, "of dogs" as objects
//! 5. Quantifiers ("the last 5", "these 3", "all") and bare integers
//! 6. Album names ("album called X", "to X")
//!
//! Every plausible reading is kept. Readings of one kind that share both span
//! and value are collapsed into the most confident one.

use chrono::NaiveDate;
use regex::Regex;
use shutter_core::{
    EntityKind, EntityValue, ExtractedEntity, Quantity, Selector, Span, Utterance,
};
use std::collections::HashMap;

use crate::dates::DatePatterns;
use crate::error::NluError;
use crate::lexicon;

const COUNT_ALT: &str = r"\d+|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve|twenty";

struct Patterns {
    gazetteer: Regex,
    place_after_preposition: Regex,
    proper_noun: Regex,
    object: Regex,
    quoted: Regex,
    labelled: Regex,
    label_boundary: Regex,
    comma_list: Regex,
    list_separator: Regex,
    before_noun: Regex,
    album_called: Regex,
    to_album: Regex,
    selection: Regex,
    everything: Regex,
    integer: Regex,
}

impl Patterns {
    fn new() -> Result<Self, regex::Error> {
        let places = lexicon::PLACES
            .iter()
            .map(|p| regex::escape(p))
            .collect::<Vec<_>>()
            .join("|");
        Ok(Self {
            gazetteer: Regex::new(&format!(r"(?i)\b({places})\b"))?,
            place_after_preposition: Regex::new(
                r"\b(?:[Ff]rom|[Ii]n|[Aa]t|[Nn]ear|[Aa]round)\s+([A-Z][\w'-]*(?:\s+[A-Z][\w'-]*)*)",
            )?,
            proper_noun: Regex::new(r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*")?,
            object: Regex::new(r"\bof\s+(?:a\s+|an\s+|the\s+|my\s+|our\s+)?([a-z][a-z-]+)")?,
            quoted: Regex::new(r#"["“]([^"”]+)["”]"#)?,
            labelled: Regex::new(r"(?i)\b(?:tagged|labell?ed|as|with\s+tags?)\s+([^.!?]+)")?,
            label_boundary: Regex::new(
                r"(?i)\s+(?:from|in|at|near|on|to|into|since|before|after|during|last|this|taken|please)\b",
            )?,
            comma_list: Regex::new(
                r"(?i)\b[a-z][a-z-]*(?:\s*,\s*[a-z][a-z-]*)+(?:,?\s+and\s+[a-z][a-z-]*)?",
            )?,
            list_separator: Regex::new(r"(?i)\s*,\s*(?:and\s+)?|\s+and\s+|\s*&\s*")?,
            before_noun: Regex::new(
                r"(?i)\b([a-z][a-z-]*)\s+(?:photos?|pictures?|pics|images?|shots?|snaps)\b",
            )?,
            album_called: Regex::new(
                r#"(?i)\balbum\s+(?:called|named|titled)\s+["“]?([^"”.!?]+?)["”]?\s*(?:$|[.!?]|\s+(?:with|from|for|and|containing)\b)"#,
            )?,
            to_album: Regex::new(
                r#"(?i)\b(?:to|into)\s+(?:the\s+|my\s+|our\s+)?(?:album\s+)?["“]?([^"”.!?]+?)["”]?(?:\s+album)?\s*(?:$|[.!?])"#,
            )?,
            selection: Regex::new(&format!(
                r"(?i)\b(last|latest|first|these|those)\s+({COUNT_ALT})\b(?:\s+([a-z]+))?"
            ))?,
            everything: Regex::new(r"(?i)\b(all|everything)\b")?,
            integer: Regex::new(r"\b(\d+)\b")?,
        })
    }
}

// Confidence by pattern specificity.
const GAZETTEER: f32 = 0.9;
const PLACE_AFTER_PREPOSITION: f32 = 0.7;
const QUOTED_KEYWORD: f32 = 0.9;
const LABELLED_KEYWORD: f32 = 0.8;
const LISTED_KEYWORD: f32 = 0.7;
const NOUN_MODIFIER: f32 = 0.6;
const OBJECT: f32 = 0.6;
const PERSON_AFTER_CUE: f32 = 0.75;
const PERSON: f32 = 0.6;
const ORDERED_SELECTION: f32 = 0.9;
const CURRENT_SELECTION: f32 = 0.85;
const EVERYTHING: f32 = 0.8;
const BARE_COUNT: f32 = 0.5;
const ALBUM_CALLED: f32 = 0.9;
const ALBUM_DESTINATION: f32 = 0.7;
const QUOTED_ALBUM: f32 = 0.5;

/// Extracts typed entities from utterances. Cheap to share; holds only
/// compiled patterns.
pub struct FeatureExtractor {
    dates: DatePatterns,
    patterns: Patterns,
}

impl FeatureExtractor {
    pub fn new() -> Result<Self, NluError> {
        Ok(Self {
            dates: DatePatterns::new()?,
            patterns: Patterns::new()?,
        })
    }

    /// Extract every plausible entity. Relative dates resolve against the
    /// day the utterance was received.
    pub fn extract(&self, utterance: &Utterance) -> Vec<ExtractedEntity> {
        let entities = self.extract_text(&utterance.text, utterance.received_at.date_naive());
        tracing::debug!(
            utterance_id = %utterance.id,
            count = entities.len(),
            "Extracted entities"
        );
        entities
    }

    pub fn extract_text(&self, text: &str, today: NaiveDate) -> Vec<ExtractedEntity> {
        let mut found = self.dates.extract(text, today);
        self.locations(text, &mut found);
        self.keywords(text, &mut found);
        self.people_and_objects(text, &mut found);
        self.album_names(text, &mut found);
        self.quantities(text, &mut found);
        dedup(found)
    }

    fn locations(&self, text: &str, found: &mut Vec<ExtractedEntity>) {
        for m in self.patterns.gazetteer.find_iter(text) {
            if let Some(place) = lexicon::place(m.as_str()) {
                found.push(entity(EntityKind::Location, EntityValue::text(place), text, m.start(), m.end(), GAZETTEER));
            }
        }

        for caps in self.patterns.place_after_preposition.captures_iter(text) {
            let Some(m) = caps.get(1) else { continue };
            let first_word = m.as_str().split_whitespace().next().unwrap_or_default();
            if lexicon::is_calendar_word(first_word) {
                continue;
            }
            let value = lexicon::place(m.as_str()).unwrap_or(m.as_str());
            found.push(entity(
                EntityKind::Location,
                EntityValue::text(value),
                text,
                m.start(),
                m.end(),
                PLACE_AFTER_PREPOSITION,
            ));
        }
    }

    fn keywords(&self, text: &str, found: &mut Vec<ExtractedEntity>) {
        let p = &self.patterns;

        for caps in p.quoted.captures_iter(text) {
            let Some(m) = caps.get(1) else { continue };
            let (value, start) = trimmed(m);
            if value.is_empty() {
                continue;
            }
            let end = start + value.len();
            found.push(keyword(value, text, start, end, QUOTED_KEYWORD));
            found.push(entity(
                EntityKind::AlbumName,
                EntityValue::text(value),
                text,
                start,
                end,
                QUOTED_ALBUM,
            ));
        }

        for caps in p.labelled.captures_iter(text) {
            let Some(m) = caps.get(1) else { continue };
            let list = m.as_str();
            let list = match p.label_boundary.find(list) {
                Some(boundary) => &list[..boundary.start()],
                None => list,
            };
            for (item, span) in self.split_list(list, m.start()) {
                if item.split_whitespace().count() <= 3 && !lexicon::is_stopword(&item) {
                    found.push(keyword(&item, text, span.start, span.end, LABELLED_KEYWORD));
                }
            }
        }

        for m in p.comma_list.find_iter(text) {
            for (item, span) in self.split_list(m.as_str(), m.start()) {
                if !lexicon::is_stopword(&item) && lexicon::place(&item).is_none() {
                    found.push(keyword(&item, text, span.start, span.end, LISTED_KEYWORD));
                }
            }
        }

        for caps in p.before_noun.captures_iter(text) {
            let Some(m) = caps.get(1) else { continue };
            let word = m.as_str();
            if lexicon::is_stopword(word)
                || lexicon::is_calendar_word(word)
                || lexicon::place(word).is_some()
                || lexicon::parse_count(word).is_some()
            {
                continue;
            }
            found.push(keyword(word, text, m.start(), m.end(), NOUN_MODIFIER));
        }
    }

    fn people_and_objects(&self, text: &str, found: &mut Vec<ExtractedEntity>) {
        for caps in self.patterns.object.captures_iter(text) {
            let Some(m) = caps.get(1) else { continue };
            let word = m.as_str();
            if lexicon::is_stopword(word) || lexicon::parse_count(word).is_some() {
                continue;
            }
            found.push(entity(
                EntityKind::Object,
                EntityValue::text(word),
                text,
                m.start(),
                m.end(),
                OBJECT,
            ));
        }

        for m in self.patterns.proper_noun.find_iter(text) {
            let mut start = m.start();
            if is_sentence_initial(text, start) {
                // Drop the capitalized first word of a sentence.
                let rest = m.as_str().find(char::is_whitespace).map(|i| start + i);
                match rest {
                    Some(i) => start = i + (text[i..].len() - text[i..].trim_start().len()),
                    None => continue,
                }
            }
            let name = &text[start..m.end()];
            if name.split_whitespace().any(lexicon::is_calendar_word)
                || lexicon::place(name).is_some()
                || name == "I"
            {
                continue;
            }
            let previous = previous_word(text, start).to_ascii_lowercase();
            let confidence = match previous.as_str() {
                "from" | "in" | "at" | "near" | "around" | "called" | "named" | "titled" => continue,
                "with" | "of" | "and" => PERSON_AFTER_CUE,
                _ => PERSON,
            };
            found.push(entity(
                EntityKind::Person,
                EntityValue::text(name),
                text,
                start,
                m.end(),
                confidence,
            ));
        }
    }

    fn album_names(&self, text: &str, found: &mut Vec<ExtractedEntity>) {
        for caps in self.patterns.album_called.captures_iter(text) {
            let Some(m) = caps.get(1) else { continue };
            let (name, start) = trimmed(m);
            if !name.is_empty() {
                found.push(entity(
                    EntityKind::AlbumName,
                    EntityValue::text(name),
                    text,
                    start,
                    start + name.len(),
                    ALBUM_CALLED,
                ));
            }
        }

        for caps in self.patterns.to_album.captures_iter(text) {
            let Some(m) = caps.get(1) else { continue };
            let (name, start) = trimmed(m);
            let lower = name.to_ascii_lowercase();
            if name.is_empty()
                || lower.starts_with("a ")
                || lower.starts_with("an ")
                || lower.starts_with("new ")
                || lower.contains(" called ")
                || lower.contains(" named ")
            {
                continue;
            }
            found.push(entity(
                EntityKind::AlbumName,
                EntityValue::text(name),
                text,
                start,
                start + name.len(),
                ALBUM_DESTINATION,
            ));
        }
    }

    fn quantities(&self, text: &str, found: &mut Vec<ExtractedEntity>) {
        let mut covered: Vec<Span> = found
            .iter()
            .filter(|e| e.kind == EntityKind::Date)
            .map(|e| e.span)
            .collect();

        for caps in self.patterns.selection.captures_iter(text) {
            let (Some(word), Some(count)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            // "last 30 days" is a date phrase
            if caps
                .get(3)
                .is_some_and(|unit| lexicon::TIME_UNITS.contains(&unit.as_str().to_ascii_lowercase().as_str()))
            {
                continue;
            }
            let Some(n) = lexicon::parse_count(count.as_str()) else {
                continue;
            };
            let (selector, confidence) = match word.as_str().to_ascii_lowercase().as_str() {
                "first" => (Selector::First, ORDERED_SELECTION),
                "these" | "those" => (Selector::These, CURRENT_SELECTION),
                _ => (Selector::Last, ORDERED_SELECTION),
            };
            let span = Span::new(word.start(), count.end());
            covered.push(span);
            found.push(entity(
                EntityKind::Quantity,
                EntityValue::Quantity(Quantity::new(selector, Some(n))),
                text,
                span.start,
                span.end,
                confidence,
            ));
        }

        for m in self.patterns.everything.find_iter(text) {
            found.push(entity(
                EntityKind::Quantity,
                EntityValue::Quantity(Quantity::new(Selector::All, None)),
                text,
                m.start(),
                m.end(),
                EVERYTHING,
            ));
        }

        for caps in self.patterns.integer.captures_iter(text) {
            let Some(m) = caps.get(1) else { continue };
            let span = Span::new(m.start(), m.end());
            if covered.iter().any(|c| c.contains(&span)) {
                continue;
            }
            let Ok(n) = m.as_str().parse::<u32>() else {
                continue;
            };
            found.push(entity(
                EntityKind::Quantity,
                EntityValue::Quantity(Quantity::new(Selector::Count, Some(n))),
                text,
                span.start,
                span.end,
                BARE_COUNT,
            ));
        }
    }

    /// Split "a, b and c" into trimmed items with spans relative to the
    /// utterance (`base` is the list's offset).
    fn split_list(&self, list: &str, base: usize) -> Vec<(String, Span)> {
        let mut items = Vec::new();
        let mut last = 0;
        for sep in self.patterns.list_separator.find_iter(list) {
            items.extend(list_item(list, last, sep.start(), base));
            last = sep.end();
        }
        items.extend(list_item(list, last, list.len(), base));
        items
    }
}

fn list_item(list: &str, start: usize, end: usize, base: usize) -> Option<(String, Span)> {
    let is_quote = |c: char| matches!(c, '"' | '“' | '”');
    let raw = &list[start..end];
    let leading = raw.trim_start_matches(|c: char| c.is_whitespace() || is_quote(c));
    let item = leading.trim_end_matches(|c: char| c.is_whitespace() || is_quote(c));
    if item.is_empty() {
        return None;
    }
    let offset = base + start + (raw.len() - leading.len());
    Some((item.to_string(), Span::new(offset, offset + item.len())))
}

/// A capture with surrounding whitespace removed, and the byte offset where
/// the trimmed text starts.
fn trimmed<'t>(m: regex::Match<'t>) -> (&'t str, usize) {
    let raw = m.as_str();
    let leading = raw.len() - raw.trim_start().len();
    (raw.trim(), m.start() + leading)
}

fn entity(
    kind: EntityKind,
    value: EntityValue,
    text: &str,
    start: usize,
    end: usize,
    confidence: f32,
) -> ExtractedEntity {
    ExtractedEntity::new(kind, value, &text[start..end], Span::new(start, end), confidence)
}

fn keyword(value: &str, text: &str, start: usize, end: usize, confidence: f32) -> ExtractedEntity {
    entity(
        EntityKind::Keyword,
        EntityValue::text(value.to_lowercase()),
        text,
        start,
        end,
        confidence,
    )
}

fn is_sentence_initial(text: &str, start: usize) -> bool {
    let before = text[..start].trim_end();
    before.is_empty() || before.ends_with(['.', '!', '?', ':', ';'])
}

fn previous_word(text: &str, start: usize) -> &str {
    text[..start]
        .trim_end_matches(|c: char| !c.is_alphanumeric())
        .split_whitespace()
        .next_back()
        .unwrap_or_default()
        .trim_matches(|c: char| !c.is_alphanumeric())
}

/// Collapse readings with identical kind, span and value, keeping the most
/// confident, and order by position.
fn dedup(entities: Vec<ExtractedEntity>) -> Vec<ExtractedEntity> {
    let mut best: HashMap<(EntityKind, Span, EntityValue), ExtractedEntity> = HashMap::new();
    for e in entities {
        let key = (e.kind, e.span, e.value.clone());
        match best.get(&key) {
            Some(existing) if existing.confidence >= e.confidence => {}
            _ => {
                best.insert(key, e);
            }
        }
    }
    let mut out: Vec<ExtractedEntity> = best.into_values().collect();
    out.sort_by(|a, b| {
        (a.span.start, a.span.end, a.kind)
            .cmp(&(b.span.start, b.span.end, b.kind))
            .then(b.confidence.total_cmp(&a.confidence))
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use shutter_core::DateRange;

    fn extractor() -> FeatureExtractor {
        FeatureExtractor::new().unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    fn of_kind(entities: &[ExtractedEntity], kind: EntityKind) -> Vec<&ExtractedEntity> {
        entities.iter().filter(|e| e.kind == kind).collect()
    }

    #[test]
    fn test_search_scenario_entities() {
        let entities = extractor().extract_text("find sunset photos from Europe last summer", today());

        let keywords = of_kind(&entities, EntityKind::Keyword);
        assert_eq!(keywords.len(), 1);
        assert_eq!(keywords[0].value, EntityValue::text("sunset"));

        let locations = of_kind(&entities, EntityKind::Location);
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].value, EntityValue::text("Europe"));
        assert_eq!(locations[0].confidence, GAZETTEER);

        let dates = of_kind(&entities, EntityKind::Date);
        assert_eq!(dates.len(), 1);
        assert_eq!(dates[0].text, "last summer");
        let expected = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 8, 31).unwrap(),
        );
        assert_eq!(dates[0].value, EntityValue::Date(expected));

        assert!(of_kind(&entities, EntityKind::Person).is_empty());
    }

    #[test]
    fn test_spans_index_the_utterance() {
        let text = "find sunset photos from Europe last summer";
        for e in extractor().extract_text(text, today()) {
            assert_eq!(&text[e.span.start..e.span.end], e.text);
        }
    }

    #[test]
    fn test_tag_without_selection_has_no_quantity() {
        let entities = extractor().extract_text("tag these photos as vacation", today());
        assert!(of_kind(&entities, EntityKind::Quantity).is_empty());
        let keywords = of_kind(&entities, EntityKind::Keyword);
        assert_eq!(keywords.len(), 1);
        assert_eq!(keywords[0].value, EntityValue::text("vacation"));
    }

    #[test]
    fn test_selection_phrases() {
        let entities = extractor().extract_text("the last 5", today());
        let quantities = of_kind(&entities, EntityKind::Quantity);
        assert_eq!(quantities.len(), 1);
        assert_eq!(
            quantities[0].value,
            EntityValue::Quantity(Quantity::new(Selector::Last, Some(5)))
        );
        assert_eq!(quantities[0].text, "last 5");

        let entities = extractor().extract_text("move these five to Holidays", today());
        let quantities = of_kind(&entities, EntityKind::Quantity);
        assert_eq!(
            quantities[0].value,
            EntityValue::Quantity(Quantity::new(Selector::These, Some(5)))
        );
    }

    #[test]
    fn test_trailing_days_is_not_a_quantity() {
        let entities = extractor().extract_text("show photos from the last 30 days", today());
        assert!(of_kind(&entities, EntityKind::Quantity).is_empty());
        assert_eq!(of_kind(&entities, EntityKind::Date).len(), 1);
    }

    #[test]
    fn test_keyword_lists() {
        let entities = extractor().extract_text("tag the last 3 photos as beach, sunset and family", today());
        let mut values: Vec<String> = of_kind(&entities, EntityKind::Keyword)
            .iter()
            .filter_map(|e| e.value.as_text().map(String::from))
            .collect();
        values.sort();
        values.dedup();
        assert_eq!(values, vec!["beach", "family", "sunset"]);
    }

    #[test]
    fn test_quoted_string_is_keyword_and_album_candidate() {
        let entities = extractor().extract_text(r#"create an album called "Road Trip""#, today());
        let albums = of_kind(&entities, EntityKind::AlbumName);
        assert_eq!(albums.len(), 1);
        assert_eq!(albums[0].value, EntityValue::text("Road Trip"));
        assert_eq!(albums[0].confidence, ALBUM_CALLED);
        assert!(of_kind(&entities, EntityKind::Keyword)
            .iter()
            .any(|e| e.value == EntityValue::text("road trip")));
    }

    #[test]
    fn test_padded_album_names_keep_exact_spans() {
        for text in [
            r#"move the last 3 photos to " Road Trip""#,
            r#"move the last 3 photos to " Café""#,
            r#"create an album called " Café""#,
            "create an album called Ünïcødé Days",
        ] {
            let entities = extractor().extract_text(text, today());
            let albums = of_kind(&entities, EntityKind::AlbumName);
            assert!(!albums.is_empty(), "no album name in {text}");
            for e in &entities {
                assert_eq!(&text[e.span.start..e.span.end], e.text, "span of {:?} in {text}", e.kind);
            }
            for album in albums {
                assert_eq!(album.value.as_text(), Some(album.text.as_str()));
                assert!(!album.text.starts_with(' '));
            }
        }

        let entities = extractor().extract_text(r#"move the last 3 photos to " Road Trip""#, today());
        assert!(of_kind(&entities, EntityKind::AlbumName)
            .iter()
            .all(|e| e.text == "Road Trip"));
    }

    #[test]
    fn test_album_destination() {
        let entities = extractor().extract_text("move the last 3 photos to Holidays", today());
        let albums = of_kind(&entities, EntityKind::AlbumName);
        assert_eq!(albums.len(), 1);
        assert_eq!(albums[0].value, EntityValue::text("Holidays"));
    }

    #[test]
    fn test_people_and_objects() {
        let entities = extractor().extract_text("Show me pictures of dogs with Anna Smith", today());
        let people = of_kind(&entities, EntityKind::Person);
        assert_eq!(people.len(), 1);
        assert_eq!(people[0].value, EntityValue::text("Anna Smith"));
        assert_eq!(people[0].confidence, PERSON_AFTER_CUE);

        let objects = of_kind(&entities, EntityKind::Object);
        assert_eq!(objects[0].value, EntityValue::text("dogs"));
    }

    #[test]
    fn test_unknown_capitalized_place_after_preposition() {
        let entities = extractor().extract_text("photos from Patagonia", today());
        let locations = of_kind(&entities, EntityKind::Location);
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].confidence, PLACE_AFTER_PREPOSITION);
        assert!(of_kind(&entities, EntityKind::Person).is_empty());
    }

    #[test]
    fn test_nothing_recognizable() {
        assert!(extractor().extract_text("hmm ok", today()).is_empty());
    }

    #[test]
    fn test_extract_uses_received_at() {
        let received = Utc.with_ymd_and_hms(2023, 1, 5, 12, 0, 0).unwrap();
        let utterance = Utterance::at("photos from last summer", received);
        let entities = extractor().extract(&utterance);
        let date = of_kind(&entities, EntityKind::Date)[0];
        match &date.value {
            EntityValue::Date(range) => {
                assert_eq!(range.start, NaiveDate::from_ymd_opt(2022, 6, 1).unwrap())
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
