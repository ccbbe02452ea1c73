//! Seeded in-memory photo library backing the standard catalog.
//!
//! The library keeps a "current selection": the result of the last search
//! or filter. "these" and "all" resolve against it.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use shutter_actions::{ActionHandler, HandlerError, PhotoHandlers, TargetResolver};
use shutter_core::{DateRange, Parameters, Quantity, Selector};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone, Serialize)]
pub struct Photo {
    pub id: String,
    pub title: String,
    pub taken: NaiveDate,
    pub location: String,
    pub region: String,
    pub tags: BTreeSet<String>,
    pub people: Vec<String>,
    pub album: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    /// Oldest first.
    photos: Vec<Photo>,
    albums: BTreeSet<String>,
    selection: Vec<String>,
}

impl State {
    fn photo_mut(&mut self, id: &str) -> Result<&mut Photo, HandlerError> {
        self.photos
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| HandlerError::permanent(format!("no photo with id '{id}'")))
    }
}

/// Search criteria decoded from action parameters.
#[derive(Debug, Default)]
struct Query {
    keywords: Vec<String>,
    location: Option<String>,
    dates: Option<DateRange>,
    people: Vec<String>,
}

impl Query {
    fn from_parameters(parameters: &Parameters) -> Result<Self, HandlerError> {
        Ok(Self {
            keywords: strings(parameters.get("keywords")),
            location: parameters
                .get("location")
                .and_then(Value::as_str)
                .map(String::from),
            dates: parameters.get("date_range").map(date_range).transpose()?,
            people: strings(parameters.get("people")),
        })
    }

    fn matches(&self, photo: &Photo) -> bool {
        let title = photo.title.to_lowercase();
        let keywords = self
            .keywords
            .iter()
            .all(|k| photo.tags.contains(k) || title.contains(k.as_str()));
        let location = self.location.as_ref().is_none_or(|place| {
            photo.region.eq_ignore_ascii_case(place)
                || photo.location.to_lowercase().contains(&place.to_lowercase())
        });
        let dates = self
            .dates
            .is_none_or(|range| range.start <= photo.taken && photo.taken <= range.end);
        let people = self
            .people
            .iter()
            .all(|name| photo.people.iter().any(|p| p.eq_ignore_ascii_case(name)));
        keywords && location && dates && people
    }
}

fn strings(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_lowercase)
                .collect()
        })
        .unwrap_or_default()
}

/// A date parameter is either `YYYY-MM-DD` or `{start, end}`.
fn date_range(value: &Value) -> Result<DateRange, HandlerError> {
    let invalid = |e: &dyn std::fmt::Display| HandlerError::permanent(format!("invalid date_range: {e}"));
    match value {
        Value::String(day) => NaiveDate::parse_from_str(day, "%Y-%m-%d")
            .map(DateRange::day)
            .map_err(|e| invalid(&e)),
        other => serde_json::from_value(other.clone()).map_err(|e| invalid(&e)),
    }
}

pub struct PhotoLibrary {
    state: RwLock<State>,
}

/// Demo photo, dated relative to today.
struct Seed {
    title: &'static str,
    days_ago: i64,
    location: &'static str,
    region: &'static str,
    tags: &'static [&'static str],
    people: &'static [&'static str],
    album: Option<&'static str>,
}

const fn seed(
    title: &'static str,
    days_ago: i64,
    (location, region): (&'static str, &'static str),
    tags: &'static [&'static str],
    people: &'static [&'static str],
    album: Option<&'static str>,
) -> Seed {
    Seed {
        title,
        days_ago,
        location,
        region,
        tags,
        people,
        album,
    }
}

const LISBON: (&str, &str) = ("Lisbon, Portugal", "Europe");
const ROME: (&str, &str) = ("Rome, Italy", "Europe");
const BERLIN: (&str, &str) = ("Berlin, Germany", "Europe");
const ANNA: &str = "Anna Smith";
const BEN: &str = "Ben Okafor";

/// Seeded in order; photo `pN` is entry N.
const SEED: [Seed; 12] = [
    seed("Sunset over the Tagus", 700, LISBON, &["sunset", "river"], &[], None),
    seed("Alfama rooftops", 698, LISBON, &["city"], &[ANNA], None),
    seed(
        "Beach at Nazare",
        460,
        ("Nazare, Portugal", "Europe"),
        &["beach", "sunset"],
        &[ANNA],
        Some("Holidays"),
    ),
    seed("Colosseum", 455, ROME, &["landmark"], &[], Some("Holidays")),
    seed("Trastevere dinner", 454, ROME, &["food", "family"], &[ANNA, BEN], Some("Holidays")),
    seed("Golden Gate fog", 320, ("San Francisco, USA", "North America"), &["bridge"], &[], None),
    seed("Big Sur sunset", 318, ("Big Sur, USA", "North America"), &["sunset", "coast"], &[BEN], None),
    seed("Rex at the park", 90, BERLIN, &["dog"], &[], None),
    seed("Birthday cake", 60, BERLIN, &["family", "birthday"], &[BEN], None),
    seed("Snowy Tiergarten", 30, BERLIN, &["snow"], &[], None),
    seed("Shibuya crossing", 12, ("Tokyo, Japan", "Asia"), &["city"], &[], None),
    seed("Fuji at dusk", 10, ("Fujinomiya, Japan", "Asia"), &["sunset", "mountain"], &[ANNA], None),
];

impl PhotoLibrary {
    pub fn new(photos: Vec<Photo>) -> Self {
        let mut photos = photos;
        photos.sort_by(|a, b| a.taken.cmp(&b.taken).then_with(|| a.id.cmp(&b.id)));
        let albums = photos.iter().filter_map(|p| p.album.clone()).collect();
        Self {
            state: RwLock::new(State {
                photos,
                albums,
                selection: Vec::new(),
            }),
        }
    }

    /// A small library with dates relative to today, so relative phrases
    /// such as "last month" find something.
    pub fn seeded() -> Self {
        let today = Utc::now().date_naive();
        let photos = SEED
            .iter()
            .enumerate()
            .map(|(i, seed)| Photo {
                id: format!("p{}", i + 1),
                title: seed.title.to_string(),
                taken: today - Duration::days(seed.days_ago),
                location: seed.location.to_string(),
                region: seed.region.to_string(),
                tags: seed.tags.iter().map(|t| t.to_string()).collect(),
                people: seed.people.iter().map(|p| p.to_string()).collect(),
                album: seed.album.map(String::from),
            })
            .collect();
        Self::new(photos)
    }

    /// Handlers for the standard catalog, all sharing this library.
    pub fn handlers(self: &Arc<Self>) -> PhotoHandlers {
        PhotoHandlers {
            search: Arc::new(SearchPhotos(self.clone())),
            filter: Arc::new(FilterPhotos(self.clone())),
            tag: Arc::new(TagPhotos(self.clone())),
            move_photos: Arc::new(MovePhotos(self.clone())),
            create_album: Arc::new(CreateAlbum(self.clone())),
        }
    }

    pub fn photos(&self) -> Vec<Photo> {
        self.read().photos.clone()
    }

    pub fn albums(&self) -> Vec<String> {
        self.read().albums.iter().cloned().collect()
    }

    pub fn selection(&self) -> Vec<String> {
        self.read().selection.clone()
    }

    /// Expand a selection into photo ids.
    pub fn select(&self, selection: &Quantity) -> Result<Vec<String>, HandlerError> {
        let state = self.read();
        let take = |ids: Vec<String>| match selection.count {
            Some(n) => ids.into_iter().take(n as usize).collect(),
            None => ids,
        };
        let newest_first = || state.photos.iter().rev().map(|p| p.id.clone()).collect::<Vec<_>>();

        let ids = match selection.selector {
            Selector::Last => take(newest_first()),
            Selector::First => take(state.photos.iter().map(|p| p.id.clone()).collect()),
            Selector::These => {
                if state.selection.is_empty() {
                    return Err(HandlerError::permanent("nothing is selected; search first"));
                }
                take(state.selection.clone())
            }
            Selector::All | Selector::Count if !state.selection.is_empty() => take(state.selection.clone()),
            Selector::All | Selector::Count => take(newest_first()),
        };
        Ok(ids)
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `query` over `within` (every photo when `None`), newest first, and
    /// make the matches the current selection.
    fn query(&self, query: &Query, within: Option<Vec<String>>) -> Value {
        let mut state = self.write();
        let matches: Vec<&Photo> = state
            .photos
            .iter()
            .rev()
            .filter(|p| within.as_ref().is_none_or(|ids| ids.contains(&p.id)))
            .filter(|p| query.matches(p))
            .collect();
        let output = json!({
            "count": matches.len(),
            "photos": matches,
        });
        let ids: Vec<String> = matches.iter().map(|p| p.id.clone()).collect();
        tracing::debug!(count = ids.len(), "Selection updated");
        state.selection = ids;
        output
    }
}

#[async_trait]
impl TargetResolver for PhotoLibrary {
    async fn resolve(&self, _action_id: &str, selection: &Quantity) -> Result<Vec<String>, HandlerError> {
        self.select(selection)
    }
}

struct SearchPhotos(Arc<PhotoLibrary>);

#[async_trait]
impl ActionHandler for SearchPhotos {
    async fn invoke(&self, _target: Option<&str>, parameters: &Parameters) -> Result<Value, HandlerError> {
        let query = Query::from_parameters(parameters)?;
        Ok(self.0.query(&query, None))
    }
}

struct FilterPhotos(Arc<PhotoLibrary>);

#[async_trait]
impl ActionHandler for FilterPhotos {
    async fn invoke(&self, _target: Option<&str>, parameters: &Parameters) -> Result<Value, HandlerError> {
        let query = Query::from_parameters(parameters)?;
        let current = self.0.selection();
        let within = (!current.is_empty()).then_some(current);
        Ok(self.0.query(&query, within))
    }
}

struct TagPhotos(Arc<PhotoLibrary>);

#[async_trait]
impl ActionHandler for TagPhotos {
    async fn invoke(&self, target: Option<&str>, parameters: &Parameters) -> Result<Value, HandlerError> {
        let id = target.ok_or_else(|| HandlerError::permanent("tag-photos needs a target"))?;
        let tags = strings(parameters.get("tags"));
        let mut state = self.0.write();
        let photo = state.photo_mut(id)?;
        let added: Vec<String> = tags.into_iter().filter(|t| photo.tags.insert(t.clone())).collect();
        Ok(json!({"photo": id, "added": added}))
    }

    async fn revert(&self, target: Option<&str>, _parameters: &Parameters, output: &Value) -> Result<(), HandlerError> {
        let id = target.ok_or_else(|| HandlerError::permanent("tag-photos needs a target"))?;
        let mut state = self.0.write();
        let photo = state.photo_mut(id)?;
        for tag in strings(output.get("added")) {
            photo.tags.remove(&tag);
        }
        Ok(())
    }
}

struct MovePhotos(Arc<PhotoLibrary>);

#[async_trait]
impl ActionHandler for MovePhotos {
    async fn invoke(&self, target: Option<&str>, parameters: &Parameters) -> Result<Value, HandlerError> {
        let id = target.ok_or_else(|| HandlerError::permanent("move-photos needs a target"))?;
        let album = parameters
            .get("album")
            .and_then(Value::as_str)
            .ok_or_else(|| HandlerError::permanent("move-photos needs an album"))?;
        let mut state = self.0.write();
        if !state.albums.contains(album) {
            return Err(HandlerError::permanent(format!("album '{album}' does not exist")));
        }
        let photo = state.photo_mut(id)?;
        let from = photo.album.replace(album.to_string());
        Ok(json!({"photo": id, "from": from, "to": album}))
    }

    async fn revert(&self, target: Option<&str>, _parameters: &Parameters, output: &Value) -> Result<(), HandlerError> {
        let id = target.ok_or_else(|| HandlerError::permanent("move-photos needs a target"))?;
        let mut state = self.0.write();
        let photo = state.photo_mut(id)?;
        photo.album = output.get("from").and_then(Value::as_str).map(String::from);
        Ok(())
    }
}

/// Not a bulk action: selections in `targets` are expanded here.
struct CreateAlbum(Arc<PhotoLibrary>);

#[async_trait]
impl ActionHandler for CreateAlbum {
    async fn invoke(&self, _target: Option<&str>, parameters: &Parameters) -> Result<Value, HandlerError> {
        let name = parameters
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| HandlerError::permanent("create-album needs a name"))?
            .to_string();

        let mut members = Vec::new();
        for item in parameters.get("targets").and_then(Value::as_array).into_iter().flatten() {
            match item {
                Value::String(id) => members.push(id.clone()),
                other => {
                    let selection: Quantity = serde_json::from_value(other.clone())
                        .map_err(|e| HandlerError::permanent(format!("invalid selection: {e}")))?;
                    members.extend(self.0.select(&selection)?);
                }
            }
        }

        let mut state = self.0.write();
        if !state.albums.insert(name.clone()) {
            return Err(HandlerError::permanent(format!("album '{name}' already exists")));
        }
        let mut previous: BTreeMap<String, Option<String>> = BTreeMap::new();
        for id in &members {
            if previous.contains_key(id) {
                continue;
            }
            let photo = match state.photo_mut(id) {
                Ok(photo) => photo,
                Err(err) => {
                    // leave the library as it was
                    for (id, album) in &previous {
                        if let Ok(photo) = state.photo_mut(id) {
                            photo.album = album.clone();
                        }
                    }
                    state.albums.remove(&name);
                    return Err(err);
                }
            };
            previous.insert(id.clone(), photo.album.replace(name.clone()));
        }
        Ok(json!({"album": name, "photos": previous.keys().collect::<Vec<_>>(), "previous": previous}))
    }

    async fn revert(&self, _target: Option<&str>, _parameters: &Parameters, output: &Value) -> Result<(), HandlerError> {
        let name = output
            .get("album")
            .and_then(Value::as_str)
            .ok_or_else(|| HandlerError::permanent("missing album in output"))?;
        let mut state = self.0.write();
        if let Some(previous) = output.get("previous").and_then(Value::as_object) {
            for (id, album) in previous {
                state.photo_mut(id)?.album = album.as_str().map(String::from);
            }
        }
        state.albums.remove(name);
        Ok(())
    }
}
