//! The standard photo catalog.
//!
//! Descriptors for the five photo operations, wired to whatever handlers the
//! persistence layer supplies.

use shutter_core::{EntityKind, IntentKind, ParamType, ParameterSchema, ParameterSpec, Validator};
use std::sync::Arc;

use crate::descriptor::ActionDescriptor;
use crate::handler::ActionHandler;

pub const SEARCH_PHOTOS: &str = "search-photos";
pub const FILTER_PHOTOS: &str = "filter-photos";
pub const TAG_PHOTOS: &str = "tag-photos";
pub const MOVE_PHOTOS: &str = "move-photos";
pub const CREATE_ALBUM: &str = "create-album";

/// One handler per catalog action.
pub struct PhotoHandlers {
    pub search: Arc<dyn ActionHandler>,
    pub filter: Arc<dyn ActionHandler>,
    pub tag: Arc<dyn ActionHandler>,
    pub move_photos: Arc<dyn ActionHandler>,
    pub create_album: Arc<dyn ActionHandler>,
}

pub fn photo_catalog(handlers: PhotoHandlers) -> Vec<ActionDescriptor> {
    vec![
        ActionDescriptor::new(SEARCH_PHOTOS, "Search photos", handlers.search)
            .description("Find photos by keyword, place, date or person")
            .schema(query_schema())
            .requires(["read:photos"])
            .serves([IntentKind::Search])
            .idempotent(true),
        ActionDescriptor::new(FILTER_PHOTOS, "Filter photos", handlers.filter)
            .description("Narrow the current result set")
            .schema(query_schema())
            .requires(["read:photos"])
            .serves([IntentKind::Filter])
            .idempotent(true),
        ActionDescriptor::new(TAG_PHOTOS, "Tag photos", handlers.tag)
            .description("Add tags to a set of photos")
            .schema(ParameterSchema::new(vec![
                targets(true),
                ParameterSpec::required("tags", ParamType::Array)
                    .from_entities([EntityKind::Keyword])
                    .collecting()
                    .validator(Validator::string_items())
                    .describe("tags to add"),
            ]))
            .requires(["write:photos"])
            .serves([IntentKind::BulkTag])
            .bulk_over("targets")
            .idempotent(true)
            .reversible(true),
        ActionDescriptor::new(MOVE_PHOTOS, "Move photos", handlers.move_photos)
            .description("Move a set of photos into an album")
            .schema(ParameterSchema::new(vec![
                targets(true),
                ParameterSpec::required("album", ParamType::String)
                    .from_entities([EntityKind::AlbumName])
                    .validator(Validator::non_empty())
                    .describe("destination album"),
            ]))
            .requires(["write:photos", "write:albums"])
            .serves([IntentKind::BulkMove])
            .bulk_over("targets")
            .idempotent(true)
            .reversible(true),
        ActionDescriptor::new(CREATE_ALBUM, "Create album", handlers.create_album)
            .description("Create an album, optionally filled with photos")
            .schema(ParameterSchema::new(vec![
                ParameterSpec::required("name", ParamType::String)
                    .from_entities([EntityKind::AlbumName])
                    .validator(Validator::non_empty())
                    .describe("album name"),
                targets(false),
            ]))
            .requires(["write:albums"])
            .serves([IntentKind::CreateAlbum])
            .reversible(true),
    ]
}

fn query_schema() -> ParameterSchema {
    ParameterSchema::new(vec![
        ParameterSpec::optional("keywords", ParamType::Array)
            .from_entities([EntityKind::Keyword, EntityKind::Object])
            .collecting()
            .validator(Validator::string_items()),
        ParameterSpec::optional("location", ParamType::String)
            .from_entities([EntityKind::Location])
            .validator(Validator::non_empty()),
        ParameterSpec::optional("date_range", ParamType::Date).from_entities([EntityKind::Date]),
        ParameterSpec::optional("people", ParamType::Array)
            .from_entities([EntityKind::Person])
            .collecting()
            .validator(Validator::string_items()),
    ])
}

fn targets(required: bool) -> ParameterSpec {
    let spec = if required {
        ParameterSpec::required("targets", ParamType::Array)
    } else {
        ParameterSpec::optional("targets", ParamType::Array)
    };
    spec.from_entities([EntityKind::Quantity])
        .validator(Validator::targets())
        .describe("which photos, e.g. \"the last 5\"")
}
