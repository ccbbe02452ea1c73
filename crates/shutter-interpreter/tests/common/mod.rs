//! Shared fixtures: an in-memory photo catalog behind the standard actions.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Value, json};
use shutter_actions::{
    ActionHandler, ActionRegistry, Dispatcher, HandlerError, PhotoHandlers, TargetResolver,
    photo_catalog,
};
use shutter_core::{Parameters, Quantity, Selector, ShutterConfig};
use shutter_interpreter::Interpreter;
use shutter_policy::{Caller, SubsetPolicy};
use std::sync::{Arc, Mutex};

pub const READ: &str = "read:photos";
pub const WRITE: &str = "write:photos";
pub const ALBUMS: &str = "write:albums";

/// Photo ids `p1..=p10`, oldest first.
pub fn photo_ids() -> Vec<String> {
    (1..=10).map(|n| format!("p{n}")).collect()
}

/// Records every invocation as `(action, target)`.
#[derive(Default)]
pub struct Recorder {
    pub calls: Mutex<Vec<(String, Option<String>)>>,
    pub reverted: Mutex<Vec<(String, Option<String>)>>,
}

impl Recorder {
    pub fn calls_for(&self, action: &str) -> Vec<Option<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(a, _)| a == action)
            .map(|(_, t)| t.clone())
            .collect()
    }

    pub fn reverted_for(&self, action: &str) -> Vec<Option<String>> {
        self.reverted
            .lock()
            .unwrap()
            .iter()
            .filter(|(a, _)| a == action)
            .map(|(_, t)| t.clone())
            .collect()
    }
}

struct Recording {
    action: &'static str,
    recorder: Arc<Recorder>,
}

#[async_trait]
impl ActionHandler for Recording {
    async fn invoke(&self, target: Option<&str>, parameters: &Parameters) -> Result<Value, HandlerError> {
        self.recorder
            .calls
            .lock()
            .unwrap()
            .push((self.action.to_string(), target.map(String::from)));
        Ok(json!({"action": self.action, "target": target, "parameters": parameters}))
    }

    async fn revert(&self, target: Option<&str>, _parameters: &Parameters, _output: &Value) -> Result<(), HandlerError> {
        self.recorder
            .reverted
            .lock()
            .unwrap()
            .push((self.action.to_string(), target.map(String::from)));
        Ok(())
    }
}

/// Resolves selections against [`photo_ids`].
pub struct Library;

#[async_trait]
impl TargetResolver for Library {
    async fn resolve(&self, _action_id: &str, selection: &Quantity) -> Result<Vec<String>, HandlerError> {
        let ids = photo_ids();
        let n = selection.count.map_or(ids.len(), |c| c as usize).min(ids.len());
        Ok(match selection.selector {
            Selector::All => ids,
            Selector::Last => ids[ids.len() - n..].to_vec(),
            Selector::First | Selector::These | Selector::Count => ids[..n].to_vec(),
        })
    }
}

pub struct Fixture {
    pub interpreter: Interpreter,
    pub recorder: Arc<Recorder>,
}

pub fn fixture() -> Fixture {
    fixture_with(ShutterConfig::default())
}

pub fn fixture_with(config: ShutterConfig) -> Fixture {
    let recorder = Arc::new(Recorder::default());
    let handler = |action: &'static str| -> Arc<dyn ActionHandler> {
        Arc::new(Recording {
            action,
            recorder: recorder.clone(),
        })
    };
    let handlers = PhotoHandlers {
        search: handler("search-photos"),
        filter: handler("filter-photos"),
        tag: handler("tag-photos"),
        move_photos: handler("move-photos"),
        create_album: handler("create-album"),
    };

    let registry = Arc::new(ActionRegistry::new());
    for descriptor in photo_catalog(handlers) {
        registry.register(descriptor).unwrap();
    }
    let dispatcher = Arc::new(
        Dispatcher::new(registry, config.dispatch.clone()).with_resolver(Arc::new(Library)),
    );
    let interpreter = Interpreter::new(&config, dispatcher, Arc::new(SubsetPolicy)).unwrap();
    Fixture {
        interpreter,
        recorder,
    }
}

pub fn reader() -> Caller {
    Caller::with_permissions("reader", [READ])
}

pub fn editor() -> Caller {
    Caller::with_permissions("editor", [READ, WRITE, ALBUMS])
}
