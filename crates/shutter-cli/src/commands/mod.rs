//! CLI command implementations.

pub mod actions;
pub mod describe;
pub mod exec;
pub mod interpret;
pub mod repl;

use anyhow::{Context, Result};
use shutter_actions::{ActionRegistry, Dispatcher, photo_catalog};
use shutter_core::{ExecutionResult, Interpretation, ShutterConfig};
use shutter_interpreter::Interpreter;
use shutter_policy::{Caller, SubsetPolicy};
use std::path::Path;
use std::sync::Arc;

use crate::library::PhotoLibrary;

/// Load configuration, falling back to defaults, and make sure the standard
/// roles exist.
pub fn load_config(path: Option<&Path>) -> Result<ShutterConfig> {
    let mut config = match path {
        Some(path) => ShutterConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => ShutterConfig::default(),
    };
    config
        .roles
        .entry("viewer".to_string())
        .or_insert_with(|| vec!["read:photos".to_string()]);
    config.roles.entry("editor".to_string()).or_insert_with(|| {
        ["read:photos", "write:photos", "write:albums"]
            .map(String::from)
            .to_vec()
    });
    Ok(config)
}

/// Everything a command needs: the interpreter over a seeded library and
/// the caller's identity.
pub struct App {
    pub interpreter: Interpreter,
    pub library: Arc<PhotoLibrary>,
    pub caller: Caller,
}

impl App {
    pub fn new(config: ShutterConfig, role: &str, grants: &[String]) -> Result<Self> {
        let caller = Caller::from_role(&config, format!("cli:{role}"), role, grants)
            .with_context(|| {
                let known: Vec<&str> = config.roles.keys().map(String::as_str).collect();
                format!("Unknown role '{role}' (known: {})", known.join(", "))
            })?;

        let library = Arc::new(PhotoLibrary::seeded());
        let registry = Arc::new(ActionRegistry::new());
        for descriptor in photo_catalog(library.handlers()) {
            registry.register(descriptor)?;
        }
        let dispatcher = Dispatcher::new(registry, config.dispatch.clone()).with_resolver(library.clone());
        let interpreter = Interpreter::new(&config, Arc::new(dispatcher), Arc::new(SubsetPolicy))?;

        tracing::debug!(caller = %caller.id, role = %role, "CLI ready");
        Ok(Self {
            interpreter,
            library,
            caller,
        })
    }
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// One-line summary followed by the full interpretation as JSON.
pub fn print_interpretation(outcome: &Interpretation) -> Result<()> {
    match outcome {
        Interpretation::Ready(command) => println!(
            "ready: {} (confidence {:.2})",
            command.action_id, command.confidence
        ),
        Interpretation::Clarification(request) => println!("clarify: {}", request.message),
        Interpretation::Rejected(rejection) => println!("rejected: {rejection}"),
    }
    print_json(outcome)
}

pub fn print_result(result: &ExecutionResult) -> Result<()> {
    println!(
        "{}: {} of {} targets succeeded",
        result.status,
        result.succeeded_count(),
        result.per_target_results.len()
    );
    if let Some(message) = &result.message {
        println!("  {message}");
    }
    if let Some(token) = &result.rollback_token {
        println!("  rollback token: {token}");
    }
    print_json(result)
}
