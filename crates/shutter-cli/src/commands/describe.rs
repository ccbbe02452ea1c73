//! `shutter describe <id>` - one descriptor with its JSON input schema.

use anyhow::{Context, Result};

use super::{App, print_json};

pub fn run(app: &App, action_id: &str) -> Result<()> {
    let summary = app
        .interpreter
        .describe(action_id)
        .with_context(|| format!("Cannot describe '{action_id}'"))?;
    print_json(&summary)
}
