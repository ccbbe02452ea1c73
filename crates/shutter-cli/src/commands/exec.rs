//! `shutter exec <id> --params <json>` - direct execution.

use anyhow::{Context, Result};
use shutter_core::Parameters;

use super::{App, print_result};

pub async fn run(app: &App, action_id: &str, params: &str) -> Result<()> {
    let parameters: Parameters =
        serde_json::from_str(params).context("--params must be a JSON object")?;

    match app.interpreter.execute(action_id, parameters, &app.caller).await {
        Ok(result) => print_result(&result),
        Err(rejection) => anyhow::bail!("{rejection}"),
    }
}
