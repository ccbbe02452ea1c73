//! `shutter interpret <text>` - one-shot interpretation, optionally executed.

use anyhow::Result;
use shutter_core::Interpretation;

use super::{App, print_interpretation, print_result};

pub async fn run(app: &App, text: &str, execute: bool) -> Result<()> {
    let outcome = app.interpreter.interpret(text, None, &app.caller);
    print_interpretation(&outcome)?;

    let Interpretation::Ready(command) = &outcome else {
        return Ok(());
    };
    if !execute {
        return Ok(());
    }
    match app.interpreter.dispatch(command, &app.caller).await {
        Ok(result) => print_result(&result),
        Err(rejection) => anyhow::bail!("{rejection}"),
    }
}
