//! `shutter actions` - list the actions the caller may run.

use anyhow::Result;

use super::{App, print_json};

pub fn run(app: &App, json: bool) -> Result<()> {
    let actions = app.interpreter.discover(&app.caller.permissions);
    if json {
        return print_json(&actions);
    }

    println!("Actions available to {} ({}):", app.caller.id, actions.len());
    for action in &actions {
        let mut badges = vec![if action.bulk { "bulk" } else { "single" }];
        if action.idempotent {
            badges.push("idempotent");
        }
        if action.reversible {
            badges.push("reversible");
        }
        println!("  {:<14} {} ({})", action.id, action.name, badges.join(", "));
        if !action.description.is_empty() {
            println!("  {:<14} {}", "", action.description);
        }
        println!("  {:<14} requires: {}", "", action.required_permissions.join(", "));
    }
    Ok(())
}
