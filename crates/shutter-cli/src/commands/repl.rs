//! `shutter repl` - multi-turn session.
//!
//! Plain lines are utterances interpreted in one session, so clarification
//! questions can be answered on the next line. Ready commands run in the
//! background with progress on stderr; `:cancel` stops the latest one.

use anyhow::Result;
use shutter_actions::ProgressEvent;
use shutter_core::{Interpretation, RollbackToken};
use std::io::{BufRead, Write};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{App, print_interpretation, print_json, print_result};

const HELP: &str = "\
Type a request, e.g. \"find sunset photos from Europe last summer\".
  :cancel [command-id]   cancel the latest (or given) running command
  :rollback <token>      undo a reversible command
  :pending               show the pending clarification
  :selection             show the current selection
  :help                  this text
  :quit                  leave";

#[derive(Debug, PartialEq)]
enum Input {
    Utterance(String),
    Cancel(Option<Uuid>),
    Rollback(RollbackToken),
    Pending,
    Selection,
    Help,
    Quit,
    Invalid(String),
}

fn parse(line: &str) -> Input {
    let line = line.trim();
    let Some(directive) = line.strip_prefix(':') else {
        return Input::Utterance(line.to_string());
    };
    let mut words = directive.split_whitespace();
    let name = words.next().unwrap_or_default();
    let arg = words.next();
    match (name, arg) {
        ("quit" | "q" | "exit", _) => Input::Quit,
        ("help" | "h", _) => Input::Help,
        ("pending", _) => Input::Pending,
        ("selection", _) => Input::Selection,
        ("cancel", None) => Input::Cancel(None),
        ("cancel", Some(id)) => match Uuid::parse_str(id) {
            Ok(id) => Input::Cancel(Some(id)),
            Err(_) => Input::Invalid(format!("not a command id: {id}")),
        },
        ("rollback", Some(token)) => match token.parse() {
            Ok(token) => Input::Rollback(token),
            Err(_) => Input::Invalid(format!("not a rollback token: {token}")),
        },
        ("rollback", None) => Input::Invalid(":rollback needs a token".to_string()),
        (other, _) => Input::Invalid(format!("unknown directive :{other}")),
    }
}

pub async fn run(app: App, session: &str) -> Result<()> {
    let app = Arc::new(app);

    // stdin is blocking; feed lines through a channel so ctrl-c stays responsive
    let (tx, mut lines) = mpsc::channel::<String>(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    println!("{HELP}");
    let mut latest: Option<Uuid> = None;
    loop {
        prompt();
        let line = tokio::select! {
            line = lines.recv() => match line {
                Some(line) => line,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                if let Some(id) = latest {
                    app.interpreter.cancel(id);
                }
                println!();
                break;
            }
        };

        match parse(&line) {
            Input::Utterance(text) if text.is_empty() => {}
            Input::Utterance(text) => {
                let outcome = app.interpreter.interpret(&text, Some(session), &app.caller);
                print_interpretation(&outcome)?;
                if let Interpretation::Ready(command) = outcome {
                    latest = Some(command.id);
                    spawn_dispatch(app.clone(), command);
                }
            }
            Input::Cancel(id) => match id.or(latest) {
                Some(id) if app.interpreter.cancel(id) => println!("cancelling {id}"),
                Some(id) => println!("{id} is not running"),
                None => println!("nothing to cancel"),
            },
            Input::Rollback(token) => match app.interpreter.rollback(token, &app.caller).await {
                Ok(report) => print_json(&report)?,
                Err(err) => println!("rollback failed: {err}"),
            },
            Input::Pending => match app.interpreter.pending(session) {
                Some(request) => println!("pending: {}", request.message),
                None => println!("nothing pending"),
            },
            Input::Selection => println!("{}", app.library.selection().join(", ")),
            Input::Help => println!("{HELP}"),
            Input::Quit => break,
            Input::Invalid(message) => println!("{message}"),
        }
    }
    Ok(())
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

fn spawn_dispatch(app: Arc<App>, command: shutter_core::Command) {
    let progress = app
        .interpreter
        .dispatcher()
        .on_progress(command.id, |event| {
            if let ProgressEvent::Progress { completed, total, .. } = event {
                eprintln!("  [{completed}/{total}]");
            }
        });

    tokio::spawn(async move {
        match app.interpreter.dispatch(&command, &app.caller).await {
            Ok(result) => {
                if let Err(err) = print_result(&result) {
                    tracing::warn!(command_id = %command.id, error = %err, "Failed to print result");
                }
            }
            Err(rejection) => {
                progress.abort();
                println!("rejected: {rejection}");
            }
        }
        prompt();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_directives() {
        assert_eq!(parse("  tag these as beach "), Input::Utterance("tag these as beach".into()));
        assert_eq!(parse(":quit"), Input::Quit);
        assert_eq!(parse(":cancel"), Input::Cancel(None));

        let id = Uuid::new_v4();
        assert_eq!(parse(&format!(":cancel {id}")), Input::Cancel(Some(id)));
        assert_eq!(parse(&format!(":rollback {id}")), Input::Rollback(RollbackToken(id)));

        assert!(matches!(parse(":rollback"), Input::Invalid(_)));
        assert!(matches!(parse(":rollback nope"), Input::Invalid(_)));
        assert!(matches!(parse(":frobnicate"), Input::Invalid(_)));
    }
}
