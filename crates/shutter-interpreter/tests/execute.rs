//! Direct execution and dispatch of interpreted commands.
//!
//! Run with: cargo test --package shutter-interpreter --test execute

mod common;

use common::{editor, fixture, reader};
use serde_json::json;
use shutter_core::{ExecutionStatus, Parameters, ReasonCode};

fn params(value: serde_json::Value) -> Parameters {
    serde_json::from_value(value).unwrap()
}

#[tokio::test]
async fn test_execute_bulk_with_explicit_ids() {
    let f = fixture();
    let result = f
        .interpreter
        .execute(
            "tag-photos",
            params(json!({"targets": ["p1", "p2", "p3"], "tags": ["beach"]})),
            &editor(),
        )
        .await
        .unwrap();

    assert_eq!(result.status, ExecutionStatus::Succeeded);
    assert_eq!(result.per_target_results.len(), 3);
    assert!(result.rollback_token.is_some());

    let mut called = f.recorder.calls_for("tag-photos");
    called.sort();
    assert_eq!(
        called,
        vec![Some("p1".to_string()), Some("p2".to_string()), Some("p3".to_string())]
    );
}

#[tokio::test]
async fn test_execute_validates_before_dispatch() {
    let f = fixture();

    let missing = f
        .interpreter
        .execute("tag-photos", params(json!({"targets": ["p1"]})), &editor())
        .await
        .unwrap_err();
    assert_eq!(missing.reason, ReasonCode::MissingRequiredParameter);
    assert_eq!(missing.parameters, vec!["tags".to_string()]);

    let invalid = f
        .interpreter
        .execute(
            "move-photos",
            params(json!({"targets": ["p1"], "album": ""})),
            &editor(),
        )
        .await
        .unwrap_err();
    assert_eq!(invalid.reason, ReasonCode::ValidationFailed);

    let unknown = f
        .interpreter
        .execute("delete-photos", Parameters::new(), &editor())
        .await
        .unwrap_err();
    assert_eq!(unknown.reason, ReasonCode::UnknownAction);

    assert!(f.recorder.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_execute_checks_permissions() {
    let f = fixture();
    let rejection = f
        .interpreter
        .execute(
            "tag-photos",
            params(json!({"targets": ["p1"], "tags": ["beach"]})),
            &reader(),
        )
        .await
        .unwrap_err();
    assert_eq!(rejection.reason, ReasonCode::Forbidden);
    assert_eq!(rejection.parameters, vec!["write:photos".to_string()]);
    assert!(f.recorder.calls_for("tag-photos").is_empty());
}

#[tokio::test]
async fn test_dispatch_interpreted_selection() {
    let f = fixture();
    f.interpreter
        .interpret("tag these photos as vacation", Some("s"), &editor());
    let outcome = f.interpreter.interpret("the last 5", Some("s"), &editor());
    let command = outcome.as_command().unwrap().clone();

    let result = f.interpreter.dispatch(&command, &editor()).await.unwrap();
    assert_eq!(result.status, ExecutionStatus::Succeeded);
    assert_eq!(result.command_id, command.id);

    let mut targets = result.succeeded_targets();
    targets.sort();
    assert_eq!(targets, vec!["p10", "p6", "p7", "p8", "p9"]);
}

#[tokio::test]
async fn test_dispatch_rechecks_permissions() {
    let f = fixture();
    let outcome = f.interpreter.interpret(
        "find sunset photos from Europe last summer",
        None,
        &editor(),
    );
    let command = outcome.as_command().unwrap().clone();

    let caller = shutter_policy::Caller::with_permissions("nobody", Vec::<String>::new());
    let rejection = f.interpreter.dispatch(&command, &caller).await.unwrap_err();
    assert_eq!(rejection.reason, ReasonCode::Forbidden);

    let result = f.interpreter.dispatch(&command, &reader()).await.unwrap();
    assert_eq!(result.status, ExecutionStatus::Succeeded);
    assert_eq!(f.recorder.calls_for("search-photos"), vec![None]);
}

#[tokio::test]
async fn test_rollback_through_interpreter() {
    let f = fixture();
    let result = f
        .interpreter
        .execute(
            "move-photos",
            params(json!({"targets": ["p1", "p2"], "album": "Holidays"})),
            &editor(),
        )
        .await
        .unwrap();
    let token = result.rollback_token.unwrap();

    // reverting needs the permissions of the action; a refusal keeps the token
    let refused = f.interpreter.rollback(token, &reader()).await.unwrap_err();
    assert_eq!(refused.reason, ReasonCode::Forbidden);
    assert_eq!(
        refused.parameters,
        vec!["write:albums".to_string(), "write:photos".to_string()]
    );
    assert!(f.recorder.reverted_for("move-photos").is_empty());

    let report = f.interpreter.rollback(token, &editor()).await.unwrap();
    assert_eq!(report.results.len(), 2);
    let mut reverted = f.recorder.reverted_for("move-photos");
    reverted.sort();
    assert_eq!(reverted, vec![Some("p1".to_string()), Some("p2".to_string())]);

    // tokens are single-use
    let reused = f.interpreter.rollback(token, &editor()).await.unwrap_err();
    assert_eq!(reused.reason, ReasonCode::HandlerError);
}

#[tokio::test]
async fn test_refused_dispatch_closes_progress() {
    let f = fixture();
    let outcome = f.interpreter.interpret("tag these photos as vacation", Some("s"), &editor());
    assert!(outcome.as_clarification().is_some());
    let command = f
        .interpreter
        .interpret("the last 5", Some("s"), &editor())
        .as_command()
        .unwrap()
        .clone();

    let forward = f.interpreter.dispatcher().on_progress(command.id, |_| {});
    let rejection = f.interpreter.dispatch(&command, &reader()).await.unwrap_err();
    assert_eq!(rejection.reason, ReasonCode::Forbidden);

    tokio::time::timeout(std::time::Duration::from_secs(1), forward)
        .await
        .expect("progress forwarding should stop")
        .unwrap();
}
