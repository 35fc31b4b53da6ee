//! One-line JSON summaries printed by the pipeline binaries.
//!
//! stdout carries exactly one line per run so callers can parse it; logs go
//! to stderr and the log file.

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::error::PipelineError;
use crate::resolve::ResolveOutcome;

/// `{"ok":true, ...report}`.
pub fn success_line<T: Serialize>(report: &T) -> String {
    let mut line = Map::new();
    line.insert("ok".to_string(), Value::Bool(true));
    match serde_json::to_value(report) {
        Ok(Value::Object(fields)) => line.extend(fields),
        Ok(Value::Null) | Err(_) => {}
        Ok(other) => {
            line.insert("result".to_string(), other);
        }
    }
    Value::Object(line).to_string()
}

/// `{"ok":false,"kind":...,"error":...}`.
pub fn failure_line(err: &PipelineError) -> String {
    json!({
        "ok": false,
        "kind": err.kind(),
        "error": err.to_string(),
    })
    .to_string()
}

/// Summary for the single-record path; a skip is reported as not-ok but is not a failure.
pub fn resolve_line(outcome: &ResolveOutcome) -> String {
    match outcome {
        ResolveOutcome::Updated { .. } => success_line(outcome),
        ResolveOutcome::Skipped { id, status } => json!({
            "ok": false,
            "skipped": true,
            "id": id,
            "status": status,
            "reason": format!("Product not pending (status={status})"),
        })
        .to_string(),
    }
}

/// Print the summary for `result` and return the process exit code.
pub fn finish<T: Serialize>(result: Result<T, PipelineError>) -> i32 {
    finish_with(result, |report| success_line(report))
}

/// Like [`finish`] with a custom success rendering.
pub fn finish_with<T>(result: Result<T, PipelineError>, render: impl FnOnce(&T) -> String) -> i32 {
    match result {
        Ok(report) => {
            println!("{}", render(&report));
            0
        }
        Err(err) => {
            tracing::error!("{err}");
            println!("{}", failure_line(&err));
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ProductStatus;
    use crate::reconcile::ReconcileReport;

    fn parse(line: &str) -> Value {
        serde_json::from_str(line).unwrap()
    }

    #[test]
    fn success_merges_report_fields() {
        let line = success_line(&ReconcileReport {
            selected: 2,
            updated: 2,
            failed: 0,
        });
        assert_eq!(
            parse(&line),
            json!({ "ok": true, "selected": 2, "updated": 2, "failed": 0 })
        );
        assert!(!line.contains('\n'));
    }

    #[test]
    fn failure_carries_kind_and_message() {
        let line = failure_line(&PipelineError::NotFound(42));
        assert_eq!(
            parse(&line),
            json!({
                "ok": false,
                "kind": "not_found",
                "error": "Product with id 42 not found",
            })
        );
    }

    #[test]
    fn skipped_outcome_echoes_status() {
        let line = resolve_line(&ResolveOutcome::Skipped {
            id: 42,
            status: ProductStatus::History,
        });
        let value = parse(&line);
        assert_eq!(value["ok"], json!(false));
        assert_eq!(value["skipped"], json!(true));
        assert_eq!(value["status"], json!("history"));
        assert_eq!(value["reason"], json!("Product not pending (status=history)"));
    }

    #[test]
    fn updated_outcome_is_ok() {
        let line = resolve_line(&ResolveOutcome::Updated {
            id: 3,
            predicted_weight: 1.5,
            status: ProductStatus::Pending,
        });
        let value = parse(&line);
        assert_eq!(value["ok"], json!(true));
        assert_eq!(value["outcome"], json!("updated"));
        assert_eq!(value["predicted_weight"], json!(1.5));
    }

    #[test]
    fn exit_codes_follow_result() {
        assert_eq!(finish(Ok(ReconcileReport::default())), 0);
        assert_eq!(finish::<ReconcileReport>(Err(PipelineError::EmptySource)), 1);
    }
}
