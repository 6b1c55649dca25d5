#![forbid(unsafe_code)]

use cb_storage::{BulkOutcome, StoreError};
use serde::Serialize;
use serde_json::{Value, json};

pub(crate) fn ok(intent: &str, at: &str, result: Value) -> Value {
    json!({
        "success": true,
        "intent": intent,
        "at": at,
        "result": result,
        "error": null
    })
}

pub(crate) fn error_with(code: &str, message: &str, recovery: Option<&str>) -> Value {
    let mut error_obj = serde_json::Map::new();
    error_obj.insert("code".to_string(), Value::String(code.to_string()));
    error_obj.insert(
        "message".to_string(),
        Value::String(message.trim().to_string()),
    );
    if let Some(recovery) = recovery {
        error_obj.insert(
            "recovery".to_string(),
            Value::String(recovery.trim().to_string()),
        );
    }

    json!({
        "success": false,
        "intent": "error",
        "result": {},
        "error": Value::Object(error_obj)
    })
}

pub(crate) fn store_error(err: &StoreError) -> Value {
    error_with(err.code(), &err.to_string(), recovery_hint(err))
}

fn recovery_hint(err: &StoreError) -> Option<&'static str> {
    match err {
        StoreError::Validation(_) => Some("Fix the named field and retry."),
        StoreError::State { .. } => Some("Refresh the assignment or template and retry."),
        StoreError::Conflict { .. } => {
            Some("Someone else changed this first; list available chores again.")
        }
        StoreError::Unauthorized { .. } => Some("Act as a parent of the same family."),
        StoreError::NotFound { .. } => None,
        StoreError::ResetRequired(_) => {
            Some("Move the storage directory aside and start with a fresh store.")
        }
        StoreError::Corrupt(_) | StoreError::Io(_) | StoreError::Sql(_) => None,
    }
}

/// One entry per bulk item, in request order; failures carry their own code.
pub(crate) fn bulk<T: Serialize>(outcomes: Vec<BulkOutcome<T>>) -> Result<Value, serde_json::Error> {
    let mut items = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        let entry = match outcome.result {
            Ok(value) => json!({
                "assignmentId": outcome.assignment_id,
                "ok": true,
                "result": serde_json::to_value(value)?,
            }),
            Err(err) => json!({
                "assignmentId": outcome.assignment_id,
                "ok": false,
                "error": { "code": err.code(), "message": err.to_string() },
            }),
        };
        items.push(entry);
    }
    Ok(Value::Array(items))
}

pub(crate) fn render(value: &Value, pretty: bool) -> String {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    rendered.unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cb_core::AssignmentId;

    #[test]
    fn error_envelope_carries_code_and_recovery() {
        let value = store_error(&StoreError::Conflict {
            reason: "pool chore already claimed".to_string(),
        });
        assert_eq!(value["success"], false);
        assert_eq!(value["error"]["code"], "CONFLICT");
        assert_eq!(value["error"]["message"], "conflict: pool chore already claimed");
        assert!(value["error"]["recovery"].is_string());

        let missing = store_error(&StoreError::NotFound {
            kind: "assignment",
            id: "ASN-0009".to_string(),
        });
        assert!(missing["error"].get("recovery").is_none());
    }

    #[test]
    fn bulk_entries_keep_request_order() {
        let outcomes = vec![
            BulkOutcome {
                assignment_id: AssignmentId::try_new("ASN-0002").unwrap(),
                result: Ok(1),
            },
            BulkOutcome {
                assignment_id: AssignmentId::try_new("ASN-0001").unwrap(),
                result: Err(StoreError::State {
                    reason: "not completed".to_string(),
                }),
            },
        ];
        let value = bulk(outcomes).expect("bulk");
        assert_eq!(value[0]["assignmentId"], "ASN-0002");
        assert_eq!(value[0]["ok"], true);
        assert_eq!(value[1]["ok"], false);
        assert_eq!(value[1]["error"]["code"], "STATE");
    }
}
