//! The AG-UI wire event (C5 output, §3/§4.5).

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
#[serde(rename_all = "camelCase")]
pub enum AguiEvent {
    RunStarted { thread_id: String, run_id: String },
    RunFinished { thread_id: String, run_id: String },
    TextMessageStart { message_id: String, role: String },
    TextMessageContent { message_id: String, delta: String },
    TextMessageEnd { message_id: String },
    ReasoningMessageStart { message_id: String },
    ReasoningMessageContent { message_id: String, delta: String },
    ReasoningMessageEnd { message_id: String },
    ToolCallStart { tool_call_id: String, tool_call_name: String },
    ToolCallArgs { tool_call_id: String, delta: String },
    ToolCallEnd { tool_call_id: String },
    ToolCallResult { tool_call_id: String, content: String },
    StateSnapshot { state: Value },
    StateDelta { patch: Vec<Value> },
    Raw { payload: Value },
}

/// One RFC-6901-flavored JSON-Patch operation, as used by `StateDelta`.
#[derive(Debug, Clone, Serialize)]
pub struct PatchOp {
    pub op: &'static str,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

fn escape_pointer_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Structural diff between two JSON values, emitted as RFC-6901 JSON
/// Pointer paths rooted at `base_path` (usually `""`). Object keys present
/// only in `before` become `remove`; keys only in `after` or with a
/// changed value become `add`/`replace` respectively. Arrays and scalars
/// that differ are replaced wholesale at their own path.
pub fn diff_json(before: &Value, after: &Value, base_path: &str) -> Vec<PatchOp> {
    let mut ops = Vec::new();
    diff_into(before, after, base_path, &mut ops);
    ops
}

fn diff_into(before: &Value, after: &Value, path: &str, ops: &mut Vec<PatchOp>) {
    if before == after {
        return;
    }
    match (before, after) {
        (Value::Object(b), Value::Object(a)) => {
            for (key, before_value) in b {
                let child_path = format!("{path}/{}", escape_pointer_segment(key));
                match a.get(key) {
                    Some(after_value) => diff_into(before_value, after_value, &child_path, ops),
                    None => ops.push(PatchOp { op: "remove", path: child_path, value: None }),
                }
            }
            for (key, after_value) in a {
                if !b.contains_key(key) {
                    let child_path = format!("{path}/{}", escape_pointer_segment(key));
                    ops.push(PatchOp { op: "add", path: child_path, value: Some(after_value.clone()) });
                }
            }
        }
        _ => ops.push(PatchOp { op: "replace", path: path.to_string(), value: Some(after.clone()) }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identical_values_produce_no_ops() {
        let v = json!({"a": 1});
        assert!(diff_json(&v, &v, "").is_empty());
    }

    #[test]
    fn changed_leaf_is_a_replace_at_its_own_path() {
        let before = json!({"a": 1, "b": 2});
        let after = json!({"a": 1, "b": 3});
        let ops = diff_json(&before, &after, "");
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].op, "replace");
        assert_eq!(ops[0].path, "/b");
    }

    #[test]
    fn special_characters_are_escaped_per_rfc6901() {
        let before = json!({"a/b~c": 1});
        let after = json!({"a/b~c": 2});
        let ops = diff_json(&before, &after, "");
        assert_eq!(ops[0].path, "/a~1b~0c");
    }

    #[test]
    fn key_removed_and_key_added_are_distinguished() {
        let before = json!({"a": 1});
        let after = json!({"b": 2});
        let mut ops = diff_json(&before, &after, "");
        ops.sort_by(|x, y| x.op.cmp(y.op));
        assert_eq!(ops[0].op, "add");
        assert_eq!(ops[1].op, "remove");
    }
}
