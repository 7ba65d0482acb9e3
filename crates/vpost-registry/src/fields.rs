//! Dotted-path partial updates over a JSON document.

use serde_json::{Map, Value};

/// Set `path` (dot-separated) to `value`, creating intermediate objects.
///
/// A `Null` value still overwrites; field removal is not needed; the
/// document schema treats null as absent.
pub fn apply_field(doc: &mut Value, path: &str, value: Value) {
    let mut current = doc;
    let mut parts = path.split('.').peekable();

    while let Some(part) = parts.next() {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let obj = current.as_object_mut().expect("object ensured above");
        if parts.peek().is_none() {
            obj.insert(part.to_string(), value);
            return;
        }
        current = obj
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sets_top_level_field() {
        let mut doc = json!({"status": "processing"});
        apply_field(&mut doc, "status", json!("failed"));
        assert_eq!(doc["status"], "failed");
    }

    #[test]
    fn creates_nested_objects() {
        let mut doc = json!({});
        apply_field(&mut doc, "steps.transcribe.status", json!("completed"));
        assert_eq!(doc["steps"]["transcribe"]["status"], "completed");
    }

    #[test]
    fn overwrites_non_object_intermediate() {
        let mut doc = json!({"steps": null});
        apply_field(&mut doc, "steps.seo.status", json!("processing"));
        assert_eq!(doc["steps"]["seo"]["status"], "processing");
    }

    #[test]
    fn null_overwrites_in_place() {
        let mut doc = json!({"error": "boom"});
        apply_field(&mut doc, "error", Value::Null);
        assert!(doc["error"].is_null());
    }
}
