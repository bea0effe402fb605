// ABOUTME: Session data context mapping completed task ids to their outputs
// ABOUTME: Cheap-to-clone snapshots used for expression resolution within a layer

use serde_json::{Map, Value};
use std::sync::Arc;

/// Completed outputs keyed by task id. Cloning shares the underlying map until
/// the next write, so per-layer snapshots cost one reference count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataContext {
    outputs: Arc<Map<String, Value>>,
}

impl DataContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, task_id: &str) -> Option<&Value> {
        self.outputs.get(task_id)
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.outputs.contains_key(task_id)
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Lookup table for the expression resolver
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.outputs
    }

    pub fn insert(&mut self, task_id: impl Into<String>, output: Value) {
        Arc::make_mut(&mut self.outputs).insert(task_id.into(), output);
    }

    /// Merge outputs, skipping nulls
    pub fn merge<I>(&mut self, outputs: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        for (task_id, output) in outputs {
            if !output.is_null() {
                self.insert(task_id, output);
            }
        }
    }

    pub fn clear(&mut self) {
        self.outputs = Arc::new(Map::new());
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.outputs.as_ref().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snapshot_is_isolated_from_writes() {
        let mut context = DataContext::new();
        context.insert("study", json!({"notes": "n"}));

        let snapshot = context.clone();
        context.insert("develop", json!({"code": "c"}));

        assert_eq!(snapshot.len(), 1);
        assert!(!snapshot.contains("develop"));
        assert_eq!(context.len(), 2);
        assert_eq!(context.get("study"), Some(&json!({"notes": "n"})));
    }

    #[test]
    fn test_merge_skips_null_outputs() {
        let mut context = DataContext::new();
        context.merge(vec![
            ("a".to_string(), json!(1)),
            ("b".to_string(), Value::Null),
        ]);

        assert!(context.contains("a"));
        assert!(!context.contains("b"));

        context.clear();
        assert!(context.is_empty());
        assert_eq!(context.to_value(), json!({}));
    }
}
