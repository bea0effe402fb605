// ABOUTME: Data transforms applied to resolved task outputs
// ABOUTME: Extract, field map, filter, rename, aggregate and multi-source merge strategies

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::cmp::Ordering;
use std::str::FromStr;

use super::expression::{parse_path, walk};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transform {
    Extract {
        path: String,
    },
    Map {
        fields: IndexMap<String, String>,
    },
    Filter {
        field: String,
        operator: FilterOperator,
        value: Value,
    },
    Rename {
        fields: IndexMap<String, String>,
    },
    Aggregate {
        op: AggregateOp,
    },
}

impl Transform {
    pub fn apply(&self, data: &Value) -> Value {
        match self {
            Transform::Extract { path } => walk(data, &parse_path(path))
                .cloned()
                .unwrap_or(Value::Null),
            Transform::Map { fields } => map_fields(data, fields),
            Transform::Filter {
                field,
                operator,
                value,
            } => filter(data, field, *operator, value),
            Transform::Rename { fields } => rename_fields(data, fields),
            Transform::Aggregate { op } => match data {
                Value::Array(items) => op.apply(items),
                _ => Value::Null,
            },
        }
    }
}

/// Apply `f` to an object, or to each object of an array
fn per_object(data: &Value, f: &dyn Fn(&Map<String, Value>) -> Map<String, Value>) -> Value {
    match data {
        Value::Object(object) => Value::Object(f(object)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| match item {
                    Value::Object(object) => Value::Object(f(object)),
                    other => other.clone(),
                })
                .collect(),
        ),
        other => other.clone(),
    }
}

fn map_fields(data: &Value, fields: &IndexMap<String, String>) -> Value {
    per_object(data, &|object| {
        let mut mapped = Map::new();
        for (from, to) in fields {
            if let Some(value) = object.get(from) {
                mapped.insert(to.clone(), value.clone());
            }
        }
        for (key, value) in object {
            if !fields.contains_key(key) {
                mapped.insert(key.clone(), value.clone());
            }
        }
        mapped
    })
}

fn rename_fields(data: &Value, fields: &IndexMap<String, String>) -> Value {
    per_object(data, &|object| {
        object
            .iter()
            .map(|(key, value)| {
                let key = fields.get(key).unwrap_or(key);
                (key.clone(), value.clone())
            })
            .collect()
    })
}

fn filter(data: &Value, field: &str, operator: FilterOperator, expected: &Value) -> Value {
    match data {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .filter(|item| operator.matches(item.get(field), expected))
                .cloned()
                .collect(),
        ),
        Value::Object(object) => Value::Object(
            object
                .iter()
                .filter(|(key, value)| {
                    let entry = serde_json::json!({ "key": key, "value": value });
                    operator.matches(entry.get(field), expected)
                })
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOperator {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "contains")]
    Contains,
}

impl FromStr for FilterOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "==" => Ok(FilterOperator::Eq),
            "!=" => Ok(FilterOperator::Ne),
            ">" => Ok(FilterOperator::Gt),
            "<" => Ok(FilterOperator::Lt),
            ">=" => Ok(FilterOperator::Ge),
            "<=" => Ok(FilterOperator::Le),
            "in" => Ok(FilterOperator::In),
            "contains" => Ok(FilterOperator::Contains),
            other => Err(format!("unknown filter operator '{}'", other)),
        }
    }
}

impl FilterOperator {
    /// An item without the field never matches, whatever the operator
    pub fn matches(&self, actual: Option<&Value>, expected: &Value) -> bool {
        let Some(actual) = actual else {
            return false;
        };
        match self {
            FilterOperator::Eq => values_equal(actual, expected),
            FilterOperator::Ne => !values_equal(actual, expected),
            FilterOperator::Gt => compare(actual, expected) == Some(Ordering::Greater),
            FilterOperator::Lt => compare(actual, expected) == Some(Ordering::Less),
            FilterOperator::Ge => matches!(
                compare(actual, expected),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOperator::Le => matches!(
                compare(actual, expected),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FilterOperator::In => contains(expected, actual),
            FilterOperator::Contains => contains(actual, expected),
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Numbers compare numerically, strings lexically, anything else is unordered
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn contains(container: &Value, needle: &Value) -> bool {
    match (container, needle) {
        (Value::Array(items), _) => items.iter().any(|item| values_equal(item, needle)),
        (Value::String(haystack), Value::String(needle)) => haystack.contains(needle.as_str()),
        (Value::Object(object), Value::String(key)) => object.contains_key(key),
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateOp {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    First,
    Last,
}

impl AggregateOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateOp::Count => "count",
            AggregateOp::Sum => "sum",
            AggregateOp::Avg => "avg",
            AggregateOp::Min => "min",
            AggregateOp::Max => "max",
            AggregateOp::First => "first",
            AggregateOp::Last => "last",
        }
    }

    /// Aggregate a sequence. An empty sequence yields null for every op.
    pub fn apply(&self, items: &[Value]) -> Value {
        if items.is_empty() {
            return Value::Null;
        }

        match self {
            AggregateOp::Count => Value::from(items.len()),
            AggregateOp::First => items[0].clone(),
            AggregateOp::Last => items[items.len() - 1].clone(),
            AggregateOp::Sum => sum(items),
            AggregateOp::Avg => {
                let numbers: Vec<f64> = items.iter().filter_map(Value::as_f64).collect();
                if numbers.is_empty() {
                    return Value::Null;
                }
                float(numbers.iter().sum::<f64>() / numbers.len() as f64)
            }
            AggregateOp::Min => extreme(items, Ordering::Less),
            AggregateOp::Max => extreme(items, Ordering::Greater),
        }
    }
}

impl FromStr for AggregateOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(Value::String(s.trim().to_lowercase()))
            .map_err(|_| format!("unknown aggregate operation '{}'", s))
    }
}

fn float(value: f64) -> Value {
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

/// Integer sum when every numeric element is an integer, float sum otherwise
fn sum(items: &[Value]) -> Value {
    let numbers: Vec<&Value> = items.iter().filter(|item| item.is_number()).collect();
    if numbers.is_empty() {
        return Value::Null;
    }

    let integers: Option<i64> = numbers
        .iter()
        .try_fold(0i64, |acc, n| n.as_i64().and_then(|n| acc.checked_add(n)));
    match integers {
        Some(total) => Value::from(total),
        None => float(numbers.iter().filter_map(|n| n.as_f64()).sum()),
    }
}

/// Numeric extreme over numbers, or lexical extreme when every element is a string
fn extreme(items: &[Value], wanted: Ordering) -> Value {
    let numbers: Vec<&Value> = items.iter().filter(|item| item.is_number()).collect();
    let candidates: Vec<&Value> = if !numbers.is_empty() {
        numbers
    } else if items.iter().all(Value::is_string) {
        items.iter().collect()
    } else {
        return Value::Null;
    };

    candidates
        .into_iter()
        .reduce(|best, item| {
            if compare(item, best) == Some(wanted) {
                item
            } else {
                best
            }
        })
        .cloned()
        .unwrap_or(Value::Null)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    #[default]
    Merge,
    Overwrite,
    Concat,
}

/// Merge object sources in order. Non-object sources are skipped.
pub fn merge(sources: &[Value], strategy: MergeStrategy) -> Value {
    let mut merged = Map::new();
    for source in sources {
        let Value::Object(object) = source else {
            continue;
        };
        for (key, value) in object {
            match strategy {
                MergeStrategy::Merge | MergeStrategy::Overwrite => {
                    merged.insert(key.clone(), value.clone());
                }
                MergeStrategy::Concat => {
                    let slot = merged
                        .entry(key.clone())
                        .or_insert_with(|| Value::Array(Vec::new()));
                    if let Value::Array(values) = slot {
                        values.push(value.clone());
                    }
                }
            }
        }
    }
    Value::Object(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    #[test]
    fn test_extract() {
        let data = json!({"user": {"emails": ["a@x", "b@x"]}});
        let extract = Transform::Extract {
            path: "user.emails[1]".to_string(),
        };
        assert_eq!(extract.apply(&data), json!("b@x"));

        let missing = Transform::Extract {
            path: "user.phone".to_string(),
        };
        assert_eq!(missing.apply(&data), Value::Null);
    }

    #[test]
    fn test_map_preserves_unmapped_fields() {
        let data = json!({"first": "Ada", "last": "Lovelace", "born": 1815});
        let mapped = Transform::Map {
            fields: fields(&[("first", "given"), ("last", "family")]),
        }
        .apply(&data);
        assert_eq!(
            mapped,
            json!({"given": "Ada", "family": "Lovelace", "born": 1815})
        );
        let keys: Vec<&String> = mapped.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["given", "family", "born"]);
    }

    #[test]
    fn test_rename_keeps_key_order() {
        let data = json!([{"a": 1, "b": 2}, 5]);
        let renamed = Transform::Rename {
            fields: fields(&[("a", "x")]),
        }
        .apply(&data);
        assert_eq!(renamed, json!([{"x": 1, "b": 2}, 5]));
    }

    #[test]
    fn test_filter_list() {
        let data = json!([
            {"name": "cpu", "load": 0.9},
            {"name": "mem", "load": 0.4},
            {"name": "disk", "load": 0.7}
        ]);
        let busy = Transform::Filter {
            field: "load".to_string(),
            operator: FilterOperator::Ge,
            value: json!(0.7),
        }
        .apply(&data);
        assert_eq!(busy.as_array().unwrap().len(), 2);

        let named = Transform::Filter {
            field: "name".to_string(),
            operator: FilterOperator::In,
            value: json!(["mem", "gpu"]),
        }
        .apply(&data);
        assert_eq!(named, json!([{"name": "mem", "load": 0.4}]));
    }

    #[test]
    fn test_filter_drops_items_missing_the_field() {
        let data = json!([{"status": "ok"}, {"name": "no-status"}]);
        let not_failed = Transform::Filter {
            field: "status".to_string(),
            operator: FilterOperator::Ne,
            value: json!("failed"),
        }
        .apply(&data);
        assert_eq!(not_failed, json!([{"status": "ok"}]));

        let maybe_null = Transform::Filter {
            field: "status".to_string(),
            operator: FilterOperator::In,
            value: json!(["ok", null]),
        }
        .apply(&data);
        assert_eq!(maybe_null, json!([{"status": "ok"}]));

        assert!(!FilterOperator::Ne.matches(None, &json!(1)));
        assert!(FilterOperator::Eq.matches(Some(&Value::Null), &Value::Null));
    }

    #[test]
    fn test_filter_object_entries() {
        let data = json!({"alpha": 1, "beta": 5, "gamma": 9});
        let filtered = Transform::Filter {
            field: "value".to_string(),
            operator: FilterOperator::Gt,
            value: json!(3),
        }
        .apply(&data);
        assert_eq!(filtered, json!({"beta": 5, "gamma": 9}));

        let by_key = Transform::Filter {
            field: "key".to_string(),
            operator: FilterOperator::Contains,
            value: json!("mm"),
        }
        .apply(&data);
        assert_eq!(by_key, json!({"gamma": 9}));
    }

    #[test]
    fn test_aggregates() {
        let numbers = [json!(3), json!(1), json!(2)];
        assert_eq!(AggregateOp::Count.apply(&numbers), json!(3));
        assert_eq!(AggregateOp::Sum.apply(&numbers), json!(6));
        assert_eq!(AggregateOp::Avg.apply(&numbers), json!(2.0));
        assert_eq!(AggregateOp::Min.apply(&numbers), json!(1));
        assert_eq!(AggregateOp::Max.apply(&numbers), json!(3));
        assert_eq!(AggregateOp::First.apply(&numbers), json!(3));
        assert_eq!(AggregateOp::Last.apply(&numbers), json!(2));

        assert_eq!(AggregateOp::Sum.apply(&[json!(1), json!(0.5)]), json!(1.5));
        assert_eq!(AggregateOp::Max.apply(&[json!("pear"), json!("apple")]), json!("pear"));
    }

    #[test]
    fn test_empty_aggregates_are_null() {
        for op in ["count", "sum", "avg", "min", "max", "first", "last"] {
            let op: AggregateOp = op.parse().unwrap();
            assert_eq!(op.apply(&[]), Value::Null);
        }
    }

    #[test]
    fn test_merge_strategies() {
        let sources = [json!({"a": 1, "b": {"x": 1}}), json!({"b": {"y": 2}, "c": 3}), json!(7)];

        let merged = merge(&sources, MergeStrategy::Merge);
        assert_eq!(merged, json!({"a": 1, "b": {"y": 2}, "c": 3}));
        assert_eq!(merge(&sources, MergeStrategy::Overwrite), merged);

        let concat = merge(&sources, MergeStrategy::Concat);
        assert_eq!(
            concat,
            json!({"a": [1], "b": [{"x": 1}, {"y": 2}], "c": [3]})
        );
    }

    #[test]
    fn test_transform_from_yaml() {
        let yaml = r#"
type: filter
field: status
operator: "!="
value: failed
"#;
        let transform: Transform = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            transform,
            Transform::Filter {
                field: "status".to_string(),
                operator: FilterOperator::Ne,
                value: json!("failed"),
            }
        );
    }
}
