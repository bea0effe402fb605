// ABOUTME: Expression resolver for task input mappings
// ABOUTME: Resolves {{ ref.path }} references, $name lookups, JSON literals and plain scalars

use indexmap::IndexMap;
use serde_json::{Map, Number, Value};

use super::error::{DataFlowError, Result};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Resolves expressions against a data context of task id to task output.
///
/// Resolution never fails: anything that cannot be resolved comes back as the
/// literal text. Only malformed expressions are reported, by validation.
#[derive(Debug, Clone, Default)]
pub struct ExpressionResolver;

impl ExpressionResolver {
    pub fn new() -> Self {
        Self
    }

    /// Check if a string contains reference expressions
    pub fn has_references(&self, text: &str) -> bool {
        text.contains(OPEN)
    }

    /// Check that every `{{` is closed before the next one opens and holds a path
    pub fn validate_expression(&self, text: &str) -> Result<()> {
        let mut rest = text;
        loop {
            let open = rest.find(OPEN);
            let close = rest.find(CLOSE);
            match (open, close) {
                (None, None) => return Ok(()),
                (Some(open), Some(close)) if open < close => {
                    let inner = &rest[open + OPEN.len()..close];
                    if inner.contains(OPEN) {
                        return Err(DataFlowError::NestedReference {
                            expression: text.to_string(),
                        });
                    }
                    if inner.trim().is_empty() {
                        return Err(DataFlowError::EmptyReference {
                            expression: text.to_string(),
                        });
                    }
                    rest = &rest[close + CLOSE.len()..];
                }
                _ => {
                    return Err(DataFlowError::UnbalancedBraces {
                        expression: text.to_string(),
                    })
                }
            }
        }
    }

    /// Resolve one expression string
    pub fn resolve(&self, expression: &str, context: &Map<String, Value>) -> Value {
        if self.has_references(expression) {
            if self.validate_expression(expression).is_err() {
                return Value::String(expression.to_string());
            }
            return self.resolve_references(expression, context);
        }

        if let Some(name) = expression.strip_prefix('$') {
            return match context.get(name) {
                Some(value) if !name.is_empty() && !value.is_null() => value.clone(),
                _ => Value::String(expression.to_string()),
            };
        }

        if expression.starts_with('{') || expression.starts_with('[') {
            return serde_json::from_str(expression)
                .unwrap_or_else(|_| Value::String(expression.to_string()));
        }

        parse_literal(expression)
    }

    /// Resolve strings as expressions, recursing into arrays and objects
    pub fn resolve_value(&self, value: &Value, context: &Map<String, Value>) -> Value {
        match value {
            Value::String(expression) => self.resolve(expression, context),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.resolve_value(item, context))
                    .collect(),
            ),
            Value::Object(object) => Value::Object(
                object
                    .iter()
                    .map(|(key, item)| (key.clone(), self.resolve_value(item, context)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Resolve every entry of a parameter mapping. A malformed entry fails with
    /// [`DataFlowError::InvalidParameter`] naming it.
    pub fn resolve_mapping(
        &self,
        mapping: &IndexMap<String, Value>,
        context: &Map<String, Value>,
    ) -> Result<IndexMap<String, Value>> {
        mapping
            .iter()
            .map(|(name, expression)| {
                self.validate_value(expression)
                    .map_err(|e| DataFlowError::InvalidParameter {
                        parameter: name.clone(),
                        source: Box::new(e),
                    })?;
                Ok((name.clone(), self.resolve_value(expression, context)))
            })
            .collect()
    }

    /// Validate every reference-bearing string inside `value`
    pub fn validate_value(&self, value: &Value) -> Result<()> {
        match value {
            Value::String(text) if self.has_references(text) => self.validate_expression(text),
            Value::Array(items) => items.iter().try_for_each(|item| self.validate_value(item)),
            Value::Object(object) => object
                .values()
                .try_for_each(|item| self.validate_value(item)),
            _ => Ok(()),
        }
    }

    fn resolve_references(&self, text: &str, context: &Map<String, Value>) -> Value {
        let spans = reference_spans(text);

        // A lone reference keeps the referenced value's type
        if let &[(start, end)] = spans.as_slice() {
            if text[..start].trim().is_empty() && text[end..].trim().is_empty() {
                let path = &text[start + OPEN.len()..end - CLOSE.len()];
                return match lookup(context, path) {
                    Some(value) => value.clone(),
                    None => Value::String(text.to_string()),
                };
            }
        }

        let mut rendered = String::with_capacity(text.len());
        let mut cursor = 0;
        for (start, end) in spans {
            rendered.push_str(&text[cursor..start]);
            let path = &text[start + OPEN.len()..end - CLOSE.len()];
            match lookup(context, path) {
                Some(Value::String(s)) => rendered.push_str(s),
                Some(value) => rendered.push_str(&value.to_string()),
                None => rendered.push_str(&text[start..end]),
            }
            cursor = end;
        }
        rendered.push_str(&text[cursor..]);
        Value::String(rendered)
    }
}

/// Byte ranges of each `{{ ... }}` reference, braces included
fn reference_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut cursor = 0;
    while let Some(offset) = text[cursor..].find(OPEN) {
        let start = cursor + offset;
        let Some(close) = text[start + OPEN.len()..].find(CLOSE) else {
            break;
        };
        let end = start + OPEN.len() + close + CLOSE.len();
        spans.push((start, end));
        cursor = end;
    }
    spans
}

/// Split `items[0].name` into `["items", "0", "name"]`
pub fn parse_path(path: &str) -> Vec<String> {
    path.trim()
        .replace('[', ".[")
        .split('.')
        .map(|segment| segment.trim().trim_start_matches('[').trim_end_matches(']'))
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

/// Walk `segments` from `root`. Numeric segments index arrays; any segment indexes objects.
pub fn walk<'a, S: AsRef<str>>(root: &'a Value, segments: &[S]) -> Option<&'a Value> {
    segments.iter().try_fold(root, |current, segment| {
        let segment = segment.as_ref();
        match current {
            Value::Array(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index)),
            Value::Object(object) => object.get(segment),
            _ => None,
        }
    })
}

/// Resolve a dotted path whose first segment is a context key. Null counts as missing.
pub fn lookup<'a>(context: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let segments = parse_path(path);
    let (head, tail) = segments.split_first()?;
    let value = walk(context.get(head)?, tail)?;
    (!value.is_null()).then_some(value)
}

/// Integer, then finite float, then the original string
pub fn parse_literal(text: &str) -> Value {
    let trimmed = text.trim();
    if let Ok(integer) = trimmed.parse::<i64>() {
        return Value::from(integer);
    }
    if let Some(number) = trimmed.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(number);
    }
    Value::String(text.to_string())
}
