//! Evaluation of parsed path steps over `serde_json::Value`.

use super::{CompareOp, Filter, JsonPathError, Step};
use serde_json::Value;
use std::cmp::Ordering;

pub(crate) fn eval_steps<'a>(
    steps: &[Step],
    mut current: Vec<&'a Value>,
) -> Result<Vec<&'a Value>, JsonPathError> {
    for step in steps {
        current = eval_step(step, current)?;
    }
    Ok(current)
}

fn eval_step<'a>(step: &Step, input: Vec<&'a Value>) -> Result<Vec<&'a Value>, JsonPathError> {
    if input.is_empty() {
        return Ok(input);
    }

    match step {
        Step::Field(name) => {
            let results: Vec<&Value> = input
                .iter()
                .filter_map(|v| v.as_object().and_then(|o| o.get(name)))
                .collect();
            if results.is_empty() {
                return Err(JsonPathError::NotFound(name.clone()));
            }
            Ok(results)
        }
        Step::Fields(names) => {
            let results: Vec<&Value> = input
                .iter()
                .filter_map(|v| v.as_object())
                .flat_map(|o| names.iter().filter_map(move |n| o.get(n)))
                .collect();
            if results.is_empty() {
                return Err(JsonPathError::NotFound(names.join(",")));
            }
            Ok(results)
        }
        Step::Wildcard => Ok(input.into_iter().flat_map(children).collect()),
        Step::Recursive => {
            let mut results = Vec::new();
            for value in input {
                collect_descendants(value, &mut results);
            }
            Ok(results)
        }
        Step::Index(indexes) => {
            let mut results = Vec::new();
            for value in input {
                let items = as_array(value)?;
                for &index in indexes {
                    results.push(index_into(items, index)?);
                }
            }
            Ok(results)
        }
        Step::Slice { start, end, step } => {
            let step = step.unwrap_or(1);
            if step <= 0 {
                return Err(JsonPathError::InvalidStep(step));
            }
            let mut results = Vec::new();
            for value in input {
                let items = as_array(value)?;
                let from = clamp(start.unwrap_or(0), items.len());
                let to = clamp(end.unwrap_or(i64::MAX), items.len());
                // step > 0 was checked above
                let stride = usize::try_from(step).unwrap_or(usize::MAX);
                if from < to {
                    results.extend(items[from..to].iter().step_by(stride));
                }
            }
            Ok(results)
        }
        Step::Filter(filter) => {
            let mut results = Vec::new();
            for value in input {
                let Some(items) = value.as_array() else {
                    continue;
                };
                results.extend(items.iter().filter(|item| filter_matches(filter, item)));
            }
            Ok(results)
        }
    }
}

fn children(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => map.values().collect(),
        _ => Vec::new(),
    }
}

/// The value itself followed by all descendants, depth first
fn collect_descendants<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    out.push(value);
    for child in children(value) {
        collect_descendants(child, out);
    }
}

fn as_array(value: &Value) -> Result<&Vec<Value>, JsonPathError> {
    value
        .as_array()
        .ok_or_else(|| JsonPathError::NotArray(value.to_string()))
}

fn index_into(items: &[Value], index: i64) -> Result<&Value, JsonPathError> {
    let length = items.len();
    let signed_len = i64::try_from(length).unwrap_or(i64::MAX);
    let resolved = if index < 0 { index + signed_len } else { index };
    usize::try_from(resolved)
        .ok()
        .and_then(|i| items.get(i))
        .ok_or(JsonPathError::IndexOutOfBounds {
            index: resolved,
            length,
        })
}

/// Python-style bound: negative counts from the end, clamped to `[0, len]`
fn clamp(bound: i64, len: usize) -> usize {
    let signed_len = i64::try_from(len).unwrap_or(i64::MAX);
    let resolved = if bound < 0 { bound.saturating_add(signed_len) } else { bound };
    usize::try_from(resolved.clamp(0, signed_len)).unwrap_or(len)
}

fn filter_matches(filter: &Filter, item: &Value) -> bool {
    let Ok(lefts) = eval_steps(&filter.path, vec![item]) else {
        return false;
    };
    match &filter.comparison {
        None => lefts.iter().any(|v| !v.is_null()),
        Some((op, literal)) => lefts.iter().any(|left| compare(left, *op, literal)),
    }
}

fn compare(left: &Value, op: CompareOp, right: &Value) -> bool {
    let ordering = match (left, right) {
        (Value::Number(l), Value::Number(r)) => match (l.as_f64(), r.as_f64()) {
            (Some(l), Some(r)) => l.partial_cmp(&r),
            _ => None,
        },
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        _ => None,
    };

    match op {
        CompareOp::Eq => ordering.map_or(left == right, Ordering::is_eq),
        CompareOp::Ne => ordering.map_or(left != right, Ordering::is_ne),
        CompareOp::Lt => ordering.is_some_and(Ordering::is_lt),
        CompareOp::Le => ordering.is_some_and(Ordering::is_le),
        CompareOp::Gt => ordering.is_some_and(Ordering::is_gt),
        CompareOp::Ge => ordering.is_some_and(Ordering::is_ge),
    }
}
