//! Built-in tasks available in every worker started from the bundled binary

use super::{TaskError, TaskRegistry};
use serde_json::{json, Map, Number, Value};

pub const SUM: &str = "sum";
pub const COUNT: &str = "count";
pub const MIN: &str = "min";
pub const MAX: &str = "max";
pub const CONCAT: &str = "concat";
pub const SUM_COUNT: &str = "sum_count";
pub const MEAN_OF_PARTIALS: &str = "mean_of_partials";
pub const IDENTITY: &str = "identity";

pub fn register_builtins(registry: &mut TaskRegistry) {
    registry
        .register(SUM, |inputs| sum(&inputs))
        .register(COUNT, |inputs| Ok(json!(inputs.len())))
        .register(MIN, |inputs| extreme(&inputs, |candidate, best| candidate < best))
        .register(MAX, |inputs| extreme(&inputs, |candidate, best| candidate > best))
        .register(CONCAT, concat)
        .register(SUM_COUNT, |inputs| {
            Ok(json!({ "sum": sum(&inputs)?, "count": inputs.len() }))
        })
        .register(MEAN_OF_PARTIALS, |inputs| mean_of_partials(&inputs))
        .register(IDENTITY, |inputs| Ok(Value::Array(inputs)));
}

fn as_number(index: usize, value: &Value) -> Result<&Number, TaskError> {
    match value {
        Value::Number(number) => Ok(number),
        other => Err(TaskError::invalid_input(
            index,
            format!("expected a number, got {}", other),
        )),
    }
}

/// Integers stay integers until a float shows up or the sum overflows i64.
fn sum(inputs: &[Value]) -> Result<Value, TaskError> {
    let mut int_total: Option<i64> = Some(0);
    let mut float_total = 0.0_f64;

    for (index, value) in inputs.iter().enumerate() {
        let number = as_number(index, value)?;
        float_total += number.as_f64().unwrap_or(0.0);
        int_total = match (int_total, number.as_i64()) {
            (Some(total), Some(n)) => total.checked_add(n),
            _ => None,
        };
    }

    Ok(match int_total {
        Some(total) => json!(total),
        None => json!(float_total),
    })
}

fn extreme(inputs: &[Value], better: fn(f64, f64) -> bool) -> Result<Value, TaskError> {
    let mut best: Option<(f64, &Value)> = None;

    for (index, value) in inputs.iter().enumerate() {
        let candidate = as_number(index, value)?.as_f64().unwrap_or(f64::NAN);
        match best {
            Some((current, _)) if !better(candidate, current) => {}
            _ => best = Some((candidate, value)),
        }
    }

    Ok(best.map(|(_, value)| value.clone()).unwrap_or(Value::Null))
}

fn concat(inputs: Vec<Value>) -> Result<Value, TaskError> {
    let mut flattened = Vec::new();
    for (index, value) in inputs.into_iter().enumerate() {
        match value {
            Value::Array(items) => flattened.extend(items),
            other => {
                return Err(TaskError::invalid_input(
                    index,
                    format!("expected an array, got {}", other),
                ))
            }
        }
    }
    Ok(Value::Array(flattened))
}

fn partial_field<'a>(
    index: usize,
    partial: &'a Map<String, Value>,
    field: &str,
) -> Result<&'a Number, TaskError> {
    partial
        .get(field)
        .ok_or_else(|| TaskError::invalid_input(index, format!("missing '{}'", field)))
        .and_then(|value| as_number(index, value))
}

fn mean_of_partials(inputs: &[Value]) -> Result<Value, TaskError> {
    let mut total = 0.0_f64;
    let mut count = 0_u64;

    for (index, value) in inputs.iter().enumerate() {
        let partial = value.as_object().ok_or_else(|| {
            TaskError::invalid_input(index, "expected an object with 'sum' and 'count'")
        })?;
        total += partial_field(index, partial, "sum")?
            .as_f64()
            .unwrap_or(0.0);
        count += partial_field(index, partial, "count")?
            .as_u64()
            .ok_or_else(|| TaskError::invalid_input(index, "'count' must be a non-negative integer"))?;
    }

    if count == 0 {
        return Ok(Value::Null);
    }
    Ok(json!(total / count as f64))
}
