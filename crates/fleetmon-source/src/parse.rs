use crate::error::{FetchError, Result};
use fleetmon_common::types::MetricReading;
use serde_json::{Map, Value};

/// Parses a percentage such as `"73%"`, `" 73.5 % "` or `"73"` into a float.
///
/// Trailing percent signs and surrounding whitespace are ignored. Empty,
/// non-numeric and non-finite inputs are rejected.
///
/// # Examples
///
/// ```
/// use fleetmon_source::parse::parse_percent;
///
/// assert_eq!(parse_percent("mem", "85%").unwrap(), 85.0);
/// assert!(parse_percent("mem", "lots%").is_err());
/// ```
pub fn parse_percent(field: &'static str, raw: &str) -> Result<f64> {
    let trimmed = raw.trim().trim_end_matches('%').trim_end();
    let invalid = || FetchError::InvalidField {
        field,
        value: raw.to_string(),
    };
    if trimmed.is_empty() {
        return Err(invalid());
    }
    let value: f64 = trimmed.parse().map_err(|_| invalid())?;
    if !value.is_finite() {
        return Err(invalid());
    }
    Ok(value)
}

/// Converts a decoded response body into a [`MetricReading`].
///
/// Expected shape: `{"cpu": 42, "mem": "61%", "disk": "37%", "uptime": "1d 2h 3m 4s"}`.
pub fn parse_payload(body: &Value) -> Result<MetricReading> {
    let object = body
        .as_object()
        .ok_or_else(|| FetchError::MalformedPayload(format!("expected a JSON object, got {body}")))?;

    Ok(MetricReading {
        cpu: parse_cpu(require(object, "cpu")?)?,
        mem_percent: percent_field(object, "mem")?,
        disk_percent: percent_field(object, "disk")?,
        uptime_label: uptime_label(require(object, "uptime")?)?,
    })
}

fn require<'a>(object: &'a Map<String, Value>, field: &'static str) -> Result<&'a Value> {
    match object.get(field) {
        None | Some(Value::Null) => Err(FetchError::MissingField(field)),
        Some(value) => Ok(value),
    }
}

fn invalid(field: &'static str, value: &Value) -> FetchError {
    FetchError::InvalidField {
        field,
        value: value.to_string(),
    }
}

// Integers pass through, floats truncate toward zero, numeric strings parse.
fn parse_cpu(value: &Value) -> Result<i64> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(i);
            }
            match n.as_f64() {
                Some(f) if f.is_finite() && f.abs() < i64::MAX as f64 => Ok(f.trunc() as i64),
                _ => Err(invalid("cpu", value)),
            }
        }
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| invalid("cpu", value)),
        _ => Err(invalid("cpu", value)),
    }
}

fn percent_field(object: &Map<String, Value>, field: &'static str) -> Result<f64> {
    let value = require(object, field)?;
    match value {
        Value::String(s) => parse_percent(field, s),
        Value::Number(n) => n
            .as_f64()
            .filter(|f| f.is_finite())
            .ok_or_else(|| invalid(field, value)),
        _ => Err(invalid(field, value)),
    }
}

fn uptime_label(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(invalid("uptime", value)),
    }
}
