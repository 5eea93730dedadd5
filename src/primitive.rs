//! Adapters for the nine primitive kinds: `bool`, `int32`,
//! `int64`, `uint64`, `float32`, `float64`, `string`, `bytes`, `timestamp`.
//!
//! Each is a zero-sized adapter behind a process-lifetime singleton handle;
//! one small module per numeric-encoding concern rather than one monolithic
//! dispatch function.

use std::sync::{Arc, OnceLock};

use base64::Engine;

use crate::adapter::{Adapter, AdapterHandle};
use crate::error::{JsonError, TypeError};
use crate::value::Value;
use crate::wire::{WireReader, WireWriter};

/// IEEE-754 double can represent every integer in this range exactly; beyond
/// it, `int64`/`uint64` are encoded as decimal strings in JSON.
const MAX_SAFE_INTEGER: i64 = (1i64 << 53) - 1;
const MIN_SAFE_INTEGER: i64 = -MAX_SAFE_INTEGER;

/// Signed 64-bit Unix milliseconds, clamped to this range.
const TIMESTAMP_MIN: i64 = -8_640_000_000_000_000;
const TIMESTAMP_MAX: i64 = 8_640_000_000_000_000;

fn unexpected(found: &Value) -> String {
    match found {
        Value::Bool(_) => "bool".into(),
        Value::Int32(_) => "int32".into(),
        Value::Int64(_) => "int64".into(),
        Value::UInt64(_) => "uint64".into(),
        Value::Float32(_) => "float32".into(),
        Value::Float64(_) => "float64".into(),
        Value::String(_) => "string".into(),
        Value::Bytes(_) => "bytes".into(),
        Value::Timestamp(_) => "timestamp".into(),
        Value::Optional(_) => "optional".into(),
        Value::Array(_) => "array".into(),
        Value::Struct(_) => "struct".into(),
        Value::Enum(_) => "enum".into(),
    }
}

fn type_error(expected: &str, found: &Value) -> TypeError {
    TypeError {
        expected: expected.to_string(),
        found: unexpected(found),
    }
}

/// Any primitive's numeric reading, truncated toward zero (never rounded):
/// `from_json({"i32": 1.2}) -> 1`.
fn as_i128_truncating(value: &Value) -> Option<i128> {
    match value {
        Value::Int32(v) => Some(*v as i128),
        Value::Int64(v) => Some(*v as i128),
        Value::UInt64(v) => Some(*v as i128),
        Value::Timestamp(v) => Some(*v as i128),
        Value::Float32(v) => Some(v.trunc() as i128),
        Value::Float64(v) => Some(v.trunc() as i128),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Int32(v) => Some(*v as f64),
        Value::Int64(v) => Some(*v as f64),
        Value::UInt64(v) => Some(*v as f64),
        Value::Float32(v) => Some(*v as f64),
        Value::Float64(v) => Some(*v),
        _ => None,
    }
}

fn json_number_to_i128(n: &serde_json::Number) -> Option<i128> {
    if let Some(i) = n.as_i64() {
        Some(i as i128)
    } else if let Some(u) = n.as_u64() {
        Some(u as i128)
    } else {
        n.as_f64().map(|f| f.trunc() as i128)
    }
}

fn json_to_i128(json: &serde_json::Value) -> Option<i128> {
    match json {
        serde_json::Value::Number(n) => json_number_to_i128(n),
        serde_json::Value::String(s) => s.parse::<i128>().ok(),
        _ => None,
    }
}

fn json_to_f64(json: &serde_json::Value) -> Option<f64> {
    match json {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

macro_rules! singleton {
    ($name:ident, $ty:ty) => {
        pub fn $name() -> AdapterHandle {
            static CELL: OnceLock<AdapterHandle> = OnceLock::new();
            CELL.get_or_init(|| Arc::new(<$ty>::default()) as AdapterHandle)
                .clone()
        }
    };
}

#[derive(Debug, Default)]
pub struct BoolAdapter;
singleton!(bool_adapter, BoolAdapter);

impl Adapter for BoolAdapter {
    fn default_value(&self) -> Value {
        Value::Bool(false)
    }
    fn to_frozen(&self, input: Value) -> Result<Value, TypeError> {
        match input {
            Value::Bool(b) => Ok(Value::Bool(b)),
            other => Err(type_error("bool", &other)),
        }
    }
    fn is_not_default(&self, value: &Value) -> bool {
        matches!(value, Value::Bool(true))
    }
    fn encode_binary(&self, value: &Value, out: &mut WireWriter) {
        let b = matches!(value, Value::Bool(true));
        out.write_uint64(if b { 1 } else { 0 });
    }
    fn decode_binary(&self, input: &mut WireReader) -> Result<Value, crate::error::WireError> {
        Ok(Value::Bool(input.read_bool()?))
    }
    fn to_json(&self, value: &Value, _readable: bool) -> serde_json::Value {
        serde_json::Value::Bool(matches!(value, Value::Bool(true)))
    }
    fn from_json(&self, json: &serde_json::Value) -> Result<Value, JsonError> {
        match json {
            serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
            other => Err(JsonError(format!("expected bool, found {other}"))),
        }
    }
    fn type_name(&self) -> String {
        "bool".into()
    }
}

#[derive(Debug, Default)]
pub struct Int32Adapter;
singleton!(int32_adapter, Int32Adapter);

impl Adapter for Int32Adapter {
    fn default_value(&self) -> Value {
        Value::Int32(0)
    }
    fn to_frozen(&self, input: Value) -> Result<Value, TypeError> {
        match as_i128_truncating(&input) {
            Some(v) => Ok(Value::Int32(v.clamp(i32::MIN as i128, i32::MAX as i128) as i32)),
            None => Err(type_error("int32", &input)),
        }
    }
    fn is_not_default(&self, value: &Value) -> bool {
        !matches!(value, Value::Int32(0))
    }
    fn encode_binary(&self, value: &Value, out: &mut WireWriter) {
        if let Value::Int32(v) = value {
            out.write_int32(*v);
        }
    }
    fn decode_binary(&self, input: &mut WireReader) -> Result<Value, crate::error::WireError> {
        Ok(Value::Int32(input.read_int32()?))
    }
    fn to_json(&self, value: &Value, _readable: bool) -> serde_json::Value {
        if let Value::Int32(v) = value {
            serde_json::Value::Number((*v).into())
        } else {
            serde_json::Value::Number(0.into())
        }
    }
    fn from_json(&self, json: &serde_json::Value) -> Result<Value, JsonError> {
        json_to_i128(json)
            .map(|v| Value::Int32(v.clamp(i32::MIN as i128, i32::MAX as i128) as i32))
            .ok_or_else(|| JsonError(format!("expected int32, found {json}")))
    }
    fn type_name(&self) -> String {
        "int32".into()
    }
}

#[derive(Debug, Default)]
pub struct Int64Adapter;
singleton!(int64_adapter, Int64Adapter);

fn int64_to_json(v: i64) -> serde_json::Value {
    if (MIN_SAFE_INTEGER..=MAX_SAFE_INTEGER).contains(&v) {
        serde_json::Value::Number(v.into())
    } else {
        serde_json::Value::String(v.to_string())
    }
}

impl Adapter for Int64Adapter {
    fn default_value(&self) -> Value {
        Value::Int64(0)
    }
    fn to_frozen(&self, input: Value) -> Result<Value, TypeError> {
        match as_i128_truncating(&input) {
            Some(v) => Ok(Value::Int64(v.clamp(i64::MIN as i128, i64::MAX as i128) as i64)),
            None => Err(type_error("int64", &input)),
        }
    }
    fn is_not_default(&self, value: &Value) -> bool {
        !matches!(value, Value::Int64(0))
    }
    fn encode_binary(&self, value: &Value, out: &mut WireWriter) {
        if let Value::Int64(v) = value {
            out.write_int64(*v);
        }
    }
    fn decode_binary(&self, input: &mut WireReader) -> Result<Value, crate::error::WireError> {
        Ok(Value::Int64(input.read_int64()?))
    }
    fn to_json(&self, value: &Value, _readable: bool) -> serde_json::Value {
        if let Value::Int64(v) = value {
            int64_to_json(*v)
        } else {
            int64_to_json(0)
        }
    }
    fn from_json(&self, json: &serde_json::Value) -> Result<Value, JsonError> {
        json_to_i128(json)
            .map(|v| Value::Int64(v.clamp(i64::MIN as i128, i64::MAX as i128) as i64))
            .ok_or_else(|| JsonError(format!("expected int64, found {json}")))
    }
    fn type_name(&self) -> String {
        "int64".into()
    }
}

#[derive(Debug, Default)]
pub struct UInt64Adapter;
singleton!(uint64_adapter, UInt64Adapter);

fn uint64_to_json(v: u64) -> serde_json::Value {
    if v <= MAX_SAFE_INTEGER as u64 {
        serde_json::Value::Number(v.into())
    } else {
        serde_json::Value::String(v.to_string())
    }
}

impl Adapter for UInt64Adapter {
    fn default_value(&self) -> Value {
        Value::UInt64(0)
    }
    fn to_frozen(&self, input: Value) -> Result<Value, TypeError> {
        match as_i128_truncating(&input) {
            Some(v) => Ok(Value::UInt64(v.clamp(0, u64::MAX as i128) as u64)),
            None => Err(type_error("uint64", &input)),
        }
    }
    fn is_not_default(&self, value: &Value) -> bool {
        !matches!(value, Value::UInt64(0))
    }
    fn encode_binary(&self, value: &Value, out: &mut WireWriter) {
        if let Value::UInt64(v) = value {
            out.write_uint64(*v);
        }
    }
    fn decode_binary(&self, input: &mut WireReader) -> Result<Value, crate::error::WireError> {
        Ok(Value::UInt64(input.read_uint64()?))
    }
    fn to_json(&self, value: &Value, _readable: bool) -> serde_json::Value {
        if let Value::UInt64(v) = value {
            uint64_to_json(*v)
        } else {
            uint64_to_json(0)
        }
    }
    fn from_json(&self, json: &serde_json::Value) -> Result<Value, JsonError> {
        json_to_i128(json)
            .map(|v| Value::UInt64(v.clamp(0, u64::MAX as i128) as u64))
            .ok_or_else(|| JsonError(format!("expected uint64, found {json}")))
    }
    fn type_name(&self) -> String {
        "uint64".into()
    }
}

#[derive(Debug, Default)]
pub struct Float32Adapter;
singleton!(float32_adapter, Float32Adapter);

impl Adapter for Float32Adapter {
    fn default_value(&self) -> Value {
        Value::Float32(0.0)
    }
    fn to_frozen(&self, input: Value) -> Result<Value, TypeError> {
        match &input {
            Value::Float32(v) => Ok(Value::Float32(*v)),
            Value::Float64(v) => Ok(Value::Float32(*v as f32)),
            _ => as_f64(&input)
                .map(|v| Value::Float32(v as f32))
                .ok_or_else(|| type_error("float32", &input)),
        }
    }
    fn is_not_default(&self, value: &Value) -> bool {
        !matches!(value, Value::Float32(v) if *v == 0.0)
    }
    fn encode_binary(&self, value: &Value, out: &mut WireWriter) {
        if let Value::Float32(v) = value {
            out.write_float32(*v);
        }
    }
    fn decode_binary(&self, input: &mut WireReader) -> Result<Value, crate::error::WireError> {
        Ok(Value::Float32(input.read_float32()?))
    }
    fn to_json(&self, value: &Value, _readable: bool) -> serde_json::Value {
        let v = if let Value::Float32(v) = value { *v } else { 0.0 };
        serde_json::Number::from_f64(v as f64)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
    fn from_json(&self, json: &serde_json::Value) -> Result<Value, JsonError> {
        json_to_f64(json)
            .map(|v| Value::Float32(v as f32))
            .ok_or_else(|| JsonError(format!("expected float32, found {json}")))
    }
    fn type_name(&self) -> String {
        "float32".into()
    }
}

#[derive(Debug, Default)]
pub struct Float64Adapter;
singleton!(float64_adapter, Float64Adapter);

impl Adapter for Float64Adapter {
    fn default_value(&self) -> Value {
        Value::Float64(0.0)
    }
    fn to_frozen(&self, input: Value) -> Result<Value, TypeError> {
        match &input {
            Value::Float64(v) => Ok(Value::Float64(*v)),
            Value::Float32(v) => Ok(Value::Float64(*v as f64)),
            _ => as_f64(&input)
                .map(Value::Float64)
                .ok_or_else(|| type_error("float64", &input)),
        }
    }
    fn is_not_default(&self, value: &Value) -> bool {
        !matches!(value, Value::Float64(v) if *v == 0.0)
    }
    fn encode_binary(&self, value: &Value, out: &mut WireWriter) {
        if let Value::Float64(v) = value {
            out.write_float64(*v);
        }
    }
    fn decode_binary(&self, input: &mut WireReader) -> Result<Value, crate::error::WireError> {
        Ok(Value::Float64(input.read_float64()?))
    }
    fn to_json(&self, value: &Value, _readable: bool) -> serde_json::Value {
        let v = if let Value::Float64(v) = value { *v } else { 0.0 };
        serde_json::Number::from_f64(v)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
    fn from_json(&self, json: &serde_json::Value) -> Result<Value, JsonError> {
        json_to_f64(json)
            .map(Value::Float64)
            .ok_or_else(|| JsonError(format!("expected float64, found {json}")))
    }
    fn type_name(&self) -> String {
        "float64".into()
    }
}

#[derive(Debug, Default)]
pub struct StringAdapter;
singleton!(string_adapter, StringAdapter);

impl Adapter for StringAdapter {
    fn default_value(&self) -> Value {
        Value::String(Arc::from(""))
    }
    fn to_frozen(&self, input: Value) -> Result<Value, TypeError> {
        match input {
            Value::String(s) => Ok(Value::String(s)),
            other => Err(type_error("string", &other)),
        }
    }
    fn is_not_default(&self, value: &Value) -> bool {
        !matches!(value, Value::String(s) if s.is_empty())
    }
    fn encode_binary(&self, value: &Value, out: &mut WireWriter) {
        if let Value::String(s) = value {
            out.write_string(s);
        }
    }
    fn decode_binary(&self, input: &mut WireReader) -> Result<Value, crate::error::WireError> {
        Ok(Value::String(Arc::from(input.read_string()?.as_str())))
    }
    fn to_json(&self, value: &Value, _readable: bool) -> serde_json::Value {
        if let Value::String(s) = value {
            serde_json::Value::String(s.to_string())
        } else {
            serde_json::Value::String(String::new())
        }
    }
    fn from_json(&self, json: &serde_json::Value) -> Result<Value, JsonError> {
        match json {
            serde_json::Value::String(s) => Ok(Value::String(Arc::from(s.as_str()))),
            other => Err(JsonError(format!("expected string, found {other}"))),
        }
    }
    fn type_name(&self) -> String {
        "string".into()
    }
}

#[derive(Debug, Default)]
pub struct BytesAdapter;
singleton!(bytes_adapter, BytesAdapter);

impl Adapter for BytesAdapter {
    fn default_value(&self) -> Value {
        Value::Bytes(Arc::from(Vec::new().into_boxed_slice()))
    }
    fn to_frozen(&self, input: Value) -> Result<Value, TypeError> {
        match input {
            Value::Bytes(b) => Ok(Value::Bytes(b)),
            other => Err(type_error("bytes", &other)),
        }
    }
    fn is_not_default(&self, value: &Value) -> bool {
        !matches!(value, Value::Bytes(b) if b.is_empty())
    }
    fn encode_binary(&self, value: &Value, out: &mut WireWriter) {
        if let Value::Bytes(b) = value {
            out.write_bytes(b);
        }
    }
    fn decode_binary(&self, input: &mut WireReader) -> Result<Value, crate::error::WireError> {
        Ok(Value::Bytes(Arc::from(input.read_bytes()?.into_boxed_slice())))
    }
    fn to_json(&self, value: &Value, _readable: bool) -> serde_json::Value {
        let b: &[u8] = if let Value::Bytes(b) = value { b } else { &[] };
        serde_json::Value::String(base64::engine::general_purpose::STANDARD.encode(b))
    }
    fn from_json(&self, json: &serde_json::Value) -> Result<Value, JsonError> {
        match json {
            serde_json::Value::String(s) => base64::engine::general_purpose::STANDARD
                .decode(s)
                .map(|b| Value::Bytes(Arc::from(b.into_boxed_slice())))
                .map_err(|e| JsonError(format!("invalid base64: {e}"))),
            other => Err(JsonError(format!("expected base64 string, found {other}"))),
        }
    }
    fn type_name(&self) -> String {
        "bytes".into()
    }
}

#[derive(Debug, Default)]
pub struct TimestampAdapter;
singleton!(timestamp_adapter, TimestampAdapter);

fn clamp_timestamp(v: i128) -> i64 {
    v.clamp(TIMESTAMP_MIN as i128, TIMESTAMP_MAX as i128) as i64
}

/// Renders Unix milliseconds as an ISO-8601 UTC timestamp without pulling in
/// a date/time crate the rest of the ambient stack doesn't otherwise need.
fn format_iso8601_utc(millis: i64) -> String {
    const DAYS_PER_400Y: i64 = 146097;
    let total_millis = millis.rem_euclid(1000);
    let total_secs = millis.div_euclid(1000);
    let days = total_secs.div_euclid(86400);
    let secs_of_day = total_secs.rem_euclid(86400);
    let (hour, min, sec) = (secs_of_day / 3600, (secs_of_day / 60) % 60, secs_of_day % 60);

    // Civil-from-days algorithm (Howard Hinnant's public-domain `civil_from_days`).
    let z = days + 719468;
    let era = if z >= 0 { z } else { z - DAYS_PER_400Y + 1 } / DAYS_PER_400Y;
    let doe = z - era * DAYS_PER_400Y;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = if month <= 2 { y + 1 } else { y };

    format!(
        "{year:04}-{month:02}-{day:02}T{hour:02}:{min:02}:{sec:02}.{total_millis:03}Z"
    )
}

impl Adapter for TimestampAdapter {
    fn default_value(&self) -> Value {
        Value::Timestamp(0)
    }
    fn to_frozen(&self, input: Value) -> Result<Value, TypeError> {
        match as_i128_truncating(&input) {
            Some(v) => Ok(Value::Timestamp(clamp_timestamp(v))),
            None => Err(type_error("timestamp", &input)),
        }
    }
    fn is_not_default(&self, value: &Value) -> bool {
        !matches!(value, Value::Timestamp(0))
    }
    fn encode_binary(&self, value: &Value, out: &mut WireWriter) {
        if let Value::Timestamp(v) = value {
            out.write_timestamp_millis(*v);
        }
    }
    fn decode_binary(&self, input: &mut WireReader) -> Result<Value, crate::error::WireError> {
        Ok(Value::Timestamp(input.read_int64()?))
    }
    fn to_json(&self, value: &Value, readable: bool) -> serde_json::Value {
        let v = if let Value::Timestamp(v) = value { *v } else { 0 };
        if readable {
            let mut obj = serde_json::Map::new();
            obj.insert("unix_millis".to_string(), serde_json::Value::Number(v.into()));
            obj.insert(
                "_formatted".to_string(),
                serde_json::Value::String(format_iso8601_utc(v)),
            );
            serde_json::Value::Object(obj)
        } else {
            serde_json::Value::Number(v.into())
        }
    }
    fn from_json(&self, json: &serde_json::Value) -> Result<Value, JsonError> {
        match json {
            serde_json::Value::Number(_) | serde_json::Value::String(_) => json_to_i128(json)
                .map(|v| Value::Timestamp(clamp_timestamp(v)))
                .ok_or_else(|| JsonError(format!("expected timestamp, found {json}"))),
            serde_json::Value::Object(obj) => obj
                .get("unix_millis")
                .and_then(json_to_i128)
                .map(|v| Value::Timestamp(clamp_timestamp(v)))
                .ok_or_else(|| JsonError("timestamp object missing unix_millis".to_string())),
            other => Err(JsonError(format!("expected timestamp, found {other}"))),
        }
    }
    fn type_name(&self) -> String {
        "timestamp".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int32_to_frozen_truncates_toward_zero() {
        let adapter = Int32Adapter;
        let v = adapter.to_frozen(Value::Float64(1.2)).unwrap();
        assert_eq!(v, Value::Int32(1));
        let v = adapter.to_frozen(Value::Float64(-1.9)).unwrap();
        assert_eq!(v, Value::Int32(-1));
    }

    #[test]
    fn int64_json_uses_string_beyond_safe_integer_range() {
        let adapter = Int64Adapter;
        assert_eq!(
            adapter.to_json(&Value::Int64(MAX_SAFE_INTEGER), false),
            serde_json::Value::Number(MAX_SAFE_INTEGER.into())
        );
        assert_eq!(
            adapter.to_json(&Value::Int64(MAX_SAFE_INTEGER + 1), false),
            serde_json::Value::String((MAX_SAFE_INTEGER + 1).to_string())
        );
    }

    #[test]
    fn timestamp_clamps_to_range() {
        let adapter = TimestampAdapter;
        let v = adapter.to_frozen(Value::Int64(i64::MAX)).unwrap();
        assert_eq!(v, Value::Timestamp(TIMESTAMP_MAX));
    }

    #[test]
    fn bytes_json_roundtrips_through_base64() {
        let adapter = BytesAdapter;
        let value = Value::Bytes(Arc::from(vec![1, 2, 3].into_boxed_slice()));
        let json = adapter.to_json(&value, true);
        let back = adapter.from_json(&json).unwrap();
        assert_eq!(value, back);
    }
}
