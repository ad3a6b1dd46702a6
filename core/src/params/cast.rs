//! # Primitive Casting
//!
//! Converts one raw value to a typed value according to `type` and `format`.
//! Formats take precedence over the bare type where both could apply; unknown
//! combinations pass the value through unchanged.

use crate::error::ParameterFailure;
use crate::params::descriptor::{Format, ParamType};
use crate::value::{ParamValue, RawValue};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde_json::Value as JsonValue;
use std::borrow::Cow;

/// Texts that cast to `true` (compared lower-cased); everything else is `false`.
const TRUTHY: [&str; 3] = ["1", "yes", "true"];

/// Timestamp layouts accepted besides RFC 3339, tried in order.
const OFFSET_LAYOUTS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%z",
];
const NAIVE_LAYOUTS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];
const DATE_LAYOUT: &str = "%Y-%m-%d";

/// The conversion a `(type, format)` pair selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    /// `type: boolean`.
    Boolean,
    /// `type: integer`, `format: int32|int64`.
    Integer,
    /// `type: number`, `format: float|double`.
    Number,
    /// `format: byte`.
    Base64,
    /// `format: binary`.
    Binary,
    /// `format: date`.
    Date,
    /// `format: dateTime`.
    DateTime,
    /// `type: string`.
    Text,
    /// Anything else.
    Passthrough,
}

impl CastKind {
    /// Selects the conversion for a declared type and format.
    pub fn select(param_type: Option<&ParamType>, format: Option<&Format>) -> Self {
        match (param_type, format) {
            (Some(ParamType::Boolean), _) => Self::Boolean,
            (Some(ParamType::Integer), _) | (_, Some(Format::Int32 | Format::Int64)) => {
                Self::Integer
            }
            (Some(ParamType::Number), _) | (_, Some(Format::Float | Format::Double)) => {
                Self::Number
            }
            (_, Some(Format::Byte)) => Self::Base64,
            (_, Some(Format::Binary)) => Self::Binary,
            (_, Some(Format::Date)) => Self::Date,
            (_, Some(Format::DateTime)) => Self::DateTime,
            (Some(ParamType::String), _) => Self::Text,
            _ => Self::Passthrough,
        }
    }
}

/// A value that could not be cast. Becomes a [`ParameterFailure::Cast`] once the
/// parameter name is known.
#[derive(Debug, Clone, PartialEq)]
pub struct CastError {
    /// The offending raw value, rendered as text.
    pub raw: String,
    /// Why the conversion failed.
    pub reason: String,
}

impl CastError {
    fn new(raw: &RawValue, reason: impl Into<String>) -> Self {
        Self {
            raw: raw.describe(),
            reason: reason.into(),
        }
    }

    /// Attaches the parameter name.
    pub fn into_failure(self, name: &str) -> ParameterFailure {
        ParameterFailure::Cast {
            name: name.to_string(),
            raw: self.raw,
            reason: self.reason,
        }
    }
}

/// Casts a raw value per `type`/`format`. Pure; no validation happens here.
pub fn cast_primitive(
    param_type: Option<&ParamType>,
    format: Option<&Format>,
    raw: RawValue,
) -> Result<ParamValue, CastError> {
    match CastKind::select(param_type, format) {
        CastKind::Boolean => cast_boolean(&raw),
        CastKind::Integer => cast_integer(&raw),
        CastKind::Number => cast_number(&raw),
        CastKind::Base64 => {
            let text = scalar_text(&raw)?;
            STANDARD
                .decode(text.as_bytes())
                .map(ParamValue::Bytes)
                .map_err(|e| CastError::new(&raw, format!("invalid base64: {}", e)))
        }
        CastKind::Binary => match raw {
            RawValue::File(file) => Ok(ParamValue::Bytes(file.content)),
            other => Ok(ParamValue::Bytes(scalar_text(&other)?.into_owned().into_bytes())),
        },
        CastKind::Date => {
            let text = scalar_text(&raw)?;
            parse_date(text.trim())
                .map(ParamValue::Date)
                .ok_or_else(|| CastError::new(&raw, "not an ISO 8601 date"))
        }
        CastKind::DateTime => {
            let text = scalar_text(&raw)?;
            parse_date_time(text.trim())
                .map(ParamValue::DateTime)
                .ok_or_else(|| CastError::new(&raw, "not an ISO 8601 timestamp"))
        }
        CastKind::Text => Ok(ParamValue::String(scalar_text(&raw)?.into_owned())),
        CastKind::Passthrough => Ok(passthrough(raw)),
    }
}

fn cast_boolean(raw: &RawValue) -> Result<ParamValue, CastError> {
    if let RawValue::Json(JsonValue::Bool(flag)) = raw {
        return Ok(ParamValue::Bool(*flag));
    }
    let text = scalar_text(raw)?.to_lowercase();
    Ok(ParamValue::Bool(TRUTHY.contains(&text.as_str())))
}

fn cast_integer(raw: &RawValue) -> Result<ParamValue, CastError> {
    if let RawValue::Json(JsonValue::Number(n)) = raw {
        return match n.as_i64() {
            Some(i) => Ok(ParamValue::Integer(i)),
            None => match n.as_f64() {
                // Integral floats truncate like a numeric `int()` would.
                Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                    Ok(ParamValue::Integer(f as i64))
                }
                _ => Err(CastError::new(raw, "not an integer")),
            },
        };
    }
    let text = scalar_text(raw)?;
    text.trim()
        .parse::<i64>()
        .map(ParamValue::Integer)
        .map_err(|e| CastError::new(raw, format!("invalid integer: {}", e)))
}

fn cast_number(raw: &RawValue) -> Result<ParamValue, CastError> {
    if let RawValue::Json(JsonValue::Number(n)) = raw {
        return n
            .as_f64()
            .map(ParamValue::Number)
            .ok_or_else(|| CastError::new(raw, "not a number"));
    }
    let text = scalar_text(raw)?;
    let number = text
        .trim()
        .parse::<f64>()
        .map_err(|e| CastError::new(raw, format!("invalid number: {}", e)))?;
    // `inf` and `NaN` parse, but have no JSON form to validate.
    if !number.is_finite() {
        return Err(CastError::new(raw, "not a finite number"));
    }
    Ok(ParamValue::Number(number))
}

/// The text of a single-valued raw value.
fn scalar_text(raw: &RawValue) -> Result<Cow<'_, str>, CastError> {
    match raw {
        RawValue::Text(text) => Ok(Cow::Borrowed(text)),
        RawValue::Json(JsonValue::String(text)) => Ok(Cow::Borrowed(text)),
        RawValue::Json(value @ (JsonValue::Number(_) | JsonValue::Bool(_))) => {
            Ok(Cow::Owned(value.to_string()))
        }
        RawValue::List(_) => Err(CastError::new(raw, "expected a single value, got a sequence")),
        RawValue::Json(_) => Err(CastError::new(raw, "expected a scalar value")),
        RawValue::File(_) => Err(CastError::new(raw, "expected a value, got a file")),
    }
}

fn passthrough(raw: RawValue) -> ParamValue {
    match raw {
        RawValue::Text(text) => ParamValue::String(text),
        RawValue::List(items) => {
            ParamValue::Array(items.into_iter().map(ParamValue::String).collect())
        }
        RawValue::Json(value) => ParamValue::Json(value),
        RawValue::File(file) => ParamValue::File(file),
    }
}

/// Parses an ISO 8601 timestamp. Missing offsets are taken as UTC and a bare date
/// is midnight UTC.
pub fn parse_date_time(text: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed);
    }
    if let Some(parsed) = OFFSET_LAYOUTS
        .iter()
        .find_map(|layout| DateTime::parse_from_str(text, layout).ok())
    {
        return Some(parsed);
    }
    if let Some(naive) = NAIVE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(text, layout).ok())
    {
        return Some(naive.and_utc().fixed_offset());
    }
    NaiveDate::parse_from_str(text, DATE_LAYOUT)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
}

/// Parses an ISO 8601 date. A full timestamp yields its calendar date in its own offset.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, DATE_LAYOUT)
        .ok()
        .or_else(|| parse_date_time(text).map(|stamp| stamp.date_naive()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::UploadedFile;
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    fn cast(param_type: Option<ParamType>, format: Option<Format>, raw: &str) -> Result<ParamValue, CastError> {
        cast_primitive(param_type.as_ref(), format.as_ref(), raw.into())
    }

    #[test]
    fn test_select_precedence() {
        assert_eq!(
            CastKind::select(Some(&ParamType::String), Some(&Format::Int64)),
            CastKind::Integer
        );
        assert_eq!(
            CastKind::select(Some(&ParamType::String), Some(&Format::Date)),
            CastKind::Date
        );
        assert_eq!(
            CastKind::select(Some(&ParamType::Boolean), Some(&Format::Byte)),
            CastKind::Boolean
        );
        assert_eq!(CastKind::select(Some(&ParamType::String), None), CastKind::Text);
        assert_eq!(CastKind::select(Some(&ParamType::File), None), CastKind::Passthrough);
        assert_eq!(
            CastKind::select(None, Some(&Format::Other("uuid".into()))),
            CastKind::Passthrough
        );
    }

    #[test]
    fn test_boolean() {
        for truthy in ["1", "yes", "TRUE", "True"] {
            assert_eq!(cast(Some(ParamType::Boolean), None, truthy).unwrap(), ParamValue::Bool(true));
        }
        for falsy in ["0", "no", "false", "", "y"] {
            assert_eq!(cast(Some(ParamType::Boolean), None, falsy).unwrap(), ParamValue::Bool(false));
        }
        assert_eq!(
            cast_primitive(Some(&ParamType::Boolean), None, RawValue::Json(json!(false))).unwrap(),
            ParamValue::Bool(false)
        );
    }

    #[test]
    fn test_integer() {
        assert_eq!(cast(Some(ParamType::Integer), None, "42").unwrap(), ParamValue::Integer(42));
        assert_eq!(cast(Some(ParamType::Integer), None, " -7 ").unwrap(), ParamValue::Integer(-7));
        assert_eq!(cast(None, Some(Format::Int32), "8").unwrap(), ParamValue::Integer(8));
        let err = cast(Some(ParamType::Integer), None, "foo").unwrap_err();
        assert_eq!(err.raw, "foo");
        assert!(cast(Some(ParamType::Integer), None, "4.2").is_err());
        assert_eq!(
            cast_primitive(Some(&ParamType::Integer), None, RawValue::Json(json!(3.0))).unwrap(),
            ParamValue::Integer(3)
        );
    }

    #[test]
    fn test_number() {
        assert_eq!(cast(Some(ParamType::Number), None, "1.5").unwrap(), ParamValue::Number(1.5));
        assert_eq!(cast(None, Some(Format::Double), "2").unwrap(), ParamValue::Number(2.0));
        assert!(cast(Some(ParamType::Number), None, "one").is_err());
    }

    #[test]
    fn test_non_finite_number_rejected() {
        for text in ["inf", "-inf", "+infinity", "NaN"] {
            let err = cast(Some(ParamType::Number), None, text).unwrap_err();
            assert_eq!(err.reason, "not a finite number", "{}", text);
        }
        let err = cast(None, Some(Format::Float), "-inf").unwrap_err();
        assert_eq!(err.raw, "-inf");
    }

    #[test]
    fn test_byte_and_binary() {
        assert_eq!(
            cast(Some(ParamType::String), Some(Format::Byte), "aGVsbG8=").unwrap(),
            ParamValue::Bytes(b"hello".to_vec())
        );
        assert!(cast(Some(ParamType::String), Some(Format::Byte), "!!!").is_err());
        assert_eq!(
            cast(Some(ParamType::String), Some(Format::Binary), "héllo").unwrap(),
            ParamValue::Bytes("héllo".as_bytes().to_vec())
        );
        let file = UploadedFile::new("a.bin", vec![0u8, 159]);
        assert_eq!(
            cast_primitive(None, Some(&Format::Binary), RawValue::File(file)).unwrap(),
            ParamValue::Bytes(vec![0, 159])
        );
    }

    #[test]
    fn test_date() {
        let value = cast(Some(ParamType::String), Some(Format::Date), "2017-08-21").unwrap();
        assert_eq!(value, ParamValue::Date(NaiveDate::from_ymd_opt(2017, 8, 21).unwrap()));
        let value = cast(Some(ParamType::String), Some(Format::Date), "2017-08-21T23:30:00+03:00").unwrap();
        assert_eq!(value, ParamValue::Date(NaiveDate::from_ymd_opt(2017, 8, 21).unwrap()));
        assert!(cast(Some(ParamType::String), Some(Format::Date), "yesterday").is_err());
    }

    #[test]
    fn test_date_time() {
        let ParamValue::DateTime(stamp) =
            cast(Some(ParamType::String), Some(Format::DateTime), "2017-08-21T12:34:56+02:00").unwrap()
        else {
            panic!("expected a timestamp");
        };
        assert_eq!(stamp.hour(), 12);
        assert_eq!(stamp.offset().local_minus_utc(), 7200);

        let ParamValue::DateTime(stamp) =
            cast(None, Some(Format::DateTime), "2017-08-21T12:34:56").unwrap()
        else {
            panic!("expected a timestamp");
        };
        assert_eq!(stamp.offset().local_minus_utc(), 0);

        let ParamValue::DateTime(stamp) = cast(None, Some(Format::DateTime), "2017-08-21").unwrap()
        else {
            panic!("expected a timestamp");
        };
        assert_eq!((stamp.day(), stamp.hour()), (21, 0));

        assert!(cast(None, Some(Format::DateTime), "12:00").is_err());
    }

    #[test]
    fn test_string_and_passthrough() {
        assert_eq!(cast(Some(ParamType::String), None, "doggo").unwrap(), "doggo".into());
        assert_eq!(cast(None, None, "raw").unwrap(), ParamValue::String("raw".into()));
        let file = UploadedFile::new("foo.txt", b"foo".to_vec());
        assert_eq!(
            cast_primitive(Some(&ParamType::File), None, RawValue::File(file.clone())).unwrap(),
            ParamValue::File(file)
        );
        assert_eq!(
            cast_primitive(Some(&ParamType::Unknown), None, RawValue::Json(json!({"a": 1}))).unwrap(),
            ParamValue::Json(json!({"a": 1}))
        );
    }

    #[test]
    fn test_sequence_for_scalar_is_cast_error() {
        let raw = RawValue::List(vec!["1".into(), "2".into()]);
        let err = cast_primitive(Some(&ParamType::Integer), None, raw).unwrap_err();
        let failure = err.into_failure("a");
        assert!(matches!(failure, ParameterFailure::Cast { ref name, .. } if name == "a"));
    }
}
