//! Lossless conversion of probe values into portable JSON.
//!
//! Tagged types follow MongoDB Extended JSON:
//! - `Int64` -> `{"$numberLong": "<decimal>"}`
//! - `ObjectId` -> `{"$oid": "<hex>"}`
//! - `DateTime` -> `{"$date": <ms>}`
//!
//! Plain strings get one more chance: when they parse as an ISO-8601 date
//! they are rendered as `{"$date": <ms>}` as well. That heuristic is lossy
//! (a string that merely looks like a date comes back as a date) and is kept
//! only for compatibility with reports produced by the legacy shell script.
//! Strings stored under a `$`-prefixed key are never touched.

use std::sync::LazyLock;

use chrono::{Duration, NaiveDate};
use regex::Regex;
use serde_json::{Map, Number, Value};

use crate::value::ProbeValue;

/// Normalize a top-level value.
pub fn normalize(value: &ProbeValue) -> Value {
    normalize_field("", value)
}

/// Normalize a value stored under `key`. Never fails.
pub fn normalize_field(key: &str, value: &ProbeValue) -> Value {
    match value {
        ProbeValue::Null => Value::Null,
        ProbeValue::Bool(b) => Value::Bool(*b),
        ProbeValue::Int32(n) => Value::Number((*n).into()),
        ProbeValue::Double(d) => Number::from_f64(*d).map_or(Value::Null, Value::Number),
        ProbeValue::Int64(n) => tagged("$numberLong", Value::String(n.to_string())),
        ProbeValue::ObjectId(hex) => tagged("$oid", Value::String(hex.clone())),
        ProbeValue::DateTime(ms) => date_tag(*ms),
        ProbeValue::String(s) if !key.starts_with('$') => match parse_iso_date(s) {
            Some(ms) => date_tag(ms),
            None => Value::String(s.clone()),
        },
        ProbeValue::String(s) => Value::String(s.clone()),
        ProbeValue::Document(fields) => Value::Object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), normalize_field(k, v)))
                .collect(),
        ),
        // Array positions are keyed by index, which never starts with `$`.
        ProbeValue::Array(items) => Value::Array(items.iter().map(normalize).collect()),
    }
}

fn tagged(tag: &str, inner: Value) -> Value {
    let mut map = Map::with_capacity(1);
    map.insert(tag.to_string(), inner);
    Value::Object(map)
}

fn date_tag(ms: i64) -> Value {
    tagged("$date", Value::Number(ms.into()))
}

/// The legacy shell's `ISODate` grammar.
static ISO_DATE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?-u)^(\d{4})-?(\d{2})-?(\d{2})([T ](\d{2})(:?(\d{2})(:?(\d{2}(\.\d+)?))?)?(Z|([+-])(\d{2}):?(\d{2})?)?)?$",
    )
    .ok()
});

/// `0000-01-01T00:00:00.000Z` and `9999-12-31T23:59:59.999Z`.
const DATE_RANGE_MIN_MS: i64 = -62_167_219_200_000;
const DATE_RANGE_MAX_MS: i64 = 253_402_300_799_999;

/// Parse an ISO-8601 date/time into milliseconds since the epoch.
///
/// Accepts `YYYY[-]MM[-]DD`, optionally followed by `T` or a space and
/// `HH[[:]MM[[:]SS[.fff...]]]` with an optional `Z` or `+HH[[:]MM]` zone.
/// Times without a zone are UTC.
///
/// Out-of-range fields roll over into the next larger unit, the way the
/// shell's `ISODate` does: `2021-02-30` is March 2nd, `T24:00` is midnight
/// of the following day. Results outside years 0000..=9999 are rejected.
pub fn parse_iso_date(s: &str) -> Option<i64> {
    let caps = ISO_DATE.as_ref()?.captures(s)?;
    let field = |i: usize| -> i64 {
        caps.get(i)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };

    let year = field(1);
    let month = field(2) - 1;
    let day = field(3);
    let hour = field(5);
    let minute = field(7);
    let second = caps
        .get(9)
        .and_then(|m| m.as_str().get(..2)?.parse::<i64>().ok())
        .unwrap_or(0);
    let millis = caps
        .get(10)
        .and_then(|m| format!("0{}", m.as_str()).parse::<f64>().ok())
        .map_or(0, |fraction| (fraction * 1000.0).round() as i64);

    let first_of_month = NaiveDate::from_ymd_opt(
        i32::try_from(year + month.div_euclid(12)).ok()?,
        u32::try_from(month.rem_euclid(12) + 1).ok()?,
        1,
    )?;
    let date = first_of_month.checked_add_signed(Duration::days(day - 1))?;
    let mut time = date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis()
        + ((hour * 60 + minute) * 60 + second) * 1000
        + millis;

    if let Some(sign) = caps.get(12) {
        let offset = (field(13) * 60 + field(14)) * 60 * 1000;
        time += if sign.as_str() == "+" { -offset } else { offset };
    }

    (DATE_RANGE_MIN_MS..=DATE_RANGE_MAX_MS)
        .contains(&time)
        .then_some(time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn int64_beyond_double_precision_survives() {
        for n in [
            0_i64,
            -1,
            (1 << 53) + 1,
            i64::MAX,
            i64::MIN,
            9_007_199_254_740_993,
        ] {
            let out = normalize(&ProbeValue::Int64(n));
            let text = out["$numberLong"].as_str().expect("tagged string");
            assert_eq!(text.parse::<i64>().unwrap(), n);
        }
    }

    #[test]
    fn object_id_is_stable() {
        let oid = ProbeValue::ObjectId("5f1d7a3c9b1e8a0012345678".into());
        let first = serde_json::to_string(&normalize(&oid)).unwrap();
        let second = serde_json::to_string(&normalize(&oid)).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, r#"{"$oid":"5f1d7a3c9b1e8a0012345678"}"#);
    }

    #[test]
    fn datetime_renders_millis() {
        assert_eq!(
            normalize(&ProbeValue::DateTime(1_600_000_000_123)),
            json!({"$date": 1_600_000_000_123_i64})
        );
    }

    #[test]
    fn non_date_strings_are_unchanged() {
        for s in [
            "",
            "hello",
            "a.b",
            "12345678x",
            "2020-01-01T",
            "2020/01/02",
            "2020-01-02T03:04:05+",
            "9999-12-31T24:00:00Z",
        ] {
            assert_eq!(normalize(&ProbeValue::from(s)), json!(s), "{s}");
        }
    }

    #[test]
    fn iso_strings_become_dates() {
        let expected = Utc
            .with_ymd_and_hms(2020, 1, 2, 3, 4, 5)
            .unwrap()
            .timestamp_millis();
        for s in [
            "2020-01-02T03:04:05Z",
            "2020-01-02T03:04:05",
            "2020-01-02 03:04:05",
            "20200102T030405Z",
            "2020-01-02T05:04:05+02:00",
            "2020-01-02T01:04:05-0200",
        ] {
            assert_eq!(parse_iso_date(s), Some(expected), "{s}");
            assert_eq!(normalize(&ProbeValue::from(s)), json!({"$date": expected}));
        }
        assert_eq!(
            parse_iso_date("2020-01-02T03:04:05.250Z"),
            Some(expected + 250)
        );
        assert_eq!(
            parse_iso_date("2020-01-02"),
            Some(Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap().timestamp_millis())
        );
    }

    #[test]
    fn out_of_range_fields_roll_over() {
        let at = |y, mo, d, h, mi, s| {
            Utc.with_ymd_and_hms(y, mo, d, h, mi, s)
                .unwrap()
                .timestamp_millis()
        };
        for (s, expected) in [
            ("2021-02-30", at(2021, 3, 2, 0, 0, 0)),
            ("2020-13-01", at(2021, 1, 1, 0, 0, 0)),
            ("2020-00-00", at(2019, 11, 30, 0, 0, 0)),
            ("2020-01-02T24:00:00Z", at(2020, 1, 3, 0, 0, 0)),
            ("2020-01-02T10:60:00Z", at(2020, 1, 2, 11, 0, 0)),
            ("2016-12-31T23:59:60Z", at(2017, 1, 1, 0, 0, 0)),
            ("2020-01-02T03:04:05.9996Z", at(2020, 1, 2, 3, 4, 6)),
        ] {
            assert_eq!(parse_iso_date(s), Some(expected), "{s}");
            assert_eq!(normalize(&ProbeValue::from(s)), json!({"$date": expected}));
        }
    }

    #[test]
    fn dollar_keys_keep_strings() {
        let doc = ProbeValue::document([
            ("$date", ProbeValue::from("2020-01-02")),
            ("when", ProbeValue::from("2020-01-02")),
        ]);
        let out = normalize(&doc);
        assert_eq!(out["$date"], json!("2020-01-02"));
        assert!(out["when"].get("$date").is_some());
    }

    #[test]
    fn nested_structures_keep_order() {
        let doc = ProbeValue::document([
            ("z", ProbeValue::Int32(1)),
            (
                "list",
                ProbeValue::Array(vec![ProbeValue::Int64(5), ProbeValue::Bool(true)]),
            ),
            ("a", ProbeValue::Double(f64::NAN)),
        ]);
        let text = serde_json::to_string(&normalize(&doc)).unwrap();
        assert_eq!(
            text,
            r#"{"z":1,"list":[{"$numberLong":"5"},true],"a":null}"#
        );
    }
}
