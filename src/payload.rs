use serde_json::Value;

/// Envelope fields checked, in order, when a payload has no top-level `ts`.
pub const NESTED_TS_PARENTS: [&str; 5] = ["data", "payload", "value", "meta", "result"];

/// Locate the numeric send timestamp (epoch millis) inside an event payload.
///
/// A top-level numeric `ts` wins outright. Otherwise `ts` is looked up one
/// level below each of [`NESTED_TS_PARENTS`] and the first numeric hit is
/// returned. Anything else is a miss.
#[inline]
pub fn extract_timestamp(payload: &Value) -> Option<f64> {
    let object = payload.as_object()?;

    if let Some(ts) = object.get("ts").and_then(Value::as_f64) {
        return Some(ts);
    }

    NESTED_TS_PARENTS
        .iter()
        .find_map(|parent| object.get(*parent)?.get("ts")?.as_f64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn top_level_ts_takes_precedence() {
        let payload = json!({ "ts": 1_700_000_000_000u64, "data": { "ts": 1 } });
        assert_eq!(extract_timestamp(&payload), Some(1_700_000_000_000.0));
    }

    #[test]
    fn non_numeric_top_level_ts_falls_through_to_nested() {
        let payload = json!({ "ts": "yesterday", "meta": { "ts": 42 } });
        assert_eq!(extract_timestamp(&payload), Some(42.0));
    }

    #[test]
    fn nested_fields_are_checked_in_fixed_order() {
        let payload = json!({
            "result": { "ts": 5 },
            "meta": { "ts": 4 },
            "value": { "ts": 3 },
            "payload": { "ts": 2 },
        });
        assert_eq!(extract_timestamp(&payload), Some(2.0));

        let payload = json!({ "result": { "ts": 5 }, "data": { "ts": 1 } });
        assert_eq!(extract_timestamp(&payload), Some(1.0));
    }

    #[test]
    fn each_parent_is_recognised() {
        for parent in NESTED_TS_PARENTS {
            let payload = json!({ parent: { "ts": 7 } });
            assert_eq!(extract_timestamp(&payload), Some(7.0), "parent {parent}");
        }
    }

    #[test]
    fn skips_parents_without_numeric_ts() {
        let payload = json!({ "data": { "ts": null }, "payload": 3, "value": { "ts": 9.5 } });
        assert_eq!(extract_timestamp(&payload), Some(9.5));
    }

    #[test]
    fn misses() {
        assert_eq!(extract_timestamp(&json!(null)), None);
        assert_eq!(extract_timestamp(&json!(12345)), None);
        assert_eq!(extract_timestamp(&json!("ts")), None);
        assert_eq!(extract_timestamp(&json!([{ "ts": 1 }])), None);
        assert_eq!(extract_timestamp(&json!({})), None);
        assert_eq!(extract_timestamp(&json!({ "data": { "inner": { "ts": 1 } } })), None);
        assert_eq!(extract_timestamp(&json!({ "other": { "ts": 1 } })), None);
    }
}
