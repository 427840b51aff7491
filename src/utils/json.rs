use serde::{Deserialize, Deserializer};

/// Deserializes a field that distinguishes "omitted" from an explicit `null`.
///
/// Use together with `#[serde(default)]`: an omitted field stays `None`,
/// `null` becomes `Some(None)` and a value becomes `Some(Some(value))`. Diesel
/// changesets read the same shape as "skip", "set NULL" and "set value".
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Parses a JSON array of strings, trimming entries and dropping blanks.
pub fn string_list(value: &serde_json::Value) -> Result<Vec<String>, String> {
    match value {
        serde_json::Value::Null => Ok(Vec::new()),
        serde_json::Value::Array(items) => items
            .iter()
            .map(|item| match item {
                serde_json::Value::String(s) => Ok(s.trim().to_string()),
                other => Err(format!("expected string entries, got {other}")),
            })
            .filter(|entry| !matches!(entry, Ok(s) if s.is_empty()))
            .collect(),
        other => Err(format!("expected an array of strings, got {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "nullable")]
        notes: Option<Option<String>>,
    }

    #[test]
    fn nullable_distinguishes_omitted_null_and_value() {
        let omitted: Patch = serde_json::from_value(json!({})).unwrap();
        assert_eq!(omitted.notes, None);

        let cleared: Patch = serde_json::from_value(json!({ "notes": null })).unwrap();
        assert_eq!(cleared.notes, Some(None));

        let set: Patch = serde_json::from_value(json!({ "notes": "bring adapters" })).unwrap();
        assert_eq!(set.notes, Some(Some("bring adapters".to_string())));
    }

    #[test]
    fn string_list_trims_and_drops_blanks() {
        let parsed = string_list(&json!([" Lucerne ", "", "Interlaken"])).unwrap();
        assert_eq!(parsed, vec!["Lucerne".to_string(), "Interlaken".to_string()]);
    }

    #[test]
    fn string_list_rejects_non_strings() {
        assert!(string_list(&json!([1, 2])).is_err());
        assert!(string_list(&json!("Lucerne")).is_err());
        assert!(string_list(&json!(null)).unwrap().is_empty());
    }
}
