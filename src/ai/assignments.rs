use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::Country;

const ASSIGNMENTS_KEY: &str = "assignments";

/// One element of an `assignments` array returned by the LLM.
pub trait Assignment: DeserializeOwned {
    fn validate(&self) -> Result<()>;
}

/// Parse an LLM response of the form `{"assignments": [...]}`.
///
/// Any other top-level shape, extra keys, or an element that fails to
/// deserialize or validate is rejected.
pub fn parse_assignments<T: Assignment>(content: &str) -> Result<Vec<T>> {
    let value: Value = serde_json::from_str(content.trim())
        .map_err(|e| AppError::parse(format!("LLM response is not valid JSON: {}", e)))?;

    let Value::Object(mut object) = value else {
        return Err(AppError::parse("LLM response must be a JSON object"));
    };

    if object.len() != 1 || !object.contains_key(ASSIGNMENTS_KEY) {
        let keys: Vec<&String> = object.keys().collect();
        return Err(AppError::parse(format!(
            "LLM response must contain only \"{}\", got keys {:?}",
            ASSIGNMENTS_KEY, keys
        )));
    }

    let Some(Value::Array(items)) = object.remove(ASSIGNMENTS_KEY) else {
        return Err(AppError::parse("\"assignments\" must be an array"));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let assignment: T = serde_json::from_value(item).map_err(|e| {
                AppError::parse(format!("assignment #{} is malformed: {}", index, e))
            })?;
            assignment.validate()?;
            Ok(assignment)
        })
        .collect()
}

pub(crate) fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::parse(format!("assignment field {} is empty", field)));
    }
    Ok(())
}

pub(crate) fn country_list(countries: &[Country]) -> String {
    countries
        .iter()
        .map(Country::prompt_line)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        country_iso2: String,
    }

    impl Assignment for Item {
        fn validate(&self) -> Result<()> {
            require("country_iso2", &self.country_iso2)
        }
    }

    #[test]
    fn accepts_single_assignments_key() {
        let items: Vec<Item> =
            parse_assignments(r#"{"assignments": [{"country_iso2": "JP"}]}"#).unwrap();
        assert_eq!(items, vec![Item { country_iso2: "JP".into() }]);

        let empty: Vec<Item> = parse_assignments(r#"{"assignments": []}"#).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn rejects_other_shapes() {
        let cases = [
            r#"[{"country_iso2": "JP"}]"#,
            r#"{"data": [{"country_iso2": "JP"}]}"#,
            r#"{"assignments": [], "note": "extra"}"#,
            r#"{"assignments": {"country_iso2": "JP"}}"#,
            r#"{"assignments": [{"iso": "JP"}]}"#,
            r#"{"assignments": [{"country_iso2": " "}]}"#,
            "not json",
        ];
        for case in cases {
            let result = parse_assignments::<Item>(case);
            assert!(matches!(result, Err(AppError::Parse(_))), "accepted {}", case);
        }
    }
}
