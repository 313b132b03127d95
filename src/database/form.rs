use std::{collections::HashMap, str::FromStr};

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::Error;

pub type FormData = HashMap<String, Value>;

/// Untyped form data handed over by the presentation layer.
pub struct Form {
    inner: HashMap<String, Value>,
}

impl Form {
    pub fn from_data(data: FormData) -> Self {
        Self { inner: data }
    }

    pub fn get_value<T>(&self, key: &'static str) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        match self.inner.get(key) {
            Some(value) => serde_json::from_value(value.to_owned())
                .map_err(|_e| Error::validation(key, "Invalid type conversion")),
            None => Err(Error::validation(key, "Missing field")),
        }
    }

    pub fn get_number<T>(&self, key: &'static str) -> Result<T, Error>
    where
        T: FromStr,
    {
        match self.inner.get(key) {
            Some(value) => match value.as_str() {
                Some(v) => v
                    .parse()
                    .map_err(|_e| Error::validation(key, "Invalid type conversion")),
                None => Err(Error::validation(key, "Failed to parse value as str")),
            },
            None => Err(Error::validation(key, "Missing field")),
        }
    }

    pub fn get_str(&self, key: &'static str) -> Result<String, Error> {
        match self.inner.get(key) {
            Some(value) => match value.as_str() {
                Some(v) => Ok(v.to_string()),
                None => Err(Error::validation(key, "Failed to parse value as str")),
            },
            None => Err(Error::validation(key, "Missing field")),
        }
    }
}

/// Parses the optional `recipes_limit` query value. Anything that is not a
/// plain run of ASCII digits is ignored, not rejected.
pub fn parse_recipes_limit(raw: Option<&str>) -> Option<i64> {
    let raw = raw?;
    if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RecipePayload;
    use serde_json::json;

    #[test]
    fn recipes_limit_accepts_digit_runs() {
        assert_eq!(parse_recipes_limit(Some("2")), Some(2));
        assert_eq!(parse_recipes_limit(Some("0")), Some(0));
        assert_eq!(parse_recipes_limit(Some("007")), Some(7));
    }

    #[test]
    fn recipes_limit_ignores_everything_else() {
        assert_eq!(parse_recipes_limit(None), None);
        assert_eq!(parse_recipes_limit(Some("")), None);
        assert_eq!(parse_recipes_limit(Some("-1")), None);
        assert_eq!(parse_recipes_limit(Some("2x")), None);
        assert_eq!(parse_recipes_limit(Some("два")), None);
    }

    #[test]
    fn form_extracts_typed_values() {
        let mut data = FormData::new();
        data.insert("recipe".to_string(), json!({
            "name": "Борщ",
            "text": "Варить.",
            "image": "data:image/png;base64,AAAA",
            "cooking_time": 90,
            "tags": [1, 2],
            "ingredients": [{"id": 3, "amount": 500}],
        }));
        data.insert("author".to_string(), json!("17"));

        let form = Form::from_data(data);
        let payload: RecipePayload = form.get_value("recipe").unwrap();
        assert_eq!(payload.cooking_time, 90);
        assert_eq!(payload.tags, vec![1, 2]);
        let author: i32 = form.get_number("author").unwrap();
        assert_eq!(author, 17);
    }

    #[test]
    fn form_reports_the_offending_field() {
        let form = Form::from_data(FormData::new());
        match form.get_str("name") {
            Err(Error::Validation { field, .. }) => assert_eq!(field, "name"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
