//! Upstream ids arrive as JSON strings or numbers; both are stored as text.

use serde::{Deserialize, Deserializer, de::Error};
use serde_json::Value;

fn id_from_value<E: Error>(value: Value) -> Result<Option<String>, E> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(E::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    id_from_value(Value::deserialize(deserializer)?)?
        .ok_or_else(|| D::Error::custom("id must not be null"))
}

pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    id_from_value(Value::deserialize(deserializer)?)
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Holder {
        #[serde(deserialize_with = "super::deserialize")]
        id: String,
        #[serde(default, deserialize_with = "super::deserialize_option")]
        brand_id: Option<String>,
    }

    #[test]
    fn numbers_and_strings_normalize_to_strings() {
        let a: Holder = serde_json::from_str(r#"{"id": 17, "brand_id": "9"}"#).unwrap();
        let b: Holder = serde_json::from_str(r#"{"id": "17", "brand_id": 9}"#).unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.brand_id, b.brand_id);
    }

    #[test]
    fn null_optional_id_is_none_and_missing_defaults() {
        let a: Holder = serde_json::from_str(r#"{"id": 1, "brand_id": null}"#).unwrap();
        let b: Holder = serde_json::from_str(r#"{"id": 1}"#).unwrap();
        assert!(a.brand_id.is_none());
        assert!(b.brand_id.is_none());
    }

    #[test]
    fn null_required_id_is_rejected() {
        assert!(serde_json::from_str::<Holder>(r#"{"id": null}"#).is_err());
    }
}
