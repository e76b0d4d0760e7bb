use rmcp::schemars::{schema_for, JsonSchema};
use serde_json::Value;

/// A JSON schema used as the request `format`.
#[derive(Clone, Debug, PartialEq)]
pub struct SchemaSpec {
    pub schema: Value,
}

impl SchemaSpec {
    pub fn from_value(schema: Value) -> Self {
        Self { schema }
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        let v: Value = serde_json::from_str(s.trim())?;
        Ok(Self::from_value(v))
    }

    pub fn from_type<T: JsonSchema>() -> Result<Self, serde_json::Error> {
        let schema = serde_json::to_value(schema_for!(T))?;
        Ok(Self::from_value(schema))
    }

    /// The plain `"json"` format, no schema enforced.
    pub fn json() -> Self {
        Self::from_value(Value::String("json".into()))
    }

    pub fn into_format(self) -> Value {
        self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn schema_from_text_and_type() {
        let spec = SchemaSpec::from_json(r#" {"type": "object", "required": ["name"]} "#).unwrap();
        assert_eq!(spec.into_format()["required"], json!(["name"]));

        let list = SchemaSpec::from_type::<Vec<String>>().unwrap();
        assert_eq!(list.schema["type"], json!("array"));

        assert_eq!(SchemaSpec::json().into_format(), json!("json"));
        assert!(SchemaSpec::from_json("{not json").is_err());
    }
}
