use schemars::JsonSchema;
use serde::Deserialize;

/// Input parameters for the lookup_info tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct LookupToolInput {
    /// The customer's question, or a rephrasing of it, to look up in the knowledge base
    pub query: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_input_deserialization() {
        let input: LookupToolInput =
            serde_json::from_str(r#"{"query": "Do you pick up laundry?"}"#).unwrap();
        assert_eq!(input.query, "Do you pick up laundry?");
    }

    #[test]
    fn test_lookup_input_requires_query() {
        assert!(serde_json::from_str::<LookupToolInput>("{}").is_err());
    }

    #[test]
    fn test_lookup_input_schema_names_query() {
        let schema = serde_json::to_string(&schemars::schema_for!(LookupToolInput)).unwrap();
        assert!(schema.contains("\"query\""));
    }
}
