use serde::{Deserialize, Serialize};

fn unknown() -> String {
    "Unknown".to_string()
}

fn unknown_title() -> String {
    "Unknown Title".to_string()
}

fn assume_multiple() -> bool {
    true
}

/// Bibliographic fields returned by the extractor. Fields absent from the
/// response take sentinel values rather than failing the parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedMetadata {
    #[serde(default = "unknown")]
    pub author: String,
    #[serde(default = "unknown", deserialize_with = "year_as_string")]
    pub year: String,
    #[serde(default = "unknown")]
    pub journal: String,
    #[serde(default = "unknown_title")]
    pub title: String,
    #[serde(default = "assume_multiple")]
    pub is_multiple_authors: bool,
}

impl Default for ExtractedMetadata {
    fn default() -> Self {
        Self {
            author: unknown(),
            year: unknown(),
            journal: unknown(),
            title: unknown_title(),
            is_multiple_authors: assume_multiple(),
        }
    }
}

// Models occasionally answer `"year": 2021` instead of a string.
fn year_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Null => unknown(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_sentinels() {
        let parsed: ExtractedMetadata = serde_json::from_str(r#"{"author": "Doe"}"#).unwrap();
        assert_eq!(parsed.author, "Doe");
        assert_eq!(parsed.year, "Unknown");
        assert_eq!(parsed.journal, "Unknown");
        assert_eq!(parsed.title, "Unknown Title");
        assert!(parsed.is_multiple_authors);
    }

    #[test]
    fn numeric_year_is_accepted() {
        let parsed: ExtractedMetadata =
            serde_json::from_str(r#"{"year": 2016, "is_multiple_authors": false}"#).unwrap();
        assert_eq!(parsed.year, "2016");
        assert!(!parsed.is_multiple_authors);
    }
}
