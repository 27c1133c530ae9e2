use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::AppError;
use crate::models::metadata::ExtractedMetadata;

pub const MAX_SNIPPET_CHARS: usize = 8000;
const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Turns a document into bibliographic metadata. Any failure means the task
/// is dropped; there is no partial result.
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    async fn extract(&self, path: &Path) -> Result<ExtractedMetadata, AppError>;
}

pub fn build_prompt(snippet: &str) -> String {
    format!(
        "Analyze text from a research paper and output ONLY a valid JSON object with these keys:\n\
         1. \"author\": ONLY the last name of the VERY FIRST author listed.\n\
         2. \"year\": the 4-digit publication year.\n\
         3. \"journal\": official NLM/PubMed journal abbreviation if available; else the full journal name. Preprints => \"Preprint\".\n\
         4. \"title\": the full official title of the paper.\n\
         5. \"is_multiple_authors\": boolean true/false.\n\
         Example: {{\"author\": \"FitzGerald\", \"year\": \"2016\", \"journal\": \"Invest Radiol\", \"title\": \"A Proposed...\", \"is_multiple_authors\": true}}\n\
         Paper Text: ---\n\
         {snippet}\n\
         ---"
    )
}

/// The outermost `{ ... }` of a model reply, code fences and chatter
/// around it ignored.
pub fn extract_json_payload(text: &str) -> Option<&str> {
    let first = text.find('{')?;
    let last = text.rfind('}')?;
    (first < last).then(|| &text[first..=last])
}

pub fn parse_metadata_response(text: &str) -> Result<ExtractedMetadata, AppError> {
    let payload = extract_json_payload(text)
        .ok_or_else(|| AppError::MalformedResponse("no JSON object in response".to_string()))?;
    serde_json::from_str(payload).map_err(|e| AppError::MalformedResponse(e.to_string()))
}

/// Leading text of the document, capped at `MAX_SNIPPET_CHARS` characters.
pub fn truncate_snippet(text: &str) -> &str {
    match text.char_indices().nth(MAX_SNIPPET_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Reads the document text on the blocking pool. An empty document is a
/// `NoText` failure.
pub async fn read_text_snippet(path: &Path) -> Result<String, AppError> {
    let owned: PathBuf = path.to_path_buf();
    let name = crate::models::task::display_name(path);
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text(&owned))
        .await
        .map_err(|e| AppError::Extraction(format!("text extraction aborted for {name}: {e}")))?
        .map_err(|e| AppError::Extraction(format!("cannot read {name}: {e}")))?;

    if text.trim().is_empty() {
        return Err(AppError::NoText(name));
    }
    Ok(truncate_snippet(&text).to_string())
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<serde_json::Value>,
    #[serde(rename = "generationConfig")]
    generation_config: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

fn response_text(response: GenerateResponse) -> String {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

/// Gemini `generateContent` over REST.
#[derive(Debug, Clone)]
pub struct GeminiExtractor {
    client: reqwest::Client,
    api_key: String,
    model: String,
    api_base: String,
}

impl GeminiExtractor {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            api_base: API_BASE.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub async fn complete(&self, prompt: &str) -> Result<String, AppError> {
        let request = GenerateRequest {
            contents: vec![json!({"role": "user", "parts": [{"text": prompt}]})],
            generation_config: json!({"temperature": 0.0}),
        };
        let url = format!(
            "{}/models/{}:generateContent",
            self.api_base.trim_end_matches('/'),
            self.model
        );

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<GenerateResponse>()
            .await?;

        let text = response_text(response);
        tracing::debug!(
            model = %self.model,
            chars = text.len(),
            "extractor response: {}",
            text.chars().take(500).collect::<String>()
        );
        Ok(text)
    }
}

#[async_trait]
impl MetadataExtractor for GeminiExtractor {
    async fn extract(&self, path: &Path) -> Result<ExtractedMetadata, AppError> {
        let snippet = read_text_snippet(path).await?;
        let reply = self.complete(&build_prompt(&snippet)).await?;
        parse_metadata_response(&reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_reply() {
        let reply = "Sure!\n```json\n{\"author\": \"Doe\", \"year\": \"2021\", \"journal\": \"Nature\", \"title\": \"X\", \"is_multiple_authors\": false}\n```";
        let meta = parse_metadata_response(reply).unwrap();
        assert_eq!(meta.author, "Doe");
        assert_eq!(meta.year, "2021");
        assert_eq!(meta.journal, "Nature");
        assert_eq!(meta.title, "X");
        assert!(!meta.is_multiple_authors);
    }

    #[test]
    fn partial_object_gets_defaults() {
        let meta = parse_metadata_response("{\"journal\": \"Radiology\"}").unwrap();
        assert_eq!(meta.journal, "Radiology");
        assert_eq!(meta.author, "Unknown");
        assert_eq!(meta.title, "Unknown Title");
        assert!(meta.is_multiple_authors);
    }

    #[test]
    fn reply_without_object_is_malformed() {
        let err = parse_metadata_response("I could not find any metadata.").unwrap_err();
        assert!(matches!(err, AppError::MalformedResponse(_)));
        assert!(parse_metadata_response("} backwards {").is_err());
    }

    #[test]
    fn invalid_json_is_malformed() {
        let err = parse_metadata_response("{author: Doe}").unwrap_err();
        assert!(matches!(err, AppError::MalformedResponse(_)));
    }

    #[test]
    fn snippet_is_capped_on_char_boundary() {
        let long = "é".repeat(MAX_SNIPPET_CHARS + 10);
        let snippet = truncate_snippet(&long);
        assert_eq!(snippet.chars().count(), MAX_SNIPPET_CHARS);
        assert_eq!(truncate_snippet("short"), "short");
    }

    #[test]
    fn prompt_embeds_snippet() {
        let prompt = build_prompt("Abstract: imaging study");
        assert!(prompt.contains("Abstract: imaging study"));
        assert!(prompt.contains("\"is_multiple_authors\""));
    }

    #[test]
    fn response_text_joins_parts() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": "{\"author\":"}, {"text": "\"Doe\"}"}]}}]
        }))
        .unwrap();
        assert_eq!(response_text(response), "{\"author\":\"Doe\"}");

        let empty: GenerateResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(response_text(empty), "");
    }

    #[tokio::test]
    async fn unreadable_document_is_an_extraction_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.pdf");
        std::fs::write(&path, b"not really a pdf").unwrap();

        let err = read_text_snippet(&path).await.unwrap_err();
        assert!(err.is_extraction_failure());
    }
}
