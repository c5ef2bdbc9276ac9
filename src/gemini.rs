use crate::error::AnalysisError;
use crate::models::{AnalysisRequest, AnalysisResult, Difficulty, Impact};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, info};

pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

const SYSTEM_INSTRUCTION: &str = "You are an expert Senior Web Strategist, SEO Specialist, and Product Manager.
Your goal is to analyze website context provided by users (text and optionally images) and generate actionable, high-impact optimizations.
Focus on modern SEO practices (semantic search, user intent), accessibility (WCAG), and feature recommendations that drive engagement (Relay features).
When generating Title Tags, ensure they are punchy, keyword-rich, and under 60 characters to prevent truncation in SERPs.
If an image is provided, analyze its visual hierarchy, design, and accessibility as part of your recommendations.";

/// Anything that can turn a request into a result. The dispatcher only
/// sees this trait.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate, if any.
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelList {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelInfo {
    name: String,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

/// Models that support `generateContent`, without the `models/` prefix.
pub async fn list_models(api_url: &str, api_key: &str) -> Result<Vec<String>, AnalysisError> {
    let endpoint = format!("{}/models", api_url.trim_end_matches('/'));
    let response = Client::new()
        .get(&endpoint)
        .header("x-goog-api-key", api_key)
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(AnalysisError::transport(format!(
            "Failed to get models: {}",
            response.status()
        )));
    }

    let list: ModelList = response.json().await?;
    Ok(list
        .models
        .into_iter()
        .filter(|m| m.supported_generation_methods.iter().any(|g| g == "generateContent"))
        .map(|m| m.name.trim_start_matches("models/").to_string())
        .collect())
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    api_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
    max_attempts: u32,
    retry_delay: Duration,
}

impl GeminiClient {
    pub fn new(api_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            http: Client::new(),
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_attempts: crate::utils::DEFAULT_MAX_ATTEMPTS,
            retry_delay: Duration::from_millis(crate::utils::RETRY_DELAY_MS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, max_attempts: u32, delay: Duration) -> Self {
        self.max_attempts = max_attempts;
        self.retry_delay = delay;
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.api_url.trim_end_matches('/'),
            self.model
        )
    }

    async fn generate(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        let endpoint = self.endpoint();
        info!("Sending analysis request to {}", endpoint);

        let body = build_request_body(request);
        let resp = self
            .http
            .post(&endpoint)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            error!("Gemini API error response: {}", text);
            return Err(AnalysisError::transport(format!(
                "Gemini API error {}: {}",
                status, text
            )));
        }

        let response_text = resp.text().await?;
        debug!("Gemini API response: {}", response_text);

        let envelope: GenerateContentResponse = serde_json::from_str(&response_text)?;
        let text = envelope.text().ok_or(AnalysisError::EmptyResponse)?;
        parse_result(&text)
    }
}

#[async_trait]
impl Analyzer for GeminiClient {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        crate::utils::retry_transport(self.max_attempts, self.retry_delay, || {
            self.generate(request)
        })
        .await
    }
}

/// Parses the model's text part. Stray markdown fences are tolerated.
pub fn parse_result(text: &str) -> Result<AnalysisResult, AnalysisError> {
    let clean = text
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    if clean.is_empty() {
        return Err(AnalysisError::EmptyResponse);
    }
    Ok(serde_json::from_str(clean)?)
}

pub fn build_prompt(request: &AnalysisRequest) -> String {
    let image_note = if request.image.is_some() {
        "Note: An image screenshot of the website or design has been provided. Please use this to inform your accessibility tips (color contrast, layout) and feature recommendations."
    } else {
        ""
    };

    format!(
"Analyze the following website context:
Business Name: {}
Target Audience: {}
URL (optional reference): {}
Description/Goals: {}
Sample Content: \"{}\"
{}

Please provide a structured analysis including:
1. SEO Optimizations:
   - Title Tag: A concise, high-impact title tag (max 60 chars) using power words and primary keywords.
   - Meta Description: A click-worthy summary (150-160 chars) with a clear call-to-action or value proposition.
   - Keywords: A list of 5-8 high-value semantic keywords.
   - Header Structure: Suggested H1/H2 hierarchy for the main landing page.
2. Content Improvements: Specific, actionable advice to improve tone, readability, or conversion.
3. Accessibility Tips: Key technical or visual changes to ensure inclusivity.
4. Feature Recommendations: Suggest \"Relay Features\" - interactive elements, tools, or functionalities that keep users engaged or move them to the next step (e.g., calculators, chatbots, interactive demos, related content engines). For each, include a technical stack suggestion and a concrete user flow example (e.g. \"User clicks 'Get Started', a modal opens asking for X...\").
5. A brief executive summary.",
        request.business_name,
        request.target_audience,
        request.url.as_deref().unwrap_or("N/A"),
        request.description,
        request.current_content.as_deref().unwrap_or(""),
        image_note,
    )
}

pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "seo": {
                "type": "OBJECT",
                "properties": {
                    "titleTag": { "type": "STRING" },
                    "metaDescription": { "type": "STRING" },
                    "keywords": { "type": "ARRAY", "items": { "type": "STRING" } },
                    "headerSuggestions": { "type": "ARRAY", "items": { "type": "STRING" } }
                },
                "required": ["titleTag", "metaDescription", "keywords", "headerSuggestions"]
            },
            "contentImprovements": { "type": "ARRAY", "items": { "type": "STRING" } },
            "accessibilityTips": { "type": "ARRAY", "items": { "type": "STRING" } },
            "recommendedFeatures": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "name": { "type": "STRING" },
                        "description": { "type": "STRING" },
                        "impact": { "type": "STRING", "enum": Impact::ALL },
                        "difficulty": { "type": "STRING", "enum": Difficulty::ALL },
                        "techStackSuggestion": { "type": "STRING" },
                        "implementationExample": { "type": "STRING" }
                    },
                    "required": ["name", "description", "impact", "difficulty"]
                }
            },
            "summary": { "type": "STRING" }
        },
        "required": ["seo", "contentImprovements", "accessibilityTips", "recommendedFeatures", "summary"]
    })
}

pub fn build_request_body(request: &AnalysisRequest) -> Value {
    let mut parts = vec![json!({ "text": build_prompt(request) })];
    if let Some(image) = &request.image {
        parts.push(json!({
            "inlineData": {
                "mimeType": image.mime_type,
                "data": image.data
            }
        }));
    }

    json!({
        "systemInstruction": { "parts": [{ "text": SYSTEM_INSTRUCTION }] },
        "contents": [{ "role": "user", "parts": parts }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": response_schema()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EmbeddedImage;
    use mockito::Matcher;

    const PATH: &str = "/models/gemini-2.5-flash:generateContent";

    fn request() -> AnalysisRequest {
        AnalysisRequest {
            url: None,
            business_name: "EcoStore".to_string(),
            target_audience: "eco-conscious millennials".to_string(),
            description: "sells reusable bottles".to_string(),
            current_content: None,
            image: None,
        }
    }

    fn envelope(text: &str) -> String {
        json!({
            "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }]
        })
        .to_string()
    }

    fn result_json() -> String {
        json!({
            "seo": {
                "titleTag": "EcoStore: Reusable Bottles for a Greener You",
                "metaDescription": "Ditch plastic with stylish reusable bottles.",
                "keywords": ["reusable bottles", "eco friendly"],
                "headerSuggestions": ["H1: Drink Sustainably"]
            },
            "contentImprovements": ["Lead with impact numbers"],
            "accessibilityTips": ["Increase contrast on CTA"],
            "recommendedFeatures": [{
                "name": "Plastic Savings Calculator",
                "description": "Estimate bottles saved",
                "impact": "High",
                "difficulty": "Moderate",
                "techStackSuggestion": "React + Chart.js"
            }],
            "summary": "Strong niche with room to grow."
        })
        .to_string()
    }

    fn client(server: &mockito::ServerGuard) -> GeminiClient {
        GeminiClient::new(&format!("{}/", server.url()), "test-key", DEFAULT_MODEL)
            .with_retry(1, Duration::from_millis(1))
    }

    #[test]
    fn prompt_falls_back_to_na_for_missing_url() {
        let prompt = build_prompt(&request());
        assert!(prompt.contains("Business Name: EcoStore"));
        assert!(prompt.contains("URL (optional reference): N/A"));
        assert!(prompt.contains("Sample Content: \"\""));
        assert!(!prompt.contains("screenshot"));
    }

    #[test]
    fn prompt_gives_an_example_user_flow_for_features() {
        let prompt = build_prompt(&request());
        assert!(prompt.contains(
            "a concrete user flow example (e.g. \"User clicks 'Get Started', a modal opens asking for X...\")."
        ));
    }

    #[test]
    fn body_carries_image_as_second_part() {
        let mut req = request();
        req.image = Some(EmbeddedImage {
            mime_type: "image/webp".to_string(),
            data: "UklGRg==".to_string(),
        });
        let body = build_request_body(&req);
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/webp");
        assert!(parts[0]["text"].as_str().unwrap().contains("screenshot"));
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
    }

    #[test]
    fn schema_declares_required_keys_and_enums() {
        let schema = response_schema();
        assert_eq!(schema["required"].as_array().unwrap().len(), 5);
        let feature = &schema["properties"]["recommendedFeatures"]["items"];
        assert_eq!(feature["properties"]["impact"]["enum"], json!(["High", "Medium", "Low"]));
        assert_eq!(
            feature["properties"]["difficulty"]["enum"],
            json!(["Easy", "Moderate", "Hard"])
        );
    }

    #[test]
    fn parse_result_strips_code_fences() {
        let fenced = format!("```json\n{}\n```", result_json());
        let result = parse_result(&fenced).unwrap();
        assert_eq!(result.seo.keywords.len(), 2);
    }

    #[tokio::test]
    async fn analyze_returns_structured_result() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", PATH)
            .match_header("x-goog-api-key", "test-key")
            .match_body(Matcher::PartialJson(json!({
                "generationConfig": { "responseMimeType": "application/json" }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(envelope(&result_json()))
            .create_async()
            .await;

        let result = client(&server).analyze(&request()).await.unwrap();
        mock.assert_async().await;
        assert!(!result.summary.is_empty());
        assert_eq!(result.recommended_features[0].impact, Impact::High);
        assert_eq!(result.recommended_features[0].difficulty, Difficulty::Moderate);
    }

    #[tokio::test]
    async fn empty_text_is_empty_response() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", PATH)
            .with_status(200)
            .with_body(envelope(""))
            .create_async()
            .await;

        let err = client(&server).analyze(&request()).await.unwrap_err();
        assert_eq!(err, AnalysisError::EmptyResponse);
        assert_eq!(err.to_string(), "No response generated from AI.");
    }

    #[tokio::test]
    async fn missing_candidates_is_empty_response() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", PATH)
            .with_status(200)
            .with_body(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#)
            .create_async()
            .await;

        let err = client(&server).analyze(&request()).await.unwrap_err();
        assert_eq!(err, AnalysisError::EmptyResponse);
    }

    #[tokio::test]
    async fn non_conforming_json_is_parse_error() {
        let mut server = mockito::Server::new_async().await;
        let bad_enum = result_json().replace("\"High\"", "\"Critical\"");
        let _mock = server
            .mock("POST", PATH)
            .with_status(200)
            .with_body(envelope(&bad_enum))
            .create_async()
            .await;

        let err = client(&server).analyze(&request()).await.unwrap_err();
        assert!(matches!(err, AnalysisError::ParseError(_)));
    }

    #[tokio::test]
    async fn server_error_is_transport_error_with_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", PATH)
            .with_status(503)
            .with_body("model overloaded")
            .create_async()
            .await;

        let err = client(&server).analyze(&request()).await.unwrap_err();
        match err {
            AnalysisError::TransportError(msg) => {
                assert!(msg.contains("503"));
                assert!(msg.contains("model overloaded"));
            }
            other => panic!("expected transport error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn list_models_keeps_generate_content_models() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/models")
            .match_header("x-goog-api-key", "test-key")
            .with_status(200)
            .with_body(
                json!({
                    "models": [
                        { "name": "models/gemini-2.5-flash", "supportedGenerationMethods": ["generateContent", "countTokens"] },
                        { "name": "models/text-embedding-004", "supportedGenerationMethods": ["embedContent"] }
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let models = list_models(&server.url(), "test-key").await.unwrap();
        assert_eq!(models, vec!["gemini-2.5-flash".to_string()]);
    }

    #[tokio::test]
    async fn transport_failures_are_retried_when_configured() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", PATH)
            .with_status(500)
            .expect(3)
            .create_async()
            .await;

        let client = client(&server).with_retry(3, Duration::from_millis(1));
        let err = client.analyze(&request()).await.unwrap_err();
        assert!(err.is_transport());
        mock.assert_async().await;
    }
}
