//! Advisory resolution against an untrusted external language model.
//!
//! The deterministic [`classify`] baseline is always computed first. The
//! external advisor may only enrich the prose: missing or malformed lists
//! are patched from the baseline, and any failure of the call (transport,
//! status, timeout, undecodable output) silently yields the baseline.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::classifier::classify;
use crate::models::{CommunityReport, SafetyAssessment, SafetyScore};

// ---

/// Failures of the external advisory call. Never surfaced to callers of
/// [`resolve`]; they are logged and replaced by the baseline.
#[derive(Debug, thiserror::Error)]
pub enum AdvisoryError {
    #[error("advisory service is not configured")]
    Disabled,

    #[error("advisory request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("advisory service returned HTTP {0}")]
    Status(u16),

    #[error("advisory response contained no text")]
    EmptyResponse,

    #[error("advisory response could not be decoded: {0}")]
    Decode(String),

    #[error("advisory call timed out after {0:?}")]
    Timeout(Duration),
}

/// An external source of natural-language advisory text.
#[async_trait]
pub trait Advisor: Send + Sync {
    /// Send the prompt and return the raw response text.
    async fn advise(&self, prompt: &str) -> Result<String, AdvisoryError>;
}

/// Advisor used when no API key is configured; every call fails so the
/// resolver serves the baseline.
#[derive(Debug, Default, Clone)]
pub struct OfflineAdvisor;

#[async_trait]
impl Advisor for OfflineAdvisor {
    async fn advise(&self, _prompt: &str) -> Result<String, AdvisoryError> {
        Err(AdvisoryError::Disabled)
    }
}

/// Google Gemini `generateContent` client.
#[derive(Debug, Clone)]
pub struct GeminiAdvisor {
    // ---
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GeminiAdvisor {
    // ---
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl Advisor for GeminiAdvisor {
    async fn advise(&self, prompt: &str) -> Result<String, AdvisoryError> {
        // ---
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };

        debug!("POST {} (model {})", url, self.model);

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdvisoryError::Status(status.as_u16()));
        }

        let parsed: GenerateResponse = response.json().await?;
        let text: String = parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .filter_map(|p| p.text)
            .collect();

        if text.trim().is_empty() {
            return Err(AdvisoryError::EmptyResponse);
        }
        Ok(text)
    }
}

// ---

/// Join reports as `"{issue_type}: {description}"`, or `"None"` when empty.
pub fn summarize_reports(reports: &[CommunityReport]) -> String {
    // ---
    if reports.is_empty() {
        return "None".to_string();
    }
    reports
        .iter()
        .map(|r| format!("{}: {}", r.issue_type, r.description))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build the advisory prompt, grounding the model in the baseline tier.
pub fn build_prompt(tds: f64, reports: &[CommunityReport], baseline: &SafetyAssessment) -> String {
    // ---
    format!(
        "Analyze water quality with TDS level: {tds} ppm.\n\
         Community reports in the area: {reports}.\n\
         Reference classification: score {score}, recommendation \"{recommendation}\".\n\
         Known side effects at this level: {side_effects}.\n\
         Known improvement tips at this level: {tips}.\n\
         Provide:\n\
         1. A safety score (Safe, Risk, Unsafe).\n\
         2. A clear recommendation.\n\
         3. A brief explanation.\n\
         4. A list of potential side effects of drinking this water.\n\
         5. A list of practical tips to improve this water quality at home.\n\
         Return ONLY a JSON object with keys: score, tds_level, recommendation, \
         explanation, side_effects, improvement_tips.",
        reports = summarize_reports(reports),
        score = baseline.score,
        recommendation = baseline.recommendation,
        side_effects = baseline.side_effects.join("; "),
        tips = baseline.improvement_tips.join("; "),
    )
}

/// Remove a surrounding Markdown code fence (with optional language tag).
pub fn strip_code_fences(raw: &str) -> &str {
    // ---
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. `json`) on the opening fence line, which may
    // also be the only line.
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Decode the advisor's raw text into an assessment.
///
/// The top-level scalar fields are required. `side_effects` and
/// `improvement_tips` fall back to the baseline's lists when missing, not
/// arrays of strings, or empty.
pub fn decode_advisory(
    raw: &str,
    baseline: &SafetyAssessment,
) -> Result<SafetyAssessment, AdvisoryError> {
    // ---
    let value: Value = serde_json::from_str(strip_code_fences(raw))
        .map_err(|e| AdvisoryError::Decode(e.to_string()))?;
    let obj = value
        .as_object()
        .ok_or_else(|| AdvisoryError::Decode("response is not a JSON object".into()))?;

    let score: SafetyScore = obj
        .get("score")
        .cloned()
        .ok_or_else(|| AdvisoryError::Decode("missing 'score'".into()))
        .and_then(|v| {
            serde_json::from_value(v).map_err(|e| AdvisoryError::Decode(format!("score: {e}")))
        })?;
    let tds_level = obj
        .get("tds_level")
        .and_then(Value::as_f64)
        .ok_or_else(|| AdvisoryError::Decode("missing or non-numeric 'tds_level'".into()))?;
    let recommendation = required_str(obj, "recommendation")?;
    let explanation = required_str(obj, "explanation")?;

    let side_effects = string_list(obj.get("side_effects")).unwrap_or_else(|| {
        debug!("advisory response lacks usable side_effects, using baseline");
        baseline.side_effects.clone()
    });
    let improvement_tips = string_list(obj.get("improvement_tips")).unwrap_or_else(|| {
        debug!("advisory response lacks usable improvement_tips, using baseline");
        baseline.improvement_tips.clone()
    });

    Ok(SafetyAssessment {
        score,
        tds_level,
        recommendation,
        explanation,
        side_effects,
        improvement_tips,
    })
}

fn required_str(obj: &serde_json::Map<String, Value>, key: &str) -> Result<String, AdvisoryError> {
    // ---
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AdvisoryError::Decode(format!("missing or non-string '{key}'")))
}

fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    // ---
    let items = value?.as_array()?;
    let list: Option<Vec<String>> = items
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect();
    list.filter(|l| !l.is_empty())
}

/// Resolve the advisory for a TDS value and local reports.
///
/// Always returns a complete assessment; failures of the advisor are
/// logged at `warn` and answered with `classify(tds)`.
pub async fn resolve(
    advisor: &dyn Advisor,
    tds: f64,
    reports: &[CommunityReport],
) -> SafetyAssessment {
    // ---
    let baseline = classify(tds);
    let prompt = build_prompt(baseline.tds_level, reports, &baseline);

    let outcome = match advisor.advise(&prompt).await {
        Ok(raw) => decode_advisory(&raw, &baseline),
        Err(e) => Err(e),
    };

    match outcome {
        Ok(assessment) => assessment,
        Err(AdvisoryError::Disabled) => baseline,
        Err(e) => {
            warn!("Advisory fallback to baseline for {} ppm: {}", tds, e);
            baseline
        }
    }
}

/// [`resolve`] bounded by a timeout; an elapsed timer yields the baseline.
pub async fn resolve_within(
    advisor: &dyn Advisor,
    tds: f64,
    reports: &[CommunityReport],
    limit: Duration,
) -> SafetyAssessment {
    // ---
    match tokio::time::timeout(limit, resolve(advisor, tds, reports)).await {
        Ok(assessment) => assessment,
        Err(_) => {
            warn!("{}", AdvisoryError::Timeout(limit));
            classify(tds)
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::IssueType;
    use chrono::{TimeZone, Utc};

    /// Advisor returning a fixed response, or failing when `None`.
    struct ScriptedAdvisor(Option<&'static str>);

    #[async_trait]
    impl Advisor for ScriptedAdvisor {
        async fn advise(&self, _prompt: &str) -> Result<String, AdvisoryError> {
            self.0
                .map(str::to_string)
                .ok_or(AdvisoryError::EmptyResponse)
        }
    }

    struct HangingAdvisor;

    #[async_trait]
    impl Advisor for HangingAdvisor {
        async fn advise(&self, _prompt: &str) -> Result<String, AdvisoryError> {
            futures::future::pending().await
        }
    }

    fn report(issue_type: IssueType, description: &str) -> CommunityReport {
        // ---
        CommunityReport {
            id: 1,
            issue_type,
            description: description.to_string(),
            lat: 28.6139,
            lng: 77.2090,
            timestamp: Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_summarize_reports() {
        // ---
        assert_eq!(summarize_reports(&[]), "None");
        let reports = vec![
            report(IssueType::Taste, "Metallic taste"),
            report(IssueType::Color, "Yellow tint"),
        ];
        assert_eq!(
            summarize_reports(&reports),
            "Taste: Metallic taste, Color: Yellow tint"
        );
    }

    #[test]
    fn test_prompt_embeds_context() {
        // ---
        let baseline = classify(640.0);
        let prompt = build_prompt(640.0, &[], &baseline);
        assert!(prompt.contains("640 ppm"));
        assert!(prompt.contains("Community reports in the area: None."));
        assert!(prompt.contains("score Unsafe"));
        assert!(prompt.contains(&baseline.side_effects[0]));
        assert!(prompt.contains("improvement_tips"));
    }

    #[test]
    fn test_strip_code_fences() {
        // ---
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
        assert_eq!(strip_code_fences("```json {\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```{\"a\":1}```"), "{\"a\":1}");
    }

    #[tokio::test]
    async fn test_resolve_accepts_single_line_fence() {
        // ---
        let advisor = ScriptedAdvisor(Some(
            "```json {\"score\":\"Safe\",\"tds_level\":140,\"recommendation\":\"Drink\",\
             \"explanation\":\"Fine.\",\"side_effects\":[\"None\"],\"improvement_tips\":[\"Keep it up\"]}```",
        ));
        let a = resolve(&advisor, 140.0, &[]).await;
        assert_eq!(a.recommendation, "Drink");
        assert_eq!(a.improvement_tips, vec!["Keep it up".to_string()]);
    }

    #[tokio::test]
    async fn test_resolve_accepts_fenced_response() {
        // ---
        let advisor = ScriptedAdvisor(Some(
            "```json\n{\"score\":\"Risk\",\"tds_level\":420,\"recommendation\":\"Boil\",\
             \"explanation\":\"Elevated.\",\"side_effects\":[\"Upset stomach\"],\
             \"improvement_tips\":[\"Use RO\"]}\n```",
        ));
        let a = resolve(&advisor, 420.0, &[]).await;
        assert_eq!(a.score, SafetyScore::Risk);
        assert_eq!(a.recommendation, "Boil");
        assert_eq!(a.side_effects, vec!["Upset stomach".to_string()]);
        assert_eq!(a.improvement_tips, vec!["Use RO".to_string()]);
    }

    #[tokio::test]
    async fn test_resolve_patches_missing_side_effects() {
        // ---
        let advisor = ScriptedAdvisor(Some(
            "{\"score\":\"Unsafe\",\"tds_level\":900,\"recommendation\":\"Avoid\",\
             \"explanation\":\"Too high.\",\"improvement_tips\":\"not a list\"}",
        ));
        let a = resolve(&advisor, 900.0, &[]).await;
        let baseline = classify(900.0);
        assert_eq!(a.recommendation, "Avoid");
        assert_eq!(a.side_effects, baseline.side_effects);
        assert_eq!(a.improvement_tips, baseline.improvement_tips);
    }

    #[tokio::test]
    async fn test_resolve_falls_back_on_malformed_json() {
        // ---
        let advisor = ScriptedAdvisor(Some("The water looks fine to me!"));
        assert_eq!(resolve(&advisor, 333.0, &[]).await, classify(333.0));
    }

    #[tokio::test]
    async fn test_resolve_falls_back_on_missing_required_field() {
        // ---
        let advisor = ScriptedAdvisor(Some(
            "{\"score\":\"Safe\",\"recommendation\":\"Drink\",\"explanation\":\"ok\"}",
        ));
        assert_eq!(resolve(&advisor, 120.0, &[]).await, classify(120.0));

        let advisor = ScriptedAdvisor(Some(
            "{\"score\":\"Fine\",\"tds_level\":120,\"recommendation\":\"Drink\",\"explanation\":\"ok\"}",
        ));
        assert_eq!(resolve(&advisor, 120.0, &[]).await, classify(120.0));
    }

    #[test]
    fn test_resolve_falls_back_on_error() {
        // ---
        let a = tokio_test::block_on(resolve(&ScriptedAdvisor(None), 1500.0, &[]));
        assert_eq!(a, classify(1500.0));

        let a = tokio_test::block_on(resolve(&OfflineAdvisor, 75.0, &[]));
        assert_eq!(a, classify(75.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_within_times_out_to_baseline() {
        // ---
        let a = resolve_within(&HangingAdvisor, 510.0, &[], Duration::from_secs(15)).await;
        assert_eq!(a, classify(510.0));
    }
}
