//! Client for the external text-generation service.
//!
//! Every AI feature is a templated prompt posted to a chat-completions
//! style endpoint. The service is treated as an opaque, unreliable
//! collaborator: one request, no retry, no backoff. Structured responses
//! are validated against explicit schemas here, at the boundary, so
//! malformed output never reaches the store.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::config::Settings;
use crate::model::FaqEntry;

/// Failures surfaced by the AI boundary.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("AI endpoint returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("AI response had no content")]
    Empty,
    #[error("AI returned a malformed {kind}: {source}")]
    Parse {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Outbound client for the generation endpoint.
#[derive(Clone)]
pub struct AiClient {
    http: reqwest::Client,
    endpoint: Url,
    api_key: String,
    model: String,
}

impl AiClient {
    /// Build a client when the endpoint and key are configured; `None`
    /// otherwise (the features then report themselves unavailable).
    pub fn from_settings(cfg: &Settings) -> anyhow::Result<Option<Self>> {
        let (Some(url), Some(key)) = (cfg.ai_api_url.as_deref(), cfg.ai_api_key.as_deref()) else {
            return Ok(None);
        };
        let endpoint = Url::parse(url)?;
        Ok(Some(Self {
            http: reqwest::Client::new(),
            endpoint,
            api_key: key.to_string(),
            model: cfg.ai_model.clone(),
        }))
    }

    /// Send one prompt and return the raw response text. `json_mode` asks
    /// the service to answer with a single JSON object.
    pub async fn generate(&self, prompt: &str, json_mode: bool) -> Result<String, AiError> {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
        });
        if json_mode {
            body["response_format"] = serde_json::json!({"type": "json_object"});
        }
        let resp = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(AiError::Status(resp.status()));
        }
        let value: Value = resp.json().await?;
        let content = value["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(AiError::Empty)?;
        Ok(content.to_string())
    }
}

/// Article draft produced by the generator, validated before use.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleDraft {
    pub title: String,
    pub excerpt: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub meta_title: Option<String>,
    #[serde(default)]
    pub meta_description: Option<String>,
    #[serde(default)]
    pub focus_keyword: Option<String>,
    #[serde(default)]
    pub faq: Vec<FaqEntry>,
}

/// Ritual draft produced by the generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RitualDraft {
    pub title: String,
    pub category: String,
    pub description: String,
    pub duration: String,
    pub difficulty: String,
}

/// Guide profile draft produced by the generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuideDraft {
    pub name: String,
    pub line: String,
    pub description: String,
    pub color: String,
    pub greeting: String,
    pub symbol: String,
}

/// One suggested keyword to write about.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeoOpportunity {
    pub keyword: String,
    pub rationale: String,
}

#[derive(Debug, Deserialize)]
pub struct SeoOpportunityList {
    pub opportunities: Vec<SeoOpportunity>,
}

/// Parse a JSON draft the generator claimed to produce. Code fences are
/// tolerated; anything else malformed is a hard [`AiError::Parse`].
pub fn parse_draft<T: DeserializeOwned>(kind: &'static str, raw: &str) -> Result<T, AiError> {
    serde_json::from_str(strip_code_fences(raw)).map_err(|source| AiError::Parse { kind, source })
}

/// Drop a surrounding ``` / ```json fence if the model added one.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

/// Prompt templates for every generated feature. Readings come back as
/// display-ready HTML; drafts come back as JSON matching the structs above.
pub mod prompts {
    const HOUSE_VOICE: &str = "You write for a Brazilian umbanda spiritual guidance house. \
        Tone: warm, respectful, welcoming; never fatalistic, never medical advice.";

    /// Card reading shown to the visitor as HTML.
    pub fn oracle_reading(cards: &[String], question: Option<&str>) -> String {
        let question = question.unwrap_or("an open reading about the visitor's path");
        format!(
            "{HOUSE_VOICE}\n\nThe visitor drew these cards: {}.\n\
             Their question: {question}.\n\
             Write the reading as a short HTML fragment (<h3> per card, <p> paragraphs), \
             closing with one piece of gentle practical advice. Answer with HTML only.",
            cards.join(", ")
        )
    }

    /// Dream interpretation shown to the visitor as HTML.
    pub fn dream_interpretation(dream: &str) -> String {
        format!(
            "{HOUSE_VOICE}\n\nThe visitor described this dream:\n{dream}\n\n\
             Interpret its symbols one by one, then give an overall meaning. \
             Answer as a short HTML fragment, HTML only."
        )
    }

    /// Herbal bath prescription shown to the visitor as HTML.
    pub fn herbal_prescription(ailment: &str) -> String {
        format!(
            "{HOUSE_VOICE}\n\nThe visitor seeks an herbal bath for: {ailment}.\n\
             Recommend herbs used in umbanda tradition, how to prepare the bath, \
             and when to take it. Remind them this complements and never replaces \
             medical care. Answer as a short HTML fragment, HTML only."
        )
    }

    /// Full article draft as JSON.
    pub fn article_draft(topic: &str, keyword: Option<&str>) -> String {
        let keyword_line = match keyword {
            Some(k) => format!("Optimize for the focus keyword \"{k}\": use it in the title, early in the body, and in the meta description."),
            None => "Choose a natural focus keyword yourself.".into(),
        };
        format!(
            "{HOUSE_VOICE}\n\nWrite a complete site article about: {topic}.\n{keyword_line}\n\
             The body must be at least 300 words of HTML with at least one internal link \
             (href starting with \"/\").\n\
             Respond with a single JSON object, no prose around it, with keys: \
             title, excerpt, content (HTML string), tags (string array), metaTitle, \
             metaDescription, focusKeyword, faq (array of {{question, answer}})."
        )
    }

    /// Ritual draft as JSON.
    pub fn ritual_draft(topic: &str) -> String {
        format!(
            "{HOUSE_VOICE}\n\nDescribe a ritual for: {topic}.\n\
             Respond with a single JSON object, no prose around it, with keys: \
             title, category, description, duration (free text like \"30 minutos\"), \
             difficulty (one of: iniciante, intermediário, avançado)."
        )
    }

    /// Guide profile draft as JSON.
    pub fn guide_draft(name: &str, line: &str) -> String {
        format!(
            "{HOUSE_VOICE}\n\nWrite the profile of the spiritual guide {name} of the line {line}.\n\
             Respond with a single JSON object, no prose around it, with keys: \
             name, line, description, color (CSS color), greeting (traditional salutation), \
             symbol (one word used to pick an icon)."
        )
    }

    /// Keyword opportunity suggestions as JSON.
    pub fn seo_opportunities(topic: &str, existing_titles: &[String]) -> String {
        format!(
            "{HOUSE_VOICE}\n\nThe site already covers these articles:\n- {}\n\n\
             Suggest 5 search keywords about \"{topic}\" the site has not covered yet. \
             Respond with a single JSON object, no prose around it, shaped as \
             {{\"opportunities\": [{{\"keyword\": ..., \"rationale\": ...}}]}}.",
            existing_titles.join("\n- ")
        )
    }
}
