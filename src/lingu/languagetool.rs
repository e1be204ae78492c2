//! Proofreading over the LanguageTool and Duden REST protocols.
//!
//! Every failure (disabled service, missing URL, transport error, non-200
//! status, malformed body) degrades to a result without errors. Results are
//! cached per text.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, trace, warn};

use super::LanguageTag;
use crate::error::LinguError;

/// Cached proofreading results.
pub const MAX_CACHE_SIZE: usize = 10;
/// Suggestions kept per error.
pub const MAX_SUGGESTIONS_SIZE: usize = 10;
/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Underline colour of typos.
pub const COLOR_LIGHT_RED: u32 = 0xFF_00_00;
/// Underline colour of style hints.
pub const COLOR_LIGHT_BLUE: u32 = 0x00_00_FF;
/// Underline colour of grammar, typography and everything else.
pub const COLOR_ORANGE: u32 = 0xD1_68_20;

/// Line colour for an error category id.
pub fn line_color(error_id: &str) -> u32 {
    match error_id {
        "TYPOS" | "orth" => COLOR_LIGHT_RED,
        "STYLE" => COLOR_LIGHT_BLUE,
        _ => COLOR_ORANGE,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestProtocol {
    /// Form-encoded `text` + `language`, LanguageTool JSON response.
    #[default]
    LanguageTool,
    /// JSON request with an `access_token` header, Duden JSON response.
    Duden,
}

impl RestProtocol {
    pub fn parse(name: &str) -> Self {
        if name == "duden" {
            RestProtocol::Duden
        } else {
            RestProtocol::LanguageTool
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct LanguageToolOptions {
    pub enabled: bool,
    pub checker_url: String,
    pub locale_list_url: String,
    pub rest_protocol: RestProtocol,
    /// Premium API key (LanguageTool) or access token (Duden).
    pub api_key: Option<String>,
    /// Premium user name; sent together with the API key.
    pub username: Option<String>,
    pub ssl_verification: bool,
    pub timeout: Duration,
}

impl Default for LanguageToolOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            checker_url: "https://api.languagetool.org/v2/check".to_string(),
            locale_list_url: "https://api.languagetool.org/v2/languages".to_string(),
            rest_protocol: RestProtocol::LanguageTool,
            api_key: None,
            username: None,
            ssl_verification: true,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// One proofreading finding. Offsets are in characters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProofreadingError {
    pub start: usize,
    pub length: usize,
    pub short_comment: String,
    pub full_comment: String,
    pub suggestions: Vec<String>,
    pub line_color: u32,
}

/// Result of checking one text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProofreadingResult {
    pub text: String,
    pub locale: LanguageTag,
    pub start_of_sentence: usize,
    pub behind_end_of_sentence: usize,
    pub start_of_next_sentence: usize,
    pub errors: Vec<ProofreadingError>,
}

#[derive(Deserialize)]
struct LtResponse {
    matches: Vec<LtMatch>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LtMatch {
    offset: usize,
    length: usize,
    message: String,
    #[serde(default)]
    short_message: String,
    rule: LtRule,
    #[serde(default)]
    replacements: Vec<LtReplacement>,
}

#[derive(Deserialize)]
struct LtRule {
    category: LtCategory,
}

#[derive(Deserialize)]
struct LtCategory {
    id: String,
}

#[derive(Deserialize)]
struct LtReplacement {
    value: String,
}

#[derive(Deserialize)]
struct DudenResponse {
    #[serde(rename = "check-positions", default)]
    check_positions: Vec<DudenPosition>,
}

#[derive(Deserialize)]
struct DudenPosition {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    offset: usize,
    #[serde(default)]
    length: usize,
    #[serde(default)]
    proposals: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LtLanguage {
    long_code: String,
}

/// Parses a LanguageTool `/check` response body.
pub fn parse_languagetool_response(body: &str) -> Result<Vec<ProofreadingError>, LinguError> {
    let response: LtResponse = serde_json::from_str(body)?;
    Ok(response
        .matches
        .into_iter()
        .map(|m| ProofreadingError {
            start: m.offset,
            length: m.length,
            short_comment: m.message,
            full_comment: m.short_message,
            line_color: line_color(&m.rule.category.id),
            suggestions: m
                .replacements
                .into_iter()
                .take(MAX_SUGGESTIONS_SIZE)
                .map(|r| r.value)
                .collect(),
        })
        .collect())
}

/// Parses a Duden response body.
pub fn parse_duden_response(body: &str) -> Result<Vec<ProofreadingError>, LinguError> {
    let response: DudenResponse = serde_json::from_str(body)?;
    Ok(response
        .check_positions
        .into_iter()
        .map(|p| ProofreadingError {
            start: p.offset,
            length: p.length,
            line_color: line_color(&p.kind),
            suggestions: p.proposals.into_iter().take(MAX_SUGGESTIONS_SIZE).collect(),
            ..ProofreadingError::default()
        })
        .collect())
}

/// Small FIFO-evicting cache keyed by text, most recent at the back.
#[derive(Debug, Default)]
struct ResultCache {
    entries: VecDeque<(String, Vec<ProofreadingError>)>,
}

impl ResultCache {
    fn get(&mut self, text: &str) -> Option<Vec<ProofreadingError>> {
        let idx = self.entries.iter().position(|(k, _)| k == text)?;
        let entry = self.entries.remove(idx)?;
        let errors = entry.1.clone();
        self.entries.push_back(entry);
        Some(errors)
    }

    fn insert(&mut self, text: String, errors: Vec<ProofreadingError>) {
        self.entries.retain(|(k, _)| *k != text);
        self.entries.push_back((text, errors));
        while self.entries.len() > MAX_CACHE_SIZE {
            self.entries.pop_front();
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Grammar checking client.
pub struct LanguageToolClient {
    client: Client,
    options: LanguageToolOptions,
    locales: AsyncMutex<Vec<LanguageTag>>,
    cache: Mutex<ResultCache>,
}

impl LanguageToolClient {
    pub fn new(options: LanguageToolOptions) -> Result<Self, LinguError> {
        let client = Client::builder()
            .timeout(options.timeout)
            .danger_accept_invalid_certs(!options.ssl_verification)
            .build()?;
        Ok(Self {
            client,
            options,
            locales: AsyncMutex::new(Vec::new()),
            cache: Mutex::new(ResultCache::default()),
        })
    }

    pub fn options(&self) -> &LanguageToolOptions {
        &self.options
    }

    /// Number of cached results.
    pub fn cached(&self) -> usize {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Locales supported by the server. Fetched once; a failed or empty
    /// fetch is retried on the next call.
    pub async fn locales(&self) -> Vec<LanguageTag> {
        let mut locales = self.locales.lock().await;
        if locales.is_empty() && !self.options.locale_list_url.is_empty() {
            match self.fetch_locales().await {
                Ok(list) => *locales = list,
                Err(e) => warn!(error = %e, "fetching proofreading locales failed"),
            }
        }
        locales.clone()
    }

    pub async fn has_locale(&self, locale: &LanguageTag) -> bool {
        self.locales().await.iter().any(|l| l == locale)
    }

    async fn fetch_locales(&self) -> Result<Vec<LanguageTag>, LinguError> {
        let resp = self.client.get(&self.options.locale_list_url).send().await?;
        if resp.status().as_u16() != 200 {
            return Err(LinguError::Status(resp.status().as_u16()));
        }
        let body = resp.text().await?;
        if body.is_empty() {
            return Ok(Vec::new());
        }
        let languages: Vec<LtLanguage> = serde_json::from_str(&body)?;
        Ok(languages
            .iter()
            .map(|l| LanguageTag::parse(&l.long_code))
            .collect())
    }

    /// Checks `text`. Only whole texts starting at sentence position 0 are
    /// sent; `locale_changed` drops the text from the result.
    pub async fn proofread(
        &self,
        text: &str,
        locale: &LanguageTag,
        start_of_sentence: usize,
        suggested_behind_end: usize,
        locale_changed: bool,
    ) -> ProofreadingResult {
        let mut result = ProofreadingResult {
            text: text.to_string(),
            locale: locale.clone(),
            start_of_sentence,
            behind_end_of_sentence: suggested_behind_end,
            ..ProofreadingResult::default()
        };
        let chars: Vec<char> = text.chars().collect();
        let len = chars.len();
        if len == 0 || start_of_sentence != 0 {
            return result;
        }
        result.start_of_next_sentence = len;
        if !self.options.enabled || self.options.checker_url.is_empty() {
            return result;
        }
        if locale_changed {
            result.text.clear();
            return result;
        }

        let mut space_index = result.start_of_next_sentence.min(len - 1);
        while space_index < len && chars[space_index] == ' ' {
            result.start_of_next_sentence += 1;
            space_index = result.start_of_next_sentence;
        }
        if result.start_of_next_sentence == suggested_behind_end && space_index < len {
            result.start_of_next_sentence = (suggested_behind_end + 1).min(len);
        }
        result.behind_end_of_sentence = result.start_of_next_sentence.min(len);

        let cached = self
            .cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(text);
        if let Some(errors) = cached {
            trace!(len, "proofreading cache hit");
            result.errors = errors;
            return result;
        }

        match self.request(text, locale).await {
            Ok(errors) => {
                debug!(len, errors = errors.len(), "proofreading finished");
                self.cache
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert(text.to_string(), errors.clone());
                result.errors = errors;
            }
            Err(e) => warn!(error = %e, "proofreading request failed"),
        }
        result
    }

    async fn request(
        &self,
        text: &str,
        locale: &LanguageTag,
    ) -> Result<Vec<ProofreadingError>, LinguError> {
        let lang_tag = format!("{}-{}", locale.language(), locale.country());
        let url = &self.options.checker_url;
        let resp = match self.options.rest_protocol {
            RestProtocol::Duden => {
                let body = serde_json::json!({
                    "text-language": lang_tag,
                    "text": text,
                    "hyphenation": false,
                    "spellchecking-level": 3,
                    "correction-proposals": true,
                });
                let mut req = self
                    .client
                    .post(url)
                    .header("Cache-Control", "no-cache")
                    .header("Content-Type", "application/json")
                    .body(body.to_string());
                if let Some(key) = &self.options.api_key {
                    req = req.header("access_token", key);
                }
                req.send().await?
            }
            RestProtocol::LanguageTool => {
                let mut form = vec![("text", text.to_string()), ("language", lang_tag)];
                if let (Some(user), Some(key)) = (&self.options.username, &self.options.api_key) {
                    if !user.is_empty() && !key.is_empty() {
                        form.push(("username", user.clone()));
                        form.push(("apiKey", key.clone()));
                    }
                }
                self.client.post(url).form(&form).send().await?
            }
        };
        let status = resp.status().as_u16();
        if status != 200 {
            return Err(LinguError::Status(status));
        }
        let body = resp.text().await?;
        if body.is_empty() {
            return Ok(Vec::new());
        }
        match self.options.rest_protocol {
            RestProtocol::Duden => parse_duden_response(&body),
            RestProtocol::LanguageTool => parse_languagetool_response(&body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LT_BODY: &str = r#"{
        "matches": [
            {"offset": 0, "length": 3, "message": "Possible typo", "shortMessage": "Spelling",
             "rule": {"category": {"id": "TYPOS"}},
             "replacements": [{"value": "The"}, {"value": "Tea"}]},
            {"offset": 4, "length": 2, "message": "Style", "rule": {"category": {"id": "STYLE"}},
             "replacements": []},
            {"offset": 7, "length": 1, "message": "Grammar", "rule": {"category": {"id": "GRAMMAR"}},
             "replacements": [{"value":"a"},{"value":"b"},{"value":"c"},{"value":"d"},{"value":"e"},
                              {"value":"f"},{"value":"g"},{"value":"h"},{"value":"i"},{"value":"j"},
                              {"value":"k"},{"value":"l"}]}
        ]
    }"#;

    #[test]
    fn test_line_colors() {
        assert_eq!(line_color("TYPOS"), COLOR_LIGHT_RED);
        assert_eq!(line_color("orth"), COLOR_LIGHT_RED);
        assert_eq!(line_color("STYLE"), COLOR_LIGHT_BLUE);
        assert_eq!(line_color("TYPOGRAPHY"), COLOR_ORANGE);
    }

    #[test]
    fn test_parse_languagetool() {
        let errors = parse_languagetool_response(LT_BODY).unwrap();
        assert_eq!(errors.len(), 3);
        assert_eq!(errors[0].start, 0);
        assert_eq!(errors[0].length, 3);
        assert_eq!(errors[0].short_comment, "Possible typo");
        assert_eq!(errors[0].full_comment, "Spelling");
        assert_eq!(errors[0].suggestions, vec!["The", "Tea"]);
        assert_eq!(errors[1].line_color, COLOR_LIGHT_BLUE);
        assert!(errors[1].suggestions.is_empty());
        assert_eq!(errors[2].suggestions.len(), MAX_SUGGESTIONS_SIZE);
    }

    #[test]
    fn test_parse_duden() {
        let body = r#"{"check-positions": [
            {"type": "orth", "offset": 2, "length": 4, "proposals": ["Haus"]},
            {"type": "gram", "offset": 9, "length": 1}
        ]}"#;
        let errors = parse_duden_response(body).unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].line_color, COLOR_LIGHT_RED);
        assert_eq!(errors[0].suggestions, vec!["Haus"]);
        assert_eq!(errors[1].line_color, COLOR_ORANGE);
        assert!(parse_duden_response("{}").unwrap().is_empty());
    }

    #[test]
    fn test_parse_malformed() {
        assert!(parse_languagetool_response("not json").is_err());
        assert!(parse_languagetool_response("{}").is_err());
    }

    #[test]
    fn test_cache_evicts_oldest() {
        let mut cache = ResultCache::default();
        for i in 0..12 {
            cache.insert(format!("text {i}"), Vec::new());
        }
        assert_eq!(cache.len(), MAX_CACHE_SIZE);
        assert!(cache.get("text 0").is_none());
        assert!(cache.get("text 1").is_none());
        assert!(cache.get("text 11").is_some());
    }

    #[tokio::test]
    async fn test_disabled_returns_empty() {
        let client = LanguageToolClient::new(LanguageToolOptions::default()).unwrap();
        let tag = LanguageTag::parse("en-US");
        let result = client.proofread("Teh house", &tag, 0, 9, false).await;
        assert!(result.errors.is_empty());
        assert_eq!(result.start_of_next_sentence, 9);
        assert_eq!(result.text, "Teh house");

        let mid = client.proofread("Teh house", &tag, 3, 9, false).await;
        assert_eq!(mid.start_of_next_sentence, 0);
    }

    #[tokio::test]
    async fn test_unreachable_server_degrades() {
        let client = LanguageToolClient::new(LanguageToolOptions {
            enabled: true,
            checker_url: "http://127.0.0.1:9/v2/check".to_string(),
            locale_list_url: String::new(),
            timeout: Duration::from_secs(2),
            ..LanguageToolOptions::default()
        })
        .unwrap();
        let tag = LanguageTag::parse("en-US");
        let result = client.proofread("Teh house", &tag, 0, 9, false).await;
        assert!(result.errors.is_empty());
        assert_eq!(client.cached(), 0);
        assert!(client.locales().await.is_empty());
    }
}
