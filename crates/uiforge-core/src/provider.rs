//! Generation/parsing provider capability
//!
//! The provider is a request/response capability: a prompt (and optionally a
//! JSON schema) goes in, free text comes out. It is treated as an unreliable
//! remote call, so every request made through [`ProviderClient`] runs under a
//! [`RetryPolicy`].
//!
//! [`ScriptedProvider`] stands in for the remote service in tests and for
//! replaying recorded sessions from a fixture file.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};
use crate::retry::{RetryPolicy, call_with_retry};

/// Pipeline stage a request belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Requirements text to component IR
    Parse,
    /// Component IR to source
    Generate,
    /// Change request to IR mutations
    Feedback,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Parse => "parse",
            Stage::Generate => "generate",
            Stage::Feedback => "feedback",
        })
    }
}

/// A single provider request
#[derive(Debug, Clone, Serialize)]
pub struct ProviderRequest {
    /// Stage issuing the request
    pub stage: Stage,
    /// System instruction
    pub system: String,
    /// User prompt
    pub prompt: String,
    /// JSON schema the answer should conform to, for structured calls
    pub schema: Option<serde_json::Value>,
    /// Sampling temperature
    pub temperature: f32,
    /// Output token limit
    pub max_tokens: u32,
}

impl ProviderRequest {
    /// Create a request with default sampling settings
    pub fn new(stage: Stage, prompt: impl Into<String>) -> Self {
        Self {
            stage,
            system: String::new(),
            prompt: prompt.into(),
            schema: None,
            temperature: 0.2,
            max_tokens: 4096,
        }
    }

    /// Set the system instruction
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = system.into();
        self
    }

    /// Attach a JSON schema for structured output
    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.schema = Some(schema);
        self
    }
}

/// Token usage reported by the provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt tokens
    pub input_tokens: u64,
    /// Completion tokens
    pub output_tokens: u64,
}

impl Usage {
    /// Sum of input and output tokens
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// A provider answer
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    /// Raw text of the answer
    pub text: String,
    /// Token usage for this call
    pub usage: Usage,
}

impl ProviderResponse {
    /// A response with no usage information
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: Usage::default(),
        }
    }
}

/// How a provider failure should be treated by the retry loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Network hiccup, timeout, 5xx
    Transient,
    /// Throttled by the remote side
    RateLimited,
    /// Will not succeed on retry (bad credentials, bad request)
    Fatal,
}

/// A failed provider call
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct ProviderError {
    /// Failure class
    pub kind: ProviderErrorKind,
    /// Description from the transport
    pub message: String,
}

impl ProviderError {
    /// A retryable failure
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Transient,
            message: message.into(),
        }
    }

    /// A throttling failure
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::RateLimited,
            message: message.into(),
        }
    }

    /// A non-retryable failure
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Fatal,
            message: message.into(),
        }
    }

    /// An attempt that exceeded the per-call timeout
    pub fn timeout(after: Duration) -> Self {
        Self::transient(format!("timed out after {}ms", after.as_millis()))
    }

    /// Whether another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(self.kind, ProviderErrorKind::Fatal)
    }
}

/// Remote text-generation capability
#[async_trait]
pub trait Provider: Send + Sync {
    /// Complete a single request. Implementations do not retry.
    async fn complete(
        &self,
        request: &ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError>;
}

/// Retrying front end over a [`Provider`] that also accounts token usage
pub struct ProviderClient {
    provider: Arc<dyn Provider>,
    policy: RetryPolicy,
    calls: AtomicU64,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
}

impl fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderClient")
            .field("policy", &self.policy)
            .field("usage", &self.usage())
            .finish()
    }
}

impl ProviderClient {
    /// Wrap a provider with a retry policy
    pub fn new(provider: Arc<dyn Provider>, policy: RetryPolicy) -> Self {
        Self {
            provider,
            policy,
            calls: AtomicU64::new(0),
            input_tokens: AtomicU64::new(0),
            output_tokens: AtomicU64::new(0),
        }
    }

    /// The retry policy in effect
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send a request, retrying transient failures
    pub async fn complete(&self, request: &ProviderRequest) -> Result<ProviderResponse> {
        let response = call_with_retry(self.provider.as_ref(), request, &self.policy)
            .await
            .into_result()?;

        self.calls.fetch_add(1, Ordering::Relaxed);
        self.input_tokens
            .fetch_add(response.usage.input_tokens, Ordering::Relaxed);
        self.output_tokens
            .fetch_add(response.usage.output_tokens, Ordering::Relaxed);

        debug!(
            stage = %request.stage,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "provider call completed"
        );
        Ok(response)
    }

    /// Send a request and decode the JSON embedded in the answer
    pub async fn complete_structured<T: DeserializeOwned>(
        &self,
        request: &ProviderRequest,
    ) -> Result<T> {
        let response = self.complete(request).await?;
        let json = extract_json(&response.text).ok_or_else(|| Error::MalformedResponse {
            message: format!("{} response contains no JSON object", request.stage),
        })?;
        serde_json::from_str(json).map_err(|e| Error::MalformedResponse {
            message: format!("{} response does not match the expected shape: {}", request.stage, e),
        })
    }

    /// Successful calls so far
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Token usage accumulated so far
    pub fn usage(&self) -> Usage {
        Usage {
            input_tokens: self.input_tokens.load(Ordering::Relaxed),
            output_tokens: self.output_tokens.load(Ordering::Relaxed),
        }
    }
}

/// Locate the JSON payload in a provider answer.
///
/// Accepts a fenced ```json block, any fenced block holding an object or
/// array, or raw JSON surrounded by prose.
pub fn extract_json(text: &str) -> Option<&str> {
    if let Some(block) = extract_fenced(text, "json") {
        return Some(block);
    }
    if let Some(block) = extract_fenced(text, "") {
        let trimmed = block.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            return Some(block);
        }
    }

    let start = text.find(['{', '['])?;
    let close = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

/// Content of the first fenced code block tagged with `lang`.
///
/// An empty `lang` matches the first block whatever its tag.
pub fn extract_fenced<'a>(text: &'a str, lang: &str) -> Option<&'a str> {
    let mut rest = text;
    while let Some(open) = rest.find("```") {
        let after = &rest[open + 3..];
        let line_end = after.find('\n')?;
        let tag = after[..line_end].trim();
        let body = &after[line_end + 1..];
        let close = body.find("```")?;

        if lang.is_empty() || tag.eq_ignore_ascii_case(lang) {
            return Some(body[..close].trim_end());
        }
        rest = &body[close + 3..];
    }
    None
}

/// One scripted provider behaviour
#[derive(Debug, Clone)]
pub enum Scripted {
    /// Answer with this text
    Reply(String),
    /// Fail with this error
    Fail(ProviderError),
    /// Sleep for this long, then answer with an empty string
    Stall(Duration),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum FixtureEntry {
    Reply(String),
    Fail(String),
    StallMs(u64),
}

/// Provider that replays queued answers per stage and records every request
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    queues: Mutex<BTreeMap<Stage, VecDeque<Scripted>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedProvider {
    /// An empty script
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for a stage
    pub fn reply(self, stage: Stage, text: impl Into<String>) -> Self {
        self.push(stage, Scripted::Reply(text.into()));
        self
    }

    /// Queue a failure for a stage
    pub fn fail(self, stage: Stage, error: ProviderError) -> Self {
        self.push(stage, Scripted::Fail(error));
        self
    }

    /// Queue a stall for a stage
    pub fn stall(self, stage: Stage, duration: Duration) -> Self {
        self.push(stage, Scripted::Stall(duration));
        self
    }

    /// Queue any behaviour on a shared provider
    pub fn push(&self, stage: Stage, scripted: Scripted) {
        lock(&self.queues).entry(stage).or_default().push_back(scripted);
    }

    /// Load a replay fixture.
    ///
    /// ```yaml
    /// parse:
    ///   - reply: '{"components": [...]}'
    /// feedback:
    ///   - fail: "503 service unavailable"
    ///   - stall_ms: 100
    /// ```
    pub fn from_fixture(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|_| Error::ConfigNotFound {
            path: path.display().to_string(),
        })?;
        Self::from_fixture_str(&content)
    }

    /// Parse a replay fixture from YAML text
    pub fn from_fixture_str(content: &str) -> Result<Self> {
        let fixture: BTreeMap<Stage, Vec<FixtureEntry>> = serde_yaml::from_str(content)?;
        let provider = Self::new();
        for (stage, entries) in fixture {
            for entry in entries {
                let scripted = match entry {
                    FixtureEntry::Reply(text) => Scripted::Reply(text),
                    FixtureEntry::Fail(message) => Scripted::Fail(ProviderError::transient(message)),
                    FixtureEntry::StallMs(ms) => Scripted::Stall(Duration::from_millis(ms)),
                };
                provider.push(stage, scripted);
            }
        }
        Ok(provider)
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<ProviderRequest> {
        lock(&self.requests).clone()
    }

    /// Requests received for one stage
    pub fn calls(&self, stage: Stage) -> usize {
        lock(&self.requests)
            .iter()
            .filter(|r| r.stage == stage)
            .count()
    }

    /// Behaviours still queued for a stage
    pub fn remaining(&self, stage: Stage) -> usize {
        lock(&self.queues).get(&stage).map_or(0, VecDeque::len)
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn complete(
        &self,
        request: &ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        lock(&self.requests).push(request.clone());
        let next = lock(&self.queues)
            .get_mut(&request.stage)
            .and_then(VecDeque::pop_front);

        match next {
            Some(Scripted::Reply(text)) => Ok(ProviderResponse {
                usage: Usage {
                    input_tokens: (request.prompt.len() / 4) as u64,
                    output_tokens: (text.len() / 4) as u64,
                },
                text,
            }),
            Some(Scripted::Fail(err)) => Err(err),
            Some(Scripted::Stall(duration)) => {
                tokio::time::sleep(duration).await;
                Ok(ProviderResponse::text(""))
            }
            None => Err(ProviderError::fatal(format!(
                "no scripted reply left for stage '{}'",
                request.stage
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::fenced_json("Here you go:\n```json\n{\"a\": 1}\n```\nDone", "{\"a\": 1}")]
    #[case::untagged_fence("```\n[1, 2]\n```", "[1, 2]")]
    #[case::raw("Sure! {\"a\": {\"b\": 2}} hope that helps", "{\"a\": {\"b\": 2}}")]
    #[case::bare("{\"a\": 1}", "{\"a\": 1}")]
    fn test_extract_json(#[case] text: &str, #[case] expected: &str) {
        assert_eq!(extract_json(text), Some(expected));
    }

    #[test]
    fn test_extract_json_none() {
        assert_eq!(extract_json("no structured content here"), None);
    }

    #[test]
    fn test_extract_fenced_picks_language() {
        let text = "```css\n.a { }\n```\n\n```tsx\nexport const A = () => null;\n```";
        assert_eq!(
            extract_fenced(text, "tsx"),
            Some("export const A = () => null;")
        );
        assert_eq!(extract_fenced(text, "css"), Some(".a { }"));
        assert_eq!(extract_fenced(text, "rust"), None);
    }

    #[tokio::test]
    async fn test_client_decodes_structured_reply() {
        #[derive(Deserialize)]
        struct Answer {
            value: u32,
        }

        let provider = Arc::new(
            ScriptedProvider::new().reply(Stage::Parse, "```json\n{\"value\": 7}\n```"),
        );
        let client = ProviderClient::new(provider.clone(), RetryPolicy::default());
        let answer: Answer = client
            .complete_structured(&ProviderRequest::new(Stage::Parse, "q"))
            .await
            .unwrap();

        assert_eq!(answer.value, 7);
        assert_eq!(client.calls(), 1);
        assert!(client.usage().output_tokens > 0);
        assert_eq!(provider.calls(Stage::Parse), 1);
    }

    #[tokio::test]
    async fn test_client_rejects_prose() {
        let provider = Arc::new(ScriptedProvider::new().reply(Stage::Parse, "I cannot help"));
        let client = ProviderClient::new(provider, RetryPolicy::default());
        let err = client
            .complete_structured::<serde_json::Value>(&ProviderRequest::new(Stage::Parse, "q"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_empty_script_is_fatal() {
        let provider = ScriptedProvider::new();
        let err = provider
            .complete(&ProviderRequest::new(Stage::Generate, "x"))
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_fixture_loading() {
        let provider = ScriptedProvider::from_fixture_str(
            "parse:\n  - fail: boom\n  - reply: '{}'\nfeedback:\n  - stall_ms: 5\n",
        )
        .unwrap();
        assert_eq!(provider.remaining(Stage::Parse), 2);
        assert_eq!(provider.remaining(Stage::Feedback), 1);
        assert_eq!(provider.remaining(Stage::Generate), 0);
    }
}
