//! Test doubles for the engine's outward seams.

use async_trait::async_trait;
use codex_core::error::Result;
use codex_core::models::TokenUsage;
use codex_core::orchestration::{CompletionNotifier, QueueDispatcher, RunCompletion};
use codex_core::providers::{
    ProviderCallRequest, ProviderConfig, ProviderError, ProviderGateway, ProviderResponse,
};
use parking_lot::Mutex;
use std::time::Duration;
use uuid::Uuid;

/// One call observed by the scripted gateway
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub provider: String,
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
}

enum Matcher {
    Provider(String),
    PromptContains(String),
}

impl Matcher {
    fn matches(&self, config: &ProviderConfig, request: &ProviderCallRequest) -> bool {
        match self {
            Matcher::Provider(provider) => &config.provider_id == provider,
            Matcher::PromptContains(text) => request.user_prompt.contains(text.as_str()),
        }
    }
}

enum Outcome {
    Reply(String),
    Fail { status: u16, body: String },
}

/// Gateway that answers from rules instead of the network
///
/// Unmatched calls succeed with `content from <provider>(<model>)` and a
/// usage of 100 prompt / 50 completion tokens.
pub struct ScriptedGateway {
    rules: Mutex<Vec<(Matcher, Outcome)>>,
    calls: Mutex<Vec<RecordedCall>>,
    delay: Option<Duration>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fail_provider(self, provider: &str) -> Self {
        self.rules.lock().push((
            Matcher::Provider(provider.to_string()),
            Outcome::Fail {
                status: 503,
                body: format!("{provider} overloaded"),
            },
        ));
        self
    }

    pub fn fail_when_prompt_contains(self, text: &str) -> Self {
        self.rules.lock().push((
            Matcher::PromptContains(text.to_string()),
            Outcome::Fail {
                status: 500,
                body: format!("refused prompt containing {text}"),
            },
        ));
        self
    }

    pub fn reply_for_provider(self, provider: &str, content: &str) -> Self {
        self.rules.lock().push((
            Matcher::Provider(provider.to_string()),
            Outcome::Reply(content.to_string()),
        ));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls_containing(&self, text: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.user_prompt.contains(text))
            .collect()
    }
}

#[async_trait]
impl ProviderGateway for ScriptedGateway {
    async fn call(
        &self,
        request: &ProviderCallRequest,
        config: &ProviderConfig,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        self.calls.lock().push(RecordedCall {
            provider: config.provider_id.clone(),
            model: config.model.clone(),
            system_prompt: request.system_prompt.clone(),
            user_prompt: request.user_prompt.clone(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let outcome = {
            let rules = self.rules.lock();
            rules
                .iter()
                .find(|(matcher, _)| matcher.matches(config, request))
                .map(|(_, outcome)| match outcome {
                    Outcome::Reply(content) => Ok(content.clone()),
                    Outcome::Fail { status, body } => Err(ProviderError::Http {
                        provider: config.provider_id.clone(),
                        status: *status,
                        body: body.clone(),
                    }),
                })
        };

        let content = match outcome {
            Some(Ok(content)) => content,
            Some(Err(e)) => return Err(e),
            None => format!("content from {}({})", config.provider_id, config.model),
        };

        Ok(ProviderResponse {
            content,
            usage: TokenUsage::new(100, 50),
            provider: config.provider_id.clone(),
            model: config.model.clone(),
        })
    }
}

/// Records dispatched queue items without processing them
#[derive(Default)]
pub struct RecordingDispatcher {
    dispatched: Mutex<Vec<Uuid>>,
}

impl RecordingDispatcher {
    pub fn dispatched(&self) -> Vec<Uuid> {
        self.dispatched.lock().clone()
    }
}

#[async_trait]
impl QueueDispatcher for RecordingDispatcher {
    async fn dispatch(&self, item_ids: Vec<Uuid>) {
        self.dispatched.lock().extend(item_ids);
    }
}

/// Notifier that records completions and can be told to fail
#[derive(Default)]
pub struct RecordingNotifier {
    completions: Mutex<Vec<RunCompletion>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            completions: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn completions(&self) -> Vec<RunCompletion> {
        self.completions.lock().clone()
    }
}

#[async_trait]
impl CompletionNotifier for RecordingNotifier {
    async fn notify(&self, completion: &RunCompletion) -> Result<()> {
        self.completions.lock().push(completion.clone());
        if self.fail {
            return Err(codex_core::CodexError::NotificationError(
                "webhook unreachable".to_string(),
            ));
        }
        Ok(())
    }
}
