//! In-process client with scripted answers, for tests and dry runs.

use super::LlmClient;
use crate::errors::ProviderError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

type Responder = Box<dyn Fn(&str) -> Result<String, ProviderError> + Send + Sync>;

enum Script {
    Queue(VecDeque<Result<String, ProviderError>>),
    Responder(Responder),
}

pub struct ScriptedClient {
    model: String,
    script: Mutex<Script>,
    prompts: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl ScriptedClient {
    /// Answers are consumed in call order.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            script: Mutex::new(Script::Queue(VecDeque::new())),
            prompts: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Answer computed from the prompt; useful when call order is not fixed.
    pub fn from_fn<F>(model: impl Into<String>, f: F) -> Self
    where
        F: Fn(&str) -> Result<String, ProviderError> + Send + Sync + 'static,
    {
        Self {
            model: model.into(),
            script: Mutex::new(Script::Responder(Box::new(f))),
            prompts: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()));
        self
    }

    pub fn with_error(self, err: ProviderError) -> Self {
        self.push(Err(err));
        self
    }

    /// Sleep before answering (exercise timeouts with a paused clock).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn push(&self, answer: Result<String, ProviderError>) {
        if let Ok(mut script) = self.script.lock() {
            if let Script::Queue(queue) = &mut *script {
                queue.push_back(answer);
            }
        }
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut script = self.script.lock().map_err(|_| ProviderError::Network {
            message: "scripted client lock poisoned".to_string(),
        })?;
        match &mut *script {
            Script::Queue(queue) => queue.pop_front().unwrap_or_else(|| {
                Err(ProviderError::Network {
                    message: "scripted client has no more responses".to_string(),
                })
            }),
            Script::Responder(f) => f(prompt),
        }
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
