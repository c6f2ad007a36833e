use std::collections::VecDeque;
use std::sync::Mutex;

use super::{CallOptions, LlmProvider, ProviderKind};
use crate::error::ProviderError;

/// Scripted provider for tests/local runs.
/// Replies are consumed in order; the last one repeats once the script runs out.
/// Every prompt it receives is recorded.
pub struct MockProvider {
    kind: ProviderKind,
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    calls: Mutex<Vec<(String, CallOptions)>>,
}

impl MockProvider {
    pub fn scripted(kind: ProviderKind, script: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            kind,
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn always(kind: ProviderKind, reply: &str) -> Self {
        Self::scripted(kind, vec![Ok(reply.to_string())])
    }

    pub fn failing(kind: ProviderKind, err: ProviderError) -> Self {
        Self::scripted(kind, vec![Err(err)])
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.lock_calls().iter().map(|(p, _)| p.clone()).collect()
    }

    pub fn calls(&self) -> Vec<(String, CallOptions)> {
        self.lock_calls().clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock_calls().len()
    }

    fn lock_calls(&self) -> std::sync::MutexGuard<'_, Vec<(String, CallOptions)>> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn next_reply(&self) -> Result<String, ProviderError> {
        let mut script = self.script.lock().unwrap_or_else(|p| p.into_inner());
        if script.len() > 1 {
            script
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::Network("empty mock script".into())))
        } else {
            script
                .front()
                .cloned()
                .unwrap_or_else(|| Err(ProviderError::Network("empty mock script".into())))
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for MockProvider {
    async fn complete(&self, prompt: &str, opts: &CallOptions) -> Result<String, ProviderError> {
        self.lock_calls().push((prompt.to_string(), *opts));
        self.next_reply()
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn script_is_consumed_then_last_repeats() {
        let m = MockProvider::scripted(
            ProviderKind::Gemini,
            vec![
                Err(ProviderError::QuotaExceeded("x".into())),
                Ok("a".into()),
            ],
        );
        let o = CallOptions::COMPLIANCE;
        assert!(m.complete("1", &o).await.is_err());
        assert_eq!(m.complete("2", &o).await.unwrap(), "a");
        assert_eq!(m.complete("3", &o).await.unwrap(), "a");
        assert_eq!(m.prompts(), vec!["1", "2", "3"]);
    }
}
