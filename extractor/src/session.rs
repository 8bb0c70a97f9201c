//! Session-scoped model hosts.
//!
//! Some hosts hand out a session object that must be created before
//! prompting and destroyed afterwards. [`SessionModelClient`] opens one
//! session per invocation and drops it on every exit path; dropping the
//! session is the release point, so a cancelled invocation (for example an
//! attempt timeout) releases it too.

use async_trait::async_trait;
use tracing::debug;

use crate::client::{ModelClient, ModelError};
use crate::prompt::DEFAULT_SENTINEL;

/// A live model session. Resources are released when the value is dropped.
#[async_trait]
pub trait ModelSession: Send {
    /// Sends a single combined prompt and returns the raw reply.
    async fn prompt(&mut self, prompt: &str) -> Result<String, ModelError>;
}

/// Creates model sessions.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Session type produced by this provider.
    type Session: ModelSession + 'static;

    /// Opens a new session.
    async fn create_session(&self) -> Result<Self::Session, ModelError>;
}

/// Joins the two prompt segments for hosts that accept a single prompt.
#[must_use]
pub fn join_prompt(system_instruction: &str, user_content: &str, sentinel: &str) -> String {
    format!("{system_instruction}{sentinel}{user_content}")
}

/// Adapts a [`SessionProvider`] to the [`ModelClient`] contract.
#[derive(Debug, Clone)]
pub struct SessionModelClient<P> {
    provider: P,
    sentinel: String,
}

impl<P: SessionProvider> SessionModelClient<P> {
    /// Creates a client that separates segments with the default sentinel.
    #[must_use]
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            sentinel: DEFAULT_SENTINEL.to_string(),
        }
    }

    /// Sets the separator placed between system instruction and user content.
    #[must_use]
    pub fn with_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.sentinel = sentinel.into();
        self
    }

    /// The wrapped provider.
    pub const fn provider(&self) -> &P {
        &self.provider
    }
}

#[async_trait]
impl<P: SessionProvider> ModelClient for SessionModelClient<P> {
    async fn invoke(
        &self,
        system_instruction: &str,
        user_content: &str,
    ) -> Result<String, ModelError> {
        let mut session = self.provider.create_session().await?;
        let prompt = join_prompt(system_instruction, user_content, &self.sentinel);
        let result = session.prompt(&prompt).await;
        drop(session);
        debug!(ok = result.is_ok(), "model session released");
        result
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Default)]
    struct Counters {
        opened: AtomicUsize,
        released: AtomicUsize,
    }

    struct CountingSession {
        counters: Arc<Counters>,
        reply: Result<String, ModelError>,
        delay: Duration,
    }

    impl Drop for CountingSession {
        fn drop(&mut self) {
            self.counters.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ModelSession for CountingSession {
        async fn prompt(&mut self, prompt: &str) -> Result<String, ModelError> {
            tokio::time::sleep(self.delay).await;
            self.reply.clone().map(|r| format!("{r}:{prompt}"))
        }
    }

    struct CountingProvider {
        counters: Arc<Counters>,
        reply: Result<String, ModelError>,
        delay: Duration,
    }

    impl CountingProvider {
        fn new(reply: Result<String, ModelError>, delay: Duration) -> Self {
            Self {
                counters: Arc::new(Counters::default()),
                reply,
                delay,
            }
        }
    }

    #[async_trait]
    impl SessionProvider for CountingProvider {
        type Session = CountingSession;

        async fn create_session(&self) -> Result<CountingSession, ModelError> {
            self.counters.opened.fetch_add(1, Ordering::SeqCst);
            Ok(CountingSession {
                counters: Arc::clone(&self.counters),
                reply: self.reply.clone(),
                delay: self.delay,
            })
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl SessionProvider for FailingProvider {
        type Session = CountingSession;

        async fn create_session(&self) -> Result<CountingSession, ModelError> {
            Err(ModelError::Session("no session available".to_string()))
        }
    }

    #[test]
    fn test_join_prompt_uses_sentinel() {
        assert_eq!(join_prompt("sys", "user", "<ctrl23>"), "sys<ctrl23>user");
    }

    #[tokio::test]
    async fn test_session_released_after_success() {
        let client = SessionModelClient::new(CountingProvider::new(
            Ok("reply".to_string()),
            Duration::ZERO,
        ))
        .with_sentinel("|");

        let out = client.invoke("sys", "user").await.unwrap();
        assert_eq!(out, "reply:sys|user");

        let counters = &client.provider().counters;
        assert_eq!(counters.opened.load(Ordering::SeqCst), 1);
        assert_eq!(counters.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_session_released_after_failure() {
        let client = SessionModelClient::new(CountingProvider::new(
            Err(ModelError::Invocation("quota".to_string())),
            Duration::ZERO,
        ));

        assert!(client.invoke("sys", "user").await.is_err());

        let counters = &client.provider().counters;
        assert_eq!(counters.opened.load(Ordering::SeqCst), 1);
        assert_eq!(counters.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_session_released_when_cancelled() {
        let client = SessionModelClient::new(CountingProvider::new(
            Ok("late".to_string()),
            Duration::from_secs(30),
        ));

        let result =
            tokio::time::timeout(Duration::from_millis(20), client.invoke("sys", "user")).await;
        assert!(result.is_err());

        let counters = &client.provider().counters;
        assert_eq!(counters.opened.load(Ordering::SeqCst), 1);
        assert_eq!(counters.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_session_creation_failure_is_a_model_error() {
        let client = SessionModelClient::new(FailingProvider);
        assert!(matches!(
            client.invoke("sys", "user").await,
            Err(ModelError::Session(_))
        ));
    }
}
