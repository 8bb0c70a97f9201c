//! The model capability: system instruction and user content in, raw text out.
//!
//! No schema crosses this boundary. Implementations own whatever session or
//! process they use and must release it on every exit path of `invoke`,
//! including when the returned future is dropped before completion.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single model invocation. Always recoverable at the attempt level.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// The backend answered with an error or could not be reached.
    #[error("Model invocation failed: {0}")]
    Invocation(String),

    /// Creating or using a model session failed.
    #[error("Model session error: {0}")]
    Session(String),

    /// The call did not complete in time.
    #[error("Model call timed out after {0:?}")]
    Timeout(Duration),

    /// The backend is not available on this host.
    #[error("Model unavailable: {0}")]
    Unavailable(String),
}

/// A text-generating model.
///
/// Implementations must be safe to call concurrently from independent
/// extractions; the extractor never overlaps calls of its own.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Sends one prompt and returns the model's raw output.
    async fn invoke(&self, system_instruction: &str, user_content: &str)
        -> Result<String, ModelError>;
}

#[async_trait]
impl<'a, T: ModelClient + ?Sized> ModelClient for &'a T {
    async fn invoke(
        &self,
        system_instruction: &str,
        user_content: &str,
    ) -> Result<String, ModelError> {
        (**self).invoke(system_instruction, user_content).await
    }
}

#[async_trait]
impl<T: ModelClient + ?Sized> ModelClient for Arc<T> {
    async fn invoke(
        &self,
        system_instruction: &str,
        user_content: &str,
    ) -> Result<String, ModelError> {
        (**self).invoke(system_instruction, user_content).await
    }
}

#[async_trait]
impl<T: ModelClient + ?Sized> ModelClient for Box<T> {
    async fn invoke(
        &self,
        system_instruction: &str,
        user_content: &str,
    ) -> Result<String, ModelError> {
        (**self).invoke(system_instruction, user_content).await
    }
}

/// A [`ModelClient`] backed by an async closure.
///
/// # Examples
///
/// ```
/// use webai_extractor::client::{model_fn, ModelClient, ModelError};
///
/// # async fn example() -> Result<(), ModelError> {
/// let client = model_fn(|_system, user| async move { Ok(format!("echo: {user}")) });
/// assert_eq!(client.invoke("sys", "hi").await?, "echo: hi");
/// # Ok(())
/// # }
/// ```
pub struct FnModelClient<F> {
    f: F,
}

impl<F> std::fmt::Debug for FnModelClient<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnModelClient").finish_non_exhaustive()
    }
}

/// Wraps `f(system_instruction, user_content)` as a [`ModelClient`].
pub const fn model_fn<F, Fut>(f: F) -> FnModelClient<F>
where
    F: Fn(String, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String, ModelError>> + Send + 'static,
{
    FnModelClient { f }
}

#[async_trait]
impl<F, Fut> ModelClient for FnModelClient<F>
where
    F: Fn(String, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String, ModelError>> + Send + 'static,
{
    async fn invoke(
        &self,
        system_instruction: &str,
        user_content: &str,
    ) -> Result<String, ModelError> {
        (self.f)(system_instruction.to_string(), user_content.to_string()).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fn_client_receives_both_segments() {
        let client = model_fn(|system, user| async move { Ok(format!("{system}|{user}")) });
        assert_eq!(client.invoke("s", "u").await.unwrap(), "s|u");
    }

    #[tokio::test]
    async fn test_shared_and_boxed_clients_delegate() {
        let shared: Arc<dyn ModelClient> =
            Arc::new(model_fn(|_, _| async { Err(ModelError::Invocation("quota".into())) }));
        assert_eq!(
            shared.invoke("s", "u").await,
            Err(ModelError::Invocation("quota".to_string()))
        );

        let boxed: Box<dyn ModelClient> = Box::new(model_fn(|_, u| async move { Ok(u) }));
        assert_eq!(boxed.invoke("s", "u").await.unwrap(), "u");
    }
}
