//! Mock platform implementation for testing
//!
//! A configurable platform that can simulate successes, failures and slow
//! responses. The counters live behind `Arc`s inside [`MockConfig`], so a test
//! can keep a clone of the config and inspect it after handing the platform
//! to a rotator.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{PlatformError, PlatformResult};
use crate::platforms::Platform;

/// Configuration for mock platform behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Platform name (e.g., "mock", "mock-mastodon")
    pub name: String,

    /// Whether authentication should succeed
    pub auth_succeeds: bool,

    /// Error message on authentication failure
    pub auth_error: Option<String>,

    /// Error returned by every post, if set
    pub post_error: Option<PlatformError>,

    /// Delay before completing operations (simulates network latency)
    pub delay: Duration,

    pub character_limit: Option<usize>,

    /// Number of times authenticate has been called
    pub auth_call_count: Arc<Mutex<usize>>,

    /// Number of times post has been called
    pub post_call_count: Arc<Mutex<usize>>,

    /// Posts that have been made (for verification)
    pub posted_content: Arc<Mutex<Vec<String>>>,

    /// One-shot failures consumed by the next posts, before `post_error`
    pub queued_failures: Arc<Mutex<VecDeque<PlatformError>>>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            auth_succeeds: true,
            auth_error: None,
            post_error: None,
            delay: Duration::from_millis(0),
            character_limit: None,
            auth_call_count: Arc::new(Mutex::new(0)),
            post_call_count: Arc::new(Mutex::new(0)),
            posted_content: Arc::new(Mutex::new(Vec::new())),
            queued_failures: Arc::new(Mutex::new(VecDeque::new())),
        }
    }
}

impl MockConfig {
    pub fn auth_calls(&self) -> usize {
        *self.auth_call_count.lock().unwrap()
    }

    pub fn post_calls(&self) -> usize {
        *self.post_call_count.lock().unwrap()
    }

    /// Content of every successful post, oldest first
    pub fn posted(&self) -> Vec<String> {
        self.posted_content.lock().unwrap().clone()
    }

    /// Make the next post fail with `error`
    pub fn fail_next(&self, error: PlatformError) {
        self.queued_failures.lock().unwrap().push_back(error);
    }
}

/// Mock platform for testing
pub struct MockPlatform {
    config: MockConfig,
    authenticated: bool,
}

impl MockPlatform {
    /// Create a new mock platform with the given configuration
    pub fn new(config: MockConfig) -> Self {
        Self {
            config,
            authenticated: false,
        }
    }

    /// Create a mock platform that always succeeds
    pub fn success(name: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            ..Default::default()
        })
    }

    /// Create a mock platform that fails authentication
    pub fn auth_failure(name: &str, error: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            auth_succeeds: false,
            auth_error: Some(error.to_string()),
            ..Default::default()
        })
    }

    /// Create a mock platform whose posts always fail with `error`
    pub fn post_failure(name: &str, error: PlatformError) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            post_error: Some(error),
            ..Default::default()
        })
    }

    /// Create a mock platform with a delay
    pub fn with_delay(name: &str, delay: Duration) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            delay,
            ..Default::default()
        })
    }

    /// Create a mock platform with a character limit
    pub fn with_limit(name: &str, limit: usize) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            character_limit: Some(limit),
            ..Default::default()
        })
    }

    /// Already-authenticated platform sharing `config`'s counters
    pub fn authenticated(config: MockConfig) -> Self {
        let mut platform = Self::new(config);
        platform.authenticated = true;
        platform
    }

    pub fn config(&self) -> &MockConfig {
        &self.config
    }

    /// Get the number of times authenticate was called
    pub fn auth_call_count(&self) -> usize {
        self.config.auth_calls()
    }

    /// Get the number of times post was called
    pub fn post_call_count(&self) -> usize {
        self.config.post_calls()
    }

    /// Get all content that was posted
    pub fn posted_content(&self) -> Vec<String> {
        self.config.posted()
    }
}

#[async_trait]
impl Platform for MockPlatform {
    async fn authenticate(&mut self) -> PlatformResult<()> {
        *self.config.auth_call_count.lock().unwrap() += 1;

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        if self.config.auth_succeeds {
            self.authenticated = true;
            Ok(())
        } else {
            let error_msg = self
                .config
                .auth_error
                .clone()
                .unwrap_or_else(|| "Mock authentication failed".to_string());
            Err(PlatformError::Authentication(error_msg))
        }
    }

    async fn post(&self, content: &str) -> PlatformResult<String> {
        *self.config.post_call_count.lock().unwrap() += 1;

        if !self.authenticated {
            return Err(PlatformError::Authentication(
                "Not authenticated".to_string(),
            ));
        }

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        let queued = self.config.queued_failures.lock().unwrap().pop_front();
        if let Some(error) = queued.or_else(|| self.config.post_error.clone()) {
            return Err(error);
        }

        if let Some(limit) = self.config.character_limit {
            let count = content.chars().count();
            if count > limit {
                return Err(PlatformError::Rejected(format!(
                    "Content exceeds {} character limit (got {} characters)",
                    limit, count
                )));
            }
        }

        self.config
            .posted_content
            .lock()
            .unwrap()
            .push(content.to_string());

        Ok(format!("{}:mock-{}", self.config.name, uuid::Uuid::new_v4()))
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn character_limit(&self) -> Option<usize> {
        self.config.character_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_success() {
        let mut platform = MockPlatform::success("test");

        assert_eq!(platform.name(), "test");
        assert_eq!(platform.character_limit(), None);

        platform.authenticate().await.unwrap();
        assert_eq!(platform.auth_call_count(), 1);

        let post_id = platform.post("Test content").await.unwrap();
        assert!(post_id.starts_with("test:mock-"));
        assert_eq!(platform.post_call_count(), 1);

        let posted = platform.posted_content();
        assert_eq!(posted, vec!["Test content".to_string()]);
    }

    #[tokio::test]
    async fn test_mock_auth_failure() {
        let mut platform = MockPlatform::auth_failure("test", "Invalid credentials");

        let err = platform.authenticate().await.unwrap_err();
        assert_eq!(platform.auth_call_count(), 1);
        assert!(matches!(err, PlatformError::Authentication(_)));
        assert!(err.to_string().contains("Invalid credentials"));
    }

    #[tokio::test]
    async fn test_mock_post_failure() {
        let mut platform =
            MockPlatform::post_failure("test", PlatformError::Network("timeout".to_string()));
        platform.authenticate().await.unwrap();

        let err = platform.post("Test content").await.unwrap_err();
        assert_eq!(platform.post_call_count(), 1);
        assert!(err.is_transient());
        assert!(platform.posted_content().is_empty());
    }

    #[tokio::test]
    async fn test_queued_failure_is_consumed_once() {
        let config = MockConfig::default();
        let platform = MockPlatform::authenticated(config.clone());

        config.fail_next(PlatformError::RateLimit("slow down".to_string()));
        assert!(matches!(
            platform.post("first").await,
            Err(PlatformError::RateLimit(_))
        ));
        assert!(platform.post("second").await.is_ok());

        assert_eq!(config.post_calls(), 2);
        assert_eq!(config.posted(), vec!["second".to_string()]);
    }

    #[tokio::test]
    async fn test_mock_with_delay() {
        let mut platform = MockPlatform::with_delay("test", Duration::from_millis(50));

        let start = std::time::Instant::now();
        platform.authenticate().await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));

        let start = std::time::Instant::now();
        platform.post("Test").await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_mock_with_character_limit() {
        let mut platform = MockPlatform::with_limit("test", 10);
        platform.authenticate().await.unwrap();

        assert_eq!(platform.character_limit(), Some(10));
        assert!(platform.post("Short").await.is_ok());

        let err = platform.post("This is way too long").await.unwrap_err();
        assert!(err.to_string().contains("character limit"));
    }

    #[tokio::test]
    async fn test_mock_requires_authentication() {
        let platform = MockPlatform::success("test");

        let err = platform.post("Test").await.unwrap_err();
        assert!(err.to_string().contains("Not authenticated"));
    }
}
