//! Publishing platforms
//!
//! The rotator only needs one thing from a platform: take a finished post and
//! either publish it or say why not. [`Platform`] is that boundary; the
//! rotator never assumes a publish call is idempotent.
//!
//! # Examples
//!
//! ```no_run
//! use librotacast::platforms::{Platform, mastodon::MastodonClient};
//!
//! # async fn example() -> librotacast::error::PlatformResult<()> {
//! let mut platform = MastodonClient::new(
//!     "https://mastodon.social".to_string(),
//!     "access-token".to_string(),
//! )?;
//!
//! platform.authenticate().await?;
//! let remote_id = platform.post("Hello from the rotation").await?;
//! println!("Posted: {}", remote_id);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;

use crate::config::Config;
use crate::error::{ConfigError, PlatformResult, Result};

pub mod dry_run;
pub mod mastodon;

// Mock platform is available for all builds (not just tests) to support integration tests
pub mod mock;

/// Platform trait for publishing a formatted post
#[async_trait]
pub trait Platform: Send + Sync {
    /// Verify credentials before the first cycle
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Authentication` if the credentials are rejected.
    async fn authenticate(&mut self) -> PlatformResult<()>;

    /// Publish `content` and return the platform's id for the new post
    ///
    /// # Errors
    ///
    /// - `PlatformError::Authentication` - credentials rejected
    /// - `PlatformError::RateLimit` - the platform asked us to slow down
    /// - `PlatformError::Network` - transport failure or server error
    /// - `PlatformError::Rejected` - the platform refused this content
    async fn post(&self, content: &str) -> PlatformResult<String>;

    /// Lowercase platform identifier (e.g. "mastodon")
    fn name(&self) -> &str;

    /// Maximum post length in characters, if the platform has one
    fn character_limit(&self) -> Option<usize>;
}

/// Build the platform the daemon publishes to
///
/// `dry_run` always wins; otherwise the `[mastodon]` section is required.
pub fn create_platform(config: &Config, dry_run: bool) -> Result<Box<dyn Platform>> {
    if dry_run {
        return Ok(Box::new(dry_run::DryRunPlatform::new()));
    }

    let mastodon = config
        .mastodon
        .as_ref()
        .ok_or_else(|| ConfigError::MissingField("mastodon".to_string()))?;

    Ok(Box::new(mastodon::MastodonClient::from_config(mastodon)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dry_run_needs_no_platform_config() {
        let config = Config::default_config();
        let platform = create_platform(&config, true).unwrap();
        assert_eq!(platform.name(), "dry-run");
    }

    #[test]
    fn test_missing_platform_config_is_error() {
        let config = Config::default_config();
        let err = create_platform(&config, false).err().unwrap();
        assert!(err.to_string().contains("mastodon"));
        assert_eq!(err.exit_code(), 2);
    }
}
