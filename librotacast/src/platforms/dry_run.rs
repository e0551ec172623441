//! Platform that publishes nothing
//!
//! Used by `rota-send --dry-run`: every post is logged and reported as
//! successful so the whole cycle can be exercised without credentials.

use async_trait::async_trait;
use tracing::info;

use crate::error::PlatformResult;
use crate::platforms::Platform;

#[derive(Debug, Default)]
pub struct DryRunPlatform;

impl DryRunPlatform {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Platform for DryRunPlatform {
    async fn authenticate(&mut self) -> PlatformResult<()> {
        Ok(())
    }

    async fn post(&self, content: &str) -> PlatformResult<String> {
        let remote_id = format!("dry-run:{}", uuid::Uuid::new_v4());
        info!(
            remote_id = %remote_id,
            chars = content.chars().count(),
            content = %content,
            "Dry run, not publishing"
        );
        Ok(remote_id)
    }

    fn name(&self) -> &str {
        "dry-run"
    }

    fn character_limit(&self) -> Option<usize> {
        None
    }
}
