//! Mastodon platform implementation
//!
//! Publishes statuses through the megalodon library, which also covers
//! Pleroma, Akkoma and GoToSocial instances speaking the Mastodon API.

use async_trait::async_trait;
use megalodon::{Megalodon, SNS};
use tracing::{debug, warn};

use crate::config::MastodonConfig;
use crate::error::{PlatformError, PlatformResult};
use crate::platforms::Platform;

/// Environment variable that overrides `mastodon.token_file`
pub const TOKEN_ENV: &str = "ROTACAST_MASTODON_TOKEN";

const DEFAULT_CHARACTER_LIMIT: usize = 500;

/// Mastodon platform client
pub struct MastodonClient {
    client: Box<dyn Megalodon + Send + Sync>,
    instance_url: String,
    /// Instance-specific, refreshed by `authenticate()`
    character_limit: usize,
}

impl MastodonClient {
    /// Create a new Mastodon client
    ///
    /// Starts with the default 500 character limit; `authenticate()` replaces
    /// it with the instance's own limit.
    pub fn new(instance_url: String, access_token: String) -> PlatformResult<Self> {
        let client = megalodon::generator(
            SNS::Mastodon,
            instance_url.clone(),
            Some(access_token),
            None,
        )
        .map_err(|e| {
            PlatformError::Authentication(format!("Failed to create Mastodon client: {:?}", e))
        })?;

        Ok(Self {
            client,
            instance_url,
            character_limit: DEFAULT_CHARACTER_LIMIT,
        })
    }

    /// Create a client from configuration
    ///
    /// The token comes from `ROTACAST_MASTODON_TOKEN` when set, otherwise
    /// from `token_file`.
    pub fn from_config(config: &MastodonConfig) -> PlatformResult<Self> {
        let token = read_token(config)?;
        Self::new(normalize_instance_url(&config.instance), token)
    }

    pub fn instance_url(&self) -> &str {
        &self.instance_url
    }

    /// Fetch the instance's character limit
    pub async fn fetch_instance_info(&mut self) -> PlatformResult<()> {
        let response = self
            .client
            .get_instance()
            .await
            .map_err(|e| map_megalodon_error(e, "fetch instance info"))?;

        let config = response.json.configuration;
        let statuses = config.statuses;
        let limit = statuses.max_characters;

        self.character_limit = limit as usize;
        debug!(instance = %self.instance_url, limit = self.character_limit, "Fetched instance limit");

        Ok(())
    }

    fn validate_content(&self, content: &str) -> PlatformResult<()> {
        if content.trim().is_empty() {
            return Err(PlatformError::Rejected("Content cannot be empty".to_string()));
        }

        let char_count = content.chars().count();
        if char_count > self.character_limit {
            return Err(PlatformError::Rejected(format!(
                "Content exceeds Mastodon's {} character limit (current: {} characters)",
                self.character_limit, char_count
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl Platform for MastodonClient {
    async fn authenticate(&mut self) -> PlatformResult<()> {
        self.client
            .verify_account_credentials()
            .await
            .map_err(|e| map_megalodon_error(e, "authenticate"))?;

        // The default limit is still usable if the instance hides its metadata
        if let Err(e) = self.fetch_instance_info().await {
            warn!(
                instance = %self.instance_url,
                error = %e,
                "Could not fetch instance limit, assuming {}",
                DEFAULT_CHARACTER_LIMIT
            );
        }

        Ok(())
    }

    async fn post(&self, content: &str) -> PlatformResult<String> {
        self.validate_content(content)?;

        let response = self
            .client
            .post_status(content.to_string(), None)
            .await
            .map_err(|e| map_megalodon_error(e, "post status"))?;

        let post_id = match response.json {
            megalodon::megalodon::PostStatusOutput::Status(status) => status.id,
            megalodon::megalodon::PostStatusOutput::ScheduledStatus(scheduled) => scheduled.id,
        };

        Ok(post_id)
    }

    fn name(&self) -> &str {
        "mastodon"
    }

    fn character_limit(&self) -> Option<usize> {
        Some(self.character_limit)
    }
}

fn read_token(config: &MastodonConfig) -> PlatformResult<String> {
    if let Ok(token) = std::env::var(TOKEN_ENV) {
        if !token.trim().is_empty() {
            return Ok(token.trim().to_string());
        }
    }

    let token_file = config.token_file.as_ref().ok_or_else(|| {
        PlatformError::Authentication(format!(
            "No Mastodon token configured. Set {} or mastodon.token_file",
            TOKEN_ENV
        ))
    })?;

    let token_path = shellexpand::full(token_file).map_err(|e| {
        PlatformError::Authentication(format!("Failed to expand token file path: {}", e))
    })?;

    let token = std::fs::read_to_string(token_path.as_ref())
        .map_err(|e| {
            PlatformError::Authentication(format!("Failed to read Mastodon token file: {}", e))
        })?
        .trim()
        .to_string();

    if token.is_empty() {
        return Err(PlatformError::Authentication(
            "Mastodon token file is empty".to_string(),
        ));
    }

    Ok(token)
}

/// Ensure the instance URL has a scheme
fn normalize_instance_url(instance: &str) -> String {
    let instance = instance.trim().trim_end_matches('/');
    if instance.starts_with("http://") || instance.starts_with("https://") {
        instance.to_string()
    } else {
        format!("https://{}", instance)
    }
}

/// Map megalodon errors to PlatformError
///
/// - HTTP 401/403 → `Authentication`
/// - HTTP 429 → `RateLimit`
/// - HTTP 408, 5xx, transport failures → `Network`
/// - other 4xx → `Rejected`
///
/// A response that arrived but could not be parsed is reported as `Network`:
/// the status may well be live, and the caller must not assume otherwise.
fn map_megalodon_error(error: megalodon::error::Error, context: &str) -> PlatformError {
    classify_error(&error.to_string(), context)
}

fn classify_error(error_str: &str, context: &str) -> PlatformError {
    let error_lower = error_str.to_lowercase();

    match extract_http_status(error_str) {
        Some(401) | Some(403) => PlatformError::Authentication(format!(
            "Mastodon authentication failed ({}): {}. \
                Suggestion: Verify your OAuth token is valid and has not expired.",
            context, error_str
        )),
        Some(429) => PlatformError::RateLimit(format!(
            "Mastodon rate limit exceeded ({}): {}",
            context, error_str
        )),
        Some(408) | Some(500..=599) => PlatformError::Network(format!(
            "Mastodon server error ({}): {}",
            context, error_str
        )),
        Some(400..=499) => PlatformError::Rejected(format!(
            "Mastodon rejected the request ({}): {}",
            context, error_str
        )),
        Some(_) => {
            PlatformError::Network(format!("Mastodon HTTP error ({}): {}", context, error_str))
        }
        None => {
            if error_lower.contains("unauthorized")
                || error_lower.contains("forbidden")
                || error_lower.contains("token")
            {
                PlatformError::Authentication(format!(
                    "Mastodon authentication failed ({}): {}",
                    context, error_str
                ))
            } else if error_lower.contains("rate limit")
                || error_lower.contains("too many requests")
            {
                PlatformError::RateLimit(format!(
                    "Mastodon rate limit exceeded ({}): {}",
                    context, error_str
                ))
            } else if error_lower.contains("validation") || error_lower.contains("unprocessable")
            {
                PlatformError::Rejected(format!(
                    "Mastodon validation failed ({}): {}",
                    context, error_str
                ))
            } else {
                PlatformError::Network(format!(
                    "Mastodon error ({}): {}. \
                        Suggestion: Check your network connection and instance availability.",
                    context, error_str
                ))
            }
        }
    }
}

/// Extract an HTTP status code from an error message
///
/// Looks for "HTTP 401", "status 403", "code: 429" or a bare 3-digit code
/// followed by ':' or ' '.
fn extract_http_status(error_str: &str) -> Option<u16> {
    let prefixes = ["HTTP ", "status ", "code: ", "status_code: "];

    for prefix in &prefixes {
        if let Some(pos) = error_str.find(prefix) {
            let after_prefix = &error_str[pos + prefix.len()..];
            if let Some(code) = after_prefix.get(0..3).and_then(|s| s.parse::<u16>().ok()) {
                if (100..=599).contains(&code) {
                    return Some(code);
                }
            }
        }
    }

    let bytes = error_str.as_bytes();
    for (i, window) in bytes.windows(4).enumerate() {
        if window[..3].iter().all(u8::is_ascii_digit) && (window[3] == b':' || window[3] == b' ')
        {
            let preceded_by_digit = i > 0 && bytes[i - 1].is_ascii_digit();
            if preceded_by_digit {
                continue;
            }
            if let Some(code) = std::str::from_utf8(&window[..3])
                .ok()
                .and_then(|s| s.parse::<u16>().ok())
            {
                if (100..=599).contains(&code) {
                    return Some(code);
                }
            }
        }
    }

    None
}
