//! Rotation cycle orchestration
//!
//! One cycle is: list unposted content, pick one item, format it, publish it,
//! record it in the ledger. [`Rotator::run_cycle`] never returns an error;
//! every failure becomes a [`CycleOutcome`] and a single structured log line.
//!
//! Only one cycle runs at a time. A trigger that arrives while a cycle is in
//! flight gets [`CycleOutcome::Busy`] and is dropped.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::content::ContentStore;
use crate::error::Result;
use crate::format::Formatter;
use crate::ledger::Ledger;
use crate::platforms::Platform;
use crate::selector::Selector;

/// Step of the cycle that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Format,
    Publish,
    Commit,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureStage::Format => write!(f, "format"),
            FailureStage::Publish => write!(f, "publish"),
            FailureStage::Commit => write!(f, "commit"),
        }
    }
}

/// Result of a single cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Published and recorded in the ledger
    Committed { item: String, remote_id: String },
    /// Published to the dry-run platform; the ledger was not touched
    DryRun { item: String, remote_id: String },
    /// Nothing left to publish
    Skipped,
    /// Another cycle was still running
    Busy,
    Failed {
        item: Option<String>,
        stage: FailureStage,
        /// Set when the item was published before the failure
        remote_id: Option<String>,
        error: String,
    },
}

impl CycleOutcome {
    /// Value of the `outcome` log field
    pub fn name(&self) -> &'static str {
        match self {
            CycleOutcome::Committed { .. } => "committed",
            CycleOutcome::DryRun { .. } => "dry_run",
            CycleOutcome::Skipped => "skipped",
            CycleOutcome::Busy => "busy",
            CycleOutcome::Failed { .. } => "failed",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, CycleOutcome::Failed { .. })
    }

    pub fn item(&self) -> Option<&str> {
        match self {
            CycleOutcome::Committed { item, .. } | CycleOutcome::DryRun { item, .. } => {
                Some(item)
            }
            CycleOutcome::Failed { item, .. } => item.as_deref(),
            CycleOutcome::Skipped | CycleOutcome::Busy => None,
        }
    }
}

/// Counters over the lifetime of a [`Rotator`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub committed: u64,
    pub dry_run: u64,
    pub skipped: u64,
    pub busy: u64,
    pub failed: u64,
    /// Items published but not yet recorded in the ledger
    pub unrecorded: usize,
}

#[derive(Debug, Default)]
struct Counters {
    committed: AtomicU64,
    dry_run: AtomicU64,
    skipped: AtomicU64,
    busy: AtomicU64,
    failed: AtomicU64,
    unrecorded: AtomicUsize,
}

/// State only one cycle may touch at a time
#[derive(Debug)]
struct CycleState {
    ledger: Ledger,
    selector: Selector,
    /// Published ids whose ledger commit failed
    unrecorded: BTreeSet<String>,
}

pub struct Rotator {
    store: ContentStore,
    formatter: Formatter,
    platform: Box<dyn Platform>,
    dry_run: bool,
    state: Mutex<CycleState>,
    counters: Counters,
}

impl Rotator {
    /// Assemble a rotator from its parts
    ///
    /// `platform` must already be authenticated.
    pub fn new(
        store: ContentStore,
        ledger: Ledger,
        formatter: Formatter,
        platform: Box<dyn Platform>,
    ) -> Self {
        Self {
            store,
            formatter,
            platform,
            dry_run: false,
            state: Mutex::new(CycleState {
                ledger,
                selector: Selector::new(),
                unrecorded: BTreeSet::new(),
            }),
            counters: Counters::default(),
        }
    }

    /// Build a rotator from configuration and an already loaded ledger
    ///
    /// Warns when `format.max_length` is above the platform's own limit.
    pub fn from_config(
        config: &Config,
        ledger: Ledger,
        platform: Box<dyn Platform>,
    ) -> Result<Self> {
        let store = ContentStore::new(config.content_dir()?, &config.content.extension);
        let formatter = Formatter::new(config.format.clone())?;

        if let Some(limit) = platform.character_limit() {
            if config.format.max_length > limit {
                warn!(
                    platform = platform.name(),
                    max_length = config.format.max_length,
                    limit,
                    "format.max_length exceeds the platform limit; long posts will be rejected"
                );
            }
        }

        Ok(Self::new(store, ledger, formatter, platform))
    }

    /// Skip the ledger commit after publishing
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Replace the selector, e.g. with [`Selector::seeded`]
    pub fn with_selector(mut self, selector: Selector) -> Self {
        self.state.get_mut().selector = selector;
        self
    }

    pub fn platform_name(&self) -> &str {
        self.platform.name()
    }

    pub fn stats(&self) -> CycleStats {
        CycleStats {
            committed: self.counters.committed.load(Ordering::Relaxed),
            dry_run: self.counters.dry_run.load(Ordering::Relaxed),
            skipped: self.counters.skipped.load(Ordering::Relaxed),
            busy: self.counters.busy.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            unrecorded: self.counters.unrecorded.load(Ordering::Relaxed),
        }
    }

    /// Ids recorded in the ledger, oldest first
    ///
    /// Waits for a running cycle to finish.
    pub async fn posted_ids(&self) -> Vec<String> {
        self.state.lock().await.ledger.posted_ids().to_vec()
    }

    /// Run one cycle
    pub async fn run_cycle(&self) -> CycleOutcome {
        let Ok(mut state) = self.state.try_lock() else {
            let outcome = CycleOutcome::Busy;
            self.record(&outcome);
            return outcome;
        };

        let outcome = self.cycle(&mut state).await;
        self.counters
            .unrecorded
            .store(state.unrecorded.len(), Ordering::Relaxed);
        drop(state);

        self.record(&outcome);
        outcome
    }

    async fn cycle(&self, state: &mut CycleState) -> CycleOutcome {
        if let Some(outcome) = retry_unrecorded(state) {
            return outcome;
        }

        let candidates = {
            let ledger = &state.ledger;
            let unrecorded = &state.unrecorded;
            self.store
                .list_unposted(|id| ledger.contains(id) || unrecorded.contains(id))
        };

        if candidates.is_empty() {
            return CycleOutcome::Skipped;
        }
        let Some(item) = state.selector.choose(&candidates) else {
            return CycleOutcome::Skipped;
        };
        debug!(item = %item.id, candidates = candidates.len(), "Selected item");

        let post = match self.formatter.format(&item.body) {
            Ok(post) => post,
            Err(e) => {
                return CycleOutcome::Failed {
                    item: Some(item.id.clone()),
                    stage: FailureStage::Format,
                    remote_id: None,
                    error: e.to_string(),
                }
            }
        };
        if post.truncated {
            debug!(item = %item.id, chars = post.char_count(), "Body truncated to fit");
        }

        let remote_id = match self.platform.post(&post.text).await {
            Ok(remote_id) => remote_id,
            Err(e) => {
                return CycleOutcome::Failed {
                    item: Some(item.id.clone()),
                    stage: FailureStage::Publish,
                    remote_id: None,
                    error: format!(
                        "{} ({}, {})",
                        e,
                        e.kind(),
                        if e.is_transient() {
                            "retryable"
                        } else {
                            "not retryable"
                        }
                    ),
                }
            }
        };

        // No await between a successful publish and its commit
        if self.dry_run {
            return CycleOutcome::DryRun {
                item: item.id.clone(),
                remote_id,
            };
        }

        match state.ledger.commit(&item.id) {
            Ok(_) => CycleOutcome::Committed {
                item: item.id.clone(),
                remote_id,
            },
            Err(e) => {
                state.unrecorded.insert(item.id.clone());
                CycleOutcome::Failed {
                    item: Some(item.id.clone()),
                    stage: FailureStage::Commit,
                    remote_id: Some(remote_id),
                    error: e.to_string(),
                }
            }
        }
    }

    /// Update counters and emit the cycle's log entry
    fn record(&self, outcome: &CycleOutcome) {
        match outcome {
            CycleOutcome::Committed { item, remote_id } => {
                self.counters.committed.fetch_add(1, Ordering::Relaxed);
                info!(
                    outcome = outcome.name(),
                    item = %item,
                    remote_id = %remote_id,
                    platform = self.platform.name(),
                    "Published item"
                );
            }
            CycleOutcome::DryRun { item, remote_id } => {
                self.counters.dry_run.fetch_add(1, Ordering::Relaxed);
                info!(
                    outcome = outcome.name(),
                    item = %item,
                    remote_id = %remote_id,
                    "Dry run cycle finished, ledger not updated"
                );
            }
            CycleOutcome::Skipped => {
                self.counters.skipped.fetch_add(1, Ordering::Relaxed);
                info!(
                    outcome = outcome.name(),
                    dir = %self.store.dir().display(),
                    "No unposted content, skipping cycle"
                );
            }
            CycleOutcome::Busy => {
                self.counters.busy.fetch_add(1, Ordering::Relaxed);
                warn!(
                    outcome = outcome.name(),
                    "Previous cycle still running, trigger dropped"
                );
            }
            CycleOutcome::Failed {
                item,
                stage: FailureStage::Commit,
                remote_id,
                error,
            } => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                error!(
                    outcome = outcome.name(),
                    stage = %FailureStage::Commit,
                    item = item.as_deref().unwrap_or("-"),
                    remote_id = remote_id.as_deref().unwrap_or("-"),
                    error = %error,
                    inconsistency = true,
                    "Item is live but not recorded; recording will be retried before the next post"
                );
            }
            CycleOutcome::Failed {
                item, stage, error, ..
            } => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    outcome = outcome.name(),
                    stage = %stage,
                    item = item.as_deref().unwrap_or("-"),
                    error = %error,
                    "Cycle failed"
                );
            }
        }
    }
}

/// Record previously unrecorded ids, stopping at the first failure
fn retry_unrecorded(state: &mut CycleState) -> Option<CycleOutcome> {
    let pending: Vec<String> = state.unrecorded.iter().cloned().collect();

    for id in pending {
        match state.ledger.commit(&id) {
            Ok(_) => {
                state.unrecorded.remove(&id);
                info!(item = %id, "Recorded previously unrecorded item");
            }
            Err(e) => {
                return Some(CycleOutcome::Failed {
                    item: Some(id),
                    stage: FailureStage::Commit,
                    remote_id: None,
                    error: e.to_string(),
                });
            }
        }
    }

    None
}
