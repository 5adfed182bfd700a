//! Invalidation Coordinator
//!
//! Maps domain mutation events to the cache keys and patterns they make
//! stale. Every target is attempted independently; failures are logged and
//! swallowed, leaving stale data to expire with its TTL.

use std::fmt;
use std::sync::Arc;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::storage::StorageEngine;

// == Events ==
/// A successful business-layer mutation that affects cached data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CacheEvent {
    GameCompleted {
        user_id: String,
    },
    UserCreated,
    LeaderboardUpdated {
        #[serde(default)]
        user_id: Option<String>,
    },
    AnalyticsUpdated {
        #[serde(default)]
        user_id: Option<String>,
    },
    All,
}

/// One thing to purge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationTarget {
    Key(String),
    Pattern(String),
}

impl fmt::Display for InvalidationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidationTarget::Key(key) => write!(f, "key {key}"),
            InvalidationTarget::Pattern(pattern) => write!(f, "pattern {pattern}"),
        }
    }
}

/// Outcome of one batch of invalidations.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InvalidationReport {
    pub attempted: usize,
    pub failed: usize,
    /// Keys actually removed
    pub removed: usize,
}

/// Key of the index entry listing the cache keys written under `tag`.
pub fn tag_key(tag: &str) -> String {
    format!("tags:{tag}")
}

// == Tag Index ==
/// Records which cache keys were written under which policy tag.
///
/// Updates are read-modify-write; two concurrent writers on the same tag
/// may drop one of the recorded keys, which then lives out its TTL.
#[derive(Clone)]
pub struct TagIndex {
    engine: Arc<StorageEngine>,
}

impl TagIndex {
    pub fn new(engine: Arc<StorageEngine>) -> Self {
        Self { engine }
    }

    /// Adds `key` to the index of `tag`; the index expires with `ttl`.
    pub async fn record(&self, tag: &str, key: &str, ttl: u64) {
        let index_key = tag_key(tag);
        let mut members = self.members(tag).await;

        if !members.iter().any(|member| member == key) {
            members.push(key.to_string());
        }
        self.engine.set_typed(&index_key, &members, Some(ttl)).await;
    }

    pub async fn members(&self, tag: &str) -> Vec<String> {
        self.engine
            .get_as::<Vec<String>>(&tag_key(tag), None)
            .await
            .into_data()
            .unwrap_or_default()
    }
}

// == Invalidation Coordinator ==
#[derive(Clone)]
pub struct InvalidationCoordinator {
    engine: Arc<StorageEngine>,
    tags: TagIndex,
}

impl InvalidationCoordinator {
    pub fn new(engine: Arc<StorageEngine>) -> Self {
        Self {
            tags: TagIndex::new(engine.clone()),
            engine,
        }
    }

    /// The keys and patterns an event makes stale.
    pub fn targets_for(event: &CacheEvent) -> Vec<InvalidationTarget> {
        use InvalidationTarget::{Key, Pattern};

        match event {
            CacheEvent::GameCompleted { user_id } => vec![
                Key(format!("analytics:user:{user_id}")),
                Key("analytics:global-stats".to_string()),
                Pattern("leaderboard:*".to_string()),
                Key(format!("games:history:{user_id}")),
                Pattern(format!("games:history:{user_id}:*")),
            ],
            CacheEvent::UserCreated => vec![
                Key("analytics:global-stats".to_string()),
                Pattern("leaderboard:*".to_string()),
            ],
            CacheEvent::LeaderboardUpdated { user_id } => {
                let mut targets = vec![Pattern("leaderboard:*".to_string())];
                if let Some(user_id) = user_id {
                    targets.push(Key(format!("analytics:user:{user_id}")));
                }
                targets
            }
            CacheEvent::AnalyticsUpdated { user_id: Some(user_id) } => vec![
                Key(format!("analytics:user:{user_id}")),
                Key("analytics:global-stats".to_string()),
            ],
            CacheEvent::AnalyticsUpdated { user_id: None } => {
                vec![Pattern("analytics:*".to_string())]
            }
            CacheEvent::All => vec![Pattern("*".to_string())],
        }
    }

    // == Dispatch ==
    /// Purges every target of `event`, concurrently and independently.
    pub async fn dispatch(&self, event: &CacheEvent) -> InvalidationReport {
        let report = self.invalidate_targets(Self::targets_for(event)).await;
        info!(
            ?event,
            removed = report.removed,
            failed = report.failed,
            "Cache invalidation dispatched"
        );
        report
    }

    /// Fire-and-forget variant of `dispatch`.
    pub fn spawn(&self, event: CacheEvent) -> JoinHandle<InvalidationReport> {
        let coordinator = self.clone();
        tokio::spawn(async move { coordinator.dispatch(&event).await })
    }

    /// Attempts every target; one failure never stops the others.
    pub async fn invalidate_targets(&self, targets: Vec<InvalidationTarget>) -> InvalidationReport {
        let outcomes = join_all(targets.iter().map(|target| self.apply(target))).await;
        let mut report = InvalidationReport {
            attempted: targets.len(),
            ..InvalidationReport::default()
        };

        for (target, outcome) in targets.iter().zip(outcomes) {
            match outcome {
                Ok(removed) => report.removed += removed,
                Err(error) => {
                    warn!(%target, error = %error, "Cache invalidation failed");
                    report.failed += 1;
                }
            }
        }
        report
    }

    async fn apply(&self, target: &InvalidationTarget) -> Result<usize, String> {
        match target {
            InvalidationTarget::Key(key) => {
                let result = self.engine.delete(key).await;
                // A missing key comes back unsuccessful but with data
                match result.data {
                    Some(removed) => Ok(usize::from(removed)),
                    None => Err(result.error.unwrap_or_default()),
                }
            }
            InvalidationTarget::Pattern(pattern) => {
                let result = self.engine.invalidate_pattern(pattern).await;
                match (result.success, result.data) {
                    (true, Some(removed)) => Ok(removed),
                    _ => Err(result.error.unwrap_or_default()),
                }
            }
        }
    }

    // == Named Triggers ==
    pub async fn on_game_complete(&self, user_id: &str) -> InvalidationReport {
        self.dispatch(&CacheEvent::GameCompleted {
            user_id: user_id.to_string(),
        })
        .await
    }

    pub async fn on_user_created(&self) -> InvalidationReport {
        self.dispatch(&CacheEvent::UserCreated).await
    }

    pub async fn on_leaderboard_update(&self, user_id: Option<&str>) -> InvalidationReport {
        self.dispatch(&CacheEvent::LeaderboardUpdated {
            user_id: user_id.map(str::to_string),
        })
        .await
    }

    pub async fn on_analytics_update(&self, user_id: Option<&str>) -> InvalidationReport {
        self.dispatch(&CacheEvent::AnalyticsUpdated {
            user_id: user_id.map(str::to_string),
        })
        .await
    }

    pub async fn invalidate_all(&self) -> InvalidationReport {
        self.dispatch(&CacheEvent::All).await
    }

    /// Purges every key recorded under `tag`, then the index itself.
    pub async fn invalidate_tag(&self, tag: &str) -> InvalidationReport {
        let mut targets: Vec<InvalidationTarget> = self
            .tags
            .members(tag)
            .await
            .into_iter()
            .map(InvalidationTarget::Key)
            .collect();
        targets.push(InvalidationTarget::Key(tag_key(tag)));

        debug!(tag, keys = targets.len() - 1, "Invalidating tag");
        self.invalidate_targets(targets).await
    }
}
