// Copyright 2025 Agentgauge Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Caching layer for judge verdicts.
//!
//! Judging the same transcript with the same evaluator and rubric is
//! deterministic enough to reuse, and judge calls dominate run cost.

use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::{Deserialize, Serialize};

use agentgauge_core::{EvaluationResult, Transcript};

use crate::registry::EvaluatorKind;

/// Cache for evaluation results keyed by transcript content.
pub struct JudgmentCache {
    cache: Cache<CacheKey, EvaluationResult>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl JudgmentCache {
    /// Create a new cache with the specified TTL in seconds.
    pub fn new(ttl_secs: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self {
            cache,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Compute the cache key for one judgment.
    pub fn compute_key(
        &self,
        kind: EvaluatorKind,
        case_name: &str,
        transcript: &Transcript,
        rubric: Option<&str>,
    ) -> CacheKey {
        CacheKey::new(kind, case_name, transcript, rubric)
    }

    pub async fn get(&self, key: &CacheKey) -> Option<EvaluationResult> {
        match self.cache.get(key).await {
            Some(result) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(result)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub async fn set(&self, key: CacheKey, value: EvaluationResult) {
        self.cache.insert(key, value).await;
    }

    pub async fn invalidate(&self, key: &CacheKey) {
        self.cache.invalidate(key).await;
    }

    pub async fn clear(&self) {
        self.cache.invalidate_all();
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        CacheStats {
            hits,
            misses,
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
            entry_count: self.cache.entry_count(),
        }
    }
}

/// Cache key covering everything that can change a verdict.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    transcript_hash: u64,
    judgment_hash: u64,
}

impl CacheKey {
    pub fn new(
        kind: EvaluatorKind,
        case_name: &str,
        transcript: &Transcript,
        rubric: Option<&str>,
    ) -> Self {
        use std::collections::hash_map::DefaultHasher;

        let mut hasher = DefaultHasher::new();
        transcript.content_hash().hash(&mut hasher);
        let transcript_hash = hasher.finish();

        let mut hasher = DefaultHasher::new();
        kind.name().hash(&mut hasher);
        case_name.hash(&mut hasher);
        if let Some(rubric) = rubric {
            rubric.hash(&mut hasher);
        }
        let judgment_hash = hasher.finish();

        Self {
            transcript_hash,
            judgment_hash,
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub entry_count: u64,
}
