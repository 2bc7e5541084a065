//! Quota accounting and synced-submission cleanup.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value;

pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;
pub const DEFAULT_SYNCED_RETENTION: usize = 50;
pub const DEFAULT_CLEANUP_RATIO: f64 = 0.8;

/// Size limits enforced by the storage queue before every write.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuotaPolicy {
    /// Hard limit for the whole store
    pub quota_bytes: usize,
    /// Synced submissions kept when cleanup runs
    pub synced_retention: usize,
    /// Usage ratio at which cleanup is recommended
    pub cleanup_ratio: f64,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            quota_bytes: DEFAULT_QUOTA_BYTES,
            synced_retention: DEFAULT_SYNCED_RETENTION,
            cleanup_ratio: DEFAULT_CLEANUP_RATIO,
        }
    }
}

/// Snapshot returned by `check_storage_health`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StorageHealth {
    pub bytes_in_use: usize,
    pub quota_bytes: usize,
    pub usage_ratio: f64,
    pub cleanup_recommended: bool,
}

impl StorageHealth {
    #[allow(clippy::cast_precision_loss)]
    pub fn measure(bytes_in_use: usize, policy: &QuotaPolicy) -> Self {
        let usage_ratio = if policy.quota_bytes == 0 {
            1.0
        } else {
            bytes_in_use as f64 / policy.quota_bytes as f64
        };
        Self {
            bytes_in_use,
            quota_bytes: policy.quota_bytes,
            usage_ratio,
            cleanup_recommended: usage_ratio >= policy.cleanup_ratio,
        }
    }

    pub const fn bytes_free(&self) -> usize {
        self.quota_bytes.saturating_sub(self.bytes_in_use)
    }
}

/// Drop the oldest synced submissions beyond `retention` from a stored
/// submission list, keeping the order of everything that remains.
///
/// Returns how many entries were removed. Non-array values are left alone.
pub fn prune_synced(submissions: &mut Value, retention: usize) -> usize {
    let Some(items) = submissions.as_array_mut() else {
        return 0;
    };

    let mut synced: Vec<(i64, usize)> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| item.get("status").and_then(Value::as_str) == Some("synced"))
        .map(|(index, item)| (completed_at(item), index))
        .collect();
    if synced.len() <= retention {
        return 0;
    }

    synced.sort_unstable();
    let excess = synced.len() - retention;
    let doomed: HashSet<usize> = synced[..excess].iter().map(|(_, index)| *index).collect();

    let mut index = 0;
    items.retain(|_| {
        let keep = !doomed.contains(&index);
        index += 1;
        keep
    });
    excess
}

fn completed_at(item: &Value) -> i64 {
    item.get("synced_at")
        .and_then(Value::as_i64)
        .or_else(|| item.get("added_at").and_then(Value::as_i64))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn entry(name: &str, status: &str, synced_at: i64) -> Value {
        json!({"name": name, "status": status, "added_at": 1, "synced_at": synced_at})
    }

    #[test]
    fn prune_keeps_newest_synced_and_all_unsynced() {
        let mut list = json!([
            entry("a", "synced", 30),
            entry("b", "pending", 0),
            entry("c", "synced", 10),
            entry("d", "failed", 0),
            entry("e", "synced", 20),
        ]);

        assert_eq!(prune_synced(&mut list, 1), 2);

        let names: Vec<&str> = list
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a", "b", "d"]);
    }

    #[test]
    fn prune_within_retention_is_noop() {
        let mut list = json!([entry("a", "synced", 1)]);
        assert_eq!(prune_synced(&mut list, 1), 0);
        assert_eq!(prune_synced(&mut json!({"not": "a list"}), 0), 0);
    }

    #[test]
    fn health_flags_cleanup_at_ratio() {
        let policy = QuotaPolicy {
            quota_bytes: 100,
            ..QuotaPolicy::default()
        };
        let health = StorageHealth::measure(79, &policy);
        assert!(!health.cleanup_recommended);
        assert_eq!(health.bytes_free(), 21);

        let health = StorageHealth::measure(80, &policy);
        assert!(health.cleanup_recommended);
        assert!((health.usage_ratio - 0.8).abs() < f64::EPSILON);
    }
}
