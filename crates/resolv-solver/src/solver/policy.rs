use std::cmp::Ordering;

use super::pool::{Pool, RecordId};

/// Policy for ordering candidate records.
///
/// When several records can satisfy a rule, the policy determines which one
/// the search tries first. The default keeps installed records in place and
/// otherwise follows the pool order (channel priority, newest version,
/// build string).
#[derive(Debug, Clone)]
pub struct Policy {
    /// Try the installed record before anything else where a change is not requested
    pub prefer_installed: bool,
    /// Prefer lowest versions within a channel (for testing)
    pub prefer_lowest: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy {
    pub fn new() -> Self {
        Self {
            prefer_installed: true,
            prefer_lowest: false,
        }
    }

    pub fn prefer_installed(mut self, prefer: bool) -> Self {
        self.prefer_installed = prefer;
        self
    }

    pub fn prefer_lowest(mut self, prefer: bool) -> Self {
        self.prefer_lowest = prefer;
        self
    }

    /// Return the candidates sorted by preference (best first).
    ///
    /// With `keep_installed`, an installed candidate moves to the front.
    pub fn select_preferred(
        &self,
        pool: &Pool,
        candidates: &[RecordId],
        keep_installed: bool,
    ) -> Vec<RecordId> {
        let mut ordered = candidates.to_vec();
        ordered.sort_by(|&a, &b| self.compare(pool, a, b));

        if keep_installed && self.prefer_installed {
            if let Some(pos) = ordered.iter().position(|&id| pool.is_installed(id)) {
                let installed = ordered.remove(pos);
                ordered.insert(0, installed);
            }
        }
        ordered
    }

    /// The single best candidate, if any.
    pub fn select_best(&self, pool: &Pool, candidates: &[RecordId]) -> Option<RecordId> {
        self.select_preferred(pool, candidates, true).first().copied()
    }

    fn compare(&self, pool: &Pool, a: RecordId, b: RecordId) -> Ordering {
        if !self.prefer_lowest {
            return pool.compare_records(a, b);
        }
        match (pool.record(a), pool.record(b)) {
            (Some(ra), Some(rb)) => pool
                .channel_priority(&ra.channel)
                .cmp(&pool.channel_priority(&rb.channel))
                .then_with(|| ra.version.cmp(&rb.version))
                .then_with(|| pool.compare_records(a, b)),
            _ => a.cmp(&b),
        }
    }
}
