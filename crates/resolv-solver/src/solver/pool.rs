use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use indexmap::IndexMap;

use resolv_spec::{MatchSpec, PackageRecord};

/// Identifier of a record in the pool. Positive, so it doubles as the
/// "selected" literal in solver rules.
pub type RecordId = i32;

/// Installed and available package records for one solve.
///
/// Records are addressed by ID (1-based). Available records are ordered by
/// channel priority (lower value first), then version descending, then build
/// string ascending, then insertion order. Channels that were never
/// registered rank after every registered channel.
#[derive(Debug, Default)]
pub struct Pool {
    /// All records indexed by ID - 1
    records: Vec<Arc<PackageRecord>>,

    /// Available record IDs by name, in insertion order
    available: HashMap<String, Vec<RecordId>>,

    /// Installed record ID per name
    installed: BTreeMap<String, RecordId>,

    /// Priority of channels (lower = preferred)
    priorities: HashMap<String, i32>,

    /// Specs the user asked for in earlier transactions
    user_specs: IndexMap<String, MatchSpec>,
}

impl Pool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel with its priority. Lower values are preferred.
    pub fn add_channel(&mut self, channel: impl Into<String>, priority: i32) {
        self.priorities.insert(channel.into(), priority);
    }

    /// Register channels in preference order, most preferred first.
    pub fn add_channels<I, S>(&mut self, channels: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for (priority, channel) in channels.into_iter().enumerate() {
            self.add_channel(channel, priority as i32);
        }
    }

    pub fn channel_priority(&self, channel: &str) -> i32 {
        self.priorities.get(channel).copied().unwrap_or(i32::MAX)
    }

    /// Add an available record.
    pub fn add_record(&mut self, record: PackageRecord) -> RecordId {
        let id = self.push(record);
        let name = self.records[id as usize - 1].name.clone();
        self.available.entry(name).or_default().push(id);
        id
    }

    /// Add a record of the current environment, replacing any installed
    /// record of the same name.
    pub fn add_installed(&mut self, record: PackageRecord) -> RecordId {
        let name = record.name.clone();
        let id = self.push(record);
        if let Some(previous) = self.installed.insert(name.clone(), id) {
            log::debug!("Replacing installed record {} for {}", previous, name);
        }
        id
    }

    /// Remember a spec the user explicitly requested in the past.
    pub fn add_user_spec(&mut self, spec: MatchSpec) {
        self.user_specs.insert(spec.name().to_string(), spec);
    }

    fn push(&mut self, record: PackageRecord) -> RecordId {
        self.records.push(Arc::new(record));
        self.records.len() as RecordId
    }

    pub fn record(&self, id: RecordId) -> Option<&Arc<PackageRecord>> {
        if id <= 0 {
            return None;
        }
        self.records.get(id as usize - 1)
    }

    /// All record IDs, ascending.
    pub fn ids(&self) -> impl Iterator<Item = RecordId> {
        1..=self.records.len() as RecordId
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_installed(&self, id: RecordId) -> bool {
        self.record(id)
            .map_or(false, |record| self.installed.get(&record.name) == Some(&id))
    }

    pub fn installed_id(&self, name: &str) -> Option<RecordId> {
        self.installed.get(name).copied()
    }

    pub fn installed_record(&self, name: &str) -> Option<&Arc<PackageRecord>> {
        self.installed_id(name).and_then(|id| self.record(id))
    }

    /// Installed record IDs ordered by package name.
    pub fn installed_ids(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.installed.values().copied()
    }

    pub fn installed_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.installed.keys().map(|name| name.as_str())
    }

    pub fn user_spec(&self, name: &str) -> Option<&MatchSpec> {
        self.user_specs.get(name)
    }

    pub fn is_user_requested(&self, name: &str) -> bool {
        self.user_specs.contains_key(name)
    }

    /// Whether the name is known at all, installed or available.
    pub fn contains_name(&self, name: &str) -> bool {
        self.installed.contains_key(name) || self.available.contains_key(name)
    }

    /// Deterministic preference order between two records.
    pub fn compare_records(&self, a: RecordId, b: RecordId) -> Ordering {
        match (self.record(a), self.record(b)) {
            (Some(ra), Some(rb)) => self
                .channel_priority(&ra.channel)
                .cmp(&self.channel_priority(&rb.channel))
                .then_with(|| rb.version.cmp(&ra.version))
                .then_with(|| ra.build.cmp(&rb.build))
                .then_with(|| rb.build_number.cmp(&ra.build_number))
                .then_with(|| a.cmp(&b)),
            _ => a.cmp(&b),
        }
    }

    fn sort_ids(&self, ids: &mut [RecordId]) {
        ids.sort_by(|&a, &b| self.compare_records(a, b));
    }

    /// Available records for a name in preference order.
    pub fn records_for(&self, name: &str) -> Vec<RecordId> {
        self.records_for_with(name, false)
    }

    /// Available records for a name in preference order. With `strict`,
    /// only records from the most preferred channel offering the name remain.
    pub fn records_for_with(&self, name: &str, strict: bool) -> Vec<RecordId> {
        let mut ids = self.available.get(name).cloned().unwrap_or_default();
        self.sort_ids(&mut ids);

        if strict {
            if let Some(best) = ids.first().and_then(|&id| self.record(id)) {
                let best = self.channel_priority(&best.channel);
                ids.retain(|&id| {
                    self.record(id)
                        .map_or(false, |record| self.channel_priority(&record.channel) == best)
                });
            }
        }
        ids
    }

    /// Every record the solver may select for `name`: the available records
    /// plus the installed one. An available record that is the same artifact
    /// as the installed record is represented by the installed ID. With
    /// `strict`, the installed record only stays when no channel ranked above
    /// its own offers the name.
    pub fn candidates(&self, name: &str, strict: bool) -> Vec<RecordId> {
        let mut ids = self.records_for_with(name, strict);

        if let Some(installed_id) = self.installed_id(name) {
            if let Some(installed) = self.record(installed_id) {
                let best = ids
                    .first()
                    .and_then(|&id| self.record(id))
                    .map(|record| self.channel_priority(&record.channel));
                let outranked = strict
                    && best.map_or(false, |best| self.channel_priority(&installed.channel) > best);

                ids.retain(|&id| {
                    self.record(id)
                        .map_or(true, |record| !record.same_artifact(installed))
                });
                if !outranked {
                    ids.push(installed_id);
                    self.sort_ids(&mut ids);
                }
            }
        }
        ids
    }

    /// Candidates matching a spec, in preference order.
    pub fn what_matches(&self, spec: &MatchSpec, strict: bool) -> Vec<RecordId> {
        self.candidates(spec.name(), strict)
            .into_iter()
            .filter(|&id| self.record(id).map_or(false, |record| spec.matches(record)))
            .collect()
    }

    /// Short label for a record, used in logs and problem descriptions.
    pub fn describe(&self, id: RecordId) -> String {
        match self.record(id) {
            Some(record) => record.pretty_string(),
            None => format!("#{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, version: &str, build: &str, channel: &str) -> PackageRecord {
        PackageRecord::parse(name, version, build)
            .unwrap()
            .with_channel(channel)
    }

    fn versions(pool: &Pool, ids: &[RecordId]) -> Vec<String> {
        ids.iter()
            .map(|&id| {
                let r = pool.record(id).unwrap();
                format!("{}:{}-{}", r.channel, r.version, r.build)
            })
            .collect()
    }

    #[test]
    fn test_pool_ids_are_one_based() {
        let mut pool = Pool::new();
        let id = pool.add_record(record("foo", "1.0", "0", ""));
        assert_eq!(id, 1);
        assert!(pool.record(0).is_none());
        assert_eq!(pool.record(1).unwrap().name, "foo");
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_records_for_ordering() {
        let mut pool = Pool::new();
        pool.add_channels(["main", "extra"]);
        pool.add_record(record("foo", "1.0", "b", "main"));
        pool.add_record(record("foo", "2.0", "a", "extra"));
        pool.add_record(record("foo", "1.5", "a", "main"));
        pool.add_record(record("foo", "1.0", "a", "main"));
        pool.add_record(record("foo", "3.0", "a", "unknown"));

        let ids = pool.records_for("foo");
        assert_eq!(
            versions(&pool, &ids),
            vec!["main:1.5-a", "main:1.0-a", "main:1.0-b", "extra:2.0-a", "unknown:3.0-a"]
        );
    }

    #[test]
    fn test_records_for_strict_priority() {
        let mut pool = Pool::new();
        pool.add_channels(["main", "extra"]);
        pool.add_record(record("foo", "2.0", "0", "extra"));
        pool.add_record(record("foo", "1.0", "0", "main"));
        pool.add_record(record("bar", "2.0", "0", "extra"));

        assert_eq!(versions(&pool, &pool.records_for_with("foo", true)), vec!["main:1.0-0"]);
        // no higher priority channel offers bar, so extra survives
        assert_eq!(versions(&pool, &pool.records_for_with("bar", true)), vec!["extra:2.0-0"]);
    }

    #[test]
    fn test_candidates_collapse_installed_artifact() {
        let mut pool = Pool::new();
        let available = pool.add_record(record("foo", "1.0", "0", ""));
        pool.add_record(record("foo", "1.1", "0", ""));
        let installed = pool.add_installed(record("foo", "1.0", "0", ""));

        let candidates = pool.candidates("foo", false);
        assert_eq!(candidates.len(), 2);
        assert!(candidates.contains(&installed));
        assert!(!candidates.contains(&available));
        assert!(pool.is_installed(installed));
        assert!(!pool.is_installed(available));
    }

    #[test]
    fn test_candidates_drop_outranked_installed_under_strict_priority() {
        let mut pool = Pool::new();
        pool.add_channels(["main", "extra"]);
        let preferred = pool.add_record(record("foo", "1.0", "0", "main"));
        pool.add_record(record("foo", "1.0", "0", "extra"));
        let installed = pool.add_installed(record("foo", "1.0", "0", "extra"));

        assert_eq!(pool.candidates("foo", true), vec![preferred]);

        let relaxed = pool.candidates("foo", false);
        assert_eq!(relaxed.len(), 2);
        assert!(relaxed.contains(&installed));
    }

    #[test]
    fn test_candidates_keep_installed_from_best_channel_under_strict_priority() {
        let mut pool = Pool::new();
        pool.add_channels(["main", "extra"]);
        pool.add_record(record("foo", "2.0", "0", "main"));
        let installed = pool.add_installed(record("foo", "1.0", "0", "main"));
        assert!(pool.candidates("foo", true).contains(&installed));

        // nothing available at all
        let mut pool = Pool::new();
        pool.add_channels(["main", "extra"]);
        let installed = pool.add_installed(record("foo", "1.0", "0", "extra"));
        assert_eq!(pool.candidates("foo", true), vec![installed]);
    }

    #[test]
    fn test_what_matches() {
        let mut pool = Pool::new();
        pool.add_record(record("foo", "1.5", "0", ""));
        pool.add_record(record("foo", "2.5", "0", ""));
        pool.add_record(record("bar", "1.0", "0", ""));

        let spec = MatchSpec::parse("foo<2.0").unwrap();
        let ids = pool.what_matches(&spec, false);
        assert_eq!(ids.len(), 1);
        assert_eq!(pool.describe(ids[0]), "foo-1.5-0");
    }

    #[test]
    fn test_add_installed_replaces_same_name() {
        let mut pool = Pool::new();
        let first = pool.add_installed(record("foo", "1.0", "0", ""));
        let second = pool.add_installed(record("foo", "2.0", "0", ""));

        assert_eq!(pool.installed_id("foo"), Some(second));
        assert!(!pool.is_installed(first));
        assert_eq!(pool.installed_ids().count(), 1);
    }

    #[test]
    fn test_user_specs() {
        let mut pool = Pool::new();
        pool.add_user_spec(MatchSpec::parse("foo>=1.0").unwrap());
        assert!(pool.is_user_requested("foo"));
        assert!(!pool.is_user_requested("bar"));
        assert_eq!(pool.user_spec("foo").unwrap().to_string(), "foo>=1.0");
    }
}
