use std::collections::{BTreeMap, HashMap};

use super::rule::{Rule, RuleType};

/// Collection of rules organized by type.
///
/// Package rules with identical literals are stored once. Request rules are
/// never merged, so every job keeps its own rules for problem reporting.
#[derive(Debug, Default)]
pub struct RuleSet {
    /// All rules indexed by ID
    rules: Vec<Rule>,

    /// Rule IDs by type, in insertion order
    rules_by_type: BTreeMap<RuleType, Vec<u32>>,

    /// Literal hash -> rule IDs, for deduplication
    rule_hashes: HashMap<u64, Vec<u32>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule to the set, returning its ID.
    /// Returns the existing rule's ID if an identical package rule exists.
    pub fn add(&mut self, mut rule: Rule) -> u32 {
        let hash = rule.literal_hash();
        if !rule.rule_type().is_request_rule() {
            if let Some(existing) = self.rule_hashes.get(&hash).and_then(|ids| {
                ids.iter()
                    .copied()
                    .find(|&id| self.rules[id as usize].equals_literals(&rule))
            }) {
                return existing;
            }
        }

        let id = self.rules.len() as u32;
        rule.set_id(id);

        self.rules_by_type
            .entry(rule.rule_type())
            .or_default()
            .push(id);
        self.rule_hashes.entry(hash).or_default().push(id);
        self.rules.push(rule);

        id
    }

    pub fn get(&self, id: u32) -> Option<&Rule> {
        self.rules.get(id as usize)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Rule> {
        self.rules.get_mut(id as usize)
    }

    /// Get all rules of a specific type, in ID order
    pub fn rules_of_type(&self, rule_type: RuleType) -> impl Iterator<Item = &Rule> {
        self.rules_by_type
            .get(&rule_type)
            .into_iter()
            .flatten()
            .filter_map(move |&id| self.get(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    /// Enabled assertion rules (single literal rules)
    pub fn assertions(&self) -> impl Iterator<Item = &Rule> {
        self.rules
            .iter()
            .filter(|r| !r.is_disabled() && r.is_assertion())
    }

    /// IDs of enabled request rules, in reporting order
    pub fn request_rule_ids(&self) -> Vec<u32> {
        let mut rules: Vec<&Rule> = self
            .rules
            .iter()
            .filter(|r| !r.is_disabled() && r.rule_type().is_request_rule())
            .collect();
        rules.sort_by_key(|r| r.report_key());
        rules.into_iter().map(|r| r.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn count_by_type(&self, rule_type: RuleType) -> usize {
        self.rules_by_type
            .get(&rule_type)
            .map(|v| v.len())
            .unwrap_or(0)
    }

    pub fn disable(&mut self, id: u32) {
        if let Some(rule) = self.get_mut(id) {
            rule.disable();
        }
    }

    pub fn enable(&mut self, id: u32) {
        if let Some(rule) = self.get_mut(id) {
            rule.enable();
        }
    }

    /// Get statistics about the rule set
    pub fn stats(&self) -> RuleSetStats {
        let mut stats = RuleSetStats {
            total: self.rules.len(),
            ..Default::default()
        };

        for rule in &self.rules {
            if rule.rule_type().is_request_rule() {
                stats.request += 1;
            }
            match rule.rule_type() {
                RuleType::PackageRequires => stats.requires += 1,
                RuleType::PackageConflict => stats.conflict += 1,
                RuleType::MultiConflict => stats.multi_conflict += 1,
                _ => {}
            }
            if rule.is_assertion() {
                stats.assertions += 1;
            }
        }

        stats
    }
}

/// Statistics about a rule set
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RuleSetStats {
    pub total: usize,
    pub assertions: usize,
    pub request: usize,
    pub requires: usize,
    pub conflict: usize,
    pub multi_conflict: usize,
}
