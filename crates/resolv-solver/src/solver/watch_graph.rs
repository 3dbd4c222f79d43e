use super::rule::Literal;
use super::rule_set::RuleSet;

/// Occurrence index used for unit propagation.
///
/// Every literal of every rule is watched. When a literal becomes false the
/// propagator re-evaluates exactly the rules containing it. Disabled rules
/// stay indexed and are skipped at evaluation time, so the graph survives
/// rules being toggled between searches.
#[derive(Debug, Default)]
pub struct WatchGraph {
    /// Maps literal index -> rule IDs containing that literal
    watches: Vec<Vec<u32>>,
}

impl WatchGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert literal to index (handles positive and negative literals)
    fn literal_to_index(literal: Literal) -> usize {
        let abs = literal.unsigned_abs() as usize;
        if literal > 0 {
            abs * 2
        } else {
            abs * 2 + 1
        }
    }

    /// Build the watch graph from a rule set
    pub fn from_rules(rules: &RuleSet) -> Self {
        let mut graph = Self::new();
        for rule in rules.iter() {
            for &literal in rule.literals() {
                graph.watch(literal, rule.id());
            }
        }
        graph
    }

    fn watch(&mut self, literal: Literal, rule_id: u32) {
        let idx = Self::literal_to_index(literal);
        if idx >= self.watches.len() {
            self.watches.resize(idx + 1, Vec::new());
        }
        let list = &mut self.watches[idx];
        if list.last() != Some(&rule_id) {
            list.push(rule_id);
        }
    }

    /// Rules that must be re-checked once `literal` is false
    pub fn rules_watching(&self, literal: Literal) -> &[u32] {
        self.watches
            .get(Self::literal_to_index(literal))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}
