use super::pool::RecordId;
use super::rule::Literal;

/// Why a literal was put on the trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// Chosen by the decision heuristic; opens a new level.
    Decision,
    /// Negation of a decision whose branch was refuted.
    Flipped,
    /// Implied by the rule with this ID.
    Rule(u32),
}

/// One assignment on the trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrailEntry {
    pub literal: Literal,
    pub level: u32,
    pub reason: Reason,
}

/// Tracks assignments made during the search.
///
/// The trail is an arena of entries in assignment order, so levels never
/// decrease along it and reverting a level is a truncation.
/// The decision_map stores: 0 = undecided, >0 = selected at level N-1,
/// <0 = not selected at level N-1.
#[derive(Debug, Default)]
pub struct Decisions {
    /// Index is RecordId
    decision_map: Vec<i32>,

    trail: Vec<TrailEntry>,

    level: u32,
}

impl Decisions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tracker able to hold every ID up to `max_id`
    pub fn with_capacity(max_id: usize) -> Self {
        Self {
            decision_map: vec![0; max_id + 1],
            trail: Vec::with_capacity(max_id),
            level: 0,
        }
    }

    #[inline]
    fn ensure_capacity(&mut self, id: usize) {
        if id >= self.decision_map.len() {
            self.decision_map.resize(id + 1, 0);
        }
    }

    #[inline]
    fn value(&self, id: RecordId) -> i32 {
        self.decision_map
            .get(id.unsigned_abs() as usize)
            .copied()
            .unwrap_or(0)
    }

    #[inline]
    pub fn level(&self) -> u32 {
        self.level
    }

    #[inline]
    pub fn increment_level(&mut self) {
        self.level += 1;
    }

    /// Assign a literal at the current level.
    ///
    /// Returns false if this conflicts with an existing assignment.
    pub fn decide(&mut self, literal: Literal, reason: Reason) -> bool {
        let id = literal.unsigned_abs() as usize;
        self.ensure_capacity(id);

        let existing = self.decision_map[id];
        if existing != 0 {
            return (existing > 0) == (literal > 0);
        }

        // level+1 so that level 0 doesn't become 0 (which means undecided)
        let level_value = (self.level + 1) as i32;
        self.decision_map[id] = if literal > 0 { level_value } else { -level_value };
        self.trail.push(TrailEntry {
            literal,
            level: self.level,
            reason,
        });

        true
    }

    /// Check if a literal is satisfied by current decisions
    #[inline]
    pub fn satisfied(&self, literal: Literal) -> bool {
        let value = self.value(literal);
        value != 0 && (value > 0) == (literal > 0)
    }

    /// Check if a literal is falsified by current decisions
    #[inline]
    pub fn conflict(&self, literal: Literal) -> bool {
        let value = self.value(literal);
        value != 0 && (value > 0) != (literal > 0)
    }

    #[inline]
    pub fn decided(&self, id: RecordId) -> bool {
        self.value(id) != 0
    }

    #[inline]
    pub fn undecided(&self, id: RecordId) -> bool {
        !self.decided(id)
    }

    #[inline]
    pub fn decided_install(&self, id: RecordId) -> bool {
        self.value(id) > 0
    }

    #[inline]
    pub fn decided_remove(&self, id: RecordId) -> bool {
        self.value(id) < 0
    }

    pub fn decision_level(&self, literal: Literal) -> Option<u32> {
        match self.value(literal) {
            0 => None,
            value => Some(value.unsigned_abs() - 1),
        }
    }

    /// Why the record behind `literal` was assigned
    pub fn reason(&self, literal: Literal) -> Option<Reason> {
        let id = literal.unsigned_abs();
        if !self.decided(id as RecordId) {
            return None;
        }
        self.trail
            .iter()
            .rev()
            .find(|entry| entry.literal.unsigned_abs() == id)
            .map(|entry| entry.reason)
    }

    /// The heuristic decision that opened `level`
    pub fn level_decision(&self, level: u32) -> Option<Literal> {
        self.trail
            .iter()
            .rev()
            .take_while(|entry| entry.level >= level)
            .find(|entry| entry.level == level && entry.reason == Reason::Decision)
            .map(|entry| entry.literal)
    }

    /// Revert all assignments at levels > target_level
    pub fn revert_to_level(&mut self, target_level: u32) {
        while let Some(entry) = self.trail.last() {
            if entry.level <= target_level {
                break;
            }
            self.decision_map[entry.literal.unsigned_abs() as usize] = 0;
            self.trail.pop();
        }
        self.level = target_level;
    }

    /// All records currently selected, ascending
    pub fn installed_packages(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.decision_map
            .iter()
            .enumerate()
            .filter(|(_, &d)| d > 0)
            .map(|(id, _)| id as RecordId)
    }

    pub fn trail(&self) -> &[TrailEntry] {
        &self.trail
    }

    pub fn len(&self) -> usize {
        self.trail.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trail.is_empty()
    }

    pub fn reset(&mut self) {
        self.decision_map.fill(0);
        self.trail.clear();
        self.level = 0;
    }
}
