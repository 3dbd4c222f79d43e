use std::fmt;
use std::hash::{Hash, Hasher};

use super::pool::RecordId;

/// A literal in SAT terms - positive means "select", negative means "don't select"
pub type Literal = i32;

/// Types of rules generated during resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RuleType {
    /// Install job: one of the matching records must be selected
    JobInstall,
    /// Update job: one of the matching records must be selected
    JobUpdate,
    /// Remove job: a matching record must not be selected
    JobRemove,
    /// Freeze job: the installed record must stay selected
    JobFreeze,
    /// Pin job: a record outside the pin must not be selected
    JobPin,
    /// A spec the user requested earlier must stay satisfied
    UserSpec,
    /// A record older than the installed one must not be selected
    NoDowngrade,
    /// Some record of an installed name must stay selected
    NoUninstall,
    /// Package dependency: if A is selected, then B|C|D must be selected
    PackageRequires,
    /// Package conflict: A and B cannot both be selected
    PackageConflict,
    /// Records of one name: at most one can be selected
    MultiConflict,
}

impl RuleType {
    /// Get the priority of this rule type (lower = reported first)
    pub fn priority(&self) -> u8 {
        if self.is_request_rule() {
            0
        } else {
            1
        }
    }

    /// Rules derived from the request and flags rather than from package metadata
    pub fn is_request_rule(&self) -> bool {
        !matches!(
            self,
            RuleType::PackageRequires | RuleType::PackageConflict | RuleType::MultiConflict
        )
    }

    /// Check if this is a multi-conflict rule type
    pub fn is_multi_conflict(&self) -> bool {
        matches!(self, RuleType::MultiConflict)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::JobInstall => "job-install",
            RuleType::JobUpdate => "job-update",
            RuleType::JobRemove => "job-remove",
            RuleType::JobFreeze => "job-freeze",
            RuleType::JobPin => "job-pin",
            RuleType::UserSpec => "user-spec",
            RuleType::NoDowngrade => "no-downgrade",
            RuleType::NoUninstall => "no-uninstall",
            RuleType::PackageRequires => "requires",
            RuleType::PackageConflict => "conflict",
            RuleType::MultiConflict => "multi-conflict",
        }
    }
}

/// A SAT rule (clause) representing a constraint.
///
/// Rules are disjunctions (OR) of literals. A rule is satisfied when
/// at least one of its literals is true. Multi-conflict rules are the
/// exception: they hold while at most one of their records is selected.
///
/// # Examples
///
/// - `[A]` - A must be selected (assertion)
/// - `[-A]` - A must not be selected
/// - `[-A, B, C]` - if A is selected, then B or C must be selected
/// - `[-A, -B]` - A and B cannot both be selected (conflict)
/// - `[]` - cannot be satisfied
#[derive(Clone)]
pub struct Rule {
    literals: Vec<Literal>,
    rule_type: RuleType,
    /// Assigned by RuleSet
    id: u32,
    /// Position of the job this rule was generated for
    job: Option<usize>,
    /// Record the rule is about (for error messages)
    source_package: Option<RecordId>,
    /// Target package name (for error messages)
    target_name: Option<String>,
    /// Spec text (for error messages)
    constraint: Option<String>,
    disabled: bool,
}

impl Rule {
    pub fn new(literals: Vec<Literal>, rule_type: RuleType) -> Self {
        Self {
            literals,
            rule_type,
            id: 0,
            job: None,
            source_package: None,
            target_name: None,
            constraint: None,
            disabled: false,
        }
    }

    /// Create an assertion rule (single literal that must be true)
    pub fn assertion(literal: Literal, rule_type: RuleType) -> Self {
        Self::new(vec![literal], rule_type)
    }

    /// Create a requirement rule: if source is selected, one of targets must be
    pub fn requires(source: RecordId, targets: Vec<RecordId>) -> Self {
        let mut literals = vec![-source];
        literals.extend(targets);
        Self::new(literals, RuleType::PackageRequires).with_source(source)
    }

    /// Create a conflict rule: source and target cannot both be selected
    pub fn conflict(source: RecordId, target: RecordId) -> Self {
        Self::new(vec![-source, -target], RuleType::PackageConflict).with_source(source)
    }

    /// Create a multi-conflict rule: at most one of these records can be selected
    pub fn multi_conflict(packages: Vec<RecordId>) -> Self {
        let literals: Vec<_> = packages.into_iter().map(|p| -p).collect();
        Self::new(literals, RuleType::MultiConflict)
    }

    pub fn set_id(&mut self, id: u32) {
        self.id = id;
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn with_job(mut self, job: usize) -> Self {
        self.job = Some(job);
        self
    }

    pub fn with_source(mut self, package: RecordId) -> Self {
        self.source_package = Some(package);
        self
    }

    pub fn with_target(mut self, name: impl Into<String>) -> Self {
        self.target_name = Some(name.into());
        self
    }

    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraint = Some(constraint.into());
        self
    }

    pub fn rule_type(&self) -> RuleType {
        self.rule_type
    }

    pub fn literals(&self) -> &[Literal] {
        &self.literals
    }

    pub fn job(&self) -> Option<usize> {
        self.job
    }

    pub fn source_package(&self) -> Option<RecordId> {
        self.source_package
    }

    pub fn target_name(&self) -> Option<&str> {
        self.target_name.as_deref()
    }

    pub fn constraint(&self) -> Option<&str> {
        self.constraint.as_deref()
    }

    pub fn is_multi_conflict(&self) -> bool {
        self.rule_type.is_multi_conflict()
    }

    /// Check if this is an assertion (single literal)
    pub fn is_assertion(&self) -> bool {
        self.literals.len() == 1 && !self.is_multi_conflict()
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn disable(&mut self) {
        self.disabled = true;
    }

    pub fn enable(&mut self) {
        self.disabled = false;
    }

    pub fn len(&self) -> usize {
        self.literals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    /// Key used to order rules in explanations
    pub fn report_key(&self) -> (u8, usize, u32) {
        (
            self.rule_type.priority(),
            self.job.unwrap_or(usize::MAX),
            self.id,
        )
    }

    /// Get a hash of this rule's literals for deduplication
    pub fn literal_hash(&self) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        let mut hasher = DefaultHasher::new();

        let mut sorted = self.literals.clone();
        sorted.sort_unstable();
        sorted.hash(&mut hasher);
        self.rule_type.hash(&mut hasher);

        hasher.finish()
    }

    /// Check if two rules have the same type and literals (regardless of order)
    pub fn equals_literals(&self, other: &Rule) -> bool {
        if self.rule_type != other.rule_type || self.literals.len() != other.literals.len() {
            return false;
        }

        let mut a = self.literals.clone();
        let mut b = other.literals.clone();
        a.sort_unstable();
        b.sort_unstable();
        a == b
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rule({:?}, {:?})", self.rule_type, self.literals)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let literals: Vec<String> = self
            .literals
            .iter()
            .map(|&l| if l > 0 { format!("+{}", l) } else { l.to_string() })
            .collect();

        write!(f, "({}) [{}]", self.rule_type.as_str(), literals.join(" | "))
    }
}
