use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::decisions::{Decisions, Reason};
use super::policy::Policy;
use super::pool::{Pool, RecordId};
use super::problem::{Problem, ProblemSet};
use super::request::{Job, Request};
use super::rule::{Literal, Rule, RuleType};
use super::rule_generator::{is_transitive, GeneratedRules, JobTargets, RuleGenerator, SearchPlan};
use super::rule_set::RuleSet;
use super::transaction::Transaction;
use super::watch_graph::WatchGraph;
use crate::error::{ExhaustReason, SolveError};

/// Default number of decisions plus conflicts a search may take.
pub const DEFAULT_MAX_STEPS: u64 = 1_000_000;

/// Bounds on one solve.
///
/// Every decision and every conflict costs one step. A search that runs out
/// of steps or time, or sees the cancel flag raised, stops with
/// [`SolveError::Exhausted`].
#[derive(Debug, Clone)]
pub struct SolveBudget {
    pub max_steps: u64,
    pub timeout: Option<Duration>,
    /// Raised from another thread to abandon the search
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for SolveBudget {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            timeout: None,
            cancel: None,
        }
    }
}

impl SolveBudget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Step and time accounting against a budget
struct Clock<'b> {
    budget: &'b SolveBudget,
    started: Instant,
    steps: u64,
}

impl<'b> Clock<'b> {
    fn new(budget: &'b SolveBudget) -> Self {
        Self {
            budget,
            started: Instant::now(),
            steps: 0,
        }
    }

    fn tick(&mut self) -> Result<(), ExhaustReason> {
        self.steps += 1;
        if self.steps > self.budget.max_steps {
            return Err(ExhaustReason::StepLimit);
        }
        if let Some(cancel) = &self.budget.cancel {
            if cancel.load(Ordering::Relaxed) {
                return Err(ExhaustReason::Cancelled);
            }
        }
        if let Some(timeout) = self.budget.timeout {
            if self.started.elapsed() >= timeout {
                return Err(ExhaustReason::Timeout);
            }
        }
        Ok(())
    }
}

/// Result of dependency resolution.
///
/// Holds the complete set of records the environment should contain. Use
/// [`Transaction::from_solution`] to turn it into operations against the
/// installed records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolverResult {
    /// Selected records, ascending by ID
    pub selected: Vec<RecordId>,
    /// Names whose unchanged record must still be reinstalled
    pub reinstall: BTreeSet<String>,
}

impl SolverResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_selected(&self, id: RecordId) -> bool {
        self.selected.contains(&id)
    }
}

/// The package solver.
///
/// Generates rules for a request, then runs a depth-first search over them
/// with unit propagation and chronological backtracking. Identical inputs
/// always produce identical results.
pub struct Solver<'a> {
    pool: &'a Pool,
    policy: Policy,
    budget: SolveBudget,
}

impl<'a> Solver<'a> {
    pub fn new(pool: &'a Pool) -> Self {
        Self {
            pool,
            policy: Policy::new(),
            budget: SolveBudget::default(),
        }
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_budget(mut self, budget: SolveBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Solve the request and build the transaction for it.
    pub fn solve(&self, request: &Request) -> Result<Transaction, SolveError> {
        let result = self.resolve(request)?;
        Ok(Transaction::from_solution(self.pool, &result))
    }

    /// Solve the request, returning the selected records.
    ///
    /// Fails with [`SolveError::Unsatisfiable`] carrying a minimal set of
    /// conflicting rules, or [`SolveError::Exhausted`] once the budget runs out.
    pub fn resolve(&self, request: &Request) -> Result<SolverResult, SolveError> {
        log::debug!(
            "Resolving {} jobs against {} records",
            request.jobs.len(),
            self.pool.len()
        );

        let GeneratedRules { mut rules, plan } =
            RuleGenerator::new(self.pool, request, &self.policy).generate()?;
        let watches = WatchGraph::from_rules(&rules);

        let start = Instant::now();
        let mut clock = Clock::new(&self.budget);
        let (outcome, _) = self.search(&rules, &watches, &plan, &mut clock);

        match outcome {
            SearchOutcome::Solved(selected) => {
                log::info!(
                    "Dependency resolution completed in {:.3} seconds ({} steps)",
                    start.elapsed().as_secs_f64(),
                    clock.steps
                );
                Ok(self.build_result(request, selected))
            }
            SearchOutcome::Exhausted(reason) => {
                log::warn!("Search exhausted after {} steps: {}", clock.steps, reason);
                Err(SolveError::Exhausted {
                    steps: clock.steps,
                    reason,
                })
            }
            SearchOutcome::Unsatisfiable => {
                log::debug!("No solution after {} steps, minimizing", clock.steps);
                let problems = self.explain(request, &mut rules, &watches, &plan, &mut clock)?;
                Err(SolveError::Unsatisfiable(problems))
            }
        }
    }

    fn search(
        &self,
        rules: &RuleSet,
        watches: &WatchGraph,
        plan: &SearchPlan,
        clock: &mut Clock<'_>,
    ) -> (SearchOutcome, BTreeSet<u32>) {
        let mut search = Search::new(self.pool, &self.policy, rules, watches, plan);
        let outcome = search.run(clock);
        (outcome, search.implicated)
    }

    /// Reduce the request rules to a minimal conflicting subset by deletion,
    /// then report them with the package rules that connect them. Runs on
    /// the budget of the failed search and gives up with
    /// [`SolveError::Exhausted`] once that runs out.
    fn explain(
        &self,
        request: &Request,
        rules: &mut RuleSet,
        watches: &WatchGraph,
        plan: &SearchPlan,
        clock: &mut Clock<'_>,
    ) -> Result<ProblemSet, SolveError> {
        for id in rules.request_rule_ids() {
            rules.disable(id);
            match self.search(rules, watches, plan, clock).0 {
                SearchOutcome::Unsatisfiable => {}
                SearchOutcome::Solved(_) => rules.enable(id),
                SearchOutcome::Exhausted(reason) => {
                    rules.enable(id);
                    log::debug!("Stopped minimizing the explanation: {}", reason);
                    break;
                }
            }
        }

        let (outcome, implicated) = self.search(rules, watches, plan, clock);
        if let SearchOutcome::Exhausted(reason) = outcome {
            log::warn!(
                "Explaining the conflict exhausted after {} steps: {}",
                clock.steps,
                reason
            );
            return Err(SolveError::Exhausted {
                steps: clock.steps,
                reason,
            });
        }

        let mut involved: Vec<&Rule> = rules
            .iter()
            .filter(|rule| {
                !rule.is_disabled()
                    && (rule.rule_type().is_request_rule() || implicated.contains(&rule.id()))
            })
            .collect();
        involved.sort_by_key(|rule| rule.report_key());

        let mut problem = Problem::new();
        for rule in involved {
            problem.add_rule(rule, self.pool, request);
        }
        log::debug!("Explanation uses {} rules", problem.rules.len());

        Ok(ProblemSet::new(vec![problem]))
    }

    fn build_result(&self, request: &Request, mut selected: Vec<RecordId>) -> SolverResult {
        self.remove_orphans(request, &mut selected);
        let reinstall = self.reinstall_names(request, &selected);
        SolverResult { selected, reinstall }
    }

    /// Drop records left without dependents once a cleaning job removed or
    /// replaced what needed them. Without `allow_uninstall` only names a
    /// Remove job targets may go.
    fn remove_orphans(&self, request: &Request, selected: &mut Vec<RecordId>) {
        let pool = self.pool;
        let targets = JobTargets::from_request(request);
        let mut eligible: BTreeSet<String> = BTreeSet::new();

        let mut queue = Vec::new();
        for job in &request.jobs {
            if let Job::Remove {
                spec,
                clean_dependencies: true,
            } = job
            {
                if let Some(record) = pool.installed_record(spec.name()) {
                    if spec.matches(record) {
                        queue.push(record.clone());
                    }
                }
            }
        }
        while let Some(record) = queue.pop() {
            for dep in &record.depends {
                if let Some(installed) = pool.installed_record(dep.name()) {
                    if eligible.insert(dep.name().to_string()) {
                        queue.push(installed.clone());
                    }
                }
            }
        }

        if targets.update_all == Some(true) {
            eligible.extend(
                pool.installed_names()
                    .filter(|name| is_transitive(pool, name))
                    .map(String::from),
            );
        }

        eligible.retain(|name| {
            !targets.is_requested(name)
                && !(request.flags.keep_user_specs && pool.is_user_requested(name))
                && (request.flags.allow_uninstall || targets.remove.contains(name.as_str()))
        });
        if eligible.is_empty() {
            return;
        }

        let name_of = |id: RecordId| pool.record(id).map(|r| r.name.as_str()).unwrap_or("");
        loop {
            let orphan = selected.iter().position(|&id| {
                let name = name_of(id);
                eligible.contains(name)
                    && !selected.iter().any(|&other| {
                        pool.record(other)
                            .map_or(false, |r| r.name != name && r.depends_on_name(name))
                    })
            });
            match orphan {
                Some(pos) => {
                    let id = selected.remove(pos);
                    log::debug!("Removing orphaned {}", pool.describe(id));
                }
                None => break,
            }
        }
    }

    /// Install and update targets whose installed record stayed selected
    fn reinstall_names(&self, request: &Request, selected: &[RecordId]) -> BTreeSet<String> {
        if !request.flags.force_reinstall {
            return BTreeSet::new();
        }
        request
            .jobs
            .iter()
            .filter_map(|job| match job {
                Job::Install { spec } | Job::Update { spec } => Some(spec.name()),
                _ => None,
            })
            .filter(|name| {
                self.pool
                    .installed_id(name)
                    .map_or(false, |id| selected.contains(&id))
            })
            .map(String::from)
            .collect()
    }
}

enum SearchOutcome {
    Solved(Vec<RecordId>),
    Unsatisfiable,
    Exhausted(ExhaustReason),
}

/// What a rule says about the current assignment
enum Evaluation {
    Satisfied,
    Open,
    Implies(Vec<Literal>),
    Conflict,
}

/// One run of the search over a fixed rule set
struct Search<'s> {
    pool: &'s Pool,
    policy: &'s Policy,
    rules: &'s RuleSet,
    watches: &'s WatchGraph,
    plan: &'s SearchPlan,
    decisions: Decisions,
    /// Trail position of the next literal to propagate
    propagate_index: usize,
    /// Rules that took part in a conflict, with the rules behind their literals
    implicated: BTreeSet<u32>,
}

impl<'s> Search<'s> {
    fn new(
        pool: &'s Pool,
        policy: &'s Policy,
        rules: &'s RuleSet,
        watches: &'s WatchGraph,
        plan: &'s SearchPlan,
    ) -> Self {
        Self {
            pool,
            policy,
            rules,
            watches,
            plan,
            decisions: Decisions::with_capacity(pool.len()),
            propagate_index: 0,
            implicated: BTreeSet::new(),
        }
    }

    fn run(&mut self, clock: &mut Clock<'_>) -> SearchOutcome {
        // level 1 holds everything that follows without a decision
        self.decisions.increment_level();
        let rules = self.rules;
        for rule in rules.iter().filter(|rule| !rule.is_disabled()) {
            if rule.is_empty() {
                log::debug!("Rule {} can never be satisfied", rule);
                self.note_conflict(rule.id());
                return SearchOutcome::Unsatisfiable;
            }
            if rule.is_assertion() && !self.decisions.decide(rule.literals()[0], Reason::Rule(rule.id())) {
                self.note_conflict(rule.id());
                return SearchOutcome::Unsatisfiable;
            }
        }

        loop {
            if let Some(conflict) = self.propagate() {
                if let Err(reason) = clock.tick() {
                    return SearchOutcome::Exhausted(reason);
                }
                self.note_conflict(conflict);

                let level = self.decisions.level();
                let decision = match self.decisions.level_decision(level) {
                    Some(literal) if level > 1 => literal,
                    _ => return SearchOutcome::Unsatisfiable,
                };
                log::debug!(
                    "Conflict in rule {} at level {}, flipping {}",
                    conflict,
                    level,
                    decision
                );

                self.decisions.revert_to_level(level - 1);
                self.propagate_index = self.decisions.len();
                self.decisions.decide(-decision, Reason::Flipped);
                continue;
            }

            match self.next_decision() {
                Some(literal) => {
                    if let Err(reason) = clock.tick() {
                        return SearchOutcome::Exhausted(reason);
                    }
                    self.decisions.increment_level();
                    self.decisions.decide(literal, Reason::Decision);
                }
                None => return SearchOutcome::Solved(self.decisions.installed_packages().collect()),
            }
        }
    }

    /// Unit propagation. Returns the ID of a violated rule on conflict.
    fn propagate(&mut self) -> Option<u32> {
        let (rules, watches) = (self.rules, self.watches);

        while self.propagate_index < self.decisions.len() {
            let literal = self.decisions.trail()[self.propagate_index].literal;
            self.propagate_index += 1;

            for &rule_id in watches.rules_watching(-literal) {
                let rule = match rules.get(rule_id) {
                    Some(rule) if !rule.is_disabled() => rule,
                    _ => continue,
                };

                match self.evaluate(rule) {
                    Evaluation::Satisfied | Evaluation::Open => {}
                    Evaluation::Conflict => return Some(rule_id),
                    Evaluation::Implies(implied) => {
                        for unit in implied {
                            if !self.decisions.decide(unit, Reason::Rule(rule_id)) {
                                return Some(rule_id);
                            }
                        }
                    }
                }
            }
        }
        None
    }

    fn evaluate(&self, rule: &Rule) -> Evaluation {
        let decisions = &self.decisions;

        if rule.is_multi_conflict() {
            let selected = rule
                .literals()
                .iter()
                .filter(|&&l| decisions.conflict(l))
                .count();
            return match selected {
                0 => Evaluation::Open,
                1 => Evaluation::Implies(
                    rule.literals()
                        .iter()
                        .copied()
                        .filter(|&l| decisions.undecided(l.abs()))
                        .collect(),
                ),
                _ => Evaluation::Conflict,
            };
        }

        let mut open = None;
        let mut open_count = 0;
        for &literal in rule.literals() {
            if decisions.satisfied(literal) {
                return Evaluation::Satisfied;
            }
            if decisions.undecided(literal.abs()) {
                open = Some(literal);
                open_count += 1;
            }
        }
        match (open_count, open) {
            (0, _) => Evaluation::Conflict,
            (1, Some(literal)) => Evaluation::Implies(vec![literal]),
            _ => Evaluation::Open,
        }
    }

    /// Record a conflict and, transitively, the rules that forced its literals
    fn note_conflict(&mut self, rule_id: u32) {
        let mut stack = vec![rule_id];
        while let Some(id) = stack.pop() {
            if !self.implicated.insert(id) {
                continue;
            }
            if let Some(rule) = self.rules.get(id) {
                for &literal in rule.literals() {
                    if let Some(Reason::Rule(reason)) = self.decisions.reason(literal) {
                        stack.push(reason);
                    }
                }
            }
        }
    }

    fn is_satisfied(&self, rule: &Rule) -> bool {
        rule.literals().iter().any(|&l| self.decisions.satisfied(l))
    }

    /// Pick the next literal to decide, or `None` once nothing is left open.
    fn next_decision(&self) -> Option<Literal> {
        let decisions = &self.decisions;
        let first_open = |ids: &[RecordId]| ids.iter().copied().find(|&id| decisions.undecided(id));

        // Job and flag requirements, in request order
        for (rule_id, order) in &self.plan.requirements {
            let rule = match self.rules.get(*rule_id) {
                Some(rule) if !rule.is_disabled() => rule,
                _ => continue,
            };
            if self.is_satisfied(rule) {
                continue;
            }
            if let Some(id) = first_open(order) {
                return Some(id);
            }
        }

        if let Some(id) = first_open(&self.plan.keep) {
            return Some(id);
        }

        for preferences in &self.plan.installed {
            if preferences.iter().any(|&id| decisions.decided_install(id)) {
                continue;
            }
            if let Some(id) = first_open(preferences) {
                return Some(id);
            }
        }

        for rule in self.rules.rules_of_type(RuleType::PackageRequires) {
            if rule.is_disabled() || self.is_satisfied(rule) {
                continue;
            }
            let source = match rule.source_package() {
                Some(source) if decisions.decided_install(source) => source,
                _ => continue,
            };
            let keep_installed = rule
                .target_name()
                .map_or(true, |name| !self.plan.updating.contains(name));
            let targets: Vec<RecordId> = rule
                .literals()
                .iter()
                .copied()
                .filter(|&l| l != -source)
                .collect();
            let order = self.policy.select_preferred(self.pool, &targets, keep_installed);
            if let Some(id) = first_open(&order) {
                return Some(id);
            }
        }

        first_open(&self.plan.variables).map(|id| -id)
    }
}
