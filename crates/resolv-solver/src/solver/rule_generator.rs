use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::time::Instant;

use resolv_spec::MatchSpec;

use super::policy::Policy;
use super::pool::{Pool, RecordId};
use super::request::{Job, Request};
use super::rule::{Rule, RuleType};
use super::rule_set::RuleSet;
use crate::error::SolveError;

/// Package names grouped by the jobs that target them.
#[derive(Debug, Default)]
pub(crate) struct JobTargets<'r> {
    pub install: BTreeSet<&'r str>,
    pub update: BTreeSet<&'r str>,
    pub remove: BTreeSet<&'r str>,
    pub keep: BTreeSet<&'r str>,
    pub freeze: BTreeSet<&'r str>,
    pub pins: BTreeMap<&'r str, Vec<&'r MatchSpec>>,
    /// `Some(clean_dependencies)` when the request updates everything
    pub update_all: Option<bool>,
}

impl<'r> JobTargets<'r> {
    pub fn from_request(request: &'r Request) -> Self {
        let mut targets = Self::default();
        for job in &request.jobs {
            match job {
                Job::Install { spec } => {
                    targets.install.insert(spec.name());
                }
                Job::Update { spec } => {
                    targets.update.insert(spec.name());
                }
                Job::Remove { spec, .. } => {
                    targets.remove.insert(spec.name());
                }
                Job::Keep { spec } => {
                    targets.keep.insert(spec.name());
                }
                Job::Freeze { spec } => {
                    targets.freeze.insert(spec.name());
                }
                Job::Pin { spec } => {
                    targets.pins.entry(spec.name()).or_default().push(spec);
                }
                Job::UpdateAll { clean_dependencies } => {
                    let clean = targets.update_all.unwrap_or(false) || *clean_dependencies;
                    targets.update_all = Some(clean);
                }
            }
        }
        targets
    }

    /// Names that `UpdateAll` leaves alone
    pub fn is_held(&self, name: &str) -> bool {
        self.keep.contains(name) || self.freeze.contains(name) || self.pins.contains_key(name)
    }

    /// Whether the installed record of `name` should move to the newest candidate
    pub fn is_updating(&self, name: &str) -> bool {
        self.update.contains(name) || (self.update_all.is_some() && !self.is_held(name))
    }

    /// Names an explicit job asks to have present
    pub fn is_requested(&self, name: &str) -> bool {
        self.install.contains(name)
            || self.update.contains(name)
            || self.is_held(name)
    }
}

/// Decision order the search follows. Built alongside the rules.
#[derive(Debug, Default)]
pub struct SearchPlan {
    /// Requirement rules with their candidates in preference order
    pub requirements: Vec<(u32, Vec<RecordId>)>,
    /// Installed records held by Keep jobs
    pub keep: Vec<RecordId>,
    /// Records to try for each installed name, in name order
    pub installed: Vec<Vec<RecordId>>,
    /// Installed names allowed to move to their newest candidate
    pub updating: BTreeSet<String>,
    /// Every record that takes part in the solve, ascending
    pub variables: Vec<RecordId>,
}

/// Rules plus the plan to search them.
#[derive(Debug)]
pub struct GeneratedRules {
    pub rules: RuleSet,
    pub plan: SearchPlan,
}

/// Generates SAT rules from a request and the package universe.
///
/// - Package requirements: if A is selected, then B|C|D must be selected
/// - Conflicts: A and B cannot both be selected
/// - Same-name: at most one record per name
/// - Job rules: one rule family per job kind
/// - Flag rules: no-downgrade, no-uninstall and user-spec constraints
pub struct RuleGenerator<'a> {
    pool: &'a Pool,
    request: &'a Request,
    policy: &'a Policy,
    targets: JobTargets<'a>,
    strict: bool,
    rules: RuleSet,
    plan: SearchPlan,
    /// Records whose package rules were generated
    added_packages: BTreeSet<RecordId>,
    queue: VecDeque<RecordId>,
}

impl<'a> RuleGenerator<'a> {
    pub fn new(pool: &'a Pool, request: &'a Request, policy: &'a Policy) -> Self {
        Self {
            pool,
            request,
            policy,
            targets: JobTargets::from_request(request),
            strict: request.flags.strict_repo_priority,
            rules: RuleSet::new(),
            plan: SearchPlan::default(),
            added_packages: BTreeSet::new(),
            queue: VecDeque::new(),
        }
    }

    /// Generate all rules for the request
    pub fn generate(mut self) -> Result<GeneratedRules, SolveError> {
        let start = Instant::now();

        self.validate()?;

        self.seed_packages();
        self.add_package_rules();
        log::debug!(
            "After package rules: {} rules, {} records",
            self.rules.len(),
            self.added_packages.len()
        );

        self.add_same_name_rules();
        self.add_conflict_rules();
        self.add_job_rules();
        self.add_installed_rules();

        let mut variables: BTreeSet<RecordId> = self.added_packages.clone();
        for rule in self.rules.iter() {
            variables.extend(rule.literals().iter().map(|l| l.abs()));
        }
        self.plan.variables = variables.into_iter().collect();

        log::info!(
            "Generated {} rules over {} records in {:?}",
            self.rules.len(),
            self.plan.variables.len(),
            start.elapsed()
        );
        log::debug!("Rules by type: {:?}", self.rules.stats());

        Ok(GeneratedRules {
            rules: self.rules,
            plan: self.plan,
        })
    }

    /// Pins and freezes must name something the pool knows about
    fn validate(&self) -> Result<(), SolveError> {
        for job in &self.request.jobs {
            if let Job::Pin { spec } | Job::Freeze { spec } = job {
                if !self.pool.contains_name(spec.name()) {
                    return Err(SolveError::InvalidRequest {
                        job: job.to_string(),
                        reason: format!("no package named '{}' is installed or available", spec.name()),
                    });
                }
            }
        }
        Ok(())
    }

    fn enqueue(&mut self, id: RecordId) {
        if self.added_packages.insert(id) {
            self.queue.push_back(id);
        }
    }

    fn seed_packages(&mut self) {
        let (pool, request) = (self.pool, self.request);
        let mut names: BTreeSet<&str> = pool.installed_names().collect();
        names.extend(request.jobs.iter().filter_map(|job| job.name()));

        for name in names {
            for id in pool.candidates(name, self.strict) {
                self.enqueue(id);
            }
        }

        // frozen records stay whatever channel they came from
        let frozen: Vec<RecordId> = self
            .targets
            .freeze
            .iter()
            .filter_map(|name| pool.installed_id(name))
            .collect();
        for id in frozen {
            self.enqueue(id);
        }
    }

    /// Walk the dependency closure, adding one requires rule per dependency
    fn add_package_rules(&mut self) {
        while let Some(id) = self.queue.pop_front() {
            let record = match self.pool.record(id) {
                Some(record) => record.clone(),
                None => continue,
            };

            for dep in &record.depends {
                let targets = self.pool.what_matches(dep, self.strict);
                if targets.is_empty() {
                    log::debug!("Nothing provides {} needed by {}", dep, record.pretty_string());
                }
                for &target in &targets {
                    self.enqueue(target);
                }
                let rule = Rule::requires(id, targets)
                    .with_target(dep.name())
                    .with_constraint(dep.to_string());
                self.rules.add(rule);
            }
        }
    }

    fn add_same_name_rules(&mut self) {
        let mut by_name: BTreeMap<&str, Vec<RecordId>> = BTreeMap::new();
        for &id in &self.added_packages {
            if let Some(record) = self.pool.record(id) {
                by_name.entry(record.name.as_str()).or_default().push(id);
            }
        }

        for (name, ids) in by_name {
            if ids.len() > 1 {
                self.rules.add(Rule::multi_conflict(ids).with_target(name));
            }
        }
    }

    fn add_conflict_rules(&mut self) {
        let ids: Vec<RecordId> = self.added_packages.iter().copied().collect();
        for id in ids {
            let record = match self.pool.record(id) {
                Some(record) => record.clone(),
                None => continue,
            };

            for spec in &record.conflicts {
                for other in self.pool.what_matches(spec, false) {
                    if other == id || !self.added_packages.contains(&other) {
                        continue;
                    }
                    let rule = Rule::conflict(id, other)
                        .with_target(spec.name())
                        .with_constraint(spec.to_string());
                    self.rules.add(rule);
                }
            }
        }
    }

    fn add_job_rules(&mut self) {
        let (pool, policy, strict) = (self.pool, self.policy, self.strict);
        let request = self.request;

        for (index, job) in request.jobs.iter().enumerate() {
            match job {
                Job::Install { spec } | Job::Update { spec } => {
                    let (rule_type, keep_installed) = match job {
                        Job::Install { .. } => (RuleType::JobInstall, true),
                        _ => (RuleType::JobUpdate, false),
                    };
                    let matches = pool.what_matches(spec, strict);
                    let order = policy.select_preferred(pool, &matches, keep_installed);
                    let rule = Rule::new(matches, rule_type)
                        .with_job(index)
                        .with_target(spec.name())
                        .with_constraint(spec.to_string());
                    let id = self.rules.add(rule);
                    self.plan.requirements.push((id, order));
                }
                Job::Remove { spec, .. } => {
                    let matches = pool.what_matches(spec, false);
                    if !matches.iter().any(|&id| pool.is_installed(id)) {
                        log::warn!("Nothing installed matches {}, nothing to remove", spec);
                    }
                    for id in matches {
                        let rule = Rule::assertion(-id, RuleType::JobRemove)
                            .with_job(index)
                            .with_source(id)
                            .with_constraint(spec.to_string());
                        self.rules.add(rule);
                    }
                }
                Job::Keep { spec } => match pool.installed_id(spec.name()) {
                    Some(id) if pool.record(id).map_or(false, |r| spec.matches(r)) => {
                        if self.added_packages.contains(&id) {
                            self.plan.keep.push(id);
                        } else {
                            log::debug!("{} is outranked by a preferred channel, not kept", spec);
                        }
                    }
                    _ => log::warn!("Nothing installed matches {}, nothing to keep", spec),
                },
                Job::Freeze { spec } => match pool.installed_id(spec.name()) {
                    Some(id) => {
                        let literals = match pool.record(id) {
                            Some(record) if spec.matches(record) => vec![id],
                            _ => Vec::new(),
                        };
                        let rule = Rule::new(literals, RuleType::JobFreeze)
                            .with_job(index)
                            .with_source(id)
                            .with_target(spec.name())
                            .with_constraint(spec.to_string());
                        self.rules.add(rule);
                    }
                    None => {
                        // not installed, so frozen absent
                        for id in pool.candidates(spec.name(), false) {
                            let rule = Rule::assertion(-id, RuleType::JobFreeze)
                                .with_job(index)
                                .with_source(id)
                                .with_target(spec.name())
                                .with_constraint(spec.to_string());
                            self.rules.add(rule);
                        }
                    }
                },
                Job::Pin { spec } => {
                    for id in pool.candidates(spec.name(), strict) {
                        if pool.record(id).map_or(false, |r| spec.matches(r)) {
                            continue;
                        }
                        let rule = Rule::assertion(-id, RuleType::JobPin)
                            .with_job(index)
                            .with_source(id)
                            .with_target(spec.name())
                            .with_constraint(spec.to_string());
                        self.rules.add(rule);
                    }
                }
                Job::UpdateAll { .. } => {}
            }
        }
    }

    /// Flag rules and preferences for every installed name
    fn add_installed_rules(&mut self) {
        let (pool, policy, strict) = (self.pool, self.policy, self.strict);
        let flags = self.request.flags;

        for installed_id in pool.installed_ids() {
            let installed = match pool.record(installed_id) {
                Some(record) => record.clone(),
                None => continue,
            };
            let name = installed.name.as_str();
            let candidates = pool.candidates(name, strict);
            let removed = self.targets.remove.contains(name);
            let updating = self.targets.is_updating(name);

            if !flags.allow_downgrade && !self.targets.install.contains(name) {
                for &id in &candidates {
                    let older = pool
                        .record(id)
                        .map_or(false, |r| r.version < installed.version);
                    if older {
                        let rule = Rule::assertion(-id, RuleType::NoDowngrade)
                            .with_source(id)
                            .with_target(name);
                        self.rules.add(rule);
                    }
                }
            }

            if flags.keep_user_specs && !removed && !self.targets.is_requested(name) {
                if let Some(user_spec) = pool.user_spec(name) {
                    let matches = pool.what_matches(user_spec, strict);
                    let order = policy.select_preferred(pool, &matches, !updating);
                    let rule = Rule::new(matches, RuleType::UserSpec)
                        .with_source(installed_id)
                        .with_target(name)
                        .with_constraint(user_spec.to_string());
                    let id = self.rules.add(rule);
                    self.plan.requirements.push((id, order));
                }
            }

            if !flags.allow_uninstall && !removed {
                let order = policy.select_preferred(pool, &candidates, !updating);
                let rule = Rule::new(candidates.clone(), RuleType::NoUninstall)
                    .with_source(installed_id)
                    .with_target(name);
                let id = self.rules.add(rule);
                self.plan.requirements.push((id, order));
            }

            if removed {
                continue;
            }
            if updating {
                self.plan.updating.insert(name.to_string());
            }

            let preferences = if updating {
                if self.targets.update_all.is_some()
                    && !flags.keep_dependencies
                    && is_transitive(pool, name)
                {
                    Vec::new()
                } else {
                    policy.select_preferred(pool, &candidates, false)
                }
            } else {
                // installed first, then the rest in case it has to go
                policy.select_preferred(pool, &candidates, true)
            };
            self.plan.installed.push(preferences);
        }
    }
}

/// Installed only because another installed record depends on it
pub(crate) fn is_transitive(pool: &Pool, name: &str) -> bool {
    !pool.is_user_requested(name)
        && pool.installed_ids().any(|id| {
            pool.record(id)
                .map_or(false, |r| r.name != name && r.depends_on_name(name))
        })
}
