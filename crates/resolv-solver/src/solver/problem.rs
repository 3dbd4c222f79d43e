use std::fmt;

use super::pool::{Pool, RecordId};
use super::request::Request;
use super::rule::{Rule, RuleType};

/// A problem encountered during resolution.
///
/// Lists the rules that together admit no solution, request rules first in
/// job order, then the package rules that connect them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    pub rules: Vec<ProblemRule>,
}

/// A rule that contributes to a problem, resolved to text at creation time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemRule {
    pub rule_id: u32,
    pub rule_type: RuleType,
    /// Position of the job the rule came from
    pub job: Option<usize>,
    pub source: Option<RecordId>,
    pub target: Option<String>,
    pub constraint: Option<String>,
    pub description: String,
}

impl Problem {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Add a rule, describing it against the pool and request
    pub fn add_rule(&mut self, rule: &Rule, pool: &Pool, request: &Request) {
        self.rules.push(ProblemRule {
            rule_id: rule.id(),
            rule_type: rule.rule_type(),
            job: rule.job(),
            source: rule.source_package(),
            target: rule.target_name().map(String::from),
            constraint: rule.constraint().map(String::from),
            description: describe_rule(rule, pool, request),
        });
    }

    /// Positions of the jobs involved, ascending
    pub fn jobs(&self) -> Vec<usize> {
        let mut jobs: Vec<usize> = self.rules.iter().filter_map(|r| r.job).collect();
        jobs.sort_unstable();
        jobs.dedup();
        jobs
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for Problem {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, rule) in self.rules.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  - {}", rule.description)?;
        }
        Ok(())
    }
}

/// All problems found for one request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProblemSet {
    pub problems: Vec<Problem>,
}

impl ProblemSet {
    pub fn new(problems: Vec<Problem>) -> Self {
        Self { problems }
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Problem> {
        self.problems.iter()
    }
}

impl fmt::Display for ProblemSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, problem) in self.problems.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "Problem {}", i + 1)?;
            write!(f, "{}", problem)?;
        }
        Ok(())
    }
}

fn record_name(pool: &Pool, id: Option<RecordId>) -> String {
    id.map(|id| pool.describe(id))
        .unwrap_or_else(|| "unknown".to_string())
}

fn job_text(rule: &Rule, request: &Request) -> String {
    rule.job()
        .and_then(|index| request.jobs.get(index))
        .map(|job| job.to_string())
        .unwrap_or_else(|| rule.rule_type().as_str().to_string())
}

fn alternatives(rule: &Rule, pool: &Pool) -> String {
    rule.literals()
        .iter()
        .filter(|&&l| l > 0)
        .map(|&l| pool.describe(l))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Describe a rule in human-readable form
fn describe_rule(rule: &Rule, pool: &Pool, request: &Request) -> String {
    let target = rule.target_name().unwrap_or("unknown");
    let constraint = rule.constraint().unwrap_or("*");
    let source = record_name(pool, rule.source_package());

    match rule.rule_type() {
        RuleType::JobInstall | RuleType::JobUpdate => {
            if rule.is_empty() {
                if pool.contains_name(target) {
                    format!(
                        "{} asks for {}, but no available version matches",
                        job_text(rule, request),
                        constraint
                    )
                } else {
                    format!(
                        "{} asks for {}, but no package named {} exists",
                        job_text(rule, request),
                        constraint,
                        target
                    )
                }
            } else {
                format!(
                    "{} needs one of {}",
                    job_text(rule, request),
                    alternatives(rule, pool)
                )
            }
        }
        RuleType::JobRemove => format!("{} forbids {}", job_text(rule, request), source),
        RuleType::JobFreeze => {
            if rule.is_empty() {
                format!(
                    "{} cannot hold installed {}, which does not match",
                    job_text(rule, request),
                    source
                )
            } else if rule.literals()[0] > 0 {
                format!("{} holds {} in place", job_text(rule, request), source)
            } else {
                format!("{} keeps {} out", job_text(rule, request), source)
            }
        }
        RuleType::JobPin => format!("{} excludes {}", job_text(rule, request), source),
        RuleType::UserSpec => {
            if rule.is_empty() {
                format!(
                    "{} was requested as {}, which no available version matches",
                    target, constraint
                )
            } else {
                format!("{} was requested as {} and must stay so", target, constraint)
            }
        }
        RuleType::NoDowngrade => {
            let installed = pool
                .installed_id(target)
                .map(|id| pool.describe(id))
                .unwrap_or_else(|| target.to_string());
            format!(
                "{} would downgrade installed {}, and downgrades are not allowed",
                source, installed
            )
        }
        RuleType::NoUninstall => format!(
            "{} is installed and uninstalling is not allowed",
            source
        ),
        RuleType::PackageRequires => {
            if rule.len() <= 1 {
                format!("{} requires {}, but nothing provides it", source, constraint)
            } else {
                format!(
                    "{} requires {} -> satisfiable by {}",
                    source,
                    constraint,
                    alternatives(rule, pool)
                )
            }
        }
        RuleType::PackageConflict => {
            let other = rule
                .literals()
                .iter()
                .map(|l| l.abs())
                .find(|&id| Some(id) != rule.source_package());
            format!(
                "{} conflicts with {}",
                source,
                record_name(pool, other)
            )
        }
        RuleType::MultiConflict => {
            let versions = rule
                .literals()
                .iter()
                .map(|l| pool.describe(l.abs()))
                .collect::<Vec<_>>()
                .join(", ");
            format!("only one of {} can be installed", versions)
        }
    }
}
