use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use resolv_spec::PackageRecord;

use super::pool::Pool;
use super::solver::SolverResult;

/// Kind of change applied to one package name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Install,
    Remove,
    Upgrade,
    Downgrade,
    Reinstall,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Install => "install",
            OperationKind::Remove => "remove",
            OperationKind::Upgrade => "upgrade",
            OperationKind::Downgrade => "downgrade",
            OperationKind::Reinstall => "reinstall",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single operation in a transaction.
///
/// `record` is what ends up installed, or what is taken away for a removal.
/// `previous` is the installed record being replaced, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub kind: OperationKind,
    pub record: Arc<PackageRecord>,
    pub previous: Option<Arc<PackageRecord>>,
}

impl Operation {
    pub fn install(record: Arc<PackageRecord>) -> Self {
        Self {
            kind: OperationKind::Install,
            record,
            previous: None,
        }
    }

    pub fn remove(record: Arc<PackageRecord>) -> Self {
        Self {
            kind: OperationKind::Remove,
            record,
            previous: None,
        }
    }

    /// Replace `previous` with `record`, classified by version then build number
    pub fn change(previous: Arc<PackageRecord>, record: Arc<PackageRecord>) -> Self {
        let kind = match record
            .version
            .cmp(&previous.version)
            .then_with(|| record.build_number.cmp(&previous.build_number))
        {
            Ordering::Greater => OperationKind::Upgrade,
            Ordering::Less => OperationKind::Downgrade,
            Ordering::Equal => OperationKind::Reinstall,
        };
        Self {
            kind,
            record,
            previous: Some(previous),
        }
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.previous {
            Some(previous) if !previous.same_artifact(&self.record) => write!(
                f,
                "{} {} -> {}",
                self.kind,
                previous.pretty_string(),
                self.record.pretty_string()
            ),
            _ => write!(f, "{} {}", self.kind, self.record.pretty_string()),
        }
    }
}

/// Ordered operations turning the installed environment into the solved one.
///
/// Removals come first, dependents before their dependencies. The remaining
/// operations follow, dependencies before their dependents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    operations: Vec<Operation>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare a solver result with the pool's installed records
    pub fn from_solution(pool: &Pool, result: &SolverResult) -> Self {
        let installed: Vec<Arc<PackageRecord>> = pool
            .installed_ids()
            .filter_map(|id| pool.record(id).cloned())
            .collect();
        let selected: Vec<Arc<PackageRecord>> = result
            .selected
            .iter()
            .filter_map(|&id| pool.record(id).cloned())
            .collect();
        Self::from_packages(&installed, &selected, &result.reinstall)
    }

    /// Diff two complete package sets.
    ///
    /// Names in `reinstall` produce a `Reinstall` even when their record is
    /// unchanged; otherwise unchanged records produce nothing.
    pub fn from_packages(
        installed: &[Arc<PackageRecord>],
        result: &[Arc<PackageRecord>],
        reinstall: &BTreeSet<String>,
    ) -> Self {
        let present: BTreeMap<&str, &Arc<PackageRecord>> =
            installed.iter().map(|r| (r.name.as_str(), r)).collect();
        let target: BTreeMap<&str, &Arc<PackageRecord>> =
            result.iter().map(|r| (r.name.as_str(), r)).collect();

        let mut removals = Vec::new();
        let mut changes = Vec::new();

        for (name, record) in &present {
            if !target.contains_key(name) {
                removals.push(Operation::remove(Arc::clone(record)));
            }
        }

        for (name, record) in &target {
            match present.get(name) {
                None => changes.push(Operation::install(Arc::clone(record))),
                Some(previous) if previous.same_artifact(record) => {
                    if reinstall.contains(*name) {
                        changes.push(Operation {
                            kind: OperationKind::Reinstall,
                            record: Arc::clone(record),
                            previous: Some(Arc::clone(previous)),
                        });
                    }
                }
                Some(previous) => {
                    changes.push(Operation::change(Arc::clone(previous), Arc::clone(record)))
                }
            }
        }

        let mut removals = topological_sort_operations(removals);
        removals.reverse();

        let mut operations = removals;
        operations.extend(topological_sort_operations(changes));
        Self { operations }
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.operations.iter()
    }

    pub fn into_operations(self) -> Vec<Operation> {
        self.operations
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Records that end up installed, in operation order
    pub fn installs(&self) -> impl Iterator<Item = &Arc<PackageRecord>> {
        self.operations
            .iter()
            .filter(|op| op.kind != OperationKind::Remove)
            .map(|op| &op.record)
    }

    /// Records removed without replacement
    pub fn removals(&self) -> impl Iterator<Item = &Arc<PackageRecord>> {
        self.operations
            .iter()
            .filter(|op| op.kind == OperationKind::Remove)
            .map(|op| &op.record)
    }

    pub fn find(&self, name: &str) -> Option<&Operation> {
        self.operations.iter().find(|op| op.name() == name)
    }

    pub fn summary(&self) -> TransactionSummary {
        let mut summary = TransactionSummary::default();
        for op in &self.operations {
            match op.kind {
                OperationKind::Install => summary.installs += 1,
                OperationKind::Remove => summary.removals += 1,
                OperationKind::Upgrade => summary.upgrades += 1,
                OperationKind::Downgrade => summary.downgrades += 1,
                OperationKind::Reinstall => summary.reinstalls += 1,
            }
        }
        summary
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, op) in self.operations.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", op)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Transaction {
    type Item = &'a Operation;
    type IntoIter = std::slice::Iter<'a, Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.operations.iter()
    }
}

/// Summary of a transaction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionSummary {
    pub installs: usize,
    pub removals: usize,
    pub upgrades: usize,
    pub downgrades: usize,
    pub reinstalls: usize,
}

impl fmt::Display for TransactionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();

        if self.installs > 0 {
            parts.push(format!("{} install(s)", self.installs));
        }
        if self.upgrades > 0 {
            parts.push(format!("{} upgrade(s)", self.upgrades));
        }
        if self.downgrades > 0 {
            parts.push(format!("{} downgrade(s)", self.downgrades));
        }
        if self.reinstalls > 0 {
            parts.push(format!("{} reinstall(s)", self.reinstalls));
        }
        if self.removals > 0 {
            parts.push(format!("{} removal(s)", self.removals));
        }

        if parts.is_empty() {
            write!(f, "Nothing to do")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

/// Sort operations so that dependencies come before their dependents.
///
/// Edges only exist between operations in the list. Ties go to the name that
/// sorts first; members of a cycle are appended in name order.
fn topological_sort_operations(mut operations: Vec<Operation>) -> Vec<Operation> {
    if operations.len() < 2 {
        return operations;
    }
    operations.sort_by(|a, b| a.name().cmp(b.name()));

    let name_to_index: HashMap<&str, usize> = operations
        .iter()
        .enumerate()
        .map(|(idx, op)| (op.name(), idx))
        .collect();

    // If A depends on B: edge B -> A (B must come first)
    let mut in_degree: Vec<usize> = vec![0; operations.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); operations.len()];
    for (idx, op) in operations.iter().enumerate() {
        let deps: BTreeSet<&str> = op.record.depends.iter().map(|d| d.name()).collect();
        for dep in deps {
            if let Some(&dep_idx) = name_to_index.get(dep) {
                if dep_idx != idx {
                    dependents[dep_idx].push(idx);
                    in_degree[idx] += 1;
                }
            }
        }
    }

    // Kahn's algorithm; indices are in name order, so the set pops names in order
    let mut ready: BTreeSet<usize> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, &degree)| degree == 0)
        .map(|(idx, _)| idx)
        .collect();
    let mut order: Vec<usize> = Vec::with_capacity(operations.len());

    while let Some(idx) = ready.pop_first() {
        order.push(idx);
        for &dependent in &dependents[idx] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() != operations.len() {
        log::debug!("Dependency cycle among {} operations", operations.len() - order.len());
        let placed: BTreeSet<usize> = order.iter().copied().collect();
        order.extend((0..operations.len()).filter(|idx| !placed.contains(idx)));
    }

    let mut slots: Vec<Option<Operation>> = operations.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|idx| slots[idx].take())
        .collect()
}
