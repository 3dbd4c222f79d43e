//! Solver scenario tests.
//!
//! Each test builds a pool of installed and available records, runs a
//! request through the solver and checks the resulting operations in order.

use std::time::Duration;

use super::*;
use crate::error::{ExhaustReason, SolveError};
use resolv_spec::{MatchSpec, PackageRecord};

/// Helper to create a record with build string "0"
fn rec(name: &str, version: &str) -> PackageRecord {
    PackageRecord::parse(name, version, "0").unwrap()
}

/// Helper to create a record with dependencies
fn rec_with_deps(name: &str, version: &str, deps: &[&str]) -> PackageRecord {
    let mut record = rec(name, version);
    for dep in deps {
        record = record.depends_on(dep).unwrap();
    }
    record
}

fn solve(pool: &Pool, request: &Request) -> Result<Transaction, SolveError> {
    Solver::new(pool).solve(request)
}

/// Check that the transaction renders to exactly these operations, in order.
fn check_solver_result(pool: &Pool, request: &Request, expected: Vec<&str>) {
    let transaction = match solve(pool, request) {
        Ok(transaction) => transaction,
        Err(err) => panic!("Solver should find a solution, got: {}", err),
    };
    let actual: Vec<String> = transaction.iter().map(|op| op.to_string()).collect();
    assert_eq!(
        actual, expected,
        "\nExpected operations: {:?}\nActual operations: {:?}",
        expected, actual
    );
}

fn expect_unsatisfiable(pool: &Pool, request: &Request) -> ProblemSet {
    match solve(pool, request) {
        Err(SolveError::Unsatisfiable(problems)) => problems,
        Err(err) => panic!("Expected an unsatisfiable request, got: {}", err),
        Ok(transaction) => panic!("Expected no solution, got:\n{}", transaction),
    }
}

// ============================================================================
// Basic Installation Tests
// ============================================================================

#[test]
fn test_install_single_package() {
    let mut pool = Pool::new();
    pool.add_record(rec("foo", "1.0"));

    let mut request = Request::new();
    request.install("foo").unwrap();

    check_solver_result(&pool, &request, vec!["install foo-1.0-0"]);
}

#[test]
fn test_install_missing_version_is_unsatisfiable() {
    let mut pool = Pool::new();
    pool.add_record(rec("foo", "1.0"));

    let mut request = Request::new();
    request.install("foo>=2.0").unwrap();

    let problems = expect_unsatisfiable(&pool, &request);
    assert_eq!(problems.len(), 1);
    assert_eq!(problems.problems[0].jobs(), vec![0]);
    assert!(problems.to_string().contains("foo>=2.0"));
}

#[test]
fn test_install_with_dependencies_in_order() {
    let mut pool = Pool::new();
    pool.add_record(rec("a", "1.0"));
    pool.add_record(rec_with_deps("b", "1.0", &["a>=1.0", "c>=1.0"]));
    pool.add_record(rec_with_deps("c", "1.0", &["a>=1.0"]));

    let mut request = Request::new();
    request.install("b").unwrap();

    check_solver_result(
        &pool,
        &request,
        vec!["install a-1.0-0", "install c-1.0-0", "install b-1.0-0"],
    );
}

#[test]
fn test_install_prefers_newest_matching() {
    let mut pool = Pool::new();
    pool.add_record(rec_with_deps("a", "1.0", &["b<1.1"]));
    pool.add_record(rec("b", "1.0"));
    pool.add_record(rec("b", "1.1"));
    pool.add_record(rec("b", "0.9"));

    let mut request = Request::new();
    request.install("a").unwrap();

    check_solver_result(&pool, &request, vec!["install b-1.0-0", "install a-1.0-0"]);
}

#[test]
fn test_install_keeps_matching_installed_record() {
    let mut pool = Pool::new();
    pool.add_record(rec("foo", "1.1"));
    pool.add_installed(rec("foo", "1.0"));

    let mut request = Request::new();
    request.install("foo").unwrap();

    check_solver_result(&pool, &request, vec![]);
}

#[test]
fn test_backtracks_out_of_conflicting_choice() {
    let mut pool = Pool::new();
    pool.add_record(rec_with_deps("a", "1.0", &["b", "c"]));
    pool.add_record(rec("b", "2.0").conflicts_with("c").unwrap());
    pool.add_record(rec("b", "1.0"));
    pool.add_record(rec("c", "2.0"));
    pool.add_record(rec("c", "1.0"));

    let mut request = Request::new();
    request.install("a").unwrap();

    check_solver_result(
        &pool,
        &request,
        vec!["install b-1.0-0", "install c-2.0-0", "install a-1.0-0"],
    );
}

#[test]
fn test_install_and_remove_same_package_conflict() {
    let mut pool = Pool::new();
    pool.add_record(rec("foo", "1.0"));

    let mut request = Request::new();
    request.install("foo").unwrap().remove("foo", false).unwrap();

    let problems = expect_unsatisfiable(&pool, &request);
    assert_eq!(problems.problems[0].jobs(), vec![0, 1]);
}

#[test]
fn test_unsatisfiable_dependency_explanation() {
    let mut pool = Pool::new();
    pool.add_record(rec_with_deps("a", "1.0", &["b>=2"]));
    pool.add_record(rec("b", "1.0"));

    let mut request = Request::new();
    request.install("a").unwrap();

    let problems = expect_unsatisfiable(&pool, &request);
    let rules = &problems.problems[0].rules;
    assert_eq!(rules.len(), 2);
    assert_eq!(rules[0].rule_type, RuleType::JobInstall);
    assert_eq!(rules[1].rule_type, RuleType::PackageRequires);
    assert!(rules[1].description.contains("requires b"));
}

// ============================================================================
// Update Tests
// ============================================================================

#[test]
fn test_update_never_downgrades() {
    let mut pool = Pool::new();
    pool.add_record(rec("foo", "0.9"));
    pool.add_record(rec("foo", "1.1"));
    pool.add_installed(rec("foo", "1.0"));

    let mut request = Request::new();
    request.update("foo").unwrap();

    check_solver_result(&pool, &request, vec!["upgrade foo-1.0-0 -> foo-1.1-0"]);
}

#[test]
fn test_downgrade_needs_flag() {
    let mut pool = Pool::new();
    pool.add_record(rec("foo", "0.9"));
    pool.add_record(rec_with_deps("bar", "1.0", &["foo<1.0"]));
    pool.add_installed(rec("foo", "1.0"));

    let mut request = Request::new();
    request.install("bar").unwrap();
    let problems = expect_unsatisfiable(&pool, &request);
    assert!(problems
        .iter()
        .flat_map(|p| p.rules.iter())
        .any(|r| r.rule_type == RuleType::NoDowngrade));

    request.flags.allow_downgrade = true;
    check_solver_result(
        &pool,
        &request,
        vec!["downgrade foo-1.0-0 -> foo-0.9-0", "install bar-1.0-0"],
    );
}

#[test]
fn test_update_all() {
    let mut pool = Pool::new();
    pool.add_record(rec("a", "2.0"));
    pool.add_record(rec("b", "2.0"));
    pool.add_installed(rec("a", "1.0"));
    pool.add_installed(rec("b", "1.0"));

    let mut request = Request::new();
    request.update_all(false);

    check_solver_result(
        &pool,
        &request,
        vec!["upgrade a-1.0-0 -> a-2.0-0", "upgrade b-1.0-0 -> b-2.0-0"],
    );
}

#[test]
fn test_nothing_changes_without_jobs() {
    let mut pool = Pool::new();
    pool.add_record(rec("a", "2.0"));
    pool.add_installed(rec("a", "1.0"));

    let transaction = solve(&pool, &Request::new()).unwrap();
    assert!(transaction.is_empty());
    assert_eq!(transaction.summary().to_string(), "Nothing to do");
}

#[test]
fn test_update_all_leaves_kept_package() {
    let mut pool = Pool::new();
    pool.add_record(rec("a", "2.0"));
    pool.add_record(rec("b", "2.0"));
    pool.add_installed(rec("a", "1.0"));
    pool.add_installed(rec("b", "1.0"));

    let mut request = Request::new();
    request.update_all(false).keep("b").unwrap();

    check_solver_result(&pool, &request, vec!["upgrade a-1.0-0 -> a-2.0-0"]);
}

#[test]
fn test_keep_yields_to_dependencies() {
    let mut pool = Pool::new();
    pool.add_record(rec("lib", "2.0"));
    pool.add_record(rec_with_deps("app", "1.0", &["lib>=2.0"]));
    pool.add_installed(rec("lib", "1.0"));

    let mut request = Request::new();
    request.keep("lib").unwrap().install("app").unwrap();

    check_solver_result(
        &pool,
        &request,
        vec!["upgrade lib-1.0-0 -> lib-2.0-0", "install app-1.0-0"],
    );
}

#[test]
fn test_freeze_blocks_dependency_upgrade() {
    let mut pool = Pool::new();
    pool.add_record(rec("lib", "2.0"));
    pool.add_record(rec_with_deps("app", "1.0", &["lib>=2.0"]));
    pool.add_installed(rec("lib", "1.0"));

    let mut request = Request::new();
    request.freeze("lib").unwrap().install("app").unwrap();

    let problems = expect_unsatisfiable(&pool, &request);
    assert_eq!(problems.problems[0].jobs(), vec![0, 1]);
}

#[test]
fn test_update_all_with_user_specs() {
    let mut pool = Pool::new();
    pool.add_record(rec("foo", "2.0"));
    pool.add_installed(rec("foo", "1.0"));
    pool.add_user_spec(MatchSpec::parse("foo<2").unwrap());

    let mut request = Request::new();
    request.update_all(false);
    check_solver_result(&pool, &request, vec!["upgrade foo-1.0-0 -> foo-2.0-0"]);

    request.flags.keep_user_specs = true;
    check_solver_result(&pool, &request, vec![]);
}

// ============================================================================
// Pin Tests
// ============================================================================

#[test]
fn test_pin_narrows_dependency_candidates() {
    let mut pool = Pool::new();
    pool.add_record(rec_with_deps("bar", "1.0", &["foo>=1.0"]));
    pool.add_record(rec("foo", "1.5"));
    pool.add_record(rec("foo", "2.5"));

    let mut request = Request::new();
    request.pin("foo<2.0").unwrap().install("bar").unwrap();

    check_solver_result(&pool, &request, vec!["install foo-1.5-0", "install bar-1.0-0"]);
}

#[test]
fn test_pin_does_not_install() {
    let mut pool = Pool::new();
    pool.add_record(rec("foo", "1.5"));

    let mut request = Request::new();
    request.pin("foo<2.0").unwrap();

    check_solver_result(&pool, &request, vec![]);
}

#[test]
fn test_pin_of_unknown_package_is_invalid() {
    let pool = Pool::new();
    let mut request = Request::new();
    request.pin("ghost").unwrap();

    let err = solve(&pool, &request).unwrap_err();
    assert!(matches!(err, SolveError::InvalidRequest { .. }));
    assert!(err.is_unsatisfiable());
}

// ============================================================================
// Removal Tests
// ============================================================================

#[test]
fn test_remove_without_cleaning() {
    let mut pool = Pool::new();
    pool.add_installed(rec_with_deps("foo", "1.0", &["bar>=1.0"]));
    pool.add_installed(rec("bar", "1.0"));

    let mut request = Request::new();
    request.remove("foo", false).unwrap();

    check_solver_result(&pool, &request, vec!["remove foo-1.0-0"]);
}

#[test]
fn test_remove_with_clean_dependencies() {
    let mut pool = Pool::new();
    pool.add_installed(rec_with_deps("foo", "1.0", &["bar>=1.0"]));
    pool.add_installed(rec("bar", "1.0"));

    let mut request = Request::new();
    request.remove("foo", true).unwrap();

    check_solver_result(&pool, &request, vec!["remove foo-1.0-0", "remove bar-1.0-0"]);
}

#[test]
fn test_clean_keeps_shared_dependency() {
    let mut pool = Pool::new();
    pool.add_installed(rec_with_deps("a", "1.0", &["lib"]));
    pool.add_installed(rec_with_deps("b", "1.0", &["lib"]));
    pool.add_installed(rec("lib", "1.0"));

    let mut request = Request::new();
    request.remove("a", true).unwrap();

    check_solver_result(&pool, &request, vec!["remove a-1.0-0"]);
}

#[test]
fn test_clean_spares_user_requested_dependency() {
    let mut pool = Pool::new();
    pool.add_installed(rec_with_deps("a", "1.0", &["lib"]));
    pool.add_installed(rec("lib", "1.0"));
    pool.add_user_spec(MatchSpec::parse("lib").unwrap());

    let mut request = Request::new();
    request.remove("a", true).unwrap();
    check_solver_result(&pool, &request, vec!["remove a-1.0-0", "remove lib-1.0-0"]);

    request.flags.keep_user_specs = true;
    check_solver_result(&pool, &request, vec!["remove a-1.0-0"]);
}

#[test]
fn test_conflict_removes_installed_package() {
    let mut pool = Pool::new();
    pool.add_record(rec("bar", "1.0").conflicts_with("foo").unwrap());
    pool.add_installed(rec("foo", "1.0"));

    let mut request = Request::new();
    request.install("bar").unwrap();
    check_solver_result(&pool, &request, vec!["remove foo-1.0-0", "install bar-1.0-0"]);

    request.flags.allow_uninstall = false;
    let problems = expect_unsatisfiable(&pool, &request);
    assert!(problems
        .iter()
        .flat_map(|p| p.rules.iter())
        .any(|r| r.rule_type == RuleType::NoUninstall));
}

#[test]
fn test_update_all_clean_keeps_packages_without_uninstall() {
    let mut pool = Pool::new();
    pool.add_installed(rec_with_deps("app", "1.0", &["lib"]));
    pool.add_installed(rec("lib", "1.0"));
    pool.add_record(rec("app", "2.0"));

    let mut request = Request::with_flags(Flags::new().with_allow_uninstall(false));
    request.update_all(true);
    check_solver_result(&pool, &request, vec!["upgrade app-1.0-0 -> app-2.0-0"]);

    request.flags.allow_uninstall = true;
    check_solver_result(
        &pool,
        &request,
        vec!["remove lib-1.0-0", "upgrade app-1.0-0 -> app-2.0-0"],
    );
}

#[test]
fn test_remove_clean_without_uninstall_only_removes_target() {
    let mut pool = Pool::new();
    pool.add_installed(rec_with_deps("foo", "1.0", &["bar>=1.0"]));
    pool.add_installed(rec("bar", "1.0"));

    let mut request = Request::with_flags(Flags::new().with_allow_uninstall(false));
    request.remove("foo", true).unwrap();

    check_solver_result(&pool, &request, vec!["remove foo-1.0-0"]);
}

// ============================================================================
// Flag Tests
// ============================================================================

#[test]
fn test_force_reinstall() {
    let mut pool = Pool::new();
    pool.add_installed(rec("foo", "1.0"));
    pool.add_installed(rec("bar", "1.0"));

    let mut request = Request::new();
    request.install("foo").unwrap();
    check_solver_result(&pool, &request, vec![]);

    request.flags.force_reinstall = true;
    check_solver_result(&pool, &request, vec!["reinstall foo-1.0-0"]);
}

#[test]
fn test_keep_dependencies_during_update_all() {
    let mut pool = Pool::new();
    pool.add_record(rec("app", "2.0"));
    pool.add_installed(rec_with_deps("app", "1.0", &["lib"]));
    pool.add_installed(rec("lib", "1.0"));

    let mut request = Request::new();
    request.update_all(false);
    check_solver_result(&pool, &request, vec!["upgrade app-1.0-0 -> app-2.0-0"]);

    request.flags.keep_dependencies = false;
    check_solver_result(
        &pool,
        &request,
        vec!["remove lib-1.0-0", "upgrade app-1.0-0 -> app-2.0-0"],
    );
}

#[test]
fn test_update_all_clean_dependencies() {
    let mut pool = Pool::new();
    pool.add_record(rec("app", "2.0"));
    pool.add_installed(rec_with_deps("app", "1.0", &["lib"]));
    pool.add_installed(rec("lib", "1.0"));

    let mut request = Request::new();
    request.update_all(true);
    check_solver_result(
        &pool,
        &request,
        vec!["remove lib-1.0-0", "upgrade app-1.0-0 -> app-2.0-0"],
    );
}

#[test]
fn test_channel_priority() {
    let mut pool = Pool::new();
    pool.add_channels(["main", "extra"]);
    pool.add_record(rec("foo", "1.0").with_channel("main"));
    pool.add_record(rec("foo", "2.0").with_channel("extra"));

    let mut request = Request::new();
    request.install("foo").unwrap();
    check_solver_result(&pool, &request, vec!["install foo-1.0-0"]);

    let mut request = Request::new();
    request.install("foo>=2.0").unwrap();
    check_solver_result(&pool, &request, vec!["install foo-2.0-0"]);

    request.flags.strict_repo_priority = true;
    expect_unsatisfiable(&pool, &request);
}

#[test]
fn test_strict_priority_moves_installed_to_preferred_channel() {
    let mut pool = Pool::new();
    pool.add_channels(["a", "b"]);
    pool.add_installed(rec("foo", "1.0").with_channel("b"));
    pool.add_record(rec("foo", "1.0").with_channel("a"));
    pool.add_record(rec("foo", "1.0").with_channel("b"));

    let mut request = Request::with_flags(Flags::new().with_strict_repo_priority(true));
    request.install("foo").unwrap();

    let transaction = solve(&pool, &request).unwrap();
    let operations: Vec<&Operation> = transaction.iter().collect();
    assert_eq!(operations.len(), 1);
    assert_eq!(operations[0].kind, OperationKind::Reinstall);
    assert_eq!(operations[0].record.channel, "a");

    request.flags.strict_repo_priority = false;
    check_solver_result(&pool, &request, vec![]);
}

// ============================================================================
// Budget and Determinism Tests
// ============================================================================

#[test]
fn test_exhausted_is_not_unsatisfiable() {
    let mut pool = Pool::new();
    pool.add_record(rec_with_deps("a", "1.0", &["b"]));
    pool.add_record(rec("b", "1.0"));
    pool.add_record(rec("b", "2.0"));

    let mut request = Request::new();
    request.install("a").unwrap();

    let err = Solver::new(&pool)
        .with_budget(SolveBudget::new().with_max_steps(0))
        .solve(&request)
        .unwrap_err();
    assert!(matches!(
        err,
        SolveError::Exhausted {
            reason: ExhaustReason::StepLimit,
            ..
        }
    ));
    assert!(!err.is_unsatisfiable());
    assert!(err.problems().is_none());

    let err = Solver::new(&pool)
        .with_budget(SolveBudget::new().with_timeout(Duration::ZERO))
        .solve(&request)
        .unwrap_err();
    assert!(matches!(
        err,
        SolveError::Exhausted {
            reason: ExhaustReason::Timeout,
            ..
        }
    ));
}

/// One hole fewer than pigeons: every pigeon needs a hole and each hole
/// takes one pigeon
fn pigeonhole_pool(pigeons: usize) -> Pool {
    let mut pool = Pool::new();
    let holes = pigeons - 1;
    for pigeon in 1..=pigeons {
        for hole in 1..=holes {
            let dep = format!("hole{}=={}", hole, pigeon);
            let name = format!("pigeon{}", pigeon);
            pool.add_record(rec_with_deps(&name, &hole.to_string(), &[dep.as_str()]));
            pool.add_record(rec(&format!("hole{}", hole), &pigeon.to_string()));
        }
    }
    pool
}

#[test]
fn test_timeout_bounds_the_whole_solve() {
    let pool = pigeonhole_pool(10);
    let mut request = Request::new();
    for pigeon in 1..=10 {
        request.install(&format!("pigeon{}", pigeon)).unwrap();
    }

    let timeout = Duration::from_millis(100);
    let started = std::time::Instant::now();
    let result = Solver::new(&pool)
        .with_budget(SolveBudget::new().with_timeout(timeout))
        .solve(&request);
    let elapsed = started.elapsed();

    match result {
        Err(SolveError::Exhausted {
            reason: ExhaustReason::Timeout,
            ..
        }) => {}
        Err(SolveError::Unsatisfiable(_)) => {}
        other => panic!("Expected a timeout or no solution, got: {:?}", other.map(|t| t.to_string())),
    }
    assert!(
        elapsed < timeout + Duration::from_millis(400),
        "solve ran {:?} past a {:?} timeout",
        elapsed,
        timeout
    );
}

#[test]
fn test_solve_is_deterministic() {
    let mut pool = Pool::new();
    pool.add_record(rec_with_deps("a", "1.0", &["b", "c"]));
    pool.add_record(rec("b", "2.0").conflicts_with("c").unwrap());
    pool.add_record(rec("b", "1.0"));
    pool.add_record(rec("c", "2.0"));
    pool.add_record(rec("c", "1.0"));
    pool.add_installed(rec("c", "1.0"));

    let mut request = Request::new();
    request.install("a").unwrap();

    let first = solve(&pool, &request).unwrap();
    for _ in 0..5 {
        assert_eq!(solve(&pool, &request).unwrap(), first);
    }

    let mut failing = Request::new();
    failing.install("a").unwrap().remove("c", false).unwrap();
    let first = expect_unsatisfiable(&pool, &failing);
    assert_eq!(expect_unsatisfiable(&pool, &failing), first);
}

#[test]
fn test_prefer_lowest_policy() {
    let mut pool = Pool::new();
    pool.add_record(rec("foo", "1.0"));
    pool.add_record(rec("foo", "2.0"));

    let mut request = Request::new();
    request.install("foo").unwrap();

    let transaction = Solver::new(&pool)
        .with_policy(Policy::new().prefer_lowest(true))
        .solve(&request)
        .unwrap();
    assert_eq!(transaction.to_string(), "install foo-1.0-0");
}
