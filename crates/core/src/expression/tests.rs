//! Expression engine scenarios over a small chart of accounts.

use std::collections::BTreeSet;

use misbuilder_shared::types::AccountId;
use rust_decimal_macros::dec;

use super::*;
use crate::domain::{Domain, DomainValue, Operator};
use crate::fiscal::resolver::date_filter;
use crate::gateway::{AccountKind, InMemoryLedger};
use crate::test_support::{account, date, leaf, line};

struct Chart {
    ledger: InMemoryLedger,
    view_6: AccountId,
    view_60: AccountId,
    acc_70: AccountId,
}

/// Chart: 6 (view) > 60 (view) > 600, 601 and 6 > 61; 70 and 701 regular;
/// 9 consolidates 70. March 2024 holds the variation, February the opening.
fn chart() -> Chart {
    let view_6 = account("6", AccountKind::View, None);
    let view_60 = account("60", AccountKind::View, Some(view_6.id));
    let acc_600 = account("600", AccountKind::Regular, Some(view_60.id));
    let acc_601 = account("601", AccountKind::Regular, Some(view_60.id));
    let acc_61 = account("61", AccountKind::Regular, Some(view_6.id));
    let acc_70 = leaf("70");
    let acc_701 = leaf("701");
    let mut consol_9 = account("9", AccountKind::Consolidation, None);
    consol_9.consolidated_ids = vec![acc_70.id];

    let mut fee = line(acc_61.id, date(2024, 3, 20), dec!(25), dec!(0));
    fee.name = "Bank fee".into();

    let ledger = InMemoryLedger::new()
        .with_move_line(line(acc_600.id, date(2024, 3, 5), dec!(100), dec!(0)))
        .with_move_line(line(acc_601.id, date(2024, 3, 6), dec!(50), dec!(0)))
        .with_move_line(fee)
        .with_move_line(line(acc_70.id, date(2024, 3, 10), dec!(0), dec!(400)))
        .with_move_line(line(acc_701.id, date(2024, 3, 11), dec!(0), dec!(100)))
        .with_move_line(line(acc_70.id, date(2024, 2, 10), dec!(0), dec!(300)))
        .with_account(view_6.clone())
        .with_account(view_60.clone())
        .with_account(acc_600)
        .with_account(acc_601)
        .with_account(acc_61)
        .with_account(acc_70.clone())
        .with_account(acc_701)
        .with_account(consol_9);

    Chart {
        ledger,
        view_6: view_6.id,
        view_60: view_60.id,
        acc_70: acc_70.id,
    }
}

fn march() -> ModeFilters {
    let (from, to) = (date(2024, 3, 1), date(2024, 3, 31));
    ModeFilters {
        variation: date_filter(from, to, Mode::Variation),
        initial: date_filter(from, to, Mode::Initial),
        end: date_filter(from, to, Mode::End),
    }
}

fn run(ledger: &InMemoryLedger, exprs: &[&str]) -> Vec<String> {
    let mut engine = ExpressionEngine::new(ledger);
    for expr in exprs {
        engine.parse(expr).unwrap();
    }
    engine.finalize(&Domain::True).unwrap();
    engine.execute(&march()).unwrap();
    exprs.iter().map(|e| engine.substitute(e).unwrap()).collect()
}

#[test]
fn test_substitutes_balance_of_exact_code() {
    let chart = chart();
    assert_eq!(run(&chart.ledger, &["bal[70]"]), vec!["(-400)"]);
}

#[test]
fn test_fields_read_debit_and_credit() {
    let chart = chart();
    assert_eq!(
        run(&chart.ledger, &["deb[6]", "crd[70]", "deb_70"]),
        vec!["(175)", "(400)", "(0)"]
    );
}

#[test]
fn test_view_account_sums_its_leaves() {
    let chart = chart();
    assert_eq!(run(&chart.ledger, &["bal[6]", "bal[60]"]), vec!["(175)", "(150)"]);
}

#[test]
fn test_consolidation_account_sums_consolidated_accounts() {
    let chart = chart();
    assert_eq!(run(&chart.ledger, &["bal[9]"]), vec!["(-400)"]);
}

#[test]
fn test_wildcard_matches_code_pattern() {
    let chart = chart();
    assert_eq!(run(&chart.ledger, &["bal[7%]"]), vec!["(-500)"]);
}

#[test]
fn test_account_matched_by_two_codes_counts_once() {
    let chart = chart();
    assert_eq!(run(&chart.ledger, &["bal[70, 7%]"]), vec!["(-500)"]);
}

#[test]
fn test_modes_select_their_window() {
    let chart = chart();
    assert_eq!(
        run(&chart.ledger, &["bali[70]", "bale[70]", "balp[70]"]),
        vec!["(-300)", "(-700)", "(-400)"]
    );
}

#[test]
fn test_unrestricted_variables_read_every_account() {
    let chart = chart();
    assert_eq!(
        run(&chart.ledger, &["bal[]", "deb[]", "crd[]"]),
        vec!["(-325)", "(175)", "(500)"]
    );
}

#[test]
fn test_domain_clause_filters_move_lines() {
    let chart = chart();
    assert_eq!(
        run(&chart.ledger, &["deb[][('name', '=', 'Bank fee')]", "deb[6][('name', '=', 'Bank fee')]"]),
        vec!["(25)", "(25)"]
    );
}

#[test]
fn test_unknown_code_resolves_to_zero() {
    let chart = chart();
    assert_eq!(run(&chart.ledger, &["bal[999] + 1"]), vec!["(0) + 1"]);
}

#[test]
fn test_formula_without_variables_is_unchanged() {
    let chart = chart();
    assert_eq!(run(&chart.ledger, &["a + b * 2"]), vec!["a + b * 2"]);
}

#[test]
fn test_shared_key_issues_one_query() {
    let chart = chart();
    let mut engine = ExpressionEngine::new(&chart.ledger);
    engine.parse("bal[70] + bal[70]").unwrap();
    engine.parse("crd[70]").unwrap();
    assert_eq!(engine.key_count(), 1);
    engine.finalize(&Domain::True).unwrap();
    engine.execute(&march()).unwrap();
    assert_eq!(chart.ledger.aggregate_count(), 1);
    assert_eq!(engine.substitute("bal[70] + bal[70]").unwrap(), "(-400) + (-400)");
}

#[test]
fn test_restricted_and_unrestricted_variables_of_a_key_query_separately() {
    let chart = chart();
    let mut engine = ExpressionEngine::new(&chart.ledger);
    engine.parse("bal[70] + bal[]").unwrap();
    engine.finalize(&Domain::True).unwrap();
    engine.execute(&march()).unwrap();
    assert_eq!(engine.key_count(), 1);
    assert_eq!(chart.ledger.aggregate_count(), 2);
}

#[test]
fn test_distinct_modes_and_domains_are_distinct_keys() {
    let chart = chart();
    let mut engine = ExpressionEngine::new(&chart.ledger);
    engine
        .parse("bal[70] + bali[70] + bal[70][('name', '=', 'x')]")
        .unwrap();
    assert_eq!(engine.key_count(), 3);
}

#[test]
fn test_execute_replaces_previous_column() {
    let chart = chart();
    let mut engine = ExpressionEngine::new(&chart.ledger);
    engine.parse("bal[70]").unwrap();
    engine.finalize(&Domain::True).unwrap();
    engine.execute(&march()).unwrap();
    assert_eq!(engine.substitute("bal[70]").unwrap(), "(-400)");

    let (from, to) = (date(2024, 2, 1), date(2024, 2, 29));
    let february = ModeFilters {
        variation: date_filter(from, to, Mode::Variation),
        initial: date_filter(from, to, Mode::Initial),
        end: date_filter(from, to, Mode::End),
    };
    engine.execute(&february).unwrap();
    assert_eq!(engine.substitute("bal[70]").unwrap(), "(-300)");
}

#[test]
fn test_lifecycle_is_enforced() {
    let chart = chart();
    let mut engine = ExpressionEngine::new(&chart.ledger);
    assert_eq!(engine.state(), EngineState::Parsing);
    assert!(matches!(
        engine.execute(&march()),
        Err(ExpressionError::InvalidState { operation: "execute", .. })
    ));
    assert!(matches!(
        engine.substitute("bal[70]"),
        Err(ExpressionError::InvalidState { .. })
    ));

    engine.parse("bal[70]").unwrap();
    engine.finalize(&Domain::True).unwrap();
    assert_eq!(engine.state(), EngineState::Finalized);
    assert!(matches!(
        engine.finalize(&Domain::True),
        Err(ExpressionError::InvalidState { .. })
    ));
    assert!(matches!(
        engine.parse("bal[60]"),
        Err(ExpressionError::InvalidState { operation: "parse", .. })
    ));
    assert!(engine.substitute("bal[70]").is_err());

    engine.execute(&march()).unwrap();
    assert_eq!(engine.state(), EngineState::Executed);
}

#[test]
fn test_unparsed_code_is_reported_on_substitute() {
    let chart = chart();
    let mut engine = ExpressionEngine::new(&chart.ledger);
    engine.parse("bal[70]").unwrap();
    engine.finalize(&Domain::True).unwrap();
    engine.execute(&march()).unwrap();
    assert!(matches!(
        engine.substitute("bal[60]"),
        Err(ExpressionError::UnknownVariable(code)) if code == "60"
    ));
}

#[test]
fn test_malformed_filter_registers_nothing() {
    let chart = chart();
    let mut engine = ExpressionEngine::new(&chart.ledger);
    assert!(matches!(
        engine.parse("bal[70] + bal[60][('x', '=')]"),
        Err(ExpressionError::Domain { .. })
    ));
    assert_eq!(engine.key_count(), 0);
}

#[test]
fn test_domain_for_skips_initial_mode() {
    let chart = chart();
    let mut engine = ExpressionEngine::new(&chart.ledger);
    let expr = "bal[70] + bali[60] + crd[]";
    engine.parse(expr).unwrap();
    engine.finalize(&Domain::True).unwrap();

    let domain = engine.domain_for(expr).unwrap().unwrap();
    assert_eq!(
        domain,
        Domain::or([
            Domain::is_in("account_id", DomainValue::ids([chart.acc_70])),
            Domain::cond("credit", Operator::Gt, rust_decimal::Decimal::ZERO),
        ])
    );
    assert_eq!(engine.domain_for("bali[60]").unwrap(), None);
    assert_eq!(engine.domain_for("1 + 2").unwrap(), None);
}

#[test]
fn test_resolver_never_returns_hierarchical_accounts() {
    let chart = chart();
    let resolver = AccountResolver::new(&chart.ledger);
    let ids = resolver.resolve("6", &Domain::True).unwrap();
    assert_eq!(ids.len(), 3);
    assert!(!ids.contains(&chart.view_6));
    assert!(!ids.contains(&chart.view_60));

    let all: BTreeSet<AccountId> = resolver.resolve("%", &Domain::True).unwrap().iter().copied().collect();
    assert!(!all.contains(&chart.view_6));
    assert!(!all.contains(&chart.view_60));
}

#[test]
fn test_resolver_caches_per_code() {
    let chart = chart();
    let resolver = AccountResolver::new(&chart.ledger);
    let first = resolver.resolve("70", &Domain::True).unwrap();
    let second = resolver.resolve("70", &Domain::eq("code", "nothing")).unwrap();
    assert_eq!(first, second);
    assert_eq!(resolver.cached_codes(), 1);
}

#[test]
fn test_resolver_applies_restriction() {
    let chart = chart();
    let resolver = AccountResolver::new(&chart.ledger);
    let ids = resolver
        .resolve("7%", &Domain::cond("code", Operator::Ne, "701"))
        .unwrap();
    assert_eq!(ids.iter().copied().collect::<Vec<_>>(), vec![chart.acc_70]);
}
