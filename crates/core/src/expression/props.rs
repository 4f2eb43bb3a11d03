//! Property-based tests for the expression engine.
//!
//! - Property 1: Substitution is the identity on formulas without variables
//! - Property 2: One aggregate query per (domain, mode) key
//! - Property 3: Wildcard resolution is a superset of exact resolution
//! - Property 4: Hierarchical accounts never appear in resolved sets

use std::collections::BTreeSet;

use proptest::prelude::*;
use rust_decimal_macros::dec;

use super::token::has_variables;
use super::{AccountResolver, ExpressionEngine, Mode, ModeFilters};
use crate::domain::Domain;
use crate::fiscal::resolver::date_filter;
use crate::gateway::{AccountKind, InMemoryLedger};
use crate::test_support::{account, date, leaf, line};

/// Strategy for formulas made of identifiers, numbers and operators.
fn plain_formula() -> impl Strategy<Value = String> {
    "[a-z_][a-z0-9_]{0,6}( [-+*/] ([0-9]{1,4}|[a-z_][a-z0-9_]{0,6})){0,5}"
}

/// Strategy for a set of distinct numeric account codes.
fn account_codes() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set("[1-9][0-9]{0,3}", 1..20)
}

fn march() -> ModeFilters {
    let (from, to) = (date(2024, 3, 1), date(2024, 3, 31));
    ModeFilters {
        variation: date_filter(from, to, Mode::Variation),
        initial: date_filter(from, to, Mode::Initial),
        end: date_filter(from, to, Mode::End),
    }
}

fn ledger_with(codes: &BTreeSet<String>) -> InMemoryLedger {
    codes.iter().fold(InMemoryLedger::new(), |ledger, code| {
        let account = leaf(code);
        ledger
            .with_move_line(line(account.id, date(2024, 3, 15), dec!(10), dec!(3)))
            .with_account(account)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property 1: Formulas without accounting variables are unchanged.
    ///
    /// *For any* formula with zero accounting variables, `substitute` SHALL
    /// return it unchanged.
    #[test]
    fn prop_substitute_is_identity_without_variables(expr in plain_formula()) {
        prop_assume!(!has_variables(&expr));
        let ledger = InMemoryLedger::new();
        let mut engine = ExpressionEngine::new(&ledger);
        engine.parse(&expr).unwrap();
        engine.finalize(&Domain::True).unwrap();
        engine.execute(&march()).unwrap();
        prop_assert_eq!(engine.substitute(&expr).unwrap(), expr);
        prop_assert_eq!(ledger.aggregate_count(), 0);
    }

    /// Property 2: Variables sharing a key share one query.
    ///
    /// *For any* number of formulas reading variation-mode variables with no
    /// filter, `execute` SHALL issue exactly one aggregate query.
    #[test]
    fn prop_one_query_per_key(
        codes in account_codes(),
        picks in prop::collection::vec((0usize..100, 0usize..3), 1..12),
    ) {
        let ledger = ledger_with(&codes);
        let codes: Vec<&String> = codes.iter().collect();
        let fields = ["bal", "deb", "crd"];
        let formulas: Vec<String> = picks
            .iter()
            .map(|(code, field)| format!("{}[{}]", fields[*field], codes[code % codes.len()]))
            .collect();

        let mut engine = ExpressionEngine::new(&ledger);
        for formula in &formulas {
            engine.parse(formula).unwrap();
        }
        engine.finalize(&Domain::True).unwrap();
        engine.execute(&march()).unwrap();

        prop_assert_eq!(engine.key_count(), 1);
        prop_assert_eq!(ledger.aggregate_count(), 1);
        for formula in &formulas {
            let substituted = engine.substitute(formula).unwrap();
            prop_assert!(!has_variables(&substituted));
        }
    }

    /// Property 3: Wildcard resolution is superset-consistent.
    ///
    /// *For any* chart and any code in it, resolving the code's first digit
    /// followed by `%` SHALL yield a superset of resolving the code itself.
    #[test]
    fn prop_wildcard_is_superset_of_exact(codes in account_codes(), pick in 0usize..100) {
        let ledger = ledger_with(&codes);
        let codes: Vec<&String> = codes.iter().collect();
        let code = codes[pick % codes.len()];
        let pattern = format!("{}%", &code[..1]);

        let resolver = AccountResolver::new(&ledger);
        let exact = resolver.resolve(code, &Domain::True).unwrap();
        let wide = resolver.resolve(&pattern, &Domain::True).unwrap();
        prop_assert_eq!(exact.len(), 1);
        prop_assert!(exact.is_subset(&wide));
    }

    /// Property 4: Hierarchical expansion excludes hierarchical accounts.
    ///
    /// *For any* chain of nested view accounts with leaves at every level,
    /// resolving the root SHALL return exactly the leaves.
    #[test]
    fn prop_expansion_returns_only_leaves(depth in 1usize..6, leaves_per_level in 1usize..4) {
        let root = account("1", AccountKind::View, None);
        let mut ledger = InMemoryLedger::new().with_account(root.clone());
        let mut views = BTreeSet::from([root.id]);
        let mut expected = BTreeSet::new();
        let mut parent = root.id;
        for level in 0..depth {
            let view = account(&format!("1{level}"), AccountKind::View, Some(parent));
            views.insert(view.id);
            for n in 0..leaves_per_level {
                let child = account(&format!("1{level}{n}"), AccountKind::Regular, Some(view.id));
                expected.insert(child.id);
                ledger = ledger.with_account(child);
            }
            parent = view.id;
            ledger = ledger.with_account(view);
        }

        let resolver = AccountResolver::new(&ledger);
        let ids = resolver.resolve("1", &Domain::True).unwrap();
        prop_assert!(ids.is_disjoint(&views));
        prop_assert_eq!(&*ids, &expected);
    }
}
