//! Property tests for the scope multiplexer.

use proptest::prelude::*;
use std::collections::BTreeSet;
use tabsync_types::{ScopeCatalog, ScopeContext, ScopePolicy};

fn region_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["us-east-1", "us-west-2", "eu-west-1", "ap-south-1"])
        .prop_map(str::to_string)
}

fn catalog_strategy() -> impl Strategy<Value = ScopeCatalog> {
    (
        prop::collection::vec(
            (
                prop::string::string_regex("[0-9]{3}").expect("Invalid regex"),
                prop::collection::vec(region_strategy(), 0..5),
            ),
            0..6,
        ),
        prop::collection::btree_set(region_strategy(), 0..4),
    )
        .prop_map(|(accounts, service_regions)| {
            let mut catalog = ScopeCatalog::new();
            for (id, regions) in accounts {
                catalog = catalog.with_account(id, regions);
            }
            catalog.with_service("svc", service_regions)
        })
}

proptest! {
    #[test]
    fn global_policy_is_always_one_scope(catalog in catalog_strategy()) {
        prop_assert_eq!(catalog.scopes_for(&ScopePolicy::Global), vec![ScopeContext::global()]);
    }

    #[test]
    fn per_account_region_matches_valid_pairs(catalog in catalog_strategy()) {
        let scopes = catalog.scopes_for(&ScopePolicy::per_account_region("svc"));

        let expected: BTreeSet<(String, String)> = catalog
            .accounts
            .iter()
            .flat_map(|a| a.regions.iter().map(move |r| (a.id.clone(), r.clone())))
            .filter(|(_, r)| catalog.is_available("svc", r))
            .collect();

        prop_assert_eq!(scopes.len(), expected.len());

        let unique: BTreeSet<&ScopeContext> = scopes.iter().collect();
        prop_assert_eq!(unique.len(), scopes.len());

        for scope in &scopes {
            let pair = (
                scope.account_id().unwrap().to_string(),
                scope.region_id().unwrap().to_string(),
            );
            prop_assert!(expected.contains(&pair));
        }
    }

    #[test]
    fn multiplexing_is_deterministic(catalog in catalog_strategy()) {
        let policy = ScopePolicy::per_account_region("svc");
        prop_assert_eq!(catalog.scopes_for(&policy), catalog.clone().scopes_for(&policy));
    }
}
