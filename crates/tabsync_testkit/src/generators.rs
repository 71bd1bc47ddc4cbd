//! Property-based test generators using proptest.

use proptest::prelude::*;
use tabsync_engine::Page;
use tabsync_types::{Item, LogicalType, ScopeCatalog};
use uuid::Uuid;

/// Region names the catalog strategies draw from.
pub const REGIONS: [&str; 5] = ["us-east-1", "us-west-2", "eu-west-1", "eu-central-1", "ap-east-1"];

/// Strategy for logical types, nested lists included.
pub fn logical_type_strategy() -> impl Strategy<Value = LogicalType> {
    let leaf = prop_oneof![
        Just(LogicalType::Bool),
        Just(LogicalType::Int8),
        Just(LogicalType::Int16),
        Just(LogicalType::Int32),
        Just(LogicalType::Int64),
        Just(LogicalType::UInt8),
        Just(LogicalType::UInt16),
        Just(LogicalType::UInt32),
        Just(LogicalType::UInt64),
        Just(LogicalType::Float32),
        Just(LogicalType::Float64),
        Just(LogicalType::String),
        Just(LogicalType::Bytes),
        Just(LogicalType::Timestamp),
        Just(LogicalType::Date),
        Just(LogicalType::Uuid),
        Just(LogicalType::Inet),
        Just(LogicalType::Mac),
        Just(LogicalType::Json),
        "[a-z]{1,8}".prop_map(LogicalType::Extension),
    ];
    leaf.prop_recursive(3, 8, 1, |inner| inner.prop_map(LogicalType::list_of))
}

/// Strategy for UUIDs over the full 128-bit space.
pub fn uuid_strategy() -> impl Strategy<Value = Uuid> {
    any::<u128>().prop_map(Uuid::from_u128)
}

/// Strategy for JSON documents with nested arrays and objects.
pub fn json_strategy() -> impl Strategy<Value = serde_json::Value> {
    let leaf = prop_oneof![
        Just(serde_json::Value::Null),
        any::<bool>().prop_map(serde_json::Value::Bool),
        any::<i64>().prop_map(serde_json::Value::from),
        "[ -~]{0,12}".prop_map(serde_json::Value::String),
    ];
    leaf.prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(serde_json::Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|m| serde_json::Value::Object(m.into_iter().collect())),
        ]
    })
}

/// Strategy for scope catalogs: up to four accounts, each with a subset of
/// [`REGIONS`], and an optional `dynamodb` region restriction.
pub fn scope_catalog_strategy() -> impl Strategy<Value = ScopeCatalog> {
    let regions = || prop::sample::subsequence(REGIONS.to_vec(), 0..=REGIONS.len());
    (
        prop::collection::vec(("[0-9]{3}", regions()), 0..4),
        prop::option::of(regions()),
    )
        .prop_map(|(accounts, service)| {
            let mut catalog = ScopeCatalog::new();
            for (id, regions) in accounts {
                catalog = catalog.with_account(id, regions);
            }
            if let Some(regions) = service {
                catalog = catalog.with_service("dynamodb", regions);
            }
            catalog
        })
}

/// Strategy for page scripts: up to five pages of distinct ids, chained
/// with tokens `T1`, `T2`, ... and an empty token on the last page.
pub fn page_script_strategy() -> impl Strategy<Value = Vec<Page>> {
    prop::collection::vec(0usize..4, 1..6).prop_map(|sizes| {
        let last = sizes.len() - 1;
        let mut next_id = 0;
        sizes
            .into_iter()
            .enumerate()
            .map(|(i, size)| {
                let items = (0..size)
                    .map(|_| {
                        next_id += 1;
                        Item::new(serde_json::json!({ "id": format!("id-{next_id}") }))
                    })
                    .collect();
                if i == last {
                    Page::new(items, "")
                } else {
                    Page::new(items, format!("T{}", i + 1))
                }
            })
            .collect()
    })
}
