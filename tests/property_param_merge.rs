use mediabroker::domain::models::{ParamMap, ParamValue};
use proptest::prelude::*;
use std::collections::HashMap;

fn arb_value() -> impl Strategy<Value = ParamValue> {
    prop_oneof![
        "[a-zA-Z0-9]{0,12}".prop_map(ParamValue::String),
        any::<i16>().prop_map(|n| ParamValue::Number(f64::from(n))),
        any::<bool>().prop_map(ParamValue::Bool),
    ]
}

fn arb_param_map() -> impl Strategy<Value = ParamMap> {
    prop::collection::hash_map("[a-zA-Z][a-zA-Z0-9]{0,8}", arb_value(), 0..8)
        .prop_map(|entries: HashMap<String, ParamValue>| entries.into_iter().fold(ParamMap::new(), |m, (k, v)| m.with(k, v)))
}

proptest! {
    /// Property: on a key collision, `overrides`' value always wins — this is the
    /// item-wins-over-fixed-config rule the submission path relies on.
    #[test]
    fn prop_merge_item_wins_on_every_shared_key(
        fixed in arb_param_map(),
        overrides in arb_param_map(),
    ) {
        let merged = fixed.merged_with(&overrides);

        for (key, value) in &overrides.0 {
            prop_assert_eq!(merged.get(key), Some(value));
        }
    }

    /// Property: merging never drops a key that was unique to either side.
    #[test]
    fn prop_merge_preserves_disjoint_keys(
        fixed in arb_param_map(),
        overrides in arb_param_map(),
    ) {
        let merged = fixed.merged_with(&overrides);

        for key in fixed.0.keys() {
            prop_assert!(merged.get(key).is_some());
        }
        for key in overrides.0.keys() {
            prop_assert!(merged.get(key).is_some());
        }
    }

    /// Property: merging is idempotent when applied twice with the same overrides —
    /// a retried submission re-merging the same params produces the same result.
    #[test]
    fn prop_merge_is_idempotent(
        fixed in arb_param_map(),
        overrides in arb_param_map(),
    ) {
        let once = fixed.merged_with(&overrides);
        let twice = once.merged_with(&overrides);
        prop_assert_eq!(once, twice);
    }

    /// Property: merge output survives a JSON round-trip unchanged, since every
    /// merged map is what actually gets persisted to the Store.
    #[test]
    fn prop_merge_result_round_trips_through_json(
        fixed in arb_param_map(),
        overrides in arb_param_map(),
    ) {
        let merged = fixed.merged_with(&overrides);
        let json = merged.to_json().expect("ParamMap always encodes");
        let back = ParamMap::from_json(&json).expect("round-trip decodes");
        prop_assert_eq!(merged, back);
    }
}
