//! Registry propagation between contexts.

use sb_script::Context;

/// Merge the parent's preload registry into the child. Only names absent
/// from the child are inserted; a name the child already defines keeps the
/// child's provider. Merging twice is the same as merging once.
pub fn merge_registries(parent: &Context, child: &mut Context) {
    let entries: Vec<_> = parent
        .preload_entries()
        .map(|(name, provider)| (name.to_string(), provider.clone()))
        .collect();
    for (name, provider) in entries {
        child.preload_insert_absent(&name, provider);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use sb_script::{Provider, Value};

    fn int_provider(n: i64) -> Provider {
        Arc::new(move |_ctx| Ok(Value::Int(n)))
    }

    #[test]
    fn merge_adds_every_parent_name_absent_from_the_child() {
        let mut parent = Context::new();
        for name in ["a", "b", "c", "d"] {
            parent.preload(name, int_provider(1));
        }
        let mut child = Context::new();
        for name in ["x", "y"] {
            child.preload(name, int_provider(2));
        }
        merge_registries(&parent, &mut child);
        assert_eq!(child.preload_len(), 6);
        for name in ["a", "b", "c", "d", "x", "y"] {
            assert!(child.preload_provider(name).is_some(), "missing {name}");
        }
    }

    #[test]
    fn child_entry_survives_collision_unchanged() {
        let mut parent = Context::new();
        parent.preload("x", int_provider(1));
        let mut child = Context::new();
        child.preload("x", int_provider(2));
        merge_registries(&parent, &mut child);
        assert!(child.require("x").unwrap().eq_value(&Value::Int(2)));
    }

    #[test]
    fn merge_is_idempotent() {
        let mut parent = Context::new();
        parent.preload("a", int_provider(1));
        parent.preload("b", int_provider(2));
        let mut child = Context::new();
        child.preload("b", int_provider(9));

        merge_registries(&parent, &mut child);
        let once: Vec<bool> = ["a", "b"]
            .iter()
            .map(|n| {
                let p = child.preload_provider(n).unwrap();
                let q = parent.preload_provider(n).unwrap();
                Arc::ptr_eq(&p, &q)
            })
            .collect();
        merge_registries(&parent, &mut child);
        let twice: Vec<bool> = ["a", "b"]
            .iter()
            .map(|n| {
                let p = child.preload_provider(n).unwrap();
                let q = parent.preload_provider(n).unwrap();
                Arc::ptr_eq(&p, &q)
            })
            .collect();
        assert_eq!(once, twice);
        assert_eq!(once, vec![true, false]);
        assert_eq!(child.preload_len(), 2);
    }

    proptest::proptest! {
        #[test]
        fn merged_registry_is_the_union_and_child_wins(
            parent_names in proptest::collection::hash_set("[a-z]{1,6}", 0..12),
            child_names in proptest::collection::hash_set("[a-z]{1,6}", 0..12),
        ) {
            let mut parent = Context::new();
            for name in &parent_names {
                parent.preload(name, int_provider(1));
            }
            let mut child = Context::new();
            for name in &child_names {
                child.preload(name, int_provider(2));
            }
            merge_registries(&parent, &mut child);

            let union: std::collections::HashSet<_> =
                parent_names.union(&child_names).cloned().collect();
            proptest::prop_assert_eq!(child.preload_len(), union.len());
            for name in &child_names {
                let v = child.require(name).unwrap();
                proptest::prop_assert!(v.eq_value(&Value::Int(2)), "child lost '{}'", name);
            }
        }
    }
}
