//! Property tests for keyed reconciliation: for any old and new key
//! sequence, the host ends up in the new order, and every key present in
//! both keeps its host node.

use std::collections::HashMap;

use fvue_harness::MemoryHost;
use fvue_vdom::{NodeId, OldNode, VNode, VNodeData};
use proptest::prelude::*;

fn row(key: u8) -> VNode {
    VNode::element(
        "li",
        Some(VNodeData::new().key(i64::from(key))),
        vec![VNode::text(format!("{key},"))],
    )
}

fn list(keys: &[u8]) -> VNode {
    VNode::element("ul", None, keys.iter().copied().map(row).collect())
}

fn ids_by_key(keys: &[u8], tree: &VNode) -> HashMap<u8, NodeId> {
    keys.iter()
        .copied()
        .zip(tree.children().unwrap().iter().map(|c| c.elm().unwrap()))
        .collect()
}

fn unique_keys() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::hash_set(0u8..24, 0..12)
        .prop_map(|set| set.into_iter().collect::<Vec<_>>())
        .prop_shuffle()
}

proptest! {
    #[test]
    fn keyed_diff_reaches_target_order(old_keys in unique_keys(), new_keys in unique_keys()) {
        let host = MemoryHost::new();
        let patcher = host.patcher();
        let container = host.create_container("app");

        let old = list(&old_keys);
        let root = patcher
            .patch(Some(OldNode::Host(container)), Some(&old), false, false)
            .unwrap()
            .unwrap();
        let before = ids_by_key(&old_keys, &old);

        let new = list(&new_keys);
        patcher
            .patch(Some(OldNode::VNode(&old)), Some(&new), false, false)
            .unwrap();

        let expected: String = new_keys.iter().map(|k| format!("{k},")).collect();
        prop_assert_eq!(host.text(root), expected);
        prop_assert_eq!(host.children(root).len(), new_keys.len());

        let after = ids_by_key(&new_keys, &new);
        for (key, id) in &after {
            if let Some(old_id) = before.get(key) {
                prop_assert_eq!(old_id, id, "key {} lost its host node", key);
            }
        }
        let host_order = host.children(root);
        let vnode_order: Vec<NodeId> = new.children().unwrap().iter().map(|c| c.elm().unwrap()).collect();
        prop_assert_eq!(host_order, vnode_order);
    }
}
