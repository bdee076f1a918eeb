//! Patching element trees against the in-memory host: creation, keyed
//! reorders, positional reuse, listener rebinding, teardown and hydration.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use fvue_core::config;
use fvue_harness::{HostOp, MemoryHost};
use fvue_reactive::Value;
use fvue_vdom::{NodeId, NodeOps, OldNode, Patcher, VNode, VNodeData};

// ── Helpers ──────────────────────────────────────────────────────────────

fn setup() -> (Rc<MemoryHost>, Patcher, NodeId) {
    let host = MemoryHost::new();
    let patcher = host.patcher();
    let container = host.create_container("app");
    (host, patcher, container)
}

fn li(key: &str) -> VNode {
    VNode::element(
        "li",
        Some(VNodeData::new().key(key)),
        vec![VNode::text(key)],
    )
}

fn list(keys: &[&str]) -> VNode {
    VNode::element("ul", None, keys.iter().map(|k| li(k)).collect())
}

fn mount(host: &MemoryHost, patcher: &Patcher, container: NodeId, tree: &VNode) -> NodeId {
    let root = patcher
        .patch(Some(OldNode::Host(container)), Some(tree), false, false)
        .unwrap()
        .unwrap();
    host.take_ops();
    root
}

fn child_ids(tree: &VNode) -> Vec<NodeId> {
    tree.children()
        .unwrap()
        .iter()
        .map(|c| c.elm().unwrap())
        .collect()
}

fn capture_warnings() -> Rc<RefCell<Vec<String>>> {
    let warnings = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&warnings);
    config::set(config::Config::new().with_warn_handler(move |w| {
        sink.borrow_mut().push(w.message.clone());
    }));
    warnings
}

// ═════════════════════════════════════════════════════════════════════════
// Creation
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn mounting_replaces_the_container() {
    let (host, patcher, container) = setup();
    let tree = VNode::element(
        "p",
        Some(VNodeData::new().attr("class", "greeting")),
        vec![VNode::text("hello")],
    );
    let root = patcher
        .patch(Some(OldNode::Host(container)), Some(&tree), false, false)
        .unwrap()
        .unwrap();
    assert_eq!(tree.elm(), Some(root));
    assert_eq!(
        host.inner_html(host.document()),
        "<p class=\"greeting\">hello</p>"
    );
    assert_eq!(host.parent_node(container), None);
}

#[test]
fn creating_without_parent_leaves_tree_detached() {
    let (host, patcher, _) = setup();
    let tree = list(&["a", "b"]);
    let root = patcher.patch(None, Some(&tree), false, false).unwrap().unwrap();
    assert_eq!(host.parent_node(root), None);
    assert_eq!(host.html(root), "<ul><li>a</li><li>b</li></ul>");
}

// ═════════════════════════════════════════════════════════════════════════
// Keyed children
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn rotating_keyed_children_is_one_move() {
    let (host, patcher, container) = setup();
    let old = list(&["a", "b", "c"]);
    let root = mount(&host, &patcher, container, &old);
    let [a, b, c]: [NodeId; 3] = child_ids(&old).try_into().unwrap();

    let new = list(&["c", "a", "b"]);
    patcher
        .patch(Some(OldNode::VNode(&old)), Some(&new), false, false)
        .unwrap();

    let ops = host.take_ops();
    assert_eq!(
        ops,
        vec![HostOp::InsertBefore {
            parent: root,
            node: c,
            reference: a
        }]
    );
    assert_eq!(child_ids(&new), vec![c, a, b]);
    assert_eq!(host.text(root), "cab");
}

#[test]
fn reversing_keyed_children_keeps_host_nodes() {
    let (host, patcher, container) = setup();
    let old = list(&["a", "b", "c", "d"]);
    let root = mount(&host, &patcher, container, &old);
    let before = child_ids(&old);

    let new = list(&["d", "c", "b", "a"]);
    patcher
        .patch(Some(OldNode::VNode(&old)), Some(&new), false, false)
        .unwrap();

    let ops = host.take_ops();
    assert!(ops.iter().all(|op| !op.is_create()));
    let mut after = child_ids(&new);
    after.reverse();
    assert_eq!(after, before);
    assert_eq!(host.text(root), "dcba");
}

#[test]
fn keyed_insert_and_remove() {
    let (host, patcher, container) = setup();
    let old = list(&["a", "b", "c"]);
    let root = mount(&host, &patcher, container, &old);
    let [a, b, c]: [NodeId; 3] = child_ids(&old).try_into().unwrap();

    let new = list(&["a", "x", "c"]);
    patcher
        .patch(Some(OldNode::VNode(&old)), Some(&new), false, false)
        .unwrap();

    let ids = child_ids(&new);
    assert_eq!(ids[0], a);
    assert_eq!(ids[2], c);
    assert!(ids[1] != b);
    assert!(host.ops().contains(&HostOp::RemoveChild {
        parent: root,
        node: b
    }));
    assert_eq!(host.text(root), "axc");
}

#[test]
fn key_lookup_moves_from_the_middle() {
    let (host, patcher, container) = setup();
    let old = list(&["a", "b", "c", "d"]);
    let root = mount(&host, &patcher, container, &old);
    let b = child_ids(&old)[1];

    let new = list(&["b", "d", "a", "c"]);
    patcher
        .patch(Some(OldNode::VNode(&old)), Some(&new), false, false)
        .unwrap();

    assert_eq!(child_ids(&new)[0], b);
    assert!(host.ops().iter().all(|op| !op.is_create()));
    assert_eq!(host.text(root), "bdac");
}

#[test]
fn unkeyed_children_are_never_matched_by_lookup() {
    let (host, patcher, container) = setup();
    let item = |t: &str| VNode::element("span", None, vec![VNode::text(t)]);
    let old = VNode::element("div", None, vec![item("a"), item("b")]);
    let root = mount(&host, &patcher, container, &old);
    let before = child_ids(&old);

    // Positional reuse: both spans are patched in place, a third is created.
    let new = VNode::element("div", None, vec![item("x"), item("a"), item("b")]);
    patcher
        .patch(Some(OldNode::VNode(&old)), Some(&new), false, false)
        .unwrap();

    let after = child_ids(&new);
    assert_eq!(&after[..2], &before[..]);
    assert_eq!(host.text(root), "xab");
    let creates = host.ops().iter().filter(|op| op.is_create()).count();
    assert_eq!(creates, 2, "one span and its text");
}

#[test]
fn duplicate_keys_warn() {
    let warnings = capture_warnings();
    let (host, patcher, container) = setup();
    let tree = list(&["a", "a"]);
    mount(&host, &patcher, container, &tree);
    assert!(warnings.borrow().iter().any(|w| w.contains("Duplicate keys detected: 'a'")));
    config::reset();
}

// ═════════════════════════════════════════════════════════════════════════
// In-place updates
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn text_change_is_a_single_set_text() {
    let (host, patcher, container) = setup();
    let old = VNode::element("p", None, vec![VNode::text("count: 0")]);
    mount(&host, &patcher, container, &old);
    let new = VNode::element("p", None, vec![VNode::text("count: 1")]);
    patcher
        .patch(Some(OldNode::VNode(&old)), Some(&new), false, false)
        .unwrap();
    let ops = host.take_ops();
    assert_eq!(ops.len(), 1);
    assert!(matches!(&ops[0], HostOp::SetText { text, .. } if text == "count: 1"));
}

#[test]
fn attrs_are_diffed() {
    let (host, patcher, container) = setup();
    let old = VNode::element(
        "input",
        Some(VNodeData::new().attr("id", "a").attr("disabled", true)),
        vec![],
    );
    let root = mount(&host, &patcher, container, &old);
    assert_eq!(host.attr(root, "disabled").as_deref(), Some("disabled"));

    let new = VNode::element(
        "input",
        Some(VNodeData::new().attr("id", "a").attr("title", "t")),
        vec![],
    );
    patcher
        .patch(Some(OldNode::VNode(&old)), Some(&new), false, false)
        .unwrap();
    assert_eq!(host.attr(root, "disabled"), None);
    assert_eq!(host.attr(root, "title").as_deref(), Some("t"));
    assert!(
        !host
            .ops()
            .iter()
            .any(|op| matches!(op, HostOp::SetAttr { name, .. } if name == "id"))
    );
}

#[test]
fn different_tags_replace_the_node() {
    let (host, patcher, container) = setup();
    let old = VNode::element("div", None, vec![VNode::element("p", None, vec![])]);
    let root = mount(&host, &patcher, container, &old);
    let p = child_ids(&old)[0];
    let new = VNode::element("div", None, vec![VNode::element("section", None, vec![])]);
    patcher
        .patch(Some(OldNode::VNode(&old)), Some(&new), false, false)
        .unwrap();
    assert_eq!(host.html(root), "<div><section></section></div>");
    assert_eq!(host.parent_node(p), None);
}

#[test]
fn identical_tree_is_a_no_op() {
    let (host, patcher, container) = setup();
    let tree = list(&["a", "b"]);
    tree.mark_static();
    mount(&host, &patcher, container, &tree);
    patcher
        .patch(Some(OldNode::VNode(&tree)), Some(&tree), false, false)
        .unwrap();
    assert!(host.ops().is_empty());
}

#[test]
fn realized_static_child_is_cloned_when_recreated() {
    let (host, patcher, container) = setup();
    let shared = VNode::element("b", None, vec![VNode::text("s")]);
    let first = VNode::element("div", None, vec![shared.clone()]);
    let root = mount(&host, &patcher, container, &first);
    let original = shared.elm().unwrap();

    // A second parent reuses the already-realized node.
    let second = VNode::element("section", None, vec![shared.clone()]);
    patcher
        .patch(Some(OldNode::VNode(&first)), Some(&second), false, false)
        .unwrap();

    let placed = second.children().unwrap()[0].clone();
    assert!(!placed.ptr_eq(&shared));
    assert!(placed.elm().is_some_and(|e| e != original));
    assert_eq!(shared.elm(), Some(original));
    assert_eq!(host.html(second.elm().unwrap()), "<section><b>s</b></section>");
    assert!(!host.contains(root) || host.parent_node(root).is_none());
}

// ═════════════════════════════════════════════════════════════════════════
// Listeners
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn rebinding_listeners_does_not_touch_the_host() {
    let (host, patcher, container) = setup();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let button = |label: &'static str| {
        let s = Rc::clone(&seen);
        VNode::element(
            "button",
            Some(VNodeData::new().on("click", move |_| {
                s.borrow_mut().push(label);
                Ok(())
            })),
            vec![],
        )
    };
    let old = button("first");
    let elm = mount(&host, &patcher, container, &old);
    assert_eq!(host.listener_count(elm), 1);

    let new = button("second");
    patcher
        .patch(Some(OldNode::VNode(&old)), Some(&new), false, false)
        .unwrap();
    assert!(host.take_ops().is_empty());

    host.dispatch(elm, "click", &[]).unwrap();
    assert_eq!(*seen.borrow(), ["second"]);
}

#[test]
fn once_modifier_fires_once() {
    let (host, patcher, container) = setup();
    let hits = Rc::new(Cell::new(0));
    let h = Rc::clone(&hits);
    let tree = VNode::element(
        "a",
        Some(VNodeData::new().on("~click", move |args: &[Value]| {
            assert_eq!(args.len(), 1);
            h.set(h.get() + 1);
            Ok(())
        })),
        vec![],
    );
    let elm = mount(&host, &patcher, container, &tree);
    host.dispatch(elm, "click", &[Value::from(1)]).unwrap();
    host.dispatch(elm, "click", &[Value::from(2)]).unwrap();
    assert_eq!(hits.get(), 1);
}

#[test]
fn destroying_the_tree_unbinds_listeners() {
    let (host, patcher, container) = setup();
    let tree = VNode::element(
        "div",
        None,
        vec![VNode::element(
            "button",
            Some(VNodeData::new().on("click", |_| Ok(()))),
            vec![],
        )],
    );
    mount(&host, &patcher, container, &tree);
    let button = child_ids(&tree)[0];
    assert_eq!(patcher.patch(Some(OldNode::VNode(&tree)), None, false, false).unwrap(), None);
    assert_eq!(host.listener_count(button), 0);
}

// ═════════════════════════════════════════════════════════════════════════
// Hydration
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn hydration_adopts_matching_content() {
    let (host, patcher, container) = setup();
    let p = host.seed_element(container, "p");
    host.seed_text(p, "hi");
    let clicks = Rc::new(Cell::new(0));
    let c = Rc::clone(&clicks);
    let tree = VNode::element(
        "div",
        Some(VNodeData::new().attr("id", "app")),
        vec![VNode::element(
            "p",
            Some(VNodeData::new().on("click", move |_| {
                c.set(c.get() + 1);
                Ok(())
            })),
            vec![VNode::text("hi")],
        )],
    );
    let root = patcher
        .patch(Some(OldNode::Host(container)), Some(&tree), true, false)
        .unwrap();
    assert_eq!(root, Some(container));
    assert!(host.ops().iter().all(|op| !op.is_create()));
    host.dispatch(p, "click", &[]).unwrap();
    assert_eq!(clicks.get(), 1);
}

#[test]
fn hydration_mismatch_falls_back_to_client_render() {
    let warnings = capture_warnings();
    let (host, patcher, container) = setup();
    host.seed_element(container, "span");
    let tree = VNode::element("div", None, vec![VNode::element("p", None, vec![])]);
    let root = patcher
        .patch(Some(OldNode::Host(container)), Some(&tree), true, false)
        .unwrap()
        .unwrap();
    assert_ne!(root, container);
    assert_eq!(host.inner_html(host.document()), "<div><p></p></div>");
    assert!(warnings.borrow().iter().any(|w| w.contains("not matching server-rendered")));
    config::reset();
}
