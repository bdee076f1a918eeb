#![forbid(unsafe_code)]

//! Tree reconciliation.
//!
//! [`Patcher::patch`] turns "old tree, new tree" into host operations:
//!
//! - no old tree: realize the new tree from scratch;
//! - no new tree: run teardown hooks over the old tree;
//! - same node (see [`same_vnode`]): patch in place, recursing into
//!   children with the four-pointer diff in `update_children`;
//! - otherwise: realize the new tree next to the old host node, then remove
//!   the old one.
//!
//! # Invariants
//!
//! 1. Unchanged keyed children keep their host node across a reorder; a
//!    reorder costs one move per displaced child.
//! 2. Children without a key are matched only by the end-pointer scan,
//!    never through the key index.
//! 3. Component `insert` hooks fire after the whole host subtree is
//!    attached, children before parents. During a component's initial
//!    render they are handed to the parent's queue instead.
//!
//! # Failure Modes
//!
//! - **Component hook fails**: the patch stops and returns
//!   [`PatchError`]; host nodes created so far stay where they are.
//! - **Duplicate keys among siblings**: warned; the diff still runs but
//!   may reuse the wrong node.
//! - **Hydration mismatch**: warned; the host node is replaced by a full
//!   client render.

use std::rc::Rc;

use ahash::{AHashMap, AHashSet};
use fvue_core::debug;

use crate::error::{PatchError, Result};
use crate::host::{HostNodeKind, Module, NodeId, NodeOps};
use crate::vnode::{Key, VNode, VNodeData, VNodeKind};

/// The "before" side of a patch.
#[derive(Debug, Clone, Copy)]
pub enum OldNode<'a> {
    VNode(&'a VNode),
    /// A host node not produced by a previous patch (mount target or
    /// server-rendered content).
    Host(NodeId),
}

/// Whether `b` can be patched in place of `a`.
#[must_use]
pub fn same_vnode(a: &VNode, b: &VNode) -> bool {
    if a.key() != b.key() {
        return false;
    }
    let same_shape = a.data().is_some() == b.data().is_some()
        && match (a.kind(), b.kind()) {
            (VNodeKind::Element { tag: x }, VNodeKind::Element { tag: y }) => {
                x == y && same_input_type(a, b)
            }
            (VNodeKind::Text { .. }, VNodeKind::Text { .. })
            | (VNodeKind::Comment { .. }, VNodeKind::Comment { .. }) => true,
            (VNodeKind::Component(x), VNodeKind::Component(y)) => {
                x.ctor.cid() == y.ctor.cid() && x.tag == y.tag
            }
            _ => false,
        };
    same_shape
        || (a.is_async_placeholder()
            && match (a.async_factory(), b.async_factory()) {
                (Some(x), Some(y)) => Rc::ptr_eq(x, y) && !y.has_failed(),
                _ => false,
            })
}

const TEXT_INPUT_TYPES: [&str; 7] = ["text", "number", "password", "search", "email", "tel", "url"];

fn same_input_type(a: &VNode, b: &VNode) -> bool {
    if a.tag() != Some("input") {
        return true;
    }
    let input_type = |v: &VNode| {
        v.data()
            .and_then(|d| d.attrs.get("type"))
            .map(|t| t.to_display_string())
    };
    let (x, y) = (input_type(a), input_type(b));
    x == y
        || (x.as_deref().is_some_and(|t| TEXT_INPUT_TYPES.contains(&t))
            && y.as_deref().is_some_and(|t| TEXT_INPUT_TYPES.contains(&t)))
}

fn component_tag(vnode: &VNode) -> String {
    vnode
        .component_options()
        .and_then(|o| o.tag.clone().or_else(|| o.ctor.name()))
        .unwrap_or_else(|| "anonymous".to_string())
}

type InsertQueue = Vec<VNode>;

/// Applies tree diffs to a host through [`NodeOps`] and a module table.
#[derive(Clone)]
pub struct Patcher {
    ops: Rc<dyn NodeOps>,
    modules: Rc<[Rc<dyn Module>]>,
}

impl std::fmt::Debug for Patcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Patcher")
            .field(
                "modules",
                &self.modules.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl Patcher {
    #[must_use]
    pub fn new(ops: Rc<dyn NodeOps>, modules: Vec<Rc<dyn Module>>) -> Self {
        Self {
            ops,
            modules: modules.into(),
        }
    }

    #[must_use]
    pub fn node_ops(&self) -> &Rc<dyn NodeOps> {
        &self.ops
    }

    /// Reconcile `old` into `vnode` and return the resulting root host node.
    pub fn patch(
        &self,
        old: Option<OldNode<'_>>,
        vnode: Option<&VNode>,
        hydrating: bool,
        remove_only: bool,
    ) -> Result<Option<NodeId>> {
        let Some(vnode) = vnode else {
            if let Some(OldNode::VNode(old)) = old {
                self.invoke_destroy_hook(old);
            }
            return Ok(None);
        };
        let _span = tracing::trace_span!("fvue.patch", initial = old.is_none()).entered();

        let mut queue = InsertQueue::new();
        let mut initial = false;
        match old {
            None => {
                initial = true;
                self.create_elm(vnode, &mut queue, None, None, false, None)?;
            }
            Some(OldNode::VNode(old)) if same_vnode(old, vnode) => {
                self.patch_vnode(old, vnode, &mut queue, remove_only)?;
            }
            Some(old) => {
                let old_vnode = match old {
                    OldNode::Host(elm) => {
                        if hydrating {
                            if self.hydrate(elm, vnode, &mut queue)? {
                                self.invoke_insert_hook(vnode, queue, true);
                                return Ok(Some(elm));
                            }
                            debug::warn(
                                "The client-side rendered virtual DOM tree is not matching \
                                 server-rendered content. Bailing hydration and performing \
                                 full client-side render.",
                                None,
                            );
                        }
                        self.empty_node_at(elm)
                    }
                    OldNode::VNode(old) => old.clone(),
                };
                self.replace(&old_vnode, vnode, &mut queue)?;
            }
        }
        self.invoke_insert_hook(vnode, queue, initial);
        Ok(vnode.elm())
    }

    fn replace(&self, old: &VNode, vnode: &VNode, queue: &mut InsertQueue) -> Result<()> {
        let old_elm = old.elm();
        let parent_elm = old_elm.and_then(|e| self.ops.parent_node(e));
        let next = old_elm.and_then(|e| self.ops.next_sibling(e));
        self.create_elm(vnode, queue, parent_elm, next, false, None)?;

        // A component whose root changed: re-point the placeholder chain.
        if let Some(mut ancestor) = vnode.parent() {
            let patchable = self.is_patchable(vnode);
            loop {
                for module in self.modules.iter() {
                    module.destroy(&ancestor);
                }
                ancestor.set_elm(vnode.elm());
                if patchable {
                    for module in self.modules.iter() {
                        module.create(&ancestor);
                    }
                }
                match ancestor.parent() {
                    Some(next) => ancestor = next,
                    None => break,
                }
            }
        }

        if parent_elm.is_some() {
            self.remove_vnodes(&[Some(old.clone())], 0, 1);
        } else if old.is_tagged() {
            self.invoke_destroy_hook(old);
        }
        Ok(())
    }

    fn empty_node_at(&self, elm: NodeId) -> VNode {
        let tag = self.ops.tag_name(elm).unwrap_or_default();
        let node = VNode::element(&tag, Some(VNodeData::new()), Vec::new());
        node.set_elm(Some(elm));
        node
    }

    // ─── Creation ───────────────────────────────────────────────────────

    /// Realize `vnode` and insert it. Returns the node actually realized:
    /// an already-realized node (a reused static tree) is cloned first and
    /// the clone replaces it in `owner`'s child list.
    fn create_elm(
        &self,
        vnode: &VNode,
        queue: &mut InsertQueue,
        parent: Option<NodeId>,
        ref_elm: Option<NodeId>,
        nested: bool,
        owner: Option<(&VNode, usize)>,
    ) -> Result<VNode> {
        let vnode = match owner {
            Some((owner, index)) if vnode.elm().is_some() => {
                let copy = vnode.clone_node();
                owner.replace_child(index, copy.clone());
                copy
            }
            _ => vnode.clone(),
        };
        vnode.set_root_insert(!nested);

        if self.create_component(&vnode, queue, parent, ref_elm)? {
            return Ok(vnode);
        }

        match vnode.kind() {
            VNodeKind::Element { tag } => {
                let elm = self.ops.create_element(tag, &vnode);
                vnode.set_elm(Some(elm));
                if let Some(children) = vnode.children() {
                    self.create_children(&vnode, &children, queue)?;
                }
                if vnode.data().is_some() {
                    self.invoke_create_hooks(&vnode, queue);
                }
                self.insert(parent, Some(elm), ref_elm);
            }
            VNodeKind::Comment { text } => {
                let elm = self.ops.create_comment(text);
                vnode.set_elm(Some(elm));
                self.insert(parent, Some(elm), ref_elm);
            }
            VNodeKind::Text { text } => {
                let elm = self.ops.create_text_node(text);
                vnode.set_elm(Some(elm));
                self.insert(parent, Some(elm), ref_elm);
            }
            VNodeKind::Component(_) => {}
        }
        Ok(vnode)
    }

    fn create_component(
        &self,
        vnode: &VNode,
        queue: &mut InsertQueue,
        parent: Option<NodeId>,
        ref_elm: Option<NodeId>,
    ) -> Result<bool> {
        let Some(options) = vnode.component_options() else {
            return Ok(false);
        };
        let reactivated = vnode.component_instance().is_some() && vnode.keep_alive();
        options
            .hooks
            .init(vnode, false)
            .map_err(|cause| PatchError::ComponentInit {
                tag: component_tag(vnode),
                cause,
            })?;
        if vnode.component_instance().is_some() {
            self.init_component(vnode, queue);
            self.insert(parent, vnode.elm(), ref_elm);
            if reactivated {
                tracing::trace!(tag = %component_tag(vnode), "reactivated cached component");
            }
        }
        Ok(true)
    }

    fn init_component(&self, vnode: &VNode, queue: &mut InsertQueue) {
        if let Some(pending) = vnode.take_pending_insert() {
            queue.extend(pending);
        }
        vnode.set_elm(vnode.component_instance().and_then(|i| i.root_elm()));
        if self.is_patchable(vnode) {
            self.invoke_create_hooks(vnode, queue);
        } else {
            // Empty component root: no element for modules to act on.
            queue.push(vnode.clone());
        }
    }

    fn create_children(
        &self,
        vnode: &VNode,
        children: &[VNode],
        queue: &mut InsertQueue,
    ) -> Result<()> {
        check_duplicate_keys(children);
        for (index, child) in children.iter().enumerate() {
            self.create_elm(child, queue, vnode.elm(), None, true, Some((vnode, index)))?;
        }
        Ok(())
    }

    fn invoke_create_hooks(&self, vnode: &VNode, queue: &mut InsertQueue) {
        for module in self.modules.iter() {
            module.create(vnode);
        }
        if vnode.component_options().is_some() {
            queue.push(vnode.clone());
        }
    }

    /// Whether the node (through nested component roots) ends in an element.
    fn is_patchable(&self, vnode: &VNode) -> bool {
        let mut current = vnode.clone();
        while let Some(instance) = current.component_instance() {
            match instance.root_vnode() {
                Some(root) => current = root,
                None => return false,
            }
        }
        current.tag().is_some()
    }

    fn insert(&self, parent: Option<NodeId>, elm: Option<NodeId>, ref_elm: Option<NodeId>) {
        let (Some(parent), Some(elm)) = (parent, elm) else {
            return;
        };
        match ref_elm {
            Some(reference) => {
                if self.ops.parent_node(reference) == Some(parent) {
                    self.ops.insert_before(parent, elm, reference);
                }
            }
            None => self.ops.append_child(parent, elm),
        }
    }

    fn insert_or_append(&self, parent: NodeId, elm: NodeId, reference: Option<NodeId>) {
        match reference {
            Some(reference) => self.ops.insert_before(parent, elm, reference),
            None => self.ops.append_child(parent, elm),
        }
    }

    fn add_vnodes(
        &self,
        parent: NodeId,
        ref_elm: Option<NodeId>,
        owner: &VNode,
        vnodes: &mut [VNode],
        range: std::ops::Range<usize>,
        queue: &mut InsertQueue,
    ) -> Result<()> {
        for index in range {
            let child = vnodes[index].clone();
            vnodes[index] =
                self.create_elm(&child, queue, Some(parent), ref_elm, false, Some((owner, index)))?;
        }
        Ok(())
    }

    // ─── Removal ────────────────────────────────────────────────────────

    fn remove_vnodes(&self, vnodes: &[Option<VNode>], start: usize, end: usize) {
        for child in vnodes[start..end].iter().flatten() {
            if child.is_tagged() {
                self.remove_and_invoke_remove_hook(child);
                self.invoke_destroy_hook(child);
            } else {
                self.remove_node(child.elm());
            }
        }
    }

    fn remove_and_invoke_remove_hook(&self, vnode: &VNode) {
        let mut nested = vnode.component_instance().and_then(|i| i.root_vnode());
        while let Some(root) = nested {
            if root.data().is_some() {
                for module in self.modules.iter() {
                    module.remove(&root);
                }
            }
            nested = root.component_instance().and_then(|i| i.root_vnode());
        }
        if vnode.data().is_some() {
            for module in self.modules.iter() {
                module.remove(vnode);
            }
        }
        self.remove_node(vnode.elm());
    }

    fn remove_node(&self, elm: Option<NodeId>) {
        let Some(elm) = elm else {
            return;
        };
        if let Some(parent) = self.ops.parent_node(elm) {
            self.ops.remove_child(parent, elm);
        }
    }

    fn invoke_destroy_hook(&self, vnode: &VNode) {
        if let Some(options) = vnode.component_options() {
            options.hooks.destroy(vnode);
        }
        if vnode.data().is_some() {
            for module in self.modules.iter() {
                module.destroy(vnode);
            }
        }
        if let Some(children) = vnode.children() {
            for child in &children {
                self.invoke_destroy_hook(child);
            }
        }
    }

    // ─── Patching ───────────────────────────────────────────────────────

    fn patch_vnode(
        &self,
        old: &VNode,
        vnode: &VNode,
        queue: &mut InsertQueue,
        remove_only: bool,
    ) -> Result<()> {
        if old.ptr_eq(vnode) {
            return Ok(());
        }
        let elm = old.elm();
        vnode.set_elm(elm);

        if old.is_async_placeholder() {
            match (elm, vnode.async_factory()) {
                (Some(elm), Some(factory)) if factory.is_resolved() => {
                    self.hydrate(elm, vnode, queue)?;
                }
                _ => vnode.set_async_placeholder(true),
            }
            return Ok(());
        }

        if let Some(options) = vnode.component_options() {
            options
                .hooks
                .prepatch(old, vnode)
                .map_err(|cause| PatchError::ComponentUpdate {
                    tag: component_tag(vnode),
                    cause,
                })?;
        }

        if vnode.data().is_some() && self.is_patchable(vnode) {
            for module in self.modules.iter() {
                module.update(old, vnode);
            }
        }

        if let Some(text) = vnode.text_content() {
            if old.text_content() != Some(text) {
                if let Some(elm) = elm {
                    self.ops.set_text_content(elm, text);
                }
            }
            return Ok(());
        }

        let Some(elm) = elm else {
            return Ok(());
        };
        match (old.children(), vnode.children()) {
            (Some(old_ch), Some(new_ch)) => {
                self.update_children(elm, old_ch, vnode, new_ch, queue, remove_only)?;
            }
            (None, Some(mut new_ch)) => {
                check_duplicate_keys(&new_ch);
                let len = new_ch.len();
                self.add_vnodes(elm, None, vnode, &mut new_ch, 0..len, queue)?;
            }
            (Some(old_ch), None) => {
                let old_ch: Vec<Option<VNode>> = old_ch.into_iter().map(Some).collect();
                self.remove_vnodes(&old_ch, 0, old_ch.len());
            }
            (None, None) => {}
        }
        Ok(())
    }

    /// Four-pointer children diff. End indices are exclusive.
    fn update_children(
        &self,
        parent_elm: NodeId,
        old: Vec<VNode>,
        owner: &VNode,
        mut new_ch: Vec<VNode>,
        queue: &mut InsertQueue,
        remove_only: bool,
    ) -> Result<()> {
        let can_move = !remove_only;
        check_duplicate_keys(&new_ch);

        let mut old_ch: Vec<Option<VNode>> = old.into_iter().map(Some).collect();
        let (mut old_start, mut old_end) = (0, old_ch.len());
        let (mut new_start, mut new_end) = (0, new_ch.len());
        let mut key_index: Option<AHashMap<Key, usize>> = None;

        while old_start < old_end && new_start < new_end {
            let Some(old_start_v) = old_ch[old_start].clone() else {
                old_start += 1;
                continue;
            };
            let Some(old_end_v) = old_ch[old_end - 1].clone() else {
                old_end -= 1;
                continue;
            };
            let new_start_v = new_ch[new_start].clone();
            let new_end_v = new_ch[new_end - 1].clone();

            if same_vnode(&old_start_v, &new_start_v) {
                self.patch_vnode(&old_start_v, &new_start_v, queue, remove_only)?;
                old_start += 1;
                new_start += 1;
            } else if same_vnode(&old_end_v, &new_end_v) {
                self.patch_vnode(&old_end_v, &new_end_v, queue, remove_only)?;
                old_end -= 1;
                new_end -= 1;
            } else if same_vnode(&old_start_v, &new_end_v) {
                // Moved right.
                self.patch_vnode(&old_start_v, &new_end_v, queue, remove_only)?;
                if can_move {
                    if let Some(moved) = old_start_v.elm() {
                        let after = old_end_v.elm().and_then(|e| self.ops.next_sibling(e));
                        self.insert_or_append(parent_elm, moved, after);
                    }
                }
                old_start += 1;
                new_end -= 1;
            } else if same_vnode(&old_end_v, &new_start_v) {
                // Moved left.
                self.patch_vnode(&old_end_v, &new_start_v, queue, remove_only)?;
                if can_move {
                    if let Some(moved) = old_end_v.elm() {
                        self.insert_or_append(parent_elm, moved, old_start_v.elm());
                    }
                }
                old_end -= 1;
                new_start += 1;
            } else {
                let found = new_start_v.key().and_then(|key| {
                    key_index
                        .get_or_insert_with(|| key_to_old_index(&old_ch, old_start, old_end))
                        .get(key)
                        .copied()
                });
                let candidate = found.and_then(|i| old_ch[i].clone().map(|v| (i, v)));
                match candidate {
                    Some((index, to_move)) if same_vnode(&to_move, &new_start_v) => {
                        self.patch_vnode(&to_move, &new_start_v, queue, remove_only)?;
                        old_ch[index] = None;
                        if can_move {
                            if let Some(moved) = to_move.elm() {
                                self.insert_or_append(parent_elm, moved, old_start_v.elm());
                            }
                        }
                    }
                    _ => {
                        new_ch[new_start] = self.create_elm(
                            &new_start_v,
                            queue,
                            Some(parent_elm),
                            old_start_v.elm(),
                            false,
                            Some((owner, new_start)),
                        )?;
                    }
                }
                new_start += 1;
            }
        }

        if old_start >= old_end {
            let ref_elm = new_ch.get(new_end).and_then(VNode::elm);
            self.add_vnodes(parent_elm, ref_elm, owner, &mut new_ch, new_start..new_end, queue)?;
        } else if new_start >= new_end {
            self.remove_vnodes(&old_ch, old_start, old_end);
        }
        Ok(())
    }

    fn invoke_insert_hook(&self, vnode: &VNode, queue: InsertQueue, initial: bool) {
        if initial {
            if let Some(placeholder) = vnode.parent() {
                placeholder.set_pending_insert(queue);
                return;
            }
        }
        for inserted in &queue {
            if let Some(options) = inserted.component_options() {
                options.hooks.insert(inserted);
            }
        }
    }

    // ─── Hydration ──────────────────────────────────────────────────────

    /// Adopt existing host content for `vnode`. Returns false on mismatch.
    fn hydrate(&self, elm: NodeId, vnode: &VNode, queue: &mut InsertQueue) -> Result<bool> {
        if vnode.is_comment() && vnode.async_factory().is_some() {
            vnode.set_elm(Some(elm));
            vnode.set_async_placeholder(true);
            return Ok(true);
        }
        if !self.node_matches(elm, vnode) {
            return Ok(false);
        }
        vnode.set_elm(Some(elm));

        if let Some(options) = vnode.component_options() {
            options
                .hooks
                .init(vnode, true)
                .map_err(|cause| PatchError::ComponentInit {
                    tag: component_tag(vnode),
                    cause,
                })?;
            if vnode.component_instance().is_some() {
                self.init_component(vnode, queue);
                return Ok(true);
            }
        }

        match vnode.kind() {
            VNodeKind::Element { .. } => {
                if let Some(children) = vnode.children() {
                    if self.ops.first_child(elm).is_none() {
                        self.create_children(vnode, &children, queue)?;
                    } else if !self.hydrate_children(elm, &children, queue)? {
                        debug::warn("Mismatching childNodes vs. VNodes during hydration.", None);
                        return Ok(false);
                    }
                }
                if vnode.data().is_some() {
                    self.invoke_create_hooks(vnode, queue);
                }
            }
            VNodeKind::Text { text } => {
                if self.ops.text_content(elm).as_deref() != Some(&**text) {
                    self.ops.set_text_content(elm, text);
                }
            }
            _ => {}
        }
        Ok(true)
    }

    fn hydrate_children(
        &self,
        elm: NodeId,
        children: &[VNode],
        queue: &mut InsertQueue,
    ) -> Result<bool> {
        let mut cursor = self.ops.first_child(elm);
        for child in children {
            let Some(node) = cursor else {
                return Ok(false);
            };
            if !self.hydrate(node, child, queue)? {
                return Ok(false);
            }
            cursor = self.ops.next_sibling(node);
        }
        Ok(cursor.is_none())
    }

    fn node_matches(&self, elm: NodeId, vnode: &VNode) -> bool {
        let Some(kind) = self.ops.kind(elm) else {
            return false;
        };
        match (vnode.kind(), kind) {
            (VNodeKind::Component(_), _) => true,
            (VNodeKind::Element { tag }, HostNodeKind::Element(host)) => {
                tag.eq_ignore_ascii_case(&host)
            }
            (VNodeKind::Text { .. }, HostNodeKind::Text)
            | (VNodeKind::Comment { .. }, HostNodeKind::Comment) => true,
            _ => false,
        }
    }
}

fn key_to_old_index(old: &[Option<VNode>], start: usize, end: usize) -> AHashMap<Key, usize> {
    let mut map = AHashMap::new();
    for (index, child) in old.iter().enumerate().take(end).skip(start) {
        if let Some(key) = child.as_ref().and_then(VNode::key) {
            map.insert(key.clone(), index);
        }
    }
    map
}

fn check_duplicate_keys(children: &[VNode]) {
    let mut seen = AHashSet::new();
    for child in children {
        if let Some(key) = child.key() {
            if !seen.insert(key.clone()) {
                debug::warn(
                    &format!("Duplicate keys detected: '{key}'. This may cause an update error."),
                    None,
                );
            }
        }
    }
}
