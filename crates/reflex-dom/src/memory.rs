//! In-memory document implementing [`Dom`].
//!
//! Nodes live in an arena and are never freed; removing a subtree only
//! detaches it, so stale [`NodeId`]s stay valid handles that queries no
//! longer return. Child-list changes under `body` mark the mutation queue
//! dirty and [`MemoryDom::flush_mutations`] stands in for the browser's
//! microtask checkpoint.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::selector::{Selector, SelectorHost};
use crate::{Dom, DomError, FieldEvent, MutationWatch};

/// Runaway guard for observers that keep mutating the tree.
const MAX_FLUSH_ROUNDS: usize = 64;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

struct NodeData {
    tag: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    attrs: BTreeMap<String, String>,
    text: String,
    value: String,
    checked: bool,
    selected: bool,
    display_none: bool,
    listeners: Vec<(FieldEvent, Rc<dyn Fn()>)>,
}

impl NodeData {
    fn new(tag: &str, parent: Option<NodeId>) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            parent,
            children: Vec::new(),
            attrs: BTreeMap::new(),
            text: String::new(),
            value: String::new(),
            checked: false,
            selected: false,
            display_none: false,
            listeners: Vec::new(),
        }
    }
}

struct ObserverSlot {
    callback: Rc<dyn Fn()>,
    connected: Cell<bool>,
}

struct Tree {
    nodes: Vec<NodeData>,
    head: NodeId,
    body: NodeId,
    mutations_pending: bool,
    observers: Vec<Rc<ObserverSlot>>,
    dispatched: Vec<(NodeId, FieldEvent)>,
}

const DOCUMENT: NodeId = NodeId(0);

impl Tree {
    fn new() -> Self {
        let mut tree = Self {
            nodes: vec![NodeData::new("#document", None)],
            head: DOCUMENT,
            body: DOCUMENT,
            mutations_pending: false,
            observers: Vec::new(),
            dispatched: Vec::new(),
        };
        let html = tree.push_node("html", DOCUMENT);
        tree.head = tree.push_node("head", html);
        tree.body = tree.push_node("body", html);
        tree
    }

    fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.0]
    }

    fn push_node(&mut self, tag: &str, parent: NodeId) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData::new(tag, Some(parent)));
        self.nodes[parent.0].children.push(id);
        id
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.node(node).parent {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }

    fn is_attached(&self, node: NodeId) -> bool {
        self.is_ancestor_or_self(DOCUMENT, node)
    }

    fn note_child_list_change(&mut self, parent: NodeId) {
        if self.is_ancestor_or_self(self.body, parent) {
            self.mutations_pending = true;
        }
    }

    /// Elements strictly below `root`, in document order.
    fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.node(root).children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.node(id).children.iter().rev().copied());
        }
        out
    }

    fn option_value(&self, option: NodeId) -> String {
        let data = self.node(option);
        data.attrs
            .get("value")
            .cloned()
            .unwrap_or_else(|| data.text.trim().to_string())
    }

    fn options(&self, select: NodeId) -> Vec<NodeId> {
        self.descendants(select)
            .into_iter()
            .filter(|id| self.node(*id).tag == "option")
            .collect()
    }

    fn is_multiple(&self, select: NodeId) -> bool {
        self.node(select).attrs.contains_key("multiple")
    }
}

impl SelectorHost for Tree {
    type Id = NodeId;

    fn parent_element(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).parent.filter(|parent| *parent != DOCUMENT)
    }

    fn tag(&self, node: NodeId) -> &str {
        &self.node(node).tag
    }

    fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.node(node).attrs.get(name).map(String::as_str)
    }
}

/// Arena-backed document: `#document > html > (head, body)`.
#[derive(Clone)]
pub struct MemoryDom {
    tree: Rc<RefCell<Tree>>,
}

impl Default for MemoryDom {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryDom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tree = self.tree.borrow();
        f.debug_struct("MemoryDom")
            .field("nodes", &tree.nodes.len())
            .field("mutations_pending", &tree.mutations_pending)
            .finish()
    }
}

impl MemoryDom {
    pub fn new() -> Self {
        Self {
            tree: Rc::new(RefCell::new(Tree::new())),
        }
    }

    pub fn body(&self) -> NodeId {
        self.tree.borrow().body
    }

    pub fn head(&self) -> NodeId {
        self.tree.borrow().head
    }

    /// Create `<tag>` as the last child of `parent`.
    ///
    /// `value`, `checked` and `selected` attributes seed the live form state
    /// the way the parser does for markup.
    pub fn create_element(&self, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let mut tree = self.tree.borrow_mut();
        let id = tree.push_node(tag, parent);
        let data = tree.node_mut(id);
        for (name, value) in attrs {
            data.attrs.insert(name.to_string(), value.to_string());
        }
        data.value = data.attrs.get("value").cloned().unwrap_or_default();
        data.checked = data.attrs.contains_key("checked");
        data.selected = data.attrs.contains_key("selected");
        tree.note_child_list_change(parent);
        id
    }

    pub fn set_text(&self, node: NodeId, text: &str) {
        self.tree.borrow_mut().node_mut(node).text = text.to_string();
    }

    /// Move an existing (possibly detached) node under `parent`.
    pub fn append(&self, parent: NodeId, node: NodeId) {
        let mut tree = self.tree.borrow_mut();
        if let Some(old_parent) = tree.node(node).parent {
            tree.node_mut(old_parent).children.retain(|child| *child != node);
            tree.note_child_list_change(old_parent);
        }
        tree.node_mut(node).parent = Some(parent);
        tree.node_mut(parent).children.push(node);
        tree.note_child_list_change(parent);
    }

    /// Detach `node` and its subtree from the document.
    pub fn remove(&self, node: NodeId) {
        let mut tree = self.tree.borrow_mut();
        let Some(parent) = tree.node(node).parent else {
            return;
        };
        tree.node_mut(parent).children.retain(|child| *child != node);
        tree.node_mut(node).parent = None;
        tree.note_child_list_change(parent);
    }

    pub fn is_attached(&self, node: NodeId) -> bool {
        self.tree.borrow().is_attached(node)
    }

    /// Whether the inline style forces `display: none`.
    pub fn is_displayed(&self, node: NodeId) -> bool {
        !self.tree.borrow().node(node).display_none
    }

    pub fn has_pending_mutations(&self) -> bool {
        self.tree.borrow().mutations_pending
    }

    /// Deliver queued child-list changes to connected observers, once per
    /// observer per round, until the tree settles.
    pub fn flush_mutations(&self) {
        for _ in 0..MAX_FLUSH_ROUNDS {
            let callbacks: Vec<Rc<dyn Fn()>> = {
                let mut tree = self.tree.borrow_mut();
                if !tree.mutations_pending {
                    return;
                }
                tree.mutations_pending = false;
                tree.observers
                    .iter()
                    .filter(|slot| slot.connected.get())
                    .map(|slot| slot.callback.clone())
                    .collect()
            };
            for callback in callbacks {
                callback();
            }
        }
        tracing::warn!("mutation flush did not settle after {MAX_FLUSH_ROUNDS} rounds");
    }

    /// Number of observers that have not been disconnected.
    pub fn connected_observers(&self) -> usize {
        self.tree
            .borrow()
            .observers
            .iter()
            .filter(|slot| slot.connected.get())
            .count()
    }

    /// Events dispatched at `node` (synthetic and test-fired), oldest first.
    pub fn dispatched_at(&self, node: NodeId) -> Vec<FieldEvent> {
        self.tree
            .borrow()
            .dispatched
            .iter()
            .filter(|(target, _)| *target == node)
            .map(|(_, event)| *event)
            .collect()
    }

    pub fn clear_dispatch_log(&self) {
        self.tree.borrow_mut().dispatched.clear();
    }

    pub fn style_element(&self, id: &str) -> Option<NodeId> {
        self.query_all(&format!("style#{id}")).into_iter().next()
    }

    pub fn text(&self, node: NodeId) -> String {
        self.tree.borrow().node(node).text.clone()
    }

    /// Simulate the user typing into `node`: new value, then `input` and `change`.
    pub fn type_value(&self, node: NodeId, value: &str) {
        self.set_value(&node, value);
        self.dispatch(&node, FieldEvent::Input);
        self.dispatch(&node, FieldEvent::Change);
    }

    /// Simulate the user clicking a checkbox or radio.
    pub fn click_check(&self, node: NodeId, checked: bool) {
        self.set_checked(&node, checked);
        self.dispatch(&node, FieldEvent::Input);
        self.dispatch(&node, FieldEvent::Change);
    }
}

impl Dom for MemoryDom {
    type Node = NodeId;
    type Observer = MemoryObserver;

    fn try_query_all_within(
        &self,
        scope: Option<&NodeId>,
        selector: &str,
    ) -> Result<Vec<NodeId>, DomError> {
        let selector = Selector::parse(selector)?;
        let tree = self.tree.borrow();
        let root = match scope {
            Some(scope) if !tree.is_attached(*scope) => return Ok(Vec::new()),
            Some(scope) => *scope,
            None => DOCUMENT,
        };
        Ok(tree
            .descendants(root)
            .into_iter()
            .filter(|id| selector.matches(&*tree, *id))
            .collect())
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.tree.borrow().parent_element(*node)
    }

    fn tag_name(&self, node: &NodeId) -> String {
        self.tree.borrow().node(*node).tag.clone()
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        self.tree.borrow().node(*node).attrs.get(name).cloned()
    }

    fn set_attribute(&self, node: &NodeId, name: &str, value: &str) {
        self.tree
            .borrow_mut()
            .node_mut(*node)
            .attrs
            .insert(name.to_string(), value.to_string());
    }

    fn remove_attribute(&self, node: &NodeId, name: &str) {
        self.tree.borrow_mut().node_mut(*node).attrs.remove(name);
    }

    fn set_displayed(&self, node: &NodeId, displayed: bool) {
        self.tree.borrow_mut().node_mut(*node).display_none = !displayed;
    }

    fn checked(&self, node: &NodeId) -> bool {
        self.tree.borrow().node(*node).checked
    }

    fn set_checked(&self, node: &NodeId, checked: bool) {
        let mut tree = self.tree.borrow_mut();
        tree.node_mut(*node).checked = checked;
        // Checking a radio unchecks the rest of its named group.
        let is_radio = tree.node(*node).attrs.get("type").map(String::as_str) == Some("radio");
        let name = tree.node(*node).attrs.get("name").cloned();
        if let (true, true, Some(name)) = (checked, is_radio, name) {
            let group: Vec<NodeId> = tree
                .descendants(DOCUMENT)
                .into_iter()
                .filter(|id| {
                    let data = tree.node(*id);
                    *id != *node
                        && data.tag == "input"
                        && data.attrs.get("type").map(String::as_str) == Some("radio")
                        && data.attrs.get("name") == Some(&name)
                })
                .collect();
            for member in group {
                tree.node_mut(member).checked = false;
            }
        }
    }

    fn value(&self, node: &NodeId) -> String {
        let tree = self.tree.borrow();
        match tree.node(*node).tag.as_str() {
            "select" => tree
                .options(*node)
                .into_iter()
                .find(|option| tree.node(*option).selected)
                .map(|option| tree.option_value(option))
                .unwrap_or_default(),
            "option" => tree.option_value(*node),
            _ => tree.node(*node).value.clone(),
        }
    }

    fn set_value(&self, node: &NodeId, value: &str) {
        let mut tree = self.tree.borrow_mut();
        if tree.node(*node).tag == "select" {
            let mut found = false;
            for option in tree.options(*node) {
                let selected = !found && tree.option_value(option) == value;
                found |= selected;
                tree.node_mut(option).selected = selected;
            }
        } else {
            tree.node_mut(*node).value = value.to_string();
        }
    }

    fn options(&self, select: &NodeId) -> Vec<NodeId> {
        self.tree.borrow().options(*select)
    }

    fn is_selected(&self, option: &NodeId) -> bool {
        self.tree.borrow().node(*option).selected
    }

    fn set_selected(&self, option: &NodeId, selected: bool) {
        let mut tree = self.tree.borrow_mut();
        // A single select keeps at most one selected option.
        if selected {
            let mut select = tree.node(*option).parent;
            while let Some(id) = select {
                if tree.node(id).tag == "select" {
                    break;
                }
                select = tree.node(id).parent;
            }
            if let Some(select) = select.filter(|select| !tree.is_multiple(*select)) {
                for other in tree.options(select) {
                    tree.node_mut(other).selected = false;
                }
            }
        }
        tree.node_mut(*option).selected = selected;
    }

    fn clear_selection(&self, select: &NodeId) {
        let mut tree = self.tree.borrow_mut();
        for option in tree.options(*select) {
            tree.node_mut(option).selected = false;
        }
    }

    fn listen(&self, node: &NodeId, event: FieldEvent, callback: Rc<dyn Fn()>) {
        self.tree
            .borrow_mut()
            .node_mut(*node)
            .listeners
            .push((event, callback));
    }

    fn dispatch(&self, node: &NodeId, event: FieldEvent) {
        let listeners: Vec<Rc<dyn Fn()>> = {
            let mut tree = self.tree.borrow_mut();
            tree.dispatched.push((*node, event));
            let mut listeners = Vec::new();
            let mut current = Some(*node);
            while let Some(id) = current {
                let data = tree.node(id);
                listeners.extend(
                    data.listeners
                        .iter()
                        .filter(|(listened, _)| *listened == event)
                        .map(|(_, callback)| callback.clone()),
                );
                current = data.parent;
            }
            listeners
        };
        // Listeners may re-enter the document, so the borrow is released first.
        for listener in listeners {
            listener();
        }
    }

    fn ensure_style(&self, id: &str, css: &str) {
        if self.style_element(id).is_some() {
            return;
        }
        let style = self.create_element(self.head(), "style", &[("id", id)]);
        self.set_text(style, css);
    }

    fn observe_subtree(&self, callback: Rc<dyn Fn()>) -> MemoryObserver {
        let slot = Rc::new(ObserverSlot {
            callback,
            connected: Cell::new(true),
        });
        self.tree.borrow_mut().observers.push(slot.clone());
        MemoryObserver { slot }
    }
}

/// Observer handle returned by [`MemoryDom::observe_subtree`].
pub struct MemoryObserver {
    slot: Rc<ObserverSlot>,
}

impl MutationWatch for MemoryObserver {
    fn disconnect(&self) {
        self.slot.connected.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> (MemoryDom, NodeId) {
        let dom = MemoryDom::new();
        let form = dom.create_element(dom.body(), "form", &[("id", "f")]);
        (dom, form)
    }

    #[test]
    fn test_queries_follow_document_order() {
        let (dom, form) = form();
        let a = dom.create_element(form, "input", &[("id", "a"), ("class", "field")]);
        let wrapper = dom.create_element(form, "div", &[]);
        let b = dom.create_element(wrapper, "input", &[("id", "b"), ("class", "field")]);
        let c = dom.create_element(form, "input", &[("id", "c"), ("class", "field")]);

        assert_eq!(dom.query_all(".field"), vec![a, b, c]);
        assert_eq!(dom.query("#b"), Some(b));
        assert_eq!(dom.query_all_within(Some(&wrapper), "input"), vec![b]);
        assert_eq!(dom.query_all_within(Some(&wrapper), "form input"), vec![b]);
    }

    #[test]
    fn test_bad_selector_degrades_to_no_match() {
        let (dom, _) = form();
        assert!(dom.try_query_all_within(None, "input:focus").is_err());
        assert!(dom.query_all("input:focus").is_empty());
    }

    #[test]
    fn test_removed_nodes_are_not_returned() {
        let (dom, form) = form();
        let a = dom.create_element(form, "input", &[("id", "a")]);
        dom.remove(form);
        assert!(!dom.is_attached(a));
        assert_eq!(dom.query("#a"), None);
        assert!(dom.query_all_within(Some(&form), "input").is_empty());
        assert_eq!(dom.parent(&a), Some(form));
    }

    #[test]
    fn test_parent_stops_at_html() {
        let (dom, form) = form();
        let html = dom.parent(&dom.body()).unwrap();
        assert_eq!(dom.tag_name(&html), "html");
        assert_eq!(dom.parent(&html), None);
        assert_eq!(dom.parent(&form), Some(dom.body()));
    }

    #[test]
    fn test_select_value_and_selection() {
        let (dom, form) = form();
        let select = dom.create_element(form, "select", &[("id", "s")]);
        let one = dom.create_element(select, "option", &[("value", "1")]);
        let two = dom.create_element(select, "option", &[]);
        dom.set_text(two, " Two ");

        assert_eq!(dom.value(&select), "");
        dom.set_selected(&one, true);
        assert_eq!(dom.value(&select), "1");
        dom.set_selected(&two, true);
        assert!(!dom.is_selected(&one));
        assert_eq!(dom.value(&select), "Two");
        dom.set_value(&select, "1");
        assert!(dom.is_selected(&one));
        dom.clear_selection(&select);
        assert_eq!(dom.value(&select), "");
    }

    #[test]
    fn test_multiple_select_keeps_several_selected() {
        let (dom, form) = form();
        let select = dom.create_element(form, "select", &[("multiple", "")]);
        let a = dom.create_element(select, "option", &[("value", "a"), ("selected", "")]);
        let b = dom.create_element(select, "option", &[("value", "b")]);
        dom.set_selected(&b, true);
        assert!(dom.is_selected(&a));
        assert!(dom.is_selected(&b));
    }

    #[test]
    fn test_checking_radio_unchecks_group() {
        let (dom, form) = form();
        let yes = dom.create_element(form, "input", &[("type", "radio"), ("name", "q"), ("checked", "")]);
        let no = dom.create_element(form, "input", &[("type", "radio"), ("name", "q")]);
        let other = dom.create_element(form, "input", &[("type", "radio"), ("name", "r"), ("checked", "")]);
        dom.set_checked(&no, true);
        assert!(!dom.checked(&yes));
        assert!(dom.checked(&no));
        assert!(dom.checked(&other));
    }

    #[test]
    fn test_dispatch_bubbles_and_allows_reentry() {
        let (dom, form) = form();
        let input = dom.create_element(form, "input", &[("id", "a")]);
        let hits = Rc::new(Cell::new(0));

        let on_input = {
            let (dom, hits) = (dom.clone(), hits.clone());
            Rc::new(move || {
                hits.set(hits.get() + 1);
                // Re-entering the document from a listener must not panic.
                dom.set_value(&input, "seen");
            })
        };
        dom.listen(&input, FieldEvent::Input, on_input);
        let on_form_change = {
            let hits = hits.clone();
            Rc::new(move || hits.set(hits.get() + 10))
        };
        dom.listen(&form, FieldEvent::Change, on_form_change);

        dom.dispatch(&input, FieldEvent::Input);
        dom.dispatch(&input, FieldEvent::Change);
        assert_eq!(hits.get(), 11);
        assert_eq!(dom.value(&input), "seen");
        assert_eq!(dom.dispatched_at(input), vec![FieldEvent::Input, FieldEvent::Change]);
    }

    #[test]
    fn test_observers_see_body_changes_once_per_flush() {
        let dom = MemoryDom::new();
        let calls = Rc::new(Cell::new(0));
        let observer = {
            let calls = calls.clone();
            dom.observe_subtree(Rc::new(move || calls.set(calls.get() + 1)))
        };

        let list = dom.create_element(dom.body(), "ul", &[]);
        dom.create_element(list, "li", &[]);
        dom.create_element(list, "li", &[]);
        dom.flush_mutations();
        assert_eq!(calls.get(), 1);

        // Attribute writes and head changes are not child-list changes under body.
        dom.set_attribute(&list, "class", "x");
        dom.ensure_style("s", "ul {}");
        dom.flush_mutations();
        assert_eq!(calls.get(), 1);

        observer.disconnect();
        observer.disconnect();
        dom.create_element(list, "li", &[]);
        dom.flush_mutations();
        assert_eq!(calls.get(), 1);
        assert_eq!(dom.connected_observers(), 0);
    }

    #[test]
    fn test_ensure_style_is_idempotent() {
        let dom = MemoryDom::new();
        dom.ensure_style("grid-css", "a {}");
        dom.ensure_style("grid-css", "b {}");
        let styles = dom.query_all("style");
        assert_eq!(styles.len(), 1);
        assert_eq!(dom.text(styles[0]), "a {}");
    }
}
