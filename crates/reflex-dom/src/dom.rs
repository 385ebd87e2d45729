//! The [`Dom`] trait.
//!
//! The host page owns every node. Implementations hand out node handles
//! that may go stale at any yield point, so callers re-query instead of
//! holding on to them between ticks.

use std::fmt::Debug;
use std::rc::Rc;

use crate::DomError;

/// Events the engines listen for and synthesize on form fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldEvent {
    Input,
    Change,
}

impl FieldEvent {
    pub const ALL: [FieldEvent; 2] = [FieldEvent::Input, FieldEvent::Change];

    pub fn name(self) -> &'static str {
        match self {
            FieldEvent::Input => "input",
            FieldEvent::Change => "change",
        }
    }
}

/// Handle returned by [`Dom::observe_subtree`].
pub trait MutationWatch {
    /// Stop delivering notifications. Safe to call any number of times.
    fn disconnect(&self);
}

/// A live document the engines read from and write to.
///
/// Cloning is cheap and yields another handle to the same document.
pub trait Dom: Clone + 'static {
    type Node: Clone + PartialEq + Debug + 'static;
    type Observer: MutationWatch + 'static;

    /// All elements matching `selector`, in document order.
    ///
    /// With a `scope`, only descendants of that element are candidates, but
    /// the selector is still matched against the whole document (the
    /// `Element.querySelectorAll` rule).
    fn try_query_all_within(
        &self,
        scope: Option<&Self::Node>,
        selector: &str,
    ) -> Result<Vec<Self::Node>, DomError>;

    /// Parent element, `None` at the top element.
    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Lower-case tag name.
    fn tag_name(&self, node: &Self::Node) -> String;

    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;
    fn set_attribute(&self, node: &Self::Node, name: &str, value: &str);
    fn remove_attribute(&self, node: &Self::Node, name: &str);

    /// `true` resets the inline `display` so the stylesheet decides,
    /// `false` forces `display: none`.
    fn set_displayed(&self, node: &Self::Node, displayed: bool);

    fn checked(&self, node: &Self::Node) -> bool;
    fn set_checked(&self, node: &Self::Node, checked: bool);

    /// Current value of an input, textarea, select or option.
    fn value(&self, node: &Self::Node) -> String;
    fn set_value(&self, node: &Self::Node, value: &str);

    /// Option elements of a select, in order.
    fn options(&self, select: &Self::Node) -> Vec<Self::Node>;
    fn is_selected(&self, option: &Self::Node) -> bool;
    fn set_selected(&self, option: &Self::Node, selected: bool);
    /// Leave a select with no selected option.
    fn clear_selection(&self, select: &Self::Node);

    /// Attach `callback` for `event` on `node` for the lifetime of the page.
    fn listen(&self, node: &Self::Node, event: FieldEvent, callback: Rc<dyn Fn()>);
    /// Fire a synthetic, bubbling `event` at `node`.
    fn dispatch(&self, node: &Self::Node, event: FieldEvent);

    /// Insert a style block identified by `id` unless one already exists.
    fn ensure_style(&self, id: &str, css: &str);

    /// Call `callback` after child-list changes anywhere under the body.
    fn observe_subtree(&self, callback: Rc<dyn Fn()>) -> Self::Observer;

    fn query_all_within(&self, scope: Option<&Self::Node>, selector: &str) -> Vec<Self::Node> {
        match self.try_query_all_within(scope, selector) {
            Ok(nodes) => nodes,
            Err(error) => {
                tracing::debug!("query `{selector}` matched nothing: {error}");
                Vec::new()
            }
        }
    }

    fn query_all(&self, selector: &str) -> Vec<Self::Node> {
        self.query_all_within(None, selector)
    }

    fn query(&self, selector: &str) -> Option<Self::Node> {
        self.query_all(selector).into_iter().next()
    }
}
