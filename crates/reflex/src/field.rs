//! Reading and clearing form fields by kind.

use reflex_dom::selector::quote_attr_value;
use reflex_dom::{Dom, FieldEvent};

use crate::value::FieldValue;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Checkbox,
    Radio,
    MultiSelect,
    SingleSelect,
    /// Text-like inputs, textareas, and anything unrecognized.
    Text,
}

impl FieldKind {
    pub fn of<D: Dom>(dom: &D, node: &D::Node) -> Self {
        match dom.tag_name(node).as_str() {
            "input" => {
                let input_type = dom.attribute(node, "type").unwrap_or_default();
                match input_type.to_ascii_lowercase().as_str() {
                    "checkbox" => FieldKind::Checkbox,
                    "radio" => FieldKind::Radio,
                    _ => FieldKind::Text,
                }
            }
            "select" if dom.attribute(node, "multiple").is_some() => FieldKind::MultiSelect,
            "select" => FieldKind::SingleSelect,
            _ => FieldKind::Text,
        }
    }
}

/// Members of the radio group `radio` belongs to, `radio` alone if unnamed.
fn radio_group<D: Dom>(dom: &D, radio: &D::Node) -> Vec<D::Node> {
    match dom.attribute(radio, "name").filter(|name| !name.is_empty()) {
        Some(name) => {
            let group = dom.query_all(&format!("input[type=radio][name={}]", quote_attr_value(&name)));
            if group.is_empty() { vec![radio.clone()] } else { group }
        }
        None => vec![radio.clone()],
    }
}

/// Coerced reading of `node`. Total: every field kind yields a value.
pub fn read_value<D: Dom>(dom: &D, node: &D::Node) -> FieldValue {
    match FieldKind::of(dom, node) {
        FieldKind::Checkbox => FieldValue::Bool(dom.checked(node)),
        FieldKind::Radio => radio_group(dom, node)
            .iter()
            .find(|member| dom.checked(member))
            .map(|member| FieldValue::coerce(&dom.value(member)))
            .unwrap_or_else(FieldValue::empty),
        FieldKind::MultiSelect => FieldValue::List(
            dom.options(node)
                .iter()
                .filter(|option| dom.is_selected(option))
                .map(|option| FieldValue::coerce(&dom.value(option)))
                .collect(),
        ),
        FieldKind::SingleSelect | FieldKind::Text => FieldValue::coerce(&dom.value(node)),
    }
}

/// Reset `node` to its kind's empty state, then fire one `change` and one
/// `input` at it so other listeners see the clearing.
pub fn clear_value<D: Dom>(dom: &D, node: &D::Node) {
    match FieldKind::of(dom, node) {
        FieldKind::Checkbox => dom.set_checked(node, false),
        FieldKind::Radio => {
            for member in radio_group(dom, node) {
                dom.set_checked(&member, false);
            }
        }
        FieldKind::MultiSelect => {
            for option in dom.options(node) {
                dom.set_selected(&option, false);
            }
        }
        FieldKind::SingleSelect => dom.clear_selection(node),
        FieldKind::Text => dom.set_value(node, ""),
    }
    dom.dispatch(node, FieldEvent::Change);
    dom.dispatch(node, FieldEvent::Input);
}

#[cfg(test)]
mod tests {
    use super::*;
    use reflex_dom::{MemoryDom, NodeId};

    fn form() -> (MemoryDom, NodeId) {
        let dom = MemoryDom::new();
        let form = dom.create_element(dom.body(), "form", &[]);
        (dom, form)
    }

    #[test]
    fn test_kind_classification() {
        let (dom, form) = form();
        let cases = [
            (dom.create_element(form, "input", &[("type", "CheckBox")]), FieldKind::Checkbox),
            (dom.create_element(form, "input", &[("type", "radio")]), FieldKind::Radio),
            (dom.create_element(form, "input", &[("type", "number")]), FieldKind::Text),
            (dom.create_element(form, "input", &[]), FieldKind::Text),
            (dom.create_element(form, "textarea", &[]), FieldKind::Text),
            (dom.create_element(form, "select", &[("multiple", "")]), FieldKind::MultiSelect),
            (dom.create_element(form, "select", &[]), FieldKind::SingleSelect),
        ];
        for (node, kind) in cases {
            assert_eq!(FieldKind::of(&dom, &node), kind);
        }
    }

    #[test]
    fn test_read_scalars() {
        let (dom, form) = form();
        let number = dom.create_element(form, "input", &[("value", "42")]);
        let text = dom.create_element(form, "textarea", &[]);
        dom.set_value(&text, "  abc ");
        let negative = dom.create_element(form, "input", &[("value", "-7")]);
        let checkbox = dom.create_element(form, "input", &[("type", "checkbox"), ("checked", "")]);

        assert_eq!(read_value(&dom, &number), FieldValue::Int(42));
        assert_eq!(read_value(&dom, &text), FieldValue::Text("abc".into()));
        assert_eq!(read_value(&dom, &negative), FieldValue::Int(-7));
        assert_eq!(read_value(&dom, &checkbox), FieldValue::Bool(true));
    }

    #[test]
    fn test_read_radio_group_from_any_member() {
        let (dom, form) = form();
        let first = dom.create_element(form, "input", &[("type", "radio"), ("name", "size"), ("value", "1")]);
        let second = dom.create_element(form, "input", &[("type", "radio"), ("name", "size"), ("value", "2")]);

        assert_eq!(read_value(&dom, &first), FieldValue::empty());
        dom.set_checked(&second, true);
        assert_eq!(read_value(&dom, &first), FieldValue::Int(2));
        assert_eq!(read_value(&dom, &second), FieldValue::Int(2));
    }

    #[test]
    fn test_read_selects() {
        let (dom, form) = form();
        let multi = dom.create_element(form, "select", &[("multiple", "")]);
        let a = dom.create_element(multi, "option", &[("value", "a")]);
        let b = dom.create_element(multi, "option", &[("value", "3")]);
        assert_eq!(read_value(&dom, &multi), FieldValue::List(vec![]));
        dom.set_selected(&a, true);
        dom.set_selected(&b, true);
        assert_eq!(
            read_value(&dom, &multi),
            FieldValue::List(vec![FieldValue::from("a"), FieldValue::Int(3)])
        );

        let single = dom.create_element(form, "select", &[]);
        dom.create_element(single, "option", &[("value", "10"), ("selected", "")]);
        assert_eq!(read_value(&dom, &single), FieldValue::Int(10));
    }

    #[test]
    fn test_clear_each_kind() {
        let (dom, form) = form();
        let checkbox = dom.create_element(form, "input", &[("type", "checkbox"), ("checked", "")]);
        let radio_a = dom.create_element(form, "input", &[("type", "radio"), ("name", "r"), ("checked", "")]);
        let radio_b = dom.create_element(form, "input", &[("type", "radio"), ("name", "r")]);
        let multi = dom.create_element(form, "select", &[("multiple", "")]);
        dom.create_element(multi, "option", &[("value", "x"), ("selected", "")]);
        dom.create_element(multi, "option", &[("value", "y"), ("selected", "")]);
        let single = dom.create_element(form, "select", &[]);
        dom.create_element(single, "option", &[("value", "1"), ("selected", "")]);
        let text = dom.create_element(form, "input", &[("value", "hello")]);

        for node in [checkbox, radio_b, multi, single, text] {
            clear_value(&dom, &node);
        }

        assert!(!dom.checked(&checkbox));
        assert!(!dom.checked(&radio_a));
        assert_eq!(read_value(&dom, &multi), FieldValue::List(vec![]));
        assert_eq!(dom.value(&single), "");
        assert_eq!(dom.value(&text), "");
    }

    #[test]
    fn test_clear_fires_change_then_input_once() {
        let (dom, form) = form();
        let text = dom.create_element(form, "input", &[("value", "hello")]);
        clear_value(&dom, &text);
        assert_eq!(dom.dispatched_at(text), vec![FieldEvent::Change, FieldEvent::Input]);
    }
}
