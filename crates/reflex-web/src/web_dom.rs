//! [`Dom`] over the real browser document.

use std::cell::RefCell;
use std::rc::Rc;

use reflex_dom::{Dom, DomError, FieldEvent, MutationWatch};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{
    Document, Element, Event, EventInit, HtmlElement, HtmlInputElement, HtmlOptionElement,
    HtmlSelectElement, HtmlTextAreaElement, MutationObserver, MutationObserverInit, NodeList,
};

pub(crate) fn describe_js(value: &JsValue) -> String {
    if let Some(error) = value.dyn_ref::<js_sys::Error>() {
        return String::from(error.message());
    }
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}

fn js_error(value: JsValue) -> DomError {
    DomError::Js(describe_js(&value))
}

fn elements(list: NodeList) -> Vec<Element> {
    (0..list.length())
        .filter_map(|index| list.get(index))
        .filter_map(|node| node.dyn_into::<Element>().ok())
        .collect()
}

/// Handle to a browser `Document`.
#[derive(Clone, Debug)]
pub struct WebDom {
    document: Document,
}

impl WebDom {
    pub fn new(document: Document) -> Self {
        Self { document }
    }

    /// The current window's document, if there is one.
    pub fn from_window() -> Option<Self> {
        web_sys::window()?.document().map(Self::new)
    }

    pub fn document(&self) -> &Document {
        &self.document
    }
}

impl Dom for WebDom {
    type Node = Element;
    type Observer = WebObserver;

    fn try_query_all_within(
        &self,
        scope: Option<&Element>,
        selector: &str,
    ) -> Result<Vec<Element>, DomError> {
        let list = match scope {
            Some(scope) => scope.query_selector_all(selector),
            None => self.document.query_selector_all(selector),
        };
        list.map(elements).map_err(js_error)
    }

    fn parent(&self, node: &Element) -> Option<Element> {
        node.parent_element()
    }

    fn tag_name(&self, node: &Element) -> String {
        node.tag_name().to_ascii_lowercase()
    }

    fn attribute(&self, node: &Element, name: &str) -> Option<String> {
        node.get_attribute(name)
    }

    fn set_attribute(&self, node: &Element, name: &str, value: &str) {
        if let Err(error) = node.set_attribute(name, value) {
            tracing::debug!("set_attribute({name}) failed: {}", describe_js(&error));
        }
    }

    fn remove_attribute(&self, node: &Element, name: &str) {
        let _ = node.remove_attribute(name);
    }

    fn set_displayed(&self, node: &Element, displayed: bool) {
        let Some(element) = node.dyn_ref::<HtmlElement>() else {
            return;
        };
        let style = element.style();
        let _ = if displayed {
            style.remove_property("display").map(drop)
        } else {
            style.set_property("display", "none")
        };
    }

    fn checked(&self, node: &Element) -> bool {
        node.dyn_ref::<HtmlInputElement>()
            .is_some_and(HtmlInputElement::checked)
    }

    fn set_checked(&self, node: &Element, checked: bool) {
        if let Some(input) = node.dyn_ref::<HtmlInputElement>() {
            input.set_checked(checked);
        }
    }

    fn value(&self, node: &Element) -> String {
        if let Some(input) = node.dyn_ref::<HtmlInputElement>() {
            input.value()
        } else if let Some(select) = node.dyn_ref::<HtmlSelectElement>() {
            select.value()
        } else if let Some(textarea) = node.dyn_ref::<HtmlTextAreaElement>() {
            textarea.value()
        } else if let Some(option) = node.dyn_ref::<HtmlOptionElement>() {
            option.value()
        } else {
            node.get_attribute("value").unwrap_or_default()
        }
    }

    fn set_value(&self, node: &Element, value: &str) {
        if let Some(input) = node.dyn_ref::<HtmlInputElement>() {
            input.set_value(value);
        } else if let Some(select) = node.dyn_ref::<HtmlSelectElement>() {
            select.set_value(value);
        } else if let Some(textarea) = node.dyn_ref::<HtmlTextAreaElement>() {
            textarea.set_value(value);
        } else if let Some(option) = node.dyn_ref::<HtmlOptionElement>() {
            option.set_value(value);
        }
    }

    fn options(&self, select: &Element) -> Vec<Element> {
        let Some(select) = select.dyn_ref::<HtmlSelectElement>() else {
            return Vec::new();
        };
        let options = select.options();
        (0..options.length())
            .filter_map(|index| options.item(index))
            .collect()
    }

    fn is_selected(&self, option: &Element) -> bool {
        option
            .dyn_ref::<HtmlOptionElement>()
            .is_some_and(HtmlOptionElement::selected)
    }

    fn set_selected(&self, option: &Element, selected: bool) {
        if let Some(option) = option.dyn_ref::<HtmlOptionElement>() {
            option.set_selected(selected);
        }
    }

    fn clear_selection(&self, select: &Element) {
        if let Some(select) = select.dyn_ref::<HtmlSelectElement>() {
            select.set_selected_index(-1);
        }
    }

    fn listen(&self, node: &Element, event: FieldEvent, callback: Rc<dyn Fn()>) {
        let closure = Closure::<dyn Fn()>::new(move || callback());
        match node.add_event_listener_with_callback(event.name(), closure.as_ref().unchecked_ref()) {
            // No teardown: the listener lives as long as the page.
            Ok(()) => closure.forget(),
            Err(error) => tracing::debug!("addEventListener({}) failed: {}", event.name(), describe_js(&error)),
        }
    }

    fn dispatch(&self, node: &Element, event: FieldEvent) {
        let init = EventInit::new();
        init.set_bubbles(true);
        match Event::new_with_event_init_dict(event.name(), &init) {
            Ok(synthetic) => {
                let _ = node.dispatch_event(&synthetic);
            }
            Err(error) => tracing::debug!("new Event({}) failed: {}", event.name(), describe_js(&error)),
        }
    }

    fn ensure_style(&self, id: &str, css: &str) {
        if self.document.get_element_by_id(id).is_some() {
            return;
        }
        let Ok(style) = self.document.create_element("style") else {
            return;
        };
        style.set_id(id);
        style.set_text_content(Some(css));
        let parent: Option<Element> = match self.document.head() {
            Some(head) => Some(head.into()),
            None => self.document.document_element(),
        };
        if let Some(parent) = parent {
            let _ = parent.append_child(&style);
        }
    }

    fn observe_subtree(&self, callback: Rc<dyn Fn()>) -> WebObserver {
        let Some(body) = self.document.body() else {
            tracing::debug!("no document body to observe");
            return WebObserver::detached();
        };
        // Owned by JS from here on, so it lives exactly as long as the observer.
        let notify: js_sys::Function = Closure::<dyn Fn()>::new(move || callback())
            .into_js_value()
            .unchecked_into();
        let observer = match MutationObserver::new(&notify) {
            Ok(observer) => observer,
            Err(error) => {
                tracing::debug!("MutationObserver unavailable: {}", describe_js(&error));
                return WebObserver::detached();
            }
        };
        let init = MutationObserverInit::new();
        init.set_child_list(true);
        init.set_subtree(true);
        if let Err(error) = observer.observe_with_options(&body, &init) {
            tracing::debug!("observe(body) failed: {}", describe_js(&error));
            return WebObserver::detached();
        }
        WebObserver {
            observer: RefCell::new(Some(observer)),
        }
    }
}

/// A `MutationObserver` that can be disconnected any number of times.
pub struct WebObserver {
    observer: RefCell<Option<MutationObserver>>,
}

impl WebObserver {
    fn detached() -> Self {
        Self {
            observer: RefCell::new(None),
        }
    }
}

impl MutationWatch for WebObserver {
    fn disconnect(&self) {
        if let Some(observer) = self.observer.borrow_mut().take() {
            observer.disconnect();
        }
    }
}
