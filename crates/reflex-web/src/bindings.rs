//! JavaScript entry points.
//!
//! None of these throw: a missing document, malformed options or a broken
//! rule all degrade to defaults or no-ops, with a console warning.

use std::str::FromStr;

use js_sys::{Array, Function, Object, Reflect};
use reflex::field::read_value;
use reflex::{ConditionalFields, EvalContext, FieldOptions, FieldValue, GridConfig, GridVisibility, PredicateError, Rule};
use reflex_dom::Dom;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::level_filters::LevelFilter;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use crate::web_dom::{WebDom, describe_js};

fn noop() -> Function {
    Function::new_no_args("")
}

fn into_function(closure: Closure<dyn Fn()>) -> Function {
    closure.into_js_value().unchecked_into()
}

fn options_or_default<T: DeserializeOwned + Default>(value: JsValue, what: &str) -> T {
    if value.is_undefined() || value.is_null() {
        return T::default();
    }
    serde_wasm_bindgen::from_value(value).unwrap_or_else(|error| {
        tracing::warn!("invalid {what}, using defaults: {error}");
        T::default()
    })
}

/// Install the grid Add-button controller. Returns `dispose()`.
#[wasm_bindgen(js_name = installGridVisibility)]
pub fn install_grid_visibility(config: JsValue) -> Function {
    let Some(dom) = WebDom::from_window() else {
        tracing::warn!("installGridVisibility: no document");
        return noop();
    };
    let config: GridConfig = options_or_default(config, "grid config");
    let controller = GridVisibility::install(dom, config);
    into_function(Closure::new(move || controller.dispose()))
}

/// Install conditional field rules. Returns `reapplyAll()`.
#[wasm_bindgen(js_name = installConditionalFields)]
pub fn install_conditional_fields(rules: JsValue, options: JsValue) -> Function {
    let Some(dom) = WebDom::from_window() else {
        tracing::warn!("installConditionalFields: no document");
        return noop();
    };
    let options: FieldOptions = options_or_default(options, "field options");
    if options.log {
        crate::logging::raise_to(LevelFilter::INFO);
    }
    let rules = rules_from_js(&rules);
    let fields = ConditionalFields::install(dom, rules, options);
    into_function(Closure::new(move || {
        fields.reapply_all();
    }))
}

/// `"error" | "warn" | "info" | "debug" | "trace" | "off"`.
#[wasm_bindgen(js_name = setLogLevel)]
pub fn set_log_level(level: &str) {
    match LevelFilter::from_str(level) {
        Ok(level) => crate::logging::init(level),
        Err(_) => tracing::warn!("unknown log level `{level}`"),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuleShape {
    target: String,
    #[serde(default)]
    deps: Vec<String>,
    #[serde(default)]
    clear_on_hide: bool,
}

fn rules_from_js(rules: &JsValue) -> Vec<Rule<WebDom>> {
    if !Array::is_array(rules) {
        tracing::warn!("installConditionalFields: rules must be an array");
        return Vec::new();
    }
    Array::from(rules)
        .iter()
        .enumerate()
        .filter_map(|(index, rule)| {
            let parsed = rule_from_js(&rule);
            if let Err(reason) = &parsed {
                tracing::warn!("rule #{index} skipped: {reason}");
            }
            parsed.ok()
        })
        .collect()
}

fn rule_from_js(rule: &JsValue) -> Result<Rule<WebDom>, String> {
    let shape: RuleShape = serde_wasm_bindgen::from_value(rule.clone()).map_err(|error| error.to_string())?;
    let predicate = Reflect::get(rule, &JsValue::from_str("predicate"))
        .ok()
        .and_then(|value| value.dyn_into::<Function>().ok())
        .ok_or_else(|| PredicateError::NotAFunction.to_string())?;
    Ok(Rule::try_new(shape.target, shape.deps, move |ctx: &EvalContext<'_, WebDom>| {
        call_predicate(&predicate, ctx)
    })
    .clear_on_hide(shape.clear_on_hide))
}

fn value_to_js(value: &FieldValue) -> JsValue {
    serde_wasm_bindgen::to_value(value).unwrap_or_else(|_| JsValue::from_str(&value.to_string()))
}

/// Call a JS predicate with `{ valueOf, elementOf, targetElement }`.
///
/// The context functions are released when the call returns; a predicate
/// that stashes them and calls them later gets an exception.
fn call_predicate(predicate: &Function, ctx: &EvalContext<'_, WebDom>) -> Result<bool, PredicateError> {
    let dom = ctx.dom().clone();
    let target = ctx.target_element().clone();

    let value_of = Closure::<dyn Fn(JsValue) -> JsValue>::new({
        let dom = dom.clone();
        move |selector: JsValue| {
            let selector = selector.as_string().unwrap_or_default();
            match dom.query(&selector) {
                Some(node) => value_to_js(&read_value(&dom, &node)),
                None => value_to_js(&FieldValue::empty()),
            }
        }
    });
    let element_of = Closure::<dyn Fn(JsValue) -> JsValue>::new(move |selector: JsValue| {
        let selector = selector.as_string().unwrap_or_default();
        dom.query(&selector).map(JsValue::from).unwrap_or(JsValue::NULL)
    });

    let context = Object::new();
    let threw = |error: JsValue| PredicateError::Threw(describe_js(&error));
    Reflect::set(&context, &JsValue::from_str("valueOf"), value_of.as_ref()).map_err(threw)?;
    Reflect::set(&context, &JsValue::from_str("elementOf"), element_of.as_ref()).map_err(threw)?;
    Reflect::set(&context, &JsValue::from_str("targetElement"), &target).map_err(threw)?;

    predicate
        .call1(&JsValue::NULL, &context)
        .map(|decision| decision.is_truthy())
        .map_err(threw)
}
