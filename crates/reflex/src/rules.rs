//! Declarative show/hide rules and the context their predicates see.

use std::fmt;
use std::rc::Rc;

use reflex_dom::Dom;
use serde::Deserialize;
use thiserror::Error;

use crate::field::read_value;
use crate::value::FieldValue;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PredicateError {
    #[error("predicate threw: {0}")]
    Threw(String),
    #[error("predicate is not callable")]
    NotAFunction,
}

pub type Predicate<D> = dyn Fn(&EvalContext<'_, D>) -> Result<bool, PredicateError>;

/// What a predicate may look at: fresh reads of the live document plus the
/// already-resolved target.
pub struct EvalContext<'a, D: Dom> {
    dom: &'a D,
    target: &'a D::Node,
}

impl<'a, D: Dom> EvalContext<'a, D> {
    pub fn new(dom: &'a D, target: &'a D::Node) -> Self {
        Self { dom, target }
    }

    /// Coerced value of the first element matching `selector`; the empty
    /// reading when nothing matches.
    pub fn value_of(&self, selector: &str) -> FieldValue {
        match self.dom.query(selector) {
            Some(node) => read_value(self.dom, &node),
            None => FieldValue::empty(),
        }
    }

    pub fn element_of(&self, selector: &str) -> Option<D::Node> {
        self.dom.query(selector)
    }

    pub fn target_element(&self) -> &D::Node {
        self.target
    }

    pub fn dom(&self) -> &D {
        self.dom
    }
}

/// One field's visibility rule. Immutable once installed.
pub struct Rule<D: Dom> {
    pub target: String,
    pub deps: Vec<String>,
    pub clear_on_hide: bool,
    predicate: Rc<Predicate<D>>,
}

impl<D: Dom> Clone for Rule<D> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            deps: self.deps.clone(),
            clear_on_hide: self.clear_on_hide,
            predicate: self.predicate.clone(),
        }
    }
}

impl<D: Dom> fmt::Debug for Rule<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("target", &self.target)
            .field("deps", &self.deps)
            .field("clear_on_hide", &self.clear_on_hide)
            .finish_non_exhaustive()
    }
}

impl<D: Dom> Rule<D> {
    pub fn new<I, S>(
        target: impl Into<String>,
        deps: I,
        predicate: impl Fn(&EvalContext<'_, D>) -> bool + 'static,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::try_new(target, deps, move |ctx: &EvalContext<'_, D>| Ok(predicate(ctx)))
    }

    /// A rule whose predicate can fail; a failure skips only this rule.
    pub fn try_new<I, S>(
        target: impl Into<String>,
        deps: I,
        predicate: impl Fn(&EvalContext<'_, D>) -> Result<bool, PredicateError> + 'static,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            target: target.into(),
            deps: deps.into_iter().map(Into::into).collect(),
            clear_on_hide: false,
            predicate: Rc::new(predicate),
        }
    }

    pub fn clear_on_hide(mut self, clear: bool) -> Self {
        self.clear_on_hide = clear;
        self
    }

    pub fn decide(&self, ctx: &EvalContext<'_, D>) -> Result<bool, PredicateError> {
        (self.predicate)(ctx)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FieldOptions {
    /// Parent hops from a target to the wrapper that is shown or hidden.
    pub container_depth: usize,
    pub log: bool,
}

impl Default for FieldOptions {
    fn default() -> Self {
        Self {
            container_depth: 3,
            log: false,
        }
    }
}

impl FieldOptions {
    pub fn container_depth(mut self, depth: usize) -> Self {
        self.container_depth = depth;
        self
    }

    pub fn log(mut self, log: bool) -> Self {
        self.log = log;
        self
    }
}
