//! Conditional form fields.
//!
//! Each rule is a stateless function of the live document: resolve the
//! target, ask the predicate, show or hide the target's container, and
//! clear the target when it is hidden and the rule asks for it. Listeners
//! on a rule's dependencies re-run just that rule.

use std::cell::Cell;
use std::rc::Rc;

use reflex_dom::{Dom, FieldEvent};

use crate::field::clear_value;
use crate::rules::{EvalContext, FieldOptions, Rule};

/// Outcome of evaluating one rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Evaluation {
    Shown,
    Hidden { cleared: bool },
    /// The target selector matched nothing.
    MissingTarget,
    /// The predicate failed; the container was left as it was.
    Failed,
    /// The rule is already being evaluated further up the stack; that
    /// evaluation runs it again once it finishes.
    Reentrant,
}

/// Cap on deferred re-evaluations of one rule, for rules that keep clearing
/// each other's dependencies.
const MAX_RERUNS: usize = 8;

/// The ancestor `depth` parent hops above `target`, stopping at the top
/// element if the chain is shorter.
pub fn container_of<D: Dom>(dom: &D, target: &D::Node, depth: usize) -> D::Node {
    let mut container = target.clone();
    for _ in 0..depth {
        match dom.parent(&container) {
            Some(parent) => container = parent,
            None => break,
        }
    }
    container
}

struct Engine<D: Dom> {
    dom: D,
    rules: Vec<Rule<D>>,
    options: FieldOptions,
    // Per rule: on the stack, and re-entered while on the stack.
    evaluating: Vec<Cell<bool>>,
    rerun: Vec<Cell<bool>>,
}

impl<D: Dom> Engine<D> {
    fn evaluate(&self, index: usize) -> Evaluation {
        let rule = &self.rules[index];
        let busy = &self.evaluating[index];
        let rerun = &self.rerun[index];
        if busy.replace(true) {
            rerun.set(true);
            self.trace(format_args!("rule `{}` re-entered, deferred", rule.target));
            return Evaluation::Reentrant;
        }
        let mut outcome = self.apply(rule);
        let mut reruns = 0;
        while rerun.replace(false) {
            if reruns == MAX_RERUNS {
                if self.options.log {
                    tracing::warn!("rule `{}` did not settle after {MAX_RERUNS} reruns", rule.target);
                }
                break;
            }
            reruns += 1;
            outcome = self.apply(rule);
        }
        busy.set(false);
        outcome
    }

    fn apply(&self, rule: &Rule<D>) -> Evaluation {
        let Some(target) = self.dom.query(&rule.target) else {
            self.trace(format_args!("target `{}` not found, skipped", rule.target));
            return Evaluation::MissingTarget;
        };
        let show = match rule.decide(&EvalContext::new(&self.dom, &target)) {
            Ok(show) => show,
            Err(error) => {
                if self.options.log {
                    tracing::warn!("rule `{}`: {error}", rule.target);
                }
                return Evaluation::Failed;
            }
        };

        let container = container_of(&self.dom, &target, self.options.container_depth);
        self.dom.set_displayed(&container, show);
        if show {
            self.trace(format_args!("`{}` shown", rule.target));
            return Evaluation::Shown;
        }
        if rule.clear_on_hide {
            clear_value(&self.dom, &target);
        }
        self.trace(format_args!(
            "`{}` hidden{}",
            rule.target,
            if rule.clear_on_hide { " and cleared" } else { "" }
        ));
        Evaluation::Hidden {
            cleared: rule.clear_on_hide,
        }
    }

    fn reapply_all(&self) -> Vec<Evaluation> {
        (0..self.rules.len()).map(|index| self.evaluate(index)).collect()
    }

    fn trace(&self, message: std::fmt::Arguments<'_>) {
        if self.options.log {
            tracing::info!("{message}");
        }
    }
}

/// Installed conditional-field engine.
///
/// There is no teardown: dependency listeners hold the engine and live as
/// long as the page. Cloning yields another handle to the same engine.
pub struct ConditionalFields<D: Dom> {
    engine: Rc<Engine<D>>,
}

impl<D: Dom> Clone for ConditionalFields<D> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
        }
    }
}

impl<D: Dom> ConditionalFields<D> {
    /// Wire `input`/`change` listeners on every dependency that resolves now,
    /// then evaluate every rule once.
    ///
    /// Dependencies that match nothing are skipped; a rule left without any
    /// is evaluated at install and afterwards only through
    /// [`reapply_all`](Self::reapply_all).
    pub fn install(dom: D, rules: Vec<Rule<D>>, options: FieldOptions) -> Self {
        let evaluating = rules.iter().map(|_| Cell::new(false)).collect();
        let rerun = rules.iter().map(|_| Cell::new(false)).collect();
        let engine = Rc::new(Engine {
            dom,
            rules,
            options,
            evaluating,
            rerun,
        });

        for (index, rule) in engine.rules.iter().enumerate() {
            for dep in &rule.deps {
                let Some(element) = engine.dom.query(dep) else {
                    engine.trace(format_args!("dependency `{dep}` of `{}` not found", rule.target));
                    continue;
                };
                for event in FieldEvent::ALL {
                    let listener_engine = engine.clone();
                    engine.dom.listen(
                        &element,
                        event,
                        Rc::new(move || {
                            listener_engine.evaluate(index);
                        }),
                    );
                }
            }
        }

        let fields = Self { engine };
        fields.reapply_all();
        fields
    }

    /// Re-evaluate every rule, in declaration order.
    pub fn reapply_all(&self) -> Vec<Evaluation> {
        self.engine.reapply_all()
    }

    /// Re-evaluate the rule at `index`.
    pub fn evaluate(&self, index: usize) -> Option<Evaluation> {
        (index < self.engine.rules.len()).then(|| self.engine.evaluate(index))
    }

    pub fn rules(&self) -> &[Rule<D>] {
        &self.engine.rules
    }

    pub fn options(&self) -> &FieldOptions {
        &self.engine.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reflex_dom::{MemoryDom, NodeId};

    /// `<div><div><label><input id=..></label></div></div>` under body.
    fn nested_input(dom: &MemoryDom, id: &str) -> (NodeId, NodeId) {
        let outer = dom.create_element(dom.body(), "div", &[("class", "field-wrapper")]);
        let inner = dom.create_element(outer, "div", &[]);
        let label = dom.create_element(inner, "label", &[]);
        let input = dom.create_element(label, "input", &[("id", id)]);
        (outer, input)
    }

    #[test]
    fn test_container_walks_up_and_clamps() {
        let dom = MemoryDom::new();
        let (outer, input) = nested_input(&dom, "a");
        assert_eq!(container_of(&dom, &input, 0), input);
        assert_eq!(container_of(&dom, &input, 3), outer);
        let html = dom.parent(&dom.body()).unwrap();
        assert_eq!(container_of(&dom, &input, 50), html);
    }

    #[test]
    fn test_missing_target_is_skipped() {
        let dom = MemoryDom::new();
        let fields = ConditionalFields::install(
            dom.clone(),
            vec![Rule::new("#nope", ["#also-nope"], |_| false)],
            FieldOptions::default(),
        );
        assert_eq!(fields.reapply_all(), vec![Evaluation::MissingTarget]);
        assert_eq!(fields.evaluate(1), None);
    }

    #[test]
    fn test_hidden_without_clear_keeps_value() {
        let dom = MemoryDom::new();
        let (outer, input) = nested_input(&dom, "b");
        dom.set_value(&input, "keep me");
        let fields = ConditionalFields::install(
            dom.clone(),
            vec![Rule::new("#b", Vec::<String>::new(), |_| false)],
            FieldOptions::default(),
        );
        assert!(!dom.is_displayed(outer));
        assert_eq!(dom.value(&input), "keep me");
        assert_eq!(fields.reapply_all(), vec![Evaluation::Hidden { cleared: false }]);
        assert!(dom.dispatched_at(input).is_empty());
    }

    #[test]
    fn test_custom_container_depth() {
        let dom = MemoryDom::new();
        let (outer, input) = nested_input(&dom, "b");
        let label = dom.parent(&input).unwrap();
        ConditionalFields::install(
            dom.clone(),
            vec![Rule::new("#b", Vec::<String>::new(), |_| false)],
            FieldOptions::default().container_depth(1),
        );
        assert!(!dom.is_displayed(label));
        assert!(dom.is_displayed(outer));
    }
}
