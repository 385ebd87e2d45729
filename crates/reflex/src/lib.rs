//! Reactive show/hide behaviors layered onto a form/grid surface rendered by
//! someone else.
//!
//! - [`GridVisibility`] shows a grid's Add controls while its row count is
//!   under a limit, re-checking after every structural mutation.
//! - [`ConditionalFields`] shows, hides and clears fields according to
//!   predicates over sibling field values, re-checking on `input`/`change`.
//!
//! The two are independent. Both are generic over [`Dom`], re-query the
//! document on every pass and never cache nodes between passes.

pub mod conditional;
pub mod field;
pub mod grid;
pub mod rules;
pub mod value;

pub use conditional::{ConditionalFields, Evaluation};
pub use field::FieldKind;
pub use grid::{GridConfig, GridVisibility};
pub use reflex_dom::Dom;
pub use rules::{EvalContext, FieldOptions, PredicateError, Rule};
pub use value::FieldValue;
