//! The DOM seam shared by the reflex engines.
//!
//! [`Dom`] is every DOM operation the engines perform. [`MemoryDom`] is an
//! arena-backed document for native tests, matching the CSS subset in
//! [`selector`].
//!
//! The browser implementation lives in `reflex-web`.

pub mod dom;
pub mod error;
pub mod memory;
pub mod selector;

pub use dom::{Dom, FieldEvent, MutationWatch};
pub use error::DomError;
pub use memory::{MemoryDom, MemoryObserver, NodeId};
