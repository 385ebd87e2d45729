//! Browser bindings for reflex.
//!
//! [`WebDom`] implements the `Dom` seam over `web_sys`, and the functions
//! in [`bindings`] are what a host page calls from JavaScript:
//!
//! ```js
//! import init, { installGridVisibility, installConditionalFields } from "./reflex_web.js";
//! await init();
//! const dispose = installGridVisibility({ maxRows: 3, entityFilterValue: "contact" });
//! const reapplyAll = installConditionalFields([
//!   { target: "#b", deps: ["#a"], predicate: ctx => ctx.valueOf("#a") === 1, clearOnHide: true },
//! ]);
//! ```

pub mod bindings;
pub mod logging;
pub mod web_dom;

pub use web_dom::{WebDom, WebObserver};

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen::prelude::wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    logging::init(tracing::level_filters::LevelFilter::WARN);
}
