//! Add-button visibility for repeating grids.
//!
//! Every structural change under the body re-runs [`toggle_all`] over every
//! grid on the page. Nothing is diffed or cached: grids, rows and buttons are
//! re-queried on each pass, so host re-renders are picked up for free.

use std::cell::RefCell;
use std::rc::Rc;

use reflex_dom::{Dom, MutationWatch};
use serde::Deserialize;

/// Marks an Add control the stylesheet should show.
pub const VISIBLE_ATTRIBUTE: &str = "data-reflex-add-visible";
/// Holds the control's own `tabindex` while it is hidden ("" = had none).
pub const SAVED_TABINDEX_ATTRIBUTE: &str = "data-reflex-saved-tabindex";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GridConfig {
    /// Add controls hide once a grid has this many rows.
    pub max_rows: usize,
    /// Count only rows whose entity attribute equals this value.
    pub entity_filter_value: Option<String>,
    pub grid_selector: String,
    pub add_button_selector: String,
    /// Rows inside a grid's table body.
    pub row_selector: String,
    /// Attribute on a row carrying its entity type.
    pub entity_attribute: String,
    /// Id of the injected style block.
    pub style_id: String,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            max_rows: 3,
            entity_filter_value: None,
            grid_selector: ".repeating-grid".to_string(),
            add_button_selector: ".grid-add-button".to_string(),
            row_selector: "tbody tr".to_string(),
            entity_attribute: "data-entity-type".to_string(),
            style_id: "reflex-grid-visibility".to_string(),
        }
    }
}

impl GridConfig {
    pub fn max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    pub fn entity_filter(mut self, value: impl Into<String>) -> Self {
        self.entity_filter_value = Some(value.into());
        self
    }

    pub fn grid_selector(mut self, selector: impl Into<String>) -> Self {
        self.grid_selector = selector.into();
        self
    }

    pub fn add_button_selector(mut self, selector: impl Into<String>) -> Self {
        self.add_button_selector = selector.into();
        self
    }

    /// Hide matched Add controls unless marked visible. Fail-safe: a control
    /// stays hidden until its grid has been evaluated at least once.
    pub fn stylesheet(&self) -> String {
        format!(
            ":is({add}):not([{VISIBLE_ATTRIBUTE}]) {{ display: none !important; }}\n",
            add = self.add_button_selector
        )
    }
}

/// Rows counted against `max_rows`.
///
/// With a filter configured, only rows tagged with it count. When that
/// yields zero, or no filter is set, every row counts.
pub fn count_rows<D: Dom>(dom: &D, config: &GridConfig, grid: &D::Node) -> usize {
    let rows = dom.query_all_within(Some(grid), &config.row_selector);
    let filtered = match &config.entity_filter_value {
        Some(wanted) => rows
            .iter()
            .filter(|row| dom.attribute(row, &config.entity_attribute).as_deref() == Some(wanted.as_str()))
            .count(),
        None => 0,
    };
    if filtered > 0 { filtered } else { rows.len() }
}

fn show_control<D: Dom>(dom: &D, control: &D::Node) {
    dom.set_attribute(control, VISIBLE_ATTRIBUTE, "");
    dom.remove_attribute(control, "hidden");
    dom.remove_attribute(control, "aria-hidden");
    dom.remove_attribute(control, "aria-disabled");
    if let Some(saved) = dom.attribute(control, SAVED_TABINDEX_ATTRIBUTE) {
        if saved.is_empty() {
            dom.remove_attribute(control, "tabindex");
        } else {
            dom.set_attribute(control, "tabindex", &saved);
        }
        dom.remove_attribute(control, SAVED_TABINDEX_ATTRIBUTE);
    }
}

fn hide_control<D: Dom>(dom: &D, control: &D::Node) {
    if dom.attribute(control, SAVED_TABINDEX_ATTRIBUTE).is_none() {
        let own = dom.attribute(control, "tabindex").unwrap_or_default();
        dom.set_attribute(control, SAVED_TABINDEX_ATTRIBUTE, &own);
    }
    dom.remove_attribute(control, VISIBLE_ATTRIBUTE);
    dom.set_attribute(control, "hidden", "");
    dom.set_attribute(control, "aria-hidden", "true");
    dom.set_attribute(control, "aria-disabled", "true");
    dom.set_attribute(control, "tabindex", "-1");
}

/// Show every Add control of `grid` while it is under `max_rows`, hide them
/// otherwise. Returns whether the controls ended up shown.
pub fn toggle<D: Dom>(dom: &D, config: &GridConfig, grid: &D::Node) -> bool {
    let rows = count_rows(dom, config, grid);
    let show = rows < config.max_rows;
    let controls = dom.query_all_within(Some(grid), &config.add_button_selector);
    tracing::debug!(
        "grid {grid:?}: {rows} row(s), max {}, {} {} control(s)",
        config.max_rows,
        if show { "showing" } else { "hiding" },
        controls.len()
    );
    for control in &controls {
        if show {
            show_control(dom, control);
        } else {
            hide_control(dom, control);
        }
    }
    show
}

pub fn toggle_all<D: Dom>(dom: &D, config: &GridConfig) {
    for grid in dom.query_all(&config.grid_selector) {
        toggle(dom, config, &grid);
    }
}

/// Installed grid controller. [`dispose`](Self::dispose) stops observation;
/// dropping the handle does not.
pub struct GridVisibility<D: Dom> {
    dom: D,
    config: Rc<GridConfig>,
    observer: RefCell<Option<D::Observer>>,
}

impl<D: Dom> GridVisibility<D> {
    /// Inject the stylesheet, evaluate every grid once, then re-evaluate on
    /// every child-list mutation under the body.
    pub fn install(dom: D, config: GridConfig) -> Self {
        dom.ensure_style(&config.style_id, &config.stylesheet());
        let config = Rc::new(config);
        toggle_all(&dom, &config);

        let observer = {
            let (watched_dom, watched_config) = (dom.clone(), config.clone());
            dom.observe_subtree(Rc::new(move || toggle_all(&watched_dom, &watched_config)))
        };
        tracing::debug!("grid visibility installed for `{}`", config.grid_selector);
        Self {
            dom,
            config,
            observer: RefCell::new(Some(observer)),
        }
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Re-synchronize every grid now.
    pub fn toggle_all(&self) {
        toggle_all(&self.dom, &self.config);
    }

    pub fn is_observing(&self) -> bool {
        self.observer.borrow().is_some()
    }

    /// Detach the observer. Idempotent.
    pub fn dispose(&self) {
        if let Some(observer) = self.observer.borrow_mut().take() {
            observer.disconnect();
            tracing::debug!("grid visibility disposed");
        }
    }
}
