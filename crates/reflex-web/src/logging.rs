//! Console logging through `tracing-wasm`, behind a level filter the host
//! can change at runtime.

use std::sync::OnceLock;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{Registry, reload};
use tracing_wasm::{WASMLayer, WASMLayerConfigBuilder};

static LEVEL: OnceLock<reload::Handle<LevelFilter, Registry>> = OnceLock::new();

/// Install the console subscriber at `level`. Later calls only change the level.
pub fn init(level: LevelFilter) {
    if LEVEL.get().is_some() {
        set_level(level);
        return;
    }
    let (filter, handle) = reload::Layer::new(level);
    let console = WASMLayer::new(
        WASMLayerConfigBuilder::new()
            .set_report_logs_in_timings(false)
            .build(),
    );
    if tracing_subscriber::registry().with(filter).with(console).try_init().is_ok() {
        let _ = LEVEL.set(handle);
    }
}

pub fn set_level(level: LevelFilter) {
    if let Some(handle) = LEVEL.get() {
        let _ = handle.reload(level);
    }
}

/// Raise the level to `level` if it is currently quieter.
pub fn raise_to(level: LevelFilter) {
    if let Some(handle) = LEVEL.get() {
        let _ = handle.modify(|current| {
            if *current < level {
                *current = level;
            }
        });
    }
}

pub fn level() -> Option<LevelFilter> {
    LEVEL.get().and_then(|handle| handle.clone_current())
}
