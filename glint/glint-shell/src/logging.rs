//! Logger initialization for shell binaries.

use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize the global logger once. The default filter is `info`;
/// `RUST_LOG` overrides it with the usual `env_logger` syntax. Subsequent
/// calls are ignored, so demos and tests can call this unconditionally.
pub fn init_logging() {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();
        if let Ok(filter) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filter);
        } else {
            builder.filter_level(log::LevelFilter::Info);
        }
        builder.init();
    });
}
