use std::sync::Once;

use log::LevelFilter;

static INIT: Once = Once::new();

/// Install a stderr logger unless the embedding application already picked
/// one. Library code only emits through the `log` facade.
pub fn ensure_initialized() {
    if log::max_level() != LevelFilter::Off {
        return;
    }

    INIT.call_once(|| {
        let filter_str =
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,memfleet=debug".to_string());
        let filter: logforth::filter::EnvFilter =
            filter_str.parse().unwrap_or_else(|_| "info".into());

        logforth::builder()
            .dispatch(|d| d.filter(filter).append(logforth::append::Stderr::default()))
            .apply();
    });
}
