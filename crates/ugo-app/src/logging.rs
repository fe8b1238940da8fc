//! Log subscriber construction.

use tracing::Dispatch;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

/// Build the log dispatcher without installing it globally.
///
/// Run code under it with [`tracing::dispatcher::with_default`]. The default is
/// thread-local; the Vulkan debug messenger captures it at creation so
/// validation messages from driver threads still reach it.
pub fn build_dispatch() -> Dispatch {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    Dispatch::new(tracing_subscriber::fmt().with_env_filter(filter).finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_scopes_to_closure() {
        let dispatch = build_dispatch();
        let ran = tracing::dispatcher::with_default(&dispatch, || {
            tracing::info!("inside scoped dispatcher");
            true
        });
        assert!(ran);
    }

    #[test]
    fn logging_without_dispatch_is_harmless() {
        tracing::error!("no subscriber installed");
    }
}
