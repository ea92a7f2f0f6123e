//=============================================
// File: logging.rs
//=============================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Tracing setup for solvra_rtti host processes
// Objective: Offer one subscriber configuration with a component label that
//            never writes to stdout
//=============================================

use std::io::{self, IsTerminal};
use std::sync::OnceLock;

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::SubscriberBuilder;

static INIT: OnceLock<()> = OnceLock::new();

/// Initialize tracing with a component label. `RUST_LOG` overrides the
/// default level (`warn`, or `debug` when `verbose`).
pub fn init(component: &str, verbose: bool) {
    INIT.get_or_init(|| {
        let level = if verbose { Level::DEBUG } else { Level::WARN };
        let filter = EnvFilter::builder()
            .with_default_directive(level.into())
            .from_env_lossy();
        let _ = SubscriberBuilder::default()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .with_target(true)
            .with_ansi(io::stderr().is_terminal())
            .compact()
            .try_init();
    });
    tracing::debug!(component, "tracing initialised");
}
