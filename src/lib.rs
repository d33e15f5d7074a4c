//! Multi-server UDP chat relay core.
//!
//! This crate is the thin root over [`codec`] (wire format) and
//! [`service`] (directory, protocol handlers, subtree manager): it
//! owns configuration, logging, and the single-threaded event loop
//! that ties them together (spec §2, component F).

pub mod config;
pub mod event_loop;
pub mod logger;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;

use self::config::Config;

/// Start the relay and block until shutdown. Separated from `main` so
/// integration tests can drive a real instance the way the teacher's
/// own `startup` function lets its integration tests start a server
/// in-process.
pub fn startup(config: &Config, shutdown: Arc<AtomicBool>) -> Result<()> {
    event_loop::run(config, shutdown)
}

/// Install a SIGINT handler that flips the returned flag. The teacher
/// has no signal handling of its own at this layer (its shutdown is
/// driven by `tokio::main`'s runtime); a blocking std-socket loop has
/// no runtime to ask, so `ctrlc` is used instead (see DESIGN.md).
pub fn install_sigint_handler() -> Result<Arc<AtomicBool>> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))?;
    Ok(shutdown)
}
