#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use chatrelay_server::config::Config;

/// Exit status is always 0 (spec §6: "Exit status: 0 on any failure or
/// SIGINT"; the reference implementation's `server_exit`/usage paths all
/// call `exit(0)`, matching `duckchat_v2/server.c`). Fatal startup errors
/// still write to stderr via `log::error!` before exiting (spec §7.4).
fn main() {
    if let Err(err) = run() {
        // `log` may not be initialized yet (e.g. a bind/resolve failure
        // before `logger::init` runs), so write directly to stderr too.
        eprintln!("chatrelay-server: {err:#}");
        log::error!("{err:#}");
    }
}

fn run() -> anyhow::Result<()> {
    let config = Config::load()?;
    chatrelay_server::logger::init(config.log_level)?;

    let shutdown = chatrelay_server::install_sigint_handler()?;

    log::info!("binding {} with {} known peer(s)", config.bind, config.peers.len());
    chatrelay_server::startup(&config, shutdown)
}
