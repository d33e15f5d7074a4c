//! Logger initialization, grounded on the teacher's `main.rs`
//! (`simple_logger::init_with_level`), driven by [`crate::config::LogLevel`]
//! instead of a config-file `Log` section (this crate has none).

use anyhow::Result;

use crate::config::LogLevel;

pub fn init(level: LogLevel) -> Result<()> {
    simple_logger::init_with_level(level.as_level())?;
    Ok(())
}
