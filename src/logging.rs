use std::fs::File;
use std::path::Path;

use anyhow::Context as _;
use log::LevelFilter;
use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode, WriteLogger};

/// Console level for the `simplelog` path, taken from an env_logger style
/// directive list. A `blelink=<level>` directive wins over a bare level;
/// directives for other crates are ignored since simplelog filters globally.
fn console_level(directives: Option<&str>) -> LevelFilter {
    let mut global: Option<LevelFilter> = None;
    let mut own: Option<LevelFilter> = None;
    for directive in directives.unwrap_or_default().split(',').map(str::trim) {
        match directive.split_once('=') {
            None => global = directive.parse().ok().or(global),
            Some((target, level)) if target.trim() == env!("CARGO_CRATE_NAME") => {
                own = level.trim().parse().ok().or(own)
            }
            Some(_) => {}
        }
    }
    own.or(global).unwrap_or(LevelFilter::Info)
}

/// Console logging through `pretty_env_logger`, or console plus file through
/// `simplelog` when a log file is given. `RUST_LOG` picks the console level.
pub fn init_logger(log_file: Option<&Path>) -> anyhow::Result<()> {
    match log_file {
        None => pretty_env_logger::formatted_builder()
            .filter_level(LevelFilter::Info)
            .parse_env("RUST_LOG")
            .try_init()
            .context("unable to install console logger")?,
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("unable to create log file {}", path.display()))?;
            let console = console_level(std::env::var("RUST_LOG").ok().as_deref());
            CombinedLogger::init(vec![
                TermLogger::new(console, Config::default(), TerminalMode::Mixed, ColorChoice::Auto),
                WriteLogger::new(LevelFilter::Debug, Config::default(), file),
            ])
            .context("unable to install file logger")?;
        }
    }
    Ok(())
}
