//! Logging for the engine. Generation stages emit messages through the standard `log` macros,
//! which this module re-exports: `error!`, `warn!`, `info!`, `debug!` and `trace!`. Recovered
//! configuration problems (a clamped `target_cases`, an unknown `scenario_type`, an epicenter
//! with nobody eligible) are always logged at `warn`.
//!
//! Logging is off until a level is set. The `outbreak` binary takes `--log-level <level>` for
//! everything and `--log-module <module>=<level>` for single modules; library users do the
//! same programmatically:
//!
//! ```rust
//! use outbreak_engine::log::{set_log_level, set_module_filter, LevelFilter};
//!
//! // Warnings from every module.
//! set_log_level(LevelFilter::Warn);
//! // Every draw decision made while assigning infections.
//! set_module_filter("outbreak_engine::infection", LevelFilter::Trace);
//! ```
//!
//! Messages go to stderr, so line lists and reports written to stdout stay parseable.
#[cfg(feature = "logging")]
mod standard_logger;

#[cfg(not(feature = "logging"))]
mod null_logger;

use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::str::FromStr;
use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};

pub use log::{debug, error, info, trace, warn, LevelFilter};

/// The random module traces every stream it creates; that stays quiet below `debug` unless a
/// filter for it is set explicitly.
const QUIET_MODULES: [(&str, LevelFilter); 1] = [("outbreak_engine::random", LevelFilter::Debug)];

/// A level for one module path and everything below it, written `module=level`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleFilter {
    pub module: String,
    pub level: LevelFilter,
}

impl FromStr for ModuleFilter {
    type Err = String;

    fn from_str(directive: &str) -> Result<Self, Self::Err> {
        let (module, level) = directive
            .split_once('=')
            .ok_or_else(|| format!("`{directive}` is not of the form module=level"))?;
        let module = module.trim();
        if module.is_empty() {
            return Err(format!("`{directive}` names no module"));
        }
        let level = level
            .trim()
            .parse()
            .map_err(|_| format!("`{level}` is not a log level"))?;
        Ok(ModuleFilter {
            module: module.to_string(),
            level,
        })
    }
}

impl Display for ModuleFilter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}={}", self.module, self.level)
    }
}

/// The levels the installed logger enforces: one for every module without a filter of its own,
/// and one per filtered module path.
#[derive(Debug, Clone, PartialEq)]
struct LogSettings {
    level: LevelFilter,
    modules: BTreeMap<String, LevelFilter>,
}

impl Default for LogSettings {
    fn default() -> Self {
        LogSettings {
            level: LevelFilter::Off,
            modules: QUIET_MODULES
                .iter()
                .map(|(module, level)| ((*module).to_string(), *level))
                .collect(),
        }
    }
}

/// The process-wide logger state. `install` (in `standard_logger` or `null_logger`) pushes the
/// settings to the global logger.
#[derive(Default)]
struct EngineLogger {
    settings: LogSettings,
    #[cfg(feature = "logging")]
    handle: Option<log4rs::Handle>,
}

impl EngineLogger {
    /// Applies `change` and reinstalls the logger if the settings changed.
    fn update(&mut self, change: impl FnOnce(&mut LogSettings)) {
        let before = self.settings.clone();
        change(&mut self.settings);
        if self.settings != before {
            self.install();
        }
    }
}

static LOGGER: LazyLock<Mutex<EngineLogger>> = LazyLock::new(Mutex::default);

fn logger() -> MutexGuard<'static, EngineLogger> {
    // The settings stay consistent even if a holder panicked.
    LOGGER.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Sets the level for every module without a filter of its own. `LevelFilter::Off` silences
/// them.
pub fn set_log_level(level: LevelFilter) {
    logger().update(|settings| settings.level = level);
}

/// Sets the level for `module_path` and the modules below it.
pub fn set_module_filter(module_path: &str, level: LevelFilter) {
    logger().update(|settings| {
        settings.modules.insert(module_path.to_string(), level);
    });
}

/// Applies every filter in `filters` with a single reinstall. Later filters for the same module
/// win.
pub fn apply_module_filters(filters: &[ModuleFilter]) {
    logger().update(|settings| {
        for filter in filters {
            settings.modules.insert(filter.module.clone(), filter.level);
        }
    });
}

/// Drops the filter for `module_path`, which then logs at the global level.
pub fn remove_module_filter(module_path: &str) {
    logger().update(|settings| {
        settings.modules.remove(module_path);
    });
}
