use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::config::{Appender, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::Config;

use crate::log::{EngineLogger, LogSettings};

// ISO 8601 timestamp, colored level, module path.
const STDERR_PATTERN: &str = "{d(%Y-%m-%dT%H:%M:%SZ)} {h({l})} {t} - {m}{n}";

impl LogSettings {
    fn to_log4rs(&self) -> Result<Config, log4rs::config::runtime::ConfigErrors> {
        let stderr = ConsoleAppender::builder()
            .encoder(Box::new(PatternEncoder::new(STDERR_PATTERN)))
            .target(Target::Stderr)
            .build();
        let loggers = self
            .modules
            .iter()
            .map(|(module, level)| Logger::builder().build(module.clone(), *level));
        Config::builder()
            .appender(Appender::builder().build("stderr", Box::new(stderr)))
            .loggers(loggers)
            .build(Root::builder().appender("stderr").build(self.level))
    }
}

impl EngineLogger {
    /// Points the global logger at the current settings, initializing it on first use.
    pub(in crate::log) fn install(&mut self) {
        let config = match self.settings.to_log4rs() {
            Ok(config) => config,
            Err(errors) => {
                eprintln!("logging not reconfigured: {errors}");
                return;
            }
        };
        if let Some(handle) = &self.handle {
            handle.set_config(config);
            return;
        }
        match log4rs::init_config(config) {
            Ok(handle) => self.handle = Some(handle),
            // Another logger (a test harness's, say) owns the global slot.
            Err(error) => eprintln!("logging not installed: {error}"),
        }
    }
}
