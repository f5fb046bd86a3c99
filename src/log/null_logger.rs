//! Without the `logging` feature nothing is written anywhere. The levels still gate the `log`
//! macros so disabled messages cost nothing.

use crate::log::EngineLogger;

impl EngineLogger {
    pub(in crate::log) fn install(&mut self) {
        log::set_max_level(self.settings.level);
    }
}
