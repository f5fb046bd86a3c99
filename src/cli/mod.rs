mod batch_command;
mod classify_command;
mod generate_command;
mod lab_command;
mod main;
mod study_command;

// Commands here
mod commands {
    pub use super::batch_command::batch;
    pub use super::classify_command::classify;
    pub use super::generate_command::generate;
    pub use super::lab_command::lab;
    pub use super::study_command::study;
}

pub use main::*;
