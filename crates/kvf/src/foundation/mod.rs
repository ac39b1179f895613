//! Foundation utilities: math helpers, frame timing and logging setup

pub mod logging;
pub mod math;
pub mod time;
