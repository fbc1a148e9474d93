//! Peripheral drivers: the optical front end and the task watchdog.

pub mod max30102;
pub mod watchdog;
