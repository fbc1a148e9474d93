//! Application core: domain logic behind port traits.
//!
//! This module contains the business rules of the measurement firmware:
//! the control surface, the command/event vocabulary and the service that
//! drives the state machine.  All interaction with hardware happens
//! through **port traits** defined in [`ports`], keeping this layer fully
//! testable without real peripherals.

pub mod commands;
pub mod control;
pub mod events;
pub mod ports;
pub mod service;
