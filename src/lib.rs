//! pomotrack - Pomodoro timer with drift-free phase timing
//!
//! This library provides the timer state machine, its async driver, and the
//! session ledger that records every phase.

pub mod app;
pub mod command;
pub mod config;
pub mod ledger;
pub mod logging;
pub mod notify;
pub mod timer;
