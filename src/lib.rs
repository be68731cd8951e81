//! Aqua Clock regulation core.
//!
//! Keeps three water columns at the elevations that spell out the time and
//! keeps their feed reservoir topped up.  Pure logic over `embedded-hal`
//! pins and small port traits, so the same code runs against real hardware
//! or the host simulation in [`adapters::sim`].

#![deny(unused_must_use)]

pub mod app;
pub mod calibration;
pub mod config;
pub mod control;
pub mod error;
pub mod faults;
pub mod scheduler;
pub mod settings;

pub mod adapters;
pub mod drivers;
pub mod sensors;
