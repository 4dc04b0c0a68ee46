//! Contains the building blocks of the countdown.
//!
//! This module provides the boundary detector (which turns corrected time into
//! remaining time and discrete crossings), the effect generators (which own
//! self-expiring visual instances), and the dispatcher that connects the two.
//! The `CountdownEngine` drives these components from its sampler task.

pub mod boundary;
pub mod dispatcher;
pub mod effects;
