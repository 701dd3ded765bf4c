//! # gpiohub-domain
//!
//! Pure domain model for the gpiohub home automation controller.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Devices** (relays, bulbs, fans) bound to a single physical pin
//! - Define the **GPIO pin catalog** and the physical → logical line mapping
//! - Define **Actions** (named, schedulable sequences of device steps)
//! - Define the **Schedule Interpreter** turning schedule strings into triggers
//! - Contain all invariant enforcement and domain logic
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod action;
pub mod device;
pub mod pin;
pub mod schedule;
