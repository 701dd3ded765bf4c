//! # gpiohub-app
//!
//! Application layer: use-cases, **port definitions** (traits) and the
//! action scheduler.
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `DeviceRepository`: device CRUD, keeping pin usage in step
//!   - `PinRepository`: the header pin catalog
//!   - `ActionRepository`: actions, steps and the execution log
//!   - `OutputLines`: raw GPIO line writes
//! - Define **driving/inbound ports** as use-case structs:
//!   - `DeviceService`, `PinService`: registry operations
//!   - `DeviceController`: the one path that changes a device's state
//!   - `ActionService`: action CRUD kept in step with the scheduler
//! - Run the **ActionScheduler** and its **Executor**
//!
//! ## Dependency rule
//! Depends on `gpiohub-domain` only (plus `tokio` for tasks, timers and locks).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod clock;
pub mod gpio_driver;
pub mod ports;
pub mod scheduler;
pub mod services;

#[cfg(test)]
mod testing;
