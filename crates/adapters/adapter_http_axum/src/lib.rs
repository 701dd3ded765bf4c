//! # gpiohub-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve the JSON API: device registry (`/devices`), manual control
//!   (`/device`), the pin catalog (`/pins`), actions (`/actions`) and the
//!   scheduler status (`/actions/scheduler/status`)
//! - Map HTTP requests into application service calls (driving adapter)
//! - Map application results and errors into JSON responses; every error
//!   body is `{"error": "<message>"}`
//!
//! ## Dependency rule
//! Depends on `gpiohub-app` (for port traits and services) and `gpiohub-domain`
//! (for domain types used in request/response mapping). Never leaks axum types
//! into the domain.

pub mod api;
pub mod error;
pub mod router;
pub mod state;
