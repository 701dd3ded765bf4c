//! Port definitions: traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod action_repo;
pub mod device_repo;
pub mod output_lines;
pub mod pin_repo;

pub use action_repo::ActionRepository;
pub use device_repo::DeviceRepository;
pub use output_lines::OutputLines;
pub use pin_repo::PinRepository;
