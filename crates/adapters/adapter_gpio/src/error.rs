//! GPIO backend errors.

use std::path::PathBuf;

/// A sysfs attribute could not be written.
#[derive(Debug, thiserror::Error)]
pub enum GpioError {
    #[error("cannot write {value:?} to {}: {source}", path.display())]
    Attribute {
        path: PathBuf,
        value: String,
        #[source]
        source: std::io::Error,
    },
}
