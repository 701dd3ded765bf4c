//! Output lines port: the raw GPIO write primitive.

use std::future::Future;

use gpiohub_domain::error::GpioHubError;
use gpiohub_domain::pin::{LineLevel, LogicalLine};

/// Drives kernel GPIO lines to an electrical level.
///
/// Implementations know nothing about devices or polarity; see
/// [`GpioDriver`](crate::gpio_driver::GpioDriver) for that.
pub trait OutputLines {
    /// Configure `line` as an output (if needed) and drive it to `level`.
    fn write(
        &self,
        line: LogicalLine,
        level: LineLevel,
    ) -> impl Future<Output = Result<(), GpioHubError>> + Send;
}
