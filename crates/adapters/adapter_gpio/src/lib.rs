//! # gpiohub-adapter-gpio
//!
//! Output line backends implementing the [`OutputLines`] port.
//!
//! - [`VirtualLines`] keeps levels in memory. It is the default backend and
//!   what development machines and tests run against.
//! - [`SysfsLines`] drives real lines through `/sys/class/gpio`
//!   (export, direction, value).
//!
//! [`AnyLines`] picks one at runtime from configuration so the composition
//! root stays monomorphic.

mod error;
mod sysfs;
mod virtual_lines;

pub use error::GpioError;
pub use sysfs::{DEFAULT_SYSFS_ROOT, SysfsLines};
pub use virtual_lines::VirtualLines;

use std::future::Future;

use serde::Deserialize;

use gpiohub_app::ports::OutputLines;
use gpiohub_domain::error::GpioHubError;
use gpiohub_domain::pin::{LineLevel, LogicalLine};

/// Which backend drives the lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Virtual,
    Sysfs,
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "virtual" => Ok(Self::Virtual),
            "sysfs" => Ok(Self::Sysfs),
            other => Err(format!("unknown GPIO backend {other:?} (expected virtual or sysfs)")),
        }
    }
}

/// Runtime-selected backend.
pub enum AnyLines {
    Virtual(VirtualLines),
    Sysfs(SysfsLines),
}

impl OutputLines for AnyLines {
    fn write(
        &self,
        line: LogicalLine,
        level: LineLevel,
    ) -> impl Future<Output = Result<(), GpioHubError>> + Send {
        async move {
            match self {
                Self::Virtual(lines) => lines.write(line, level).await,
                Self::Sysfs(lines) => lines.write(line, level).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_backend_names() {
        assert_eq!("virtual".parse::<Backend>().unwrap(), Backend::Virtual);
        assert_eq!(" Sysfs ".parse::<Backend>().unwrap(), Backend::Sysfs);
        assert!("gpiod".parse::<Backend>().is_err());
    }

    #[tokio::test]
    async fn should_dispatch_to_selected_backend() {
        let virtual_lines = VirtualLines::default();
        let lines = AnyLines::Virtual(virtual_lines.clone());

        lines.write(LogicalLine(17), LineLevel::Low).await.unwrap();

        assert_eq!(virtual_lines.level(LogicalLine(17)), Some(LineLevel::Low));
    }
}
