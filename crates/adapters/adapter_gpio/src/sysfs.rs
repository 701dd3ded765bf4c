//! Linux sysfs GPIO (`/sys/class/gpio`).
//!
//! A line is exported and switched to output on its first write; later
//! writes only touch `value`. Lines that are already exported (for example
//! by a previous run) are reused as they are.

use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use gpiohub_app::ports::OutputLines;
use gpiohub_domain::error::{DeviceFault, GpioHubError};
use gpiohub_domain::pin::{LineLevel, LogicalLine};

use crate::error::GpioError;

pub const DEFAULT_SYSFS_ROOT: &str = "/sys/class/gpio";

pub struct SysfsLines {
    root: PathBuf,
    configured: Mutex<HashSet<LogicalLine>>,
}

impl SysfsLines {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            configured: Mutex::new(HashSet::new()),
        }
    }

    fn line_dir(&self, line: LogicalLine) -> PathBuf {
        self.root.join(format!("gpio{}", line.0))
    }

    async fn configure(&self, line: LogicalLine) -> Result<(), GpioError> {
        let dir = self.line_dir(line);
        if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            write_attribute(&self.root.join("export"), &line.0.to_string()).await?;
            tracing::debug!(%line, "line exported");
        }
        write_attribute(&dir.join("direction"), "out").await
    }

    async fn drive(&self, line: LogicalLine, level: LineLevel) -> Result<(), GpioError> {
        let mut configured = self.configured.lock().await;
        if !configured.contains(&line) {
            self.configure(line).await?;
            configured.insert(line);
        }
        let value = match level {
            LineLevel::High => "1",
            LineLevel::Low => "0",
        };
        write_attribute(&self.line_dir(line).join("value"), value).await
    }
}

impl Default for SysfsLines {
    fn default() -> Self {
        Self::new(DEFAULT_SYSFS_ROOT)
    }
}

async fn write_attribute(path: &Path, value: &str) -> Result<(), GpioError> {
    tokio::fs::write(path, value)
        .await
        .map_err(|source| GpioError::Attribute {
            path: path.to_path_buf(),
            value: value.to_string(),
            source,
        })
}

impl OutputLines for SysfsLines {
    fn write(
        &self,
        line: LogicalLine,
        level: LineLevel,
    ) -> impl Future<Output = Result<(), GpioHubError>> + Send {
        async move {
            self.drive(line, level).await.map_err(|err| {
                GpioHubError::from(DeviceFault::Write {
                    line,
                    source: Box::new(err),
                })
            })?;
            tracing::debug!(%line, %level, "sysfs line written");
            Ok(())
        }
    }
}
