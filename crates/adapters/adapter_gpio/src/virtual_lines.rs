//! In-memory output lines.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use gpiohub_app::ports::OutputLines;
use gpiohub_domain::error::GpioHubError;
use gpiohub_domain::pin::{LineLevel, LogicalLine};

/// Lines that only remember the last level written. Clones share state.
#[derive(Clone, Default)]
pub struct VirtualLines {
    levels: Arc<Mutex<HashMap<LogicalLine, LineLevel>>>,
}

impl VirtualLines {
    /// Last level written to `line`, if any.
    #[must_use]
    pub fn level(&self, line: LogicalLine) -> Option<LineLevel> {
        self.levels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&line)
            .copied()
    }
}

impl OutputLines for VirtualLines {
    fn write(
        &self,
        line: LogicalLine,
        level: LineLevel,
    ) -> impl Future<Output = Result<(), GpioHubError>> + Send {
        self.levels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(line, level);
        tracing::debug!(%line, %level, "virtual line written");
        async { Ok(()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn should_remember_last_level_per_line() {
        let lines = VirtualLines::default();
        assert_eq!(lines.level(LogicalLine(4)), None);

        lines.write(LogicalLine(4), LineLevel::High).await.unwrap();
        lines.write(LogicalLine(4), LineLevel::Low).await.unwrap();
        lines.write(LogicalLine(5), LineLevel::High).await.unwrap();

        assert_eq!(lines.level(LogicalLine(4)), Some(LineLevel::Low));
        assert_eq!(lines.level(LogicalLine(5)), Some(LineLevel::High));
    }
}
