//! Wall clock used by the scheduler and executor.
//!
//! [`Clock::System`] reads the real time. [`Clock::Anchored`] derives wall
//! time from tokio's monotonic clock, so tests running with paused time
//! (`#[tokio::test(start_paused = true)]`) see a wall clock that only moves
//! when tokio's does.

use chrono::Duration;
use gpiohub_domain::time::{self, Timestamp};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    System,
    Anchored {
        wall: Timestamp,
        origin: Instant,
    },
}

impl Clock {
    /// A clock reading `wall` right now and advancing with tokio time.
    #[must_use]
    pub fn anchored(wall: Timestamp) -> Self {
        Self::Anchored {
            wall,
            origin: Instant::now(),
        }
    }

    #[must_use]
    pub fn now(&self) -> Timestamp {
        match self {
            Self::System => time::now(),
            Self::Anchored { wall, origin } => {
                Duration::from_std(origin.elapsed()).map_or(*wall, |elapsed| *wall + elapsed)
            }
        }
    }

    /// Sleep until the wall clock reaches `at`. Returns at once if it already has.
    pub async fn sleep_until(&self, at: Timestamp) {
        match self {
            Self::System => {
                if let Ok(remaining) = (at - time::now()).to_std() {
                    tokio::time::sleep(remaining).await;
                }
            }
            Self::Anchored { wall, origin } => {
                if let Ok(offset) = (at - *wall).to_std() {
                    tokio::time::sleep_until(*origin + offset).await;
                }
            }
        }
    }
}
