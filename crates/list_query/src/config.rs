use std::time::Duration;

use serde::Deserialize;
use shared::domain::PageSize;

pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(600);
pub const DEFAULT_PREFETCH_DEPTH: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    #[serde(rename = "quiet_period_ms", with = "millis")]
    pub quiet_period: Duration,
    pub default_page_size: PageSize,
    /// Pages read ahead after each visible fetch.
    pub prefetch_depth: u32,
    pub retry_transient: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            quiet_period: DEFAULT_QUIET_PERIOD,
            default_page_size: PageSize::Ten,
            prefetch_depth: DEFAULT_PREFETCH_DEPTH,
            retry_transient: true,
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
