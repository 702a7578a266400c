//! Tracker runtime configuration.
use std::env;
use std::time::Duration;

use tracker_core::{MetadataKey, PanelLayout};

/// Settings shared by the tracker engines.
#[derive(Clone, Debug)]
pub struct TrackerConfig {
    /// Metadata key under which every tracker record is stored.
    pub namespace: MetadataKey,
    /// Quiet period before a scheduled highlighter reposition runs.
    pub highlight_debounce: Duration,
    /// Delay between a turn advance and the viewport recenter.
    pub center_delay: Duration,
    /// Recenter the viewport on the new active combatant after each advance.
    pub auto_center: bool,
    pub panel: PanelLayout,
    /// Buffered change notifications per subscriber before it lags.
    pub change_buffer: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            namespace: MetadataKey::default(),
            highlight_debounce: Duration::from_millis(150),
            center_delay: Duration::from_millis(100),
            auto_center: false,
            panel: PanelLayout::default(),
            change_buffer: 64,
        }
    }
}

impl TrackerConfig {
    /// Construct configuration from process environment variables.
    ///
    /// Environment variables:
    /// - `TRACKER_NAMESPACE` - Metadata key (default: `com.initiative-tracker/metadata`)
    /// - `TRACKER_HIGHLIGHT_DEBOUNCE_MS` - Highlighter debounce (default: 150)
    /// - `TRACKER_CENTER_DELAY_MS` - Recenter delay after an advance (default: 100)
    /// - `TRACKER_AUTO_CENTER` - Recenter on the active combatant (default: false)
    /// - `TRACKER_PANEL_MIN_HEIGHT` - Minimum panel height in pixels (default: 225)
    /// - `TRACKER_CHANGE_BUFFER` - Change notification buffer (default: 64)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(namespace) = env::var("TRACKER_NAMESPACE")
            && !namespace.trim().is_empty()
        {
            config.namespace = MetadataKey::new(namespace.trim());
        }

        if let Some(ms) = read_env::<u64>("TRACKER_HIGHLIGHT_DEBOUNCE_MS") {
            config.highlight_debounce = Duration::from_millis(ms);
        }

        if let Some(ms) = read_env::<u64>("TRACKER_CENTER_DELAY_MS") {
            config.center_delay = Duration::from_millis(ms);
        }

        if let Some(enable) = read_env::<bool>("TRACKER_AUTO_CENTER") {
            config.auto_center = enable;
        } else if env::var("TRACKER_AUTO_CENTER").is_ok() {
            // A bare variable counts as enabled.
            config.auto_center = true;
        }

        if let Some(height) = read_env::<u32>("TRACKER_PANEL_MIN_HEIGHT") {
            config.panel.min_height = height;
        }

        if let Some(capacity) = read_env::<usize>("TRACKER_CHANGE_BUFFER") {
            config.change_buffer = capacity.max(1);
        }

        config
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = MetadataKey::new(namespace);
        self
    }

    pub fn with_auto_center(mut self, enable: bool) -> Self {
        self.auto_center = enable;
        self
    }
}

fn read_env<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    env::var(key).ok()?.parse().ok()
}
