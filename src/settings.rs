use std::{
    fs,
    path::{Path, PathBuf},
    sync::RwLock,
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::session::ControllerConfig;

pub const DATA_DIR_ENV: &str = "CRAMPWAVE_DATA_DIR";
pub const DEBUG_ENV: &str = "CRAMPWAVE_DEBUG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelSettings {
    /// `host:port` of a line-delimited JSON device bridge. `None` runs the
    /// built-in simulator.
    pub endpoint: Option<String>,
    pub reconnect_delay_ms: u64,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            reconnect_delay_ms: 3_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceSettings {
    pub device_id: String,
    pub auto_mode: bool,
    pub tick_interval_ms: u64,
    pub simulator_interval_ms: u64,
    pub channel: ChannelSettings,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            device_id: "crampwave-device".into(),
            auto_mode: true,
            tick_interval_ms: 1_000,
            simulator_interval_ms: 1_000,
            channel: ChannelSettings::default(),
        }
    }
}

impl DeviceSettings {
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            device_id: self.device_id.clone(),
            reconnect_delay: Duration::from_millis(self.channel.reconnect_delay_ms.max(1)),
            tick_interval: Duration::from_millis(self.tick_interval_ms.max(1)),
            auto_mode: self.auto_mode,
            ..ControllerConfig::default()
        }
    }
}

/// JSON-backed settings file in the data directory.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<DeviceSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse settings in {}", path.display()))?
        } else {
            DeviceSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current(&self) -> DeviceSettings {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update(&self, settings: DeviceSettings) -> Result<()> {
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    fn persist(&self, data: &DeviceSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

/// `$CRAMPWAVE_DATA_DIR`, else the platform data directory, else `./.crampwave`.
pub fn resolve_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .map(|dir| dir.join("crampwave"))
        .unwrap_or_else(|| PathBuf::from(".crampwave"))
}

pub fn debug_enabled() -> bool {
    std::env::var(DEBUG_ENV)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}
