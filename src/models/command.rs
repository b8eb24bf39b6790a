use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VibrationMode {
    Auto,
    Manual,
}

impl VibrationMode {
    pub fn from_auto(auto: bool) -> Self {
        if auto {
            VibrationMode::Auto
        } else {
            VibrationMode::Manual
        }
    }
}

/// Commands published to the device over the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum DeviceCommand {
    #[serde(rename_all = "camelCase")]
    Init { device_id: String },
    StartVibration { mode: VibrationMode },
    SetVibration { level: u8 },
    EmergencyStop,
}

impl DeviceCommand {
    pub fn to_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_line(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn commands_use_device_wire_names() {
        let init = serde_json::to_value(DeviceCommand::Init {
            device_id: "user-1".into(),
        })
        .unwrap();
        assert_eq!(init, json!({"command": "init", "deviceId": "user-1"}));

        let start = serde_json::to_value(DeviceCommand::StartVibration {
            mode: VibrationMode::Manual,
        })
        .unwrap();
        assert_eq!(start, json!({"command": "startVibration", "mode": "manual"}));

        let set = serde_json::to_value(DeviceCommand::SetVibration { level: 7 }).unwrap();
        assert_eq!(set, json!({"command": "setVibration", "level": 7}));

        let stop = serde_json::to_value(DeviceCommand::EmergencyStop).unwrap();
        assert_eq!(stop, json!({"command": "emergencyStop"}));
    }
}
