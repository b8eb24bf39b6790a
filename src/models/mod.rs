pub mod command;
pub mod profile;
pub mod session;
pub mod telemetry;

pub use command::{DeviceCommand, VibrationMode};
pub use profile::Profile;
pub use session::{SensorSummary, SessionPhase, SessionRecord};
pub use telemetry::{TelemetryPatch, TelemetrySample};
