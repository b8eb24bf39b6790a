pub mod loop_worker;
pub mod smoothing;
pub mod state;
pub mod window;

pub use loop_worker::{system_clock, Clock};
pub use state::{LoopSnapshot, SessionLoopState};
pub use window::{IntensityReading, RollingWindow, WINDOW_CAPACITY};
