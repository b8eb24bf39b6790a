pub mod controller;

pub use controller::{ControllerConfig, SessionController};
