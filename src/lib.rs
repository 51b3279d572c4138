pub mod button;
pub mod capture;
pub mod error;
pub mod gps;
pub mod imu;
pub mod led;
pub mod logger;
pub mod session;
pub mod shutdown;
pub mod state;

pub use error::{RecorderError, Result};
