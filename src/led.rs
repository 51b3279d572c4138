use log::debug;
use std::fs;
use std::path::PathBuf;

/// Best-effort indicator light. Failures never propagate; a dead LED is not
/// worth interrupting a recording for.
pub trait StatusLight: Send + Sync {
    fn set(&self, on: bool);
}

/// LED driven through the sysfs GPIO interface.
pub struct SysfsLed {
    value_path: PathBuf,
}

impl SysfsLed {
    /// Export the pin and configure it as an output. Every step is
    /// best-effort: the pin may already be exported from a previous run.
    pub fn new(pin: u32) -> Self {
        let _ = fs::write("/sys/class/gpio/export", pin.to_string());
        std::thread::sleep(std::time::Duration::from_millis(100));
        let _ = fs::write(format!("/sys/class/gpio/gpio{}/direction", pin), "out");

        SysfsLed {
            value_path: PathBuf::from(format!("/sys/class/gpio/gpio{}/value", pin)),
        }
    }
}

impl StatusLight for SysfsLed {
    fn set(&self, on: bool) {
        if let Err(e) = fs::write(&self.value_path, if on { "1" } else { "0" }) {
            debug!("led write {} failed: {}", self.value_path.display(), e);
        }
    }
}
