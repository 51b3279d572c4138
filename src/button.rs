use crate::error::RecorderError;
use crate::session::SessionController;
use crate::shutdown::ShutdownScheduler;
use log::{debug, info, warn};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Poll cadence of the input monitor.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Presses held longer than this classify as long presses.
pub const LONG_PRESS_THRESHOLD: Duration = Duration::from_secs(2);

/// Physical button read primitive. Construction may fail (missing GPIO,
/// missing helper binary); that is a fatal startup condition for the input
/// monitor only, reported once.
pub trait ButtonSource: Send {
    fn is_pressed(&mut self) -> io::Result<bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    ShortPress,
    LongPress,
}

/// Classifies press/release timing into button events.
///
/// One event per press, emitted on release; a press still ongoing when the
/// monitor stops is abandoned without an event.
#[derive(Debug, Default)]
pub struct PressTracker {
    press_started: Option<Instant>,
}

impl PressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one poll observation. A failed read is reported by the caller as
    /// `pressed = false`.
    pub fn poll(&mut self, pressed: bool, now: Instant) -> Option<ButtonEvent> {
        if pressed {
            if self.press_started.is_none() {
                self.press_started = Some(now);
            }
            return None;
        }

        let started = self.press_started.take()?;
        let held = now.duration_since(started);
        if held <= LONG_PRESS_THRESHOLD {
            Some(ButtonEvent::ShortPress)
        } else {
            Some(ButtonEvent::LongPress)
        }
    }
}

/// Apply a classified event to the session.
pub fn dispatch(
    event: ButtonEvent,
    controller: &SessionController,
    shutdown: &dyn ShutdownScheduler,
) {
    match event {
        ButtonEvent::ShortPress => {
            info!("short press: toggling recording");
            controller.toggle();
        }
        ButtonEvent::LongPress => {
            info!("long press: stopping session and scheduling shutdown");
            controller.set_active(false);
            shutdown.schedule();
        }
    }
}

/// Input monitor loop. Polls the button every [`POLL_INTERVAL`] until the
/// stop signal flips; transient read failures count as "not pressed".
pub async fn monitor_loop(
    mut source: Box<dyn ButtonSource>,
    controller: Arc<SessionController>,
    shutdown: Arc<dyn ShutdownScheduler>,
    mut stop: watch::Receiver<bool>,
) {
    let mut tracker = PressTracker::new();
    info!("input monitor running");

    loop {
        tokio::select! {
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
            _ = stop.changed() => {}
        }
        if *stop.borrow() {
            break;
        }

        let pressed = match source.is_pressed() {
            Ok(pressed) => pressed,
            Err(e) => {
                debug!("button read failed, treating as released: {}", e);
                false
            }
        };

        if let Some(event) = tracker.poll(pressed, Instant::now()) {
            dispatch(event, &controller, shutdown.as_ref());
        }
    }

    info!("input monitor stopped");
}

/// Button wired to a GPIO pin exposed through sysfs, active low (pull-up).
pub struct SysfsButton {
    value_path: PathBuf,
}

impl SysfsButton {
    pub fn new(pin: u32) -> Result<Self, RecorderError> {
        // The export write fails with EBUSY when the pin is already exported
        // from a previous run; that is fine.
        if let Err(e) = fs::write("/sys/class/gpio/export", pin.to_string()) {
            debug!("gpio export {}: {}", pin, e);
        }
        std::thread::sleep(Duration::from_millis(100));

        fs::write(format!("/sys/class/gpio/gpio{}/direction", pin), "in")
            .map_err(|e| RecorderError::ButtonInit(format!("gpio {} direction: {}", pin, e)))?;

        let value_path = PathBuf::from(format!("/sys/class/gpio/gpio{}/value", pin));
        fs::read_to_string(&value_path)
            .map_err(|e| RecorderError::ButtonInit(format!("gpio {} value: {}", pin, e)))?;

        info!("sysfs button ready on GPIO {}", pin);
        Ok(SysfsButton { value_path })
    }
}

impl ButtonSource for SysfsButton {
    fn is_pressed(&mut self) -> io::Result<bool> {
        let raw = fs::read_to_string(&self.value_path)?;
        Ok(raw.trim() == "0")
    }
}

/// Button read through the `gpioget` character-device CLI, for kernels where
/// the sysfs interface is gone (Pi 5 and later).
pub struct GpiogetButton {
    chip: String,
    line: u32,
}

impl GpiogetButton {
    pub fn new(chip: impl Into<String>, line: u32) -> Result<Self, RecorderError> {
        let mut button = GpiogetButton {
            chip: chip.into(),
            line,
        };
        button
            .is_pressed()
            .map_err(|e| RecorderError::ButtonInit(format!("gpioget probe: {}", e)))?;

        info!("gpioget button ready on {} line {}", button.chip, button.line);
        Ok(button)
    }
}

impl ButtonSource for GpiogetButton {
    fn is_pressed(&mut self) -> io::Result<bool> {
        let output = Command::new("gpioget")
            .arg(&self.chip)
            .arg(self.line.to_string())
            .output()?;

        if !output.status.success() {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("gpioget exited with {}", output.status),
            ));
        }

        match String::from_utf8_lossy(&output.stdout).trim() {
            "0" => Ok(true), // active low
            "1" => Ok(false),
            other => {
                warn!("unexpected gpioget output: {:?}", other);
                Err(io::Error::new(io::ErrorKind::InvalidData, "bad gpioget output"))
            }
        }
    }
}
