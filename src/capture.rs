use log::{error, info, warn};
use std::process::{Command, Stdio};
use std::time::Duration;

/// How long to wait after terminating capture instances for OS cleanup.
pub const KILL_GRACE: Duration = Duration::from_millis(200);

/// Control surface for the external video-capture subprocess.
///
/// Narrow on purpose so the orchestration core can be exercised with a fake
/// implementation; the real mechanics live in [`VideoCapture`].
pub trait CaptureControl: Send + Sync {
    /// Launch a capture subprocess whose output is named by `stamp`.
    /// Must guarantee no previous instance survives before launching.
    fn start(&self, stamp: &str);

    /// Terminate the capture subprocess by name.
    fn stop(&self);
}

/// Runs the capture helper program as a detached subprocess and terminates
/// it by process name. Prior runs may have left an orphaned instance behind
/// (crash, forced kill), so `start` always kills by name first rather than
/// trusting a process handle to exist.
pub struct VideoCapture {
    program: String,
    process_name: String,
}

impl VideoCapture {
    pub fn new(program: impl Into<String>, process_name: impl Into<String>) -> Self {
        VideoCapture {
            program: program.into(),
            process_name: process_name.into(),
        }
    }

    fn kill_existing(&self) {
        match Command::new("pkill").arg("-f").arg(&self.process_name).status() {
            Ok(_) => {}
            Err(e) => warn!("pkill {} failed: {}", self.process_name, e),
        }
        // Give the OS a moment to reap before touching the camera again.
        std::thread::sleep(KILL_GRACE);
    }
}

impl CaptureControl for VideoCapture {
    fn start(&self, stamp: &str) {
        self.kill_existing();

        let spawned = Command::new(&self.program)
            .arg(stamp)
            .arg("--action")
            .arg("start")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        match spawned {
            Ok(_) => info!("capture started for session {}", stamp),
            // Missing artifact only; the session keeps running degraded.
            Err(e) => error!("failed to launch capture `{}`: {}", self.program, e),
        }
    }

    fn stop(&self) {
        self.kill_existing();
        info!("capture stopped");
    }
}
