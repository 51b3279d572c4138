use crate::capture::CaptureControl;
use crate::led::StatusLight;
use crate::state::{RecordingState, Transition};
use log::info;
use std::sync::Arc;

/// Applies the side effects of recording-state transitions.
///
/// The flag write happens inside [`RecordingState`] under its lock; the
/// transition value returned from there picks exactly one side-effect path
/// (start or stop), so the two directions cannot race for the same toggle.
pub struct SessionController {
    state: Arc<RecordingState>,
    capture: Arc<dyn CaptureControl>,
    recording_led: Option<Arc<dyn StatusLight>>,
}

impl SessionController {
    pub fn new(
        state: Arc<RecordingState>,
        capture: Arc<dyn CaptureControl>,
        recording_led: Option<Arc<dyn StatusLight>>,
    ) -> Self {
        SessionController {
            state,
            capture,
            recording_led,
        }
    }

    pub fn state(&self) -> &Arc<RecordingState> {
        &self.state
    }

    /// Flip the recording flag and run the matching side effects.
    pub fn toggle(&self) {
        let transition = self.state.toggle();
        self.apply(transition);
    }

    /// Force the recording flag to `active`; side effects run only when the
    /// value actually changed.
    pub fn set_active(&self, active: bool) {
        if let Some(transition) = self.state.set_active(active) {
            self.apply(transition);
        }
    }

    fn apply(&self, transition: Transition) {
        match transition {
            Transition::Started(stamp) => {
                info!("session {} starting", stamp);
                self.capture.start(&stamp);
                if let Some(led) = &self.recording_led {
                    led.set(true);
                }
            }
            Transition::Stopped => {
                info!("session stopping");
                self.capture.stop();
                if let Some(led) = &self.recording_led {
                    led.set(false);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records start/stop calls instead of touching real processes.
    pub(crate) struct FakeCapture {
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeCapture {
        pub(crate) fn new() -> Arc<Self> {
            Arc::new(FakeCapture {
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    impl CaptureControl for FakeCapture {
        fn start(&self, stamp: &str) {
            self.calls.lock().unwrap().push(format!("start {}", stamp));
        }

        fn stop(&self) {
            self.calls.lock().unwrap().push("stop".to_string());
        }
    }

    fn controller_with_fake() -> (SessionController, Arc<FakeCapture>) {
        let capture = FakeCapture::new();
        let controller = SessionController::new(
            Arc::new(RecordingState::new()),
            capture.clone(),
            None,
        );
        (controller, capture)
    }

    #[test]
    fn toggle_starts_then_stops_capture() {
        let (controller, capture) = controller_with_fake();

        controller.toggle();
        assert!(controller.state().is_active());
        let stamp = controller.state().session_stamp().unwrap();

        controller.toggle();
        assert!(!controller.state().is_active());

        let calls = capture.calls.lock().unwrap();
        assert_eq!(*calls, vec![format!("start {}", stamp), "stop".to_string()]);
    }

    #[test]
    fn set_active_is_idempotent() {
        let (controller, capture) = controller_with_fake();

        controller.set_active(true);
        controller.set_active(true);
        controller.set_active(false);
        controller.set_active(false);

        let calls = capture.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].starts_with("start "));
        assert_eq!(calls[1], "stop");
    }
}
