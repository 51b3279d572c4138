use chrono::Local;
use std::sync::Mutex;

/// Timestamp format embedded in session artifact names.
pub const STAMP_FORMAT: &str = "%m%d%Y-%H%M%S";

/// Format the current local time as a session stamp (`MMDDYYYY-HHMMSS`).
pub fn session_stamp() -> String {
    Local::now().format(STAMP_FORMAT).to_string()
}

/// A state change observed by [`RecordingState::set_active`] or
/// [`RecordingState::toggle`]. Returned to the caller so start/stop side
/// effects run outside the lock, at most once per transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Recording became active; carries the session stamp taken at the
    /// moment of the transition.
    Started(String),
    /// Recording became inactive.
    Stopped,
}

#[derive(Debug, Default)]
struct Inner {
    active: bool,
    session_stamp: Option<String>,
}

/// The single authoritative recording flag, shared across every loop.
///
/// All reads and writes go through one mutex held only for the duration of
/// the access itself, never across I/O.
#[derive(Debug, Default)]
pub struct RecordingState {
    inner: Mutex<Inner>,
}

impl RecordingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock-protected read, no side effects.
    pub fn is_active(&self) -> bool {
        self.inner.lock().unwrap().active
    }

    /// Stamp of the currently active session, if any.
    pub fn session_stamp(&self) -> Option<String> {
        self.inner.lock().unwrap().session_stamp.clone()
    }

    /// Write the new value under the lock. Returns the transition when the
    /// value actually changed; `None` means nothing to do for the caller.
    pub fn set_active(&self, active: bool) -> Option<Transition> {
        let mut inner = self.inner.lock().unwrap();
        if inner.active == active {
            return None;
        }
        inner.active = active;
        if active {
            let stamp = session_stamp();
            inner.session_stamp = Some(stamp.clone());
            Some(Transition::Started(stamp))
        } else {
            inner.session_stamp = None;
            Some(Transition::Stopped)
        }
    }

    /// Atomic read-modify-write toggle under the same lock, so two toggles
    /// can never both observe the same prior value.
    pub fn toggle(&self) -> Transition {
        let mut inner = self.inner.lock().unwrap();
        inner.active = !inner.active;
        if inner.active {
            let stamp = session_stamp();
            inner.session_stamp = Some(stamp.clone());
            Transition::Started(stamp)
        } else {
            inner.session_stamp = None;
            Transition::Stopped
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_inactive() {
        let state = RecordingState::new();
        assert!(!state.is_active());
        assert_eq!(state.session_stamp(), None);
    }

    #[test]
    fn set_active_reports_transitions_once() {
        let state = RecordingState::new();

        let t = state.set_active(true);
        assert!(matches!(t, Some(Transition::Started(_))));
        assert!(state.is_active());
        assert!(state.session_stamp().is_some());

        // Same value again: no transition, side effects must not rerun.
        assert_eq!(state.set_active(true), None);

        assert_eq!(state.set_active(false), Some(Transition::Stopped));
        assert!(!state.is_active());
        assert_eq!(state.session_stamp(), None);

        assert_eq!(state.set_active(false), None);
    }

    #[test]
    fn toggle_alternates_directions() {
        let state = RecordingState::new();

        assert!(matches!(state.toggle(), Transition::Started(_)));
        assert!(state.is_active());

        assert_eq!(state.toggle(), Transition::Stopped);
        assert!(!state.is_active());
    }

    #[test]
    fn session_stamp_shape() {
        let stamp = session_stamp();
        // MMDDYYYY-HHMMSS
        assert_eq!(stamp.len(), 15);
        assert_eq!(stamp.as_bytes()[8], b'-');
        assert!(stamp
            .chars()
            .enumerate()
            .all(|(i, c)| if i == 8 { c == '-' } else { c.is_ascii_digit() }));
    }
}
