use crate::gps::GpsSource;
use crate::imu::ImuCache;
use crate::state::{session_stamp, RecordingState};
use log::{debug, error, info, warn};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Pause after the GPS append in each iteration.
pub const GPS_INTERVAL: Duration = Duration::from_millis(300);
/// Pause after the inertial row append in each iteration.
pub const IMU_INTERVAL: Duration = Duration::from_millis(100);
/// Idle poll while no session is active.
const IDLE_INTERVAL: Duration = Duration::from_millis(100);

const GPS_CHUNK_LEN: usize = 256;

/// The pair of per-session artifact files. A failed open is reported once
/// and that artifact is simply missing for the session; writes to the other
/// file continue.
pub struct SessionFiles {
    gps: Option<File>,
    imu: Option<File>,
}

impl SessionFiles {
    pub fn create(dir: &Path, stamp: &str) -> Self {
        SessionFiles {
            gps: open_artifact(dir.join(format!("gps_{}.csv", stamp))),
            imu: open_artifact(dir.join(format!("imu_{}.csv", stamp))),
        }
    }

    /// Append a raw GPS chunk. Best-effort: a failed write drops the chunk.
    pub fn append_gps(&mut self, chunk: &[u8]) {
        if let Some(file) = &mut self.gps {
            if let Err(e) = file.write_all(chunk) {
                warn!("gps chunk dropped: {}", e);
            }
        }
    }

    /// Append one inertial row in a single write, so the file never holds a
    /// partial row.
    pub fn append_imu_row(&mut self, row: &str) {
        if let Some(file) = &mut self.imu {
            if let Err(e) = file.write_all(row.as_bytes()) {
                warn!("imu row dropped: {}", e);
            }
        }
    }
}

fn open_artifact(path: PathBuf) -> Option<File> {
    match File::create(&path) {
        Ok(file) => Some(file),
        Err(e) => {
            error!(
                "cannot create {}; session continues without it: {}",
                path.display(),
                e
            );
            None
        }
    }
}

/// One recording session: open the file pair, sample at a fixed cadence
/// until the state flips inactive (or a stop is signalled), then close.
///
/// The GPS append always precedes the inertial row within an iteration, and
/// rows land in iteration order; exit latency is bounded by one iteration's
/// sleeps (~400 ms).
pub async fn run_session(
    state: &RecordingState,
    stop: &watch::Receiver<bool>,
    gps: &mut Option<Box<dyn GpsSource>>,
    cache: &ImuCache,
    dir: &Path,
) {
    let stamp = state.session_stamp().unwrap_or_else(session_stamp);
    let mut files = SessionFiles::create(dir, &stamp);
    info!("logging session {} under {}", stamp, dir.display());

    let mut chunk = [0u8; GPS_CHUNK_LEN];
    let mut rows = 0u64;

    while state.is_active() && !*stop.borrow() {
        if let Some(source) = gps.as_deref_mut() {
            match source.read_chunk(&mut chunk) {
                Ok(0) => {}
                Ok(n) => files.append_gps(&chunk[..n]),
                Err(e) => debug!("gps read failed: {}", e),
            }
        }
        tokio::time::sleep(GPS_INTERVAL).await;

        files.append_imu_row(&cache.csv_row());
        rows += 1;
        tokio::time::sleep(IMU_INTERVAL).await;
    }

    info!("session {} closed after {} rows", stamp, rows);
}

/// Top-level session loop: waits for the recording flag, runs one session
/// at a time, and returns once the stop signal flips. At most one session's
/// files are ever open, and a new session cannot begin until the previous
/// one's files are closed.
pub async fn session_loop(
    state: Arc<RecordingState>,
    stop: watch::Receiver<bool>,
    mut gps: Option<Box<dyn GpsSource>>,
    cache: Arc<ImuCache>,
    dir: PathBuf,
) {
    info!("session logger running");

    loop {
        if *stop.borrow() {
            break;
        }
        if state.is_active() {
            run_session(&state, &stop, &mut gps, &cache, &dir).await;
        } else {
            tokio::time::sleep(IDLE_INTERVAL).await;
        }
    }

    info!("session logger stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    struct ScriptedGps {
        chunks: Vec<Vec<u8>>,
    }

    impl GpsSource for ScriptedGps {
        fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.chunks.pop() {
                Some(chunk) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
                None => Ok(0),
            }
        }
    }

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "ride_recorder_{}_{}",
            tag,
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn session_files_are_named_by_stamp() {
        let dir = temp_dir("names");
        let _files = SessionFiles::create(&dir, "01022026-101500");

        assert!(dir.join("gps_01022026-101500.csv").exists());
        assert!(dir.join("imu_01022026-101500.csv").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_directory_degrades_without_panic() {
        let dir = std::env::temp_dir().join("ride_recorder_no_such_dir/deeper");
        let mut files = SessionFiles::create(&dir, "01022026-101500");

        files.append_gps(b"$GPGGA,");
        files.append_imu_row("0.0,0.0,0.0,0.0,0.0,0.0,0.0,0.0,0.0\n");
    }

    #[tokio::test]
    async fn session_logs_rows_until_state_flips() {
        let dir = temp_dir("session");
        let state = Arc::new(RecordingState::new());
        state.set_active(true);
        let stamp = state.session_stamp().unwrap();

        let cache = ImuCache::new();
        cache.apply_line(r#"{"accel":{"x":1.0,"y":2.0,"z":3.0,"timestamp":100.0}}"#);
        let expected_row = cache.csv_row();

        let mut gps: Option<Box<dyn GpsSource>> = Some(Box::new(ScriptedGps {
            chunks: vec![b"$GPRMC,120000,A\r\n".to_vec()],
        }));

        let (_stop_tx, stop_rx) = watch::channel(false);
        let stopper = state.clone();
        let flip = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(850)).await;
            stopper.set_active(false);
        });

        run_session(&state, &stop_rx, &mut gps, &cache, &dir).await;
        flip.await.unwrap();

        let imu = std::fs::read_to_string(dir.join(format!("imu_{}.csv", stamp))).unwrap();
        let rows: Vec<&str> = imu.lines().collect();
        assert!(!rows.is_empty());
        for row in rows {
            assert_eq!(format!("{}\n", row), expected_row);
        }

        let gps_bytes = std::fs::read(dir.join(format!("gps_{}.csv", stamp))).unwrap();
        assert_eq!(gps_bytes, b"$GPRMC,120000,A\r\n");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn stop_signal_ends_session_even_while_active() {
        let dir = temp_dir("stop");
        let state = Arc::new(RecordingState::new());
        state.set_active(true);

        let cache = ImuCache::new();
        let mut gps: Option<Box<dyn GpsSource>> = None;

        let (stop_tx, stop_rx) = watch::channel(false);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(450)).await;
            let _ = stop_tx.send(true);
        });

        run_session(&state, &stop_rx, &mut gps, &cache, &dir).await;

        // The state never flipped; only the stop signal ended the loop.
        assert!(state.is_active());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
