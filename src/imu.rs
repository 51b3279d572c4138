use log::{debug, error, info, warn};
use serde::Deserialize;
use std::fmt::Write as _;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::watch;

/// Accelerometer or gyroscope sample from the inertial feed.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Vec3Sample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub timestamp: f64,
}

/// Rotation-vector sample (unit quaternion components).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RotationSample {
    pub i: f64,
    pub j: f64,
    pub k: f64,
    pub real: f64,
    #[serde(default)]
    pub accuracy: f64,
    pub timestamp: f64,
}

/// One line of the feed: a JSON object keyed by sample kind.
#[derive(Debug, Deserialize)]
struct FeedRecord {
    accel: Option<Vec3Sample>,
    gyro: Option<Vec3Sample>,
    rotation_vector: Option<RotationSample>,
}

/// Most recent sample of each kind. `None` means that kind has produced no
/// data yet this run.
#[derive(Debug, Clone, Copy, Default)]
pub struct LatestSamples {
    pub accel: Option<Vec3Sample>,
    pub gyro: Option<Vec3Sample>,
    pub rotation: Option<RotationSample>,
}

/// Latest-reading cache fed by the acquisition loop and read by the session
/// logger. Each entry is replaced as a whole under the lock, so a reader
/// never sees a half-updated sample.
#[derive(Debug, Default)]
pub struct ImuCache {
    inner: Mutex<LatestSamples>,
}

impl ImuCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one feed line and overwrite the matching cache entries.
    /// Returns false for malformed or unrecognized lines, which are dropped.
    pub fn apply_line(&self, line: &str) -> bool {
        let record: FeedRecord = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(_) => return false,
        };

        if record.accel.is_none() && record.gyro.is_none() && record.rotation_vector.is_none() {
            return false;
        }

        let mut latest = self.inner.lock().unwrap();
        if let Some(accel) = record.accel {
            latest.accel = Some(accel);
        }
        if let Some(gyro) = record.gyro {
            latest.gyro = Some(gyro);
        }
        if let Some(rotation) = record.rotation_vector {
            latest.rotation = Some(rotation);
        }
        true
    }

    pub fn snapshot(&self) -> LatestSamples {
        *self.inner.lock().unwrap()
    }

    /// Format one CSV row: accel x,y,z, gyro x,y,z, rotation i,j,k.
    /// Kinds without data yet appear as literal `0.0` placeholders; the row
    /// is always complete and newline-terminated.
    pub fn csv_row(&self) -> String {
        let latest = self.snapshot();
        let mut row = String::with_capacity(96);

        match latest.accel {
            Some(a) => {
                let _ = write!(row, "{:.6},{:.6},{:.6}", a.x, a.y, a.z);
            }
            None => row.push_str("0.0,0.0,0.0"),
        }
        row.push(',');
        match latest.gyro {
            Some(g) => {
                let _ = write!(row, "{:.6},{:.6},{:.6}", g.x, g.y, g.z);
            }
            None => row.push_str("0.0,0.0,0.0"),
        }
        row.push(',');
        match latest.rotation {
            Some(r) => {
                let _ = write!(row, "{:.6},{:.6},{:.6}", r.i, r.j, r.k);
            }
            None => row.push_str("0.0,0.0,0.0"),
        }
        row.push('\n');
        row
    }
}

/// Inertial acquisition loop. Runs the configured feed command as a child
/// process and streams its stdout into the cache, independent of session
/// state, until the stop signal flips (or the feed ends). The caller joins
/// this task before process exit so no reader is left dangling on the feed.
pub async fn feed_loop(command: String, cache: Arc<ImuCache>, mut stop: watch::Receiver<bool>) {
    let mut parts = command.split_whitespace();
    let program = match parts.next() {
        Some(program) => program.to_string(),
        None => {
            error!("inertial feed command is empty");
            return;
        }
    };

    let mut child = match Command::new(&program)
        .args(parts)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            error!("failed to start inertial feed `{}`: {}", command, e);
            return;
        }
    };

    let stdout = match child.stdout.take() {
        Some(stdout) => stdout,
        None => {
            error!("inertial feed has no stdout");
            return;
        }
    };
    let mut lines = BufReader::new(stdout).lines();

    info!("inertial feed running: {}", command);

    loop {
        tokio::select! {
            _ = stop.changed() => {
                if *stop.borrow() {
                    break;
                }
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if !cache.apply_line(&line) {
                        debug!("dropped unrecognized inertial line");
                    }
                }
                Ok(None) => {
                    warn!("inertial feed ended");
                    break;
                }
                Err(e) => {
                    warn!("inertial feed read failed: {}", e);
                    break;
                }
            }
        }
    }

    let _ = child.start_kill();
    let _ = child.wait().await;
    info!("inertial feed stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accel_line_updates_cache() {
        let cache = ImuCache::new();
        assert!(cache.apply_line(r#"{"accel":{"x":1.0,"y":2.0,"z":3.0,"timestamp":100.0}}"#));

        let latest = cache.snapshot();
        let accel = latest.accel.unwrap();
        assert_eq!(accel.x, 1.0);
        assert_eq!(accel.timestamp, 100.0);
        assert!(latest.gyro.is_none());
        assert!(latest.rotation.is_none());
    }

    #[test]
    fn newer_sample_overwrites_older() {
        let cache = ImuCache::new();
        cache.apply_line(r#"{"gyro":{"x":0.1,"y":0.2,"z":0.3,"timestamp":1.0}}"#);
        cache.apply_line(r#"{"gyro":{"x":0.4,"y":0.5,"z":0.6,"timestamp":2.0}}"#);

        let gyro = cache.snapshot().gyro.unwrap();
        assert_eq!(gyro.x, 0.4);
        assert_eq!(gyro.timestamp, 2.0);
    }

    #[test]
    fn malformed_lines_are_dropped() {
        let cache = ImuCache::new();
        assert!(!cache.apply_line("not json"));
        assert!(!cache.apply_line(r#"{"magnetometer":{"x":1.0}}"#));
        assert!(!cache.apply_line(r#"{"accel":{"x":1.0}}"#)); // missing fields
        assert!(cache.snapshot().accel.is_none());
    }

    #[test]
    fn rotation_vector_accuracy_is_optional() {
        let cache = ImuCache::new();
        assert!(cache.apply_line(
            r#"{"rotation_vector":{"i":0.1,"j":0.2,"k":0.3,"real":0.9,"timestamp":5.0}}"#
        ));
        assert_eq!(cache.snapshot().rotation.unwrap().accuracy, 0.0);
    }

    #[test]
    fn empty_cache_formats_placeholder_row() {
        let cache = ImuCache::new();
        assert_eq!(cache.csv_row(), "0.0,0.0,0.0,0.0,0.0,0.0,0.0,0.0,0.0\n");
    }

    #[test]
    fn accel_only_row_keeps_placeholders_for_other_kinds() {
        let cache = ImuCache::new();
        cache.apply_line(r#"{"accel":{"x":1.0,"y":2.0,"z":3.0,"timestamp":100.0}}"#);
        assert_eq!(
            cache.csv_row(),
            "1.000000,2.000000,3.000000,0.0,0.0,0.0,0.0,0.0,0.0\n"
        );
    }

    #[test]
    fn full_row_formats_all_kinds() {
        let cache = ImuCache::new();
        cache.apply_line(r#"{"accel":{"x":1.0,"y":2.0,"z":3.0,"timestamp":1.0}}"#);
        cache.apply_line(r#"{"gyro":{"x":4.0,"y":5.0,"z":6.0,"timestamp":2.0}}"#);
        cache.apply_line(
            r#"{"rotation_vector":{"i":0.5,"j":0.25,"k":0.125,"real":0.8,"accuracy":3.0,"timestamp":3.0}}"#,
        );

        assert_eq!(
            cache.csv_row(),
            "1.000000,2.000000,3.000000,4.000000,5.000000,6.000000,0.500000,0.250000,0.125000\n"
        );
    }
}
