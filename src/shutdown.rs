use log::{error, info};
use std::process::{Command, Stdio};
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;

/// Default countdown before the host powers off after a long press.
pub const DEFAULT_SHUTDOWN_DELAY: Duration = Duration::from_secs(10);

/// Schedules a delayed power-off of the host.
pub trait ShutdownScheduler: Send + Sync {
    /// Returns immediately; the countdown runs outside this process. Once
    /// scheduled it cannot be cancelled from here.
    fn schedule(&self);
}

/// Hands the countdown to a detached shell so it survives this process.
pub struct HostShutdown {
    delay: Duration,
}

impl HostShutdown {
    pub fn new(delay: Duration) -> Self {
        HostShutdown { delay }
    }
}

impl ShutdownScheduler for HostShutdown {
    fn schedule(&self) {
        let secs = self.delay.as_secs();
        info!("shutting down the system in {} seconds", secs);

        let result = Command::new("sh")
            .arg("-c")
            .arg(format!("sleep {} && shutdown -h now", secs))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        if let Err(e) = result {
            error!("failed to schedule shutdown: {}", e);
        }
    }
}

/// Wait for SIGINT or SIGTERM, then flip the stop signal. Every loop checks
/// the watch channel each iteration and winds down cooperatively.
pub async fn signal_listener(stop: watch::Sender<bool>) {
    let ctrl_c = tokio::signal::ctrl_c();

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = ctrl_c => info!("received SIGINT, stopping"),
                _ = term.recv() => info!("received SIGTERM, stopping"),
            }
        }
        Err(e) => {
            error!("failed to install SIGTERM handler: {}", e);
            let _ = ctrl_c.await;
            info!("received SIGINT, stopping");
        }
    }

    let _ = stop.send(true);
}
