//! Session loop: one interval drives both the expiry check and the status poll

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use super::controller::PairingController;

/// Default cadence of the session loop
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(1);

/// Owner of a running session loop; closing it releases the loop and the session
pub struct SessionHandle {
    controller: PairingController,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn controller(&self) -> &PairingController {
        &self.controller
    }

    /// Dispose the session and stop the loop
    pub async fn close(&self) {
        self.controller.dispose().await;
        self.task.abort();
    }

    /// Wait for the loop to stop on its own (terminal state or close())
    pub async fn wait(&mut self) {
        if let Err(e) = (&mut self.task).await {
            if !e.is_cancelled() {
                debug!("Session loop ended abnormally: {}", e);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.controller.dispose_now();
        self.task.abort();
    }
}

/// Spawn the loop calling `tick()` then `poll()` every `period` until the session ends
pub fn spawn_session_loop(controller: PairingController, period: Duration) -> SessionHandle {
    let task = tokio::spawn(run_session_loop(controller.clone(), period));
    SessionHandle { controller, task }
}

async fn run_session_loop(controller: PairingController, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        controller.tick().await;
        controller.poll().await;

        if controller.is_finished().await {
            info!("🛑 Session loop finished with status {}", controller.status().await);
            break;
        }
    }
}
