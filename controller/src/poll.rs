use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use coolwatch_common::{MonitorAction, ObservationRecord, PollState, Sample};

use crate::{client::ThermostatApi, journal::RecordLog, notify::Notifier, recovery};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Sampled(Sample),
    Recovered { trigger: Sample, restarted: Sample },
    ReadFailed,
}

/// Drives one thermostat: sample, detect, recover, sleep.
pub struct Watchdog<A> {
    api: A,
    log: RecordLog,
    notifier: Notifier,
    interval: Duration,
    notifications: Vec<JoinHandle<()>>,
}

impl<A: ThermostatApi> Watchdog<A> {
    pub fn new(api: A, log: RecordLog, notifier: Notifier, interval: Duration) -> Self {
        Self {
            api,
            log,
            notifier,
            interval,
            notifications: Vec::new(),
        }
    }

    pub async fn tick(&mut self, state: &mut PollState) -> TickOutcome {
        let sample = match self.api.read().await {
            Ok(sample) => sample,
            Err(err) => {
                state.read_failed();
                warn!(
                    kind = err.kind(),
                    consecutive = state.consecutive_read_failures(),
                    "error in GET request: {err}"
                );
                self.log.note(err.to_string()).await;
                return TickOutcome::ReadFailed;
            }
        };

        info!(
            temperature_f = sample.temperature_f,
            mode = sample.mode.as_str(),
            cooling = sample.is_cooling,
            "sampled thermostat"
        );
        self.log.record(ObservationRecord::sample(&sample)).await;

        match state.observe(&sample) {
            MonitorAction::Advance => TickOutcome::Sampled(sample),
            MonitorAction::Restart { original_mode } => {
                debug!(phase = ?state.phase(), "fault detected");
                let outcome = recovery::recover(
                    &self.api,
                    &self.log,
                    &self.notifier,
                    &sample,
                    original_mode,
                )
                .await;
                info!(
                    write_attempts = outcome.write_attempts,
                    off_temperature_f = outcome.shut_off.temperature_f,
                    "system restarted"
                );
                state.recovery_complete(&outcome.restarted);
                if let Some(handle) = outcome.notifications {
                    self.notifications.push(handle);
                }
                TickOutcome::Recovered {
                    trigger: sample,
                    restarted: outcome.restarted,
                }
            }
        }
    }

    /// Polls until the surrounding task is dropped.
    pub async fn run(&mut self, mut state: PollState) {
        info!(
            interval_secs = self.interval.as_secs(),
            output = %self.log.path().display(),
            "watchdog started"
        );

        loop {
            match self.tick(&mut state).await {
                TickOutcome::Sampled(sample) => {
                    debug!(temperature_f = sample.temperature_f, "baseline advanced");
                }
                TickOutcome::Recovered { trigger, restarted } => info!(
                    trigger_temperature_f = trigger.temperature_f,
                    restarted_temperature_f = restarted.temperature_f,
                    "baseline replaced after restart"
                ),
                TickOutcome::ReadFailed => {}
            }
            self.notifications.retain(|handle| !handle.is_finished());
            debug!(
                last_is_cooling = state.last_is_cooling,
                last_temperature_f = state.last_temperature_f,
                "sleeping until next sample"
            );
            tokio::time::sleep(self.interval).await;
        }
    }

    /// Waits up to `grace` for webhook calls still in flight, then abandons them.
    pub async fn shutdown(self, grace: Duration) {
        let pending: Vec<_> = self
            .notifications
            .into_iter()
            .filter(|handle| !handle.is_finished())
            .collect();
        if pending.is_empty() {
            return;
        }

        info!(count = pending.len(), "waiting for webhook notifications");
        let aborts: Vec<_> = pending.iter().map(JoinHandle::abort_handle).collect();
        let drained = tokio::time::timeout(grace, async {
            for handle in pending {
                if let Err(err) = handle.await {
                    warn!("webhook task failed: {err}");
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!("webhook notifications still pending after {grace:?}, abandoning them");
            for abort in aborts {
                abort.abort();
            }
        }
    }
}
