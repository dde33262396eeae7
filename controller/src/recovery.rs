use tokio::task::JoinHandle;
use tracing::{info, warn};

use coolwatch_common::{record, HvacMode, Sample};

use crate::{client::ThermostatApi, journal::RecordLog, notify::Notifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    TurnOff,
    TurnOn,
}

impl Step {
    fn waiting_note(self) -> &'static str {
        match self {
            Self::TurnOff => record::NOTE_WAITING_OFF,
            Self::TurnOn => record::NOTE_WAITING_ON,
        }
    }

    fn confirmed_note(self) -> &'static str {
        match self {
            Self::TurnOff => record::NOTE_TURNED_OFF,
            Self::TurnOn => record::NOTE_TURNED_ON,
        }
    }

    fn failure_note(self) -> &'static str {
        match self {
            Self::TurnOff => "Error turning system off",
            Self::TurnOn => "Error turning system back on",
        }
    }
}

/// Result of one off/on cycle. Only `restarted` outlives the sequence, as the next baseline.
#[derive(Debug)]
pub struct RecoveryOutcome {
    pub shut_off: Sample,
    pub restarted: Sample,
    pub write_attempts: u32,
    pub notifications: Option<JoinHandle<()>>,
}

/// Cycles the system off and back to `original_mode`, the mode `trigger` was read in.
///
/// Both steps retry until the device reports the requested mode. There is no
/// attempt limit, so a device that never reports the mode keeps this future
/// pending. Webhooks run on their own task and are never awaited here.
pub async fn recover<A>(
    api: &A,
    log: &RecordLog,
    notifier: &Notifier,
    trigger: &Sample,
    original_mode: HvacMode,
) -> RecoveryOutcome
where
    A: ThermostatApi + ?Sized,
{
    warn!(
        temperature_f = trigger.temperature_f,
        mode = trigger.mode.as_str(),
        "temperature rising while cooling, restarting system"
    );
    log.note(record::NOTE_RESTARTING).await;

    let notifications = notifier.spawn(log.clone());

    let (shut_off, off_attempts) = confirmed_write(api, log, HvacMode::Off, Step::TurnOff).await;
    let (restarted, on_attempts) = confirmed_write(api, log, original_mode, Step::TurnOn).await;

    RecoveryOutcome {
        shut_off,
        restarted,
        write_attempts: off_attempts + on_attempts,
        notifications,
    }
}

async fn confirmed_write<A>(api: &A, log: &RecordLog, target: HvacMode, step: Step) -> (Sample, u32)
where
    A: ThermostatApi + ?Sized,
{
    let mut attempts: u32 = 0;

    loop {
        attempts = attempts.saturating_add(1);

        match api.write(target).await {
            Ok(sample) if sample.mode == target => {
                info!(mode = target.as_str(), attempts, "{}", step.confirmed_note());
                log.note(step.confirmed_note()).await;
                return (sample, attempts);
            }
            Ok(sample) => {
                warn!(
                    wanted = target.as_str(),
                    reported = sample.mode.as_str(),
                    attempts,
                    "{}",
                    step.waiting_note()
                );
                log.note(step.waiting_note()).await;
            }
            Err(err) => {
                warn!(kind = err.kind(), attempts, "{}: {err}", step.failure_note());
                log.note(format!("{}: {err}", step.failure_note())).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use coolwatch_common::record::{
        NOTE_RESTARTING, NOTE_TURNED_OFF, NOTE_TURNED_ON, NOTE_WAITING_OFF, NOTE_WAITING_ON,
    };

    use super::*;
    use crate::{
        client::ApiError,
        testing::{cooling, in_mode, notes, temp_log, FailingWebhooks, HangingWebhooks, ScriptedApi},
    };

    fn silent() -> Notifier {
        Notifier::new(Arc::new(FailingWebhooks), None, None)
    }

    #[tokio::test]
    async fn immediate_confirmation_takes_two_writes() {
        let dir = tempfile::tempdir().unwrap();
        let log = temp_log(&dir).await;
        let api = ScriptedApi::new();
        api.push_write(Ok(in_mode(72, HvacMode::Off)))
            .push_write(Ok(in_mode(71, HvacMode::Cool)));

        let outcome = recover(&api, &log, &silent(), &cooling(72), HvacMode::Cool).await;

        assert_eq!(api.written(), vec![HvacMode::Off, HvacMode::Cool]);
        assert_eq!(outcome.write_attempts, 2);
        assert_eq!(outcome.shut_off.mode, HvacMode::Off);
        assert_eq!(outcome.restarted, in_mode(71, HvacMode::Cool));
        assert!(outcome.notifications.is_none());
        assert_eq!(
            notes(&log).await,
            vec![NOTE_RESTARTING, NOTE_TURNED_OFF, NOTE_TURNED_ON]
        );
    }

    #[tokio::test]
    async fn waits_until_mode_matches() {
        const LAGGING: usize = 3;

        let dir = tempfile::tempdir().unwrap();
        let log = temp_log(&dir).await;
        let api = ScriptedApi::new();
        for _ in 0..LAGGING {
            api.push_write(Ok(cooling(73)));
        }
        api.push_write(Ok(in_mode(73, HvacMode::Off)));

        let outcome = recover(&api, &log, &silent(), &cooling(73), HvacMode::Cool).await;

        let off_writes = api
            .written()
            .iter()
            .filter(|mode| **mode == HvacMode::Off)
            .count();
        assert_eq!(off_writes, LAGGING + 1);
        assert_eq!(outcome.write_attempts as usize, LAGGING + 2);

        let notes = notes(&log).await;
        let waiting = notes.iter().filter(|n| *n == NOTE_WAITING_OFF).count();
        assert_eq!(waiting, LAGGING);
        assert!(!notes.iter().any(|n| n == NOTE_WAITING_ON));
    }

    #[tokio::test]
    async fn write_errors_are_logged_and_retried() {
        let dir = tempfile::tempdir().unwrap();
        let log = temp_log(&dir).await;
        let api = ScriptedApi::new();
        api.push_write(Ok(in_mode(74, HvacMode::Off)))
            .push_write(Err(ApiError::Transport("connection reset".into())))
            .push_write(Ok(in_mode(74, HvacMode::Off)))
            .push_write(Ok(in_mode(74, HvacMode::Heat)));

        let trigger = in_mode(74, HvacMode::Heat);
        let outcome = recover(&api, &log, &silent(), &trigger, trigger.mode).await;

        assert_eq!(
            api.written(),
            vec![HvacMode::Off, HvacMode::Heat, HvacMode::Heat, HvacMode::Heat]
        );
        assert_eq!(outcome.restarted.mode, HvacMode::Heat);
        assert_eq!(
            notes(&log).await,
            vec![
                NOTE_RESTARTING.to_owned(),
                NOTE_TURNED_OFF.to_owned(),
                "Error turning system back on: could not communicate: connection reset".to_owned(),
                NOTE_WAITING_ON.to_owned(),
                NOTE_TURNED_ON.to_owned(),
            ]
        );
    }

    #[tokio::test]
    async fn hanging_webhooks_do_not_block_the_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let log = temp_log(&dir).await;
        let api = ScriptedApi::new();
        let notifier = Notifier::new(
            Arc::new(HangingWebhooks),
            Some("https://hooks.example.com/post".into()),
            Some("https://hooks.example.com/get".into()),
        );

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            recover(&api, &log, &notifier, &cooling(72), HvacMode::Cool),
        )
        .await
        .expect("recovery must not wait on webhooks");

        let handle = outcome.notifications.expect("webhooks configured");
        assert!(!handle.is_finished());
        handle.abort();

        assert_eq!(outcome.write_attempts, 2);
        assert!(notes(&log).await.iter().any(|n| n == NOTE_TURNED_ON));
    }

    #[tokio::test]
    async fn failing_webhooks_do_not_abort_the_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let log = temp_log(&dir).await;
        let api = ScriptedApi::new();
        let notifier = Notifier::new(
            Arc::new(FailingWebhooks),
            Some("https://hooks.example.com/post".into()),
            None,
        );

        let outcome = recover(&api, &log, &notifier, &cooling(72), HvacMode::Cool).await;
        outcome.notifications.unwrap().await.unwrap();

        let notes = notes(&log).await;
        assert!(notes.iter().any(|n| n == NOTE_TURNED_OFF));
        assert!(notes.iter().any(|n| n == NOTE_TURNED_ON));
        assert!(notes
            .iter()
            .any(|n| n.starts_with("problem with webhook-post")));
    }
}
