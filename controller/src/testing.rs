//! Scripted collaborators shared by the recovery and poll loop tests.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use coolwatch_common::{HvacMode, HvacState, Sample};

use crate::{
    client::{ApiError, ApiFuture, ThermostatApi},
    journal::RecordLog,
    notify::{WebhookMethod, WebhookTransport},
};

pub fn cooling(temperature_f: i32) -> Sample {
    Sample::new(temperature_f, HvacMode::Cool, HvacState::Cooling)
}

pub fn in_mode(temperature_f: i32, mode: HvacMode) -> Sample {
    let state = match mode {
        HvacMode::Cool => HvacState::Cooling,
        HvacMode::Heat => HvacState::Heating,
        _ => HvacState::Off,
    };
    Sample::new(temperature_f, mode, state)
}

/// Plays back queued results. An exhausted write queue confirms the requested mode.
#[derive(Default)]
pub struct ScriptedApi {
    reads: Mutex<VecDeque<Result<Sample, ApiError>>>,
    writes: Mutex<VecDeque<Result<Sample, ApiError>>>,
    written: Mutex<Vec<HvacMode>>,
    read_calls: AtomicUsize,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_read(&self, result: Result<Sample, ApiError>) -> &Self {
        self.reads.lock().unwrap().push_back(result);
        self
    }

    pub fn push_write(&self, result: Result<Sample, ApiError>) -> &Self {
        self.writes.lock().unwrap().push_back(result);
        self
    }

    pub fn written(&self) -> Vec<HvacMode> {
        self.written.lock().unwrap().clone()
    }

    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }
}

impl ThermostatApi for ScriptedApi {
    fn read(&self) -> ApiFuture<'_, Sample> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .reads
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::Transport("read script exhausted".into())));
        Box::pin(async move { next })
    }

    fn write(&self, mode: HvacMode) -> ApiFuture<'_, Sample> {
        self.written.lock().unwrap().push(mode);
        let next = self
            .writes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(in_mode(75, mode)));
        Box::pin(async move { next })
    }
}

/// A webhook endpoint that never answers.
pub struct HangingWebhooks;

impl WebhookTransport for HangingWebhooks {
    fn call<'a>(&'a self, _method: WebhookMethod, _url: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(std::future::pending())
    }
}

/// A webhook endpoint that always refuses the connection.
pub struct FailingWebhooks;

impl WebhookTransport for FailingWebhooks {
    fn call<'a>(&'a self, _method: WebhookMethod, _url: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async { Err(ApiError::Transport("connection refused".into())) })
    }
}

pub async fn temp_log(dir: &tempfile::TempDir) -> RecordLog {
    RecordLog::create(dir.path().join("nest.tsv")).await.unwrap()
}

/// Notes column of every row after the header.
pub async fn notes(log: &RecordLog) -> Vec<String> {
    tokio::fs::read_to_string(log.path())
        .await
        .unwrap()
        .lines()
        .skip(1)
        .map(|line| line.split('\t').nth(3).unwrap_or_default().to_owned())
        .collect()
}
