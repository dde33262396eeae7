use std::sync::Arc;

use reqwest::{Method, StatusCode};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use coolwatch_common::WatchdogConfig;

use crate::{
    client::{ApiError, ApiFuture},
    journal::RecordLog,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookMethod {
    Post,
    Get,
}

impl WebhookMethod {
    pub fn label(self) -> &'static str {
        match self {
            Self::Post => "webhook-post",
            Self::Get => "webhook-get",
        }
    }

    fn http_method(self) -> Method {
        match self {
            Self::Post => Method::POST,
            Self::Get => Method::GET,
        }
    }
}

pub trait WebhookTransport: Send + Sync {
    fn call<'a>(&'a self, method: WebhookMethod, url: &'a str) -> ApiFuture<'a, ()>;
}

/// Bodyless webhook calls; anything but 200 counts as a failure.
#[derive(Default)]
pub struct HttpWebhooks {
    http: reqwest::Client,
}

impl HttpWebhooks {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl WebhookTransport for HttpWebhooks {
    fn call<'a>(&'a self, method: WebhookMethod, url: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let response = self
                .http
                .request(method.http_method(), url)
                .send()
                .await
                .map_err(|err| ApiError::Transport(err.to_string()))?;

            let status = response.status();
            if status != StatusCode::OK {
                let body = response.text().await.unwrap_or_default();
                return Err(ApiError::Protocol { status, body });
            }
            Ok(())
        })
    }
}

/// Fires the configured restart webhooks without blocking the caller.
#[derive(Clone)]
pub struct Notifier {
    transport: Arc<dyn WebhookTransport>,
    post_url: Option<String>,
    get_url: Option<String>,
}

impl Notifier {
    pub fn new(
        transport: Arc<dyn WebhookTransport>,
        post_url: Option<String>,
        get_url: Option<String>,
    ) -> Self {
        Self {
            transport,
            post_url,
            get_url,
        }
    }

    pub fn from_config(config: &WatchdogConfig) -> Self {
        Self::new(
            Arc::new(HttpWebhooks::new()),
            config.webhook_post.clone(),
            config.webhook_get.clone(),
        )
    }

    pub fn is_configured(&self) -> bool {
        self.post_url.is_some() || self.get_url.is_some()
    }

    /// Spawns both calls on one task and returns its handle, or `None` when no
    /// webhook is configured. Outcomes are logged, never returned.
    pub fn spawn(&self, log: RecordLog) -> Option<JoinHandle<()>> {
        if !self.is_configured() {
            return None;
        }

        let notifier = self.clone();
        Some(tokio::spawn(async move {
            tokio::join!(
                notifier.fire(WebhookMethod::Post, notifier.post_url.as_deref(), &log),
                notifier.fire(WebhookMethod::Get, notifier.get_url.as_deref(), &log)
            );
        }))
    }

    async fn fire(&self, method: WebhookMethod, url: Option<&str>, log: &RecordLog) {
        let Some(url) = url else {
            return;
        };

        match self.transport.call(method, url).await {
            Ok(()) => {
                info!(webhook = method.label(), "webhook performed");
                log.note(format!("{} performed", method.label())).await;
            }
            Err(err) => {
                warn!(webhook = method.label(), kind = err.kind(), "problem with webhook: {err}");
                log.note(format!("problem with {}: {err}", method.label()))
                    .await;
            }
        }
    }
}
