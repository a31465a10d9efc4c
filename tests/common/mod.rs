#![allow(dead_code)]

use chrono::{DateTime, Utc};
use copilot_usage_exporter::config::GithubConfig;
use copilot_usage_exporter::http::{GithubClient, Timer};
use futures::future::BoxFuture;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Fixed clock whose sleeps return at once and are remembered.
pub struct RecordingTimer {
    now: DateTime<Utc>,
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingTimer {
    pub fn at(epoch: i64) -> Arc<Self> {
        Arc::new(Self {
            now: DateTime::<Utc>::from_timestamp(epoch, 0).unwrap(),
            sleeps: Mutex::new(Vec::new()),
        })
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

impl Timer for RecordingTimer {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        self.sleeps.lock().unwrap().push(duration);
        Box::pin(futures::future::ready(()))
    }
}

pub const NOW: i64 = 1_750_000_000;

pub fn github_config(api_url: &str) -> GithubConfig {
    GithubConfig {
        token: "t0ken".into(),
        enterprise: "acme".into(),
        api_url: api_url.to_string(),
        api_version: "2022-11-28".into(),
        user_agent: "copilot-usage-exporter-tests".into(),
        timeout: Some(Duration::from_secs(5)),
    }
}

pub fn client(api_url: &str) -> (Arc<GithubClient>, Arc<RecordingTimer>) {
    let timer = RecordingTimer::at(NOW);
    let client = GithubClient::with_timer(&github_config(api_url), timer.clone()).unwrap();
    (Arc::new(client), timer)
}
