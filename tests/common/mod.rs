#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use restock_watcher::fetcher::PageFetcher;
use restock_watcher::models::NewProduct;
use restock_watcher::monitor::MonitorConfig;
use restock_watcher::notifier::Notifier;

/// Fetcher scripted per url. Each fetch pops the next queued response; the
/// last response repeats once the queue is down to one entry. Unknown urls
/// behave like a selector miss.
pub struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, VecDeque<Option<String>>>>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub async fn script(&self, url: &str, responses: Vec<Option<&str>>) {
        let queue = responses
            .into_iter()
            .map(|r| r.map(str::to_string))
            .collect();
        self.scripts.lock().await.insert(url.to_string(), queue);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str, _selector: &str) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut scripts = self.scripts.lock().await;
        match scripts.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or(None),
            Some(queue) => queue.front().cloned().unwrap_or(None),
            None => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Dispatch {
    pub recipient: String,
    pub product_name: String,
    pub product_url: String,
}

/// Notifier that records every dispatch attempt and succeeds or fails
/// according to a switchable flag.
pub struct RecordingNotifier {
    succeed: AtomicBool,
    attempts: Mutex<Vec<Dispatch>>,
}

impl RecordingNotifier {
    pub fn new(succeed: bool) -> Self {
        Self {
            succeed: AtomicBool::new(succeed),
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn set_succeed(&self, succeed: bool) {
        self.succeed.store(succeed, Ordering::SeqCst);
    }

    pub async fn attempts(&self) -> Vec<Dispatch> {
        self.attempts.lock().await.clone()
    }

    pub async fn attempt_count(&self) -> usize {
        self.attempts.lock().await.len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn dispatch(&self, recipient: &str, product_name: &str, product_url: &str) -> bool {
        self.attempts.lock().await.push(Dispatch {
            recipient: recipient.to_string(),
            product_name: product_name.to_string(),
            product_url: product_url.to_string(),
        });
        self.succeed.load(Ordering::SeqCst)
    }
}

/// Tick fast enough for tests to observe several passes quickly.
pub fn fast_config() -> MonitorConfig {
    MonitorConfig {
        check_interval: Duration::from_millis(20),
        error_retry: Duration::from_millis(20),
    }
}

pub fn sample_product(url: &str, email: &str) -> NewProduct {
    NewProduct {
        name: "Mechanical Keyboard".to_string(),
        url: url.to_string(),
        selector: "#stock-status".to_string(),
        expected_text: "out of stock".to_string(),
        email: email.to_string(),
    }
}

/// Poll a condition every 10ms for up to two seconds.
pub async fn eventually<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
