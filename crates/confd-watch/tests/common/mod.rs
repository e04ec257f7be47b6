//! Shared fixtures for registry tests

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use confd_watch::{ChangeKind, ChangeStream, Result, WatchBackend, WatchError};
use tokio::sync::mpsc;

type Feed = mpsc::UnboundedSender<Result<ChangeKind>>;

#[derive(Default)]
struct FakeState {
    opens: usize,
    failing_opens: usize,
    feeds: Vec<Feed>,
}

/// A backend whose streams are driven by the test.
#[derive(Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` open attempts fail.
    pub fn fail_next_opens(&self, n: usize) {
        self.state.lock().unwrap().failing_opens = n;
    }

    /// Successful opens so far.
    pub fn opens(&self) -> usize {
        self.state.lock().unwrap().opens
    }

    /// Deliver an event on the most recently opened stream.
    pub fn emit(&self, kind: ChangeKind) {
        if let Some(feed) = self.state.lock().unwrap().feeds.last() {
            let _ = feed.send(Ok(kind));
        }
    }

    /// Kill the most recently opened stream.
    pub fn kill(&self) {
        if let Some(feed) = self.state.lock().unwrap().feeds.last() {
            let _ = feed.send(Err(WatchError::Stream {
                path: "fake".into(),
                message: "invalidated by test".to_string(),
            }));
        }
    }
}

impl WatchBackend for FakeBackend {
    fn open(&self, path: &Path) -> Result<Box<dyn ChangeStream>> {
        let mut state = self.state.lock().unwrap();
        if state.failing_opens > 0 {
            state.failing_opens -= 1;
            return Err(WatchError::Backend {
                path: path.to_path_buf(),
                message: "refused by test".to_string(),
            });
        }
        let (tx, rx) = mpsc::unbounded_channel();
        state.opens += 1;
        state.feeds.push(tx);
        Ok(Box::new(FakeStream { rx }))
    }
}

struct FakeStream {
    rx: mpsc::UnboundedReceiver<Result<ChangeKind>>,
}

#[async_trait]
impl ChangeStream for FakeStream {
    async fn next(&mut self) -> Result<ChangeKind> {
        match self.rx.recv().await {
            Some(event) => event,
            None => std::future::pending().await,
        }
    }
}

/// Poll `check` until it holds or `timeout` elapses.
pub async fn eventually<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
