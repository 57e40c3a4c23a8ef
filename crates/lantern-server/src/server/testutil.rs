//! Shared test fixtures.

use crate::server::config::{CliArgs, ServerConfig};
use crate::server::store::{PoolKey, PoolStore};
use crate::server::synth::Synthesize;
use clap::Parser;
use lantern::{Board, Cell, Difficulty};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Deterministic synthesizer: boards come out instantly (or after a fixed
/// delay), tagged so successive boards for one key differ.
#[derive(Default)]
pub struct StubSynth {
    pub delay: Option<Duration>,
    pub fail: bool,
    calls: AtomicUsize,
}

impl StubSynth {
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Synthesize for StubSynth {
    fn synthesize(&self, key: &PoolKey) -> Result<Board, lantern::Error> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.fail {
            return Err(lantern::Error::SynthesisExhausted {
                width: key.width as usize,
                height: key.height as usize,
                attempts: 0,
            });
        }
        let width = key.width as usize;
        let height = key.height as usize;
        let mut rows = vec![vec![Cell::Empty; width]; height];
        let tag = call % (width * height);
        rows[tag / width][tag % width] = Cell::Barrier;
        Board::from_rows(rows)
    }
}

pub fn medium_key(width: u32, height: u32) -> PoolKey {
    PoolKey {
        width,
        height,
        difficulty: Difficulty::Medium,
    }
}

pub fn temp_store() -> (tempfile::TempDir, Arc<PoolStore>) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = PoolStore::open(dir.path().join("pool.jsonl"), Duration::from_secs(5))
        .expect("open store");
    (dir, Arc::new(store))
}

/// Config for tests: two workers, small queues, short grace periods.
pub fn test_config(dir: &tempfile::TempDir) -> ServerConfig {
    let pool_path = dir.path().join("pool.jsonl");
    let args = CliArgs::try_parse_from([
        "lantern-server",
        "--pool-path",
        pool_path.to_str().expect("utf-8 temp path"),
        "--num-workers",
        "2",
        "--backlog-target",
        "5",
        "--shutdown-timeout-secs",
        "1",
    ])
    .expect("test args");
    ServerConfig::try_from(args).expect("test config")
}

/// Poll `predicate` until it holds or `deadline` elapses.
pub async fn wait_for(deadline: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let started = std::time::Instant::now();
    while started.elapsed() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    predicate()
}
