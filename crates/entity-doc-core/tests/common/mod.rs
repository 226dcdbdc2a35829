#![allow(dead_code)]

pub mod fixtures;
pub mod scripted;

use std::time::Duration;

use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Installs a test-writer subscriber once; `RUST_LOG` selects the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Waits until `rx` holds a value accepted by `accept`, failing the test
/// after [`TIMEOUT`].
pub async fn wait_until<T>(rx: &mut watch::Receiver<T>, accept: impl FnMut(&T) -> bool) -> T
where
    T: Clone,
{
    tokio::time::timeout(TIMEOUT, rx.wait_for(accept))
        .await
        .expect("timed out waiting for watch value")
        .expect("watch sender dropped")
        .clone()
}
