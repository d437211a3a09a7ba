//! Transport actor: the worker thread that owns the [`TransportClient`].
//!
//! Messages reach the main loop only through the event channel, so the
//! worker can block on socket reads without stalling the UI.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use tracing::error;
use url::Url;

use super::{Backoff, Connector, TransportClient, TransportEvent};

/// Handle to the transport worker thread.
pub struct TransportActor {
    handle: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl TransportActor {
    /// Spawn the worker and start connecting to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS fails to spawn the thread.
    pub fn spawn<C>(
        connector: C,
        endpoint: Url,
        backoff: Backoff,
        events: Sender<TransportEvent>,
    ) -> std::io::Result<Self>
    where
        C: Connector + Send + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = Arc::clone(&shutdown);

        let handle = thread::Builder::new()
            .name("danmaku-transport".to_string())
            .spawn(move || {
                let span = tracing::info_span!("transport", %endpoint);
                let _entered = span.enter();
                TransportClient::new(connector, endpoint, backoff, events).run(&shutdown_clone);
            })?;

        Ok(Self {
            handle: Some(handle),
            shutdown,
        })
    }

    /// Signal the worker to stop after its current read.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Stop the worker and wait for it.
    pub fn join(mut self) {
        self.shutdown();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("transport thread panicked");
            }
        }
    }
}

impl Drop for TransportActor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
