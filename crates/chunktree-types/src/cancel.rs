use tokio::sync::watch;

/// Cooperative cancellation signal observed by the builder and joiner.
///
/// Both check the signal before every store call. Once a builder sees it
/// set, the builder is unusable for good; a joiner fails the read in
/// progress and every read after it.
///
/// The signal is backed by a `tokio::sync::watch` channel so the same
/// token can be tripped from an async task (e.g. a request handler that
/// was dropped) while a blocking thread drives the build.
#[derive(Clone, Debug)]
pub struct Cancellation {
    rx: Option<watch::Receiver<bool>>,
}

/// Trips every [`Cancellation`] created from the same pair.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl Cancellation {
    /// A signal that never fires.
    #[must_use]
    pub fn never() -> Self {
        Self { rx: None }
    }

    /// Create a connected handle/signal pair.
    #[must_use]
    pub fn pair() -> (CancelHandle, Self) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, Self { rx: Some(rx) })
    }

    /// Non-blocking check.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once cancellation is requested. Never resolves for
    /// [`Cancellation::never`] or when the handle is dropped unfired.
    pub async fn cancelled(&self) {
        let Some(rx) = &self.rx else {
            return std::future::pending().await;
        };
        let mut rx = rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return std::future::pending().await;
            }
        }
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::never()
    }
}

impl CancelHandle {
    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// A further signal tied to this handle.
    #[must_use]
    pub fn signal(&self) -> Cancellation {
        Cancellation {
            rx: Some(self.tx.subscribe()),
        }
    }
}
