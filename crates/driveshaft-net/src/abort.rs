//! Abort controller and signal
//!
//! A signal is a channel nobody ever sends on: aborting closes it, which
//! wakes every pending `aborted()` and flips `is_aborted()` for all clones.

use std::future::Future;
use std::pin::Pin;
use std::task::Poll;

use smol::channel::{Receiver, Sender};

#[derive(Debug, Clone)]
struct Source {
    /// Held so the channel only closes through `abort()`
    sender: Sender<()>,
    receiver: Receiver<()>,
}

impl Source {
    fn new() -> Self {
        let (sender, receiver) = smol::channel::bounded(1);
        Self { sender, receiver }
    }
}

/// Owner side: aborts every clone of its signal
#[derive(Debug)]
pub struct AbortController {
    source: Source,
}

impl AbortController {
    pub fn new() -> Self {
        Self {
            source: Source::new(),
        }
    }

    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            sources: vec![self.source.clone()],
        }
    }

    /// Abort. Idempotent.
    pub fn abort(&self) {
        self.source.sender.close();
    }

    pub fn is_aborted(&self) -> bool {
        self.source.receiver.is_closed()
    }
}

impl Default for AbortController {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer side of an abort; cheap to clone
#[derive(Debug, Clone)]
pub struct AbortSignal {
    sources: Vec<Source>,
}

impl AbortSignal {
    /// A signal that never aborts
    pub fn never() -> Self {
        Self {
            sources: vec![Source::new()],
        }
    }

    /// A signal that aborts as soon as any of `signals` does
    pub fn any<'a>(signals: impl IntoIterator<Item = &'a AbortSignal>) -> Self {
        Self {
            sources: signals
                .into_iter()
                .flat_map(|s| s.sources.iter().cloned())
                .collect(),
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.sources.iter().any(|s| s.receiver.is_closed())
    }

    /// Resolves once the signal is aborted
    pub async fn aborted(&self) {
        if self.is_aborted() {
            return;
        }
        let mut waits: Vec<Pin<Box<_>>> = self
            .sources
            .iter()
            .map(|s| Box::pin(s.receiver.recv()))
            .collect();
        smol::future::poll_fn(|cx| {
            if waits.iter_mut().any(|w| w.as_mut().poll(cx).is_ready()) {
                Poll::Ready(())
            } else {
                Poll::Pending
            }
        })
        .await
    }
}
