//! Blocking iteration over an asynchronous stream of result pages.
//!
//! The bridge is single-pass and cannot be restarted. Nothing happens until
//! the first `has_next` or `take_next` call. That call spawns a task on the
//! runtime that drives the page stream into a bounded channel. Every pull
//! then blocks the calling thread on that channel until the next page or the
//! end of the stream arrives.
//!
//! Pulls block the calling thread, so they must not be made from a thread
//! that is driving the runtime. Use `spawn_blocking` or a plain thread.

use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::stream::{self, Stream, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::debug;

use crate::errors::ResultsError;
use crate::results::Results;
use entity_index_shared::ResultsPage;

/// Pages buffered between the producer task and the pulling thread.
const PAGE_BUFFER: usize = 4;

type PageItem = Result<Results, ResultsError>;
type PageStream = Pin<Box<dyn Stream<Item = PageItem> + Send>>;

/// Pull-style access to a result sequence.
pub trait QueryExecutor {
    /// Whether another `Results` can be taken. Blocks on first use.
    fn has_next(&self) -> bool;

    /// Take the next `Results`.
    ///
    /// Fails with [`ResultsError::Exhausted`] once every page has been taken.
    fn take_next(&self) -> Result<Results, ResultsError>;
}

enum Source {
    NotStarted(PageStream),
    Started(mpsc::Receiver<PageItem>),
    Finished,
}

struct BridgeState {
    source: Source,
    peeked: Option<PageItem>,
}

/// Adapts a stream of [`ResultsPage`]s into blocking, single-pass iteration.
///
/// Cloning yields another handle to the same iteration state; each
/// [`Results`] handed out holds one such handle.
#[derive(Clone)]
pub struct LegacyResultBridge {
    state: Arc<Mutex<BridgeState>>,
    runtime: Handle,
}

impl LegacyResultBridge {
    /// Wrap a page stream.
    ///
    /// Pages are translated to [`Results`] as they arrive. A stream that ends
    /// without producing any page yields one empty `Results` with no cursor.
    /// Producer errors surface as [`ResultsError::PipelineError`].
    pub fn new<S, E>(pages: S, runtime: Handle) -> Self
    where
        S: Stream<Item = Result<ResultsPage, E>> + Send + 'static,
        E: fmt::Display + 'static,
    {
        let translated = pages.map(|page| {
            page.map(Results::from_page)
                .map_err(|e| ResultsError::pipeline(e.to_string()))
        });

        Self {
            state: Arc::new(Mutex::new(BridgeState {
                source: Source::NotStarted(Box::pin(default_if_empty(translated))),
                peeked: None,
            })),
            runtime,
        }
    }

    /// Whether another `Results` can be taken.
    ///
    /// The first call starts the page stream and blocks until it yields.
    pub fn has_next(&self) -> bool {
        let mut state = self.lock();
        self.fill(&mut state);
        state.peeked.is_some()
    }

    /// Take the next `Results`, blocking until it is available.
    pub fn take_next(&self) -> Result<Results, ResultsError> {
        let mut state = self.lock();
        self.fill(&mut state);

        match state.peeked.take() {
            Some(Ok(mut results)) => {
                results.set_query_executor(self.clone());
                Ok(results)
            }
            Some(Err(e)) => Err(e),
            None => Err(ResultsError::Exhausted),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BridgeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make sure `peeked` holds the next item, unless the stream has ended.
    fn fill(&self, state: &mut BridgeState) {
        if state.peeked.is_some() {
            return;
        }
        self.start(state);

        let next = match &mut state.source {
            Source::Started(receiver) => receiver.blocking_recv(),
            Source::NotStarted(_) | Source::Finished => return,
        };

        match next {
            Some(item) => state.peeked = Some(item),
            None => {
                debug!("Result stream exhausted");
                state.source = Source::Finished;
            }
        }
    }

    /// Spawn the producer task, once.
    fn start(&self, state: &mut BridgeState) {
        let source = std::mem::replace(&mut state.source, Source::Finished);
        state.source = match source {
            Source::NotStarted(mut pages) => {
                let (sender, receiver) = mpsc::channel(PAGE_BUFFER);
                self.runtime.spawn(async move {
                    while let Some(item) = pages.next().await {
                        if sender.send(item).await.is_err() {
                            debug!("Result bridge dropped, stopping page producer");
                            break;
                        }
                    }
                });
                Source::Started(receiver)
            }
            other => other,
        };
    }
}

impl QueryExecutor for LegacyResultBridge {
    fn has_next(&self) -> bool {
        LegacyResultBridge::has_next(self)
    }

    fn take_next(&self) -> Result<Results, ResultsError> {
        LegacyResultBridge::take_next(self)
    }
}

impl Iterator for LegacyResultBridge {
    type Item = Result<Results, ResultsError>;

    fn next(&mut self) -> Option<Self::Item> {
        if LegacyResultBridge::has_next(self) {
            Some(LegacyResultBridge::take_next(self))
        } else {
            None
        }
    }
}

impl fmt::Debug for LegacyResultBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LegacyResultBridge").finish_non_exhaustive()
    }
}

/// Yield one empty `Results` if `items` ends without yielding anything.
fn default_if_empty<S>(items: S) -> impl Stream<Item = PageItem> + Send
where
    S: Stream<Item = PageItem> + Send + 'static,
{
    stream::unfold(
        (Box::pin(items.fuse()), false),
        |(mut items, yielded)| async move {
            match items.next().await {
                Some(item) => Some((item, (items, true))),
                None if !yielded => Some((Ok(Results::empty()), (items, true))),
                None => None,
            }
        },
    )
}
