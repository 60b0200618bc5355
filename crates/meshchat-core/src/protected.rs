//! Protected state container
//!
//! [`Protected`] serializes all mutation of a wrapped value while allowing
//! reads to run concurrently with other reads. Mutations are shipped over a
//! channel to a dedicated writer task, so `write` never blocks the caller
//! and writes apply in submission order.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::{mpsc, oneshot, RwLock};

// ----------------------------------------------------------------------------
// Protected Container
// ----------------------------------------------------------------------------

struct WriteJob<T> {
    mutation: Box<dyn FnOnce(&mut T) + Send>,
    done: oneshot::Sender<()>,
}

/// Thread-safe wrapper enforcing a read/write discipline over one value.
///
/// Reads run under a shared lock and may overlap with each other; writes run
/// one at a time on a writer task, mutually exclusive with everything. A
/// read can never observe a half-applied mutation.
///
/// Cloning shares the underlying value. Must be created inside a tokio
/// runtime. Issuing a `write` from within another mutation of the same
/// container is a contract violation and will stall the writer task.
pub struct Protected<T> {
    ward: Arc<RwLock<T>>,
    writer: mpsc::UnboundedSender<WriteJob<T>>,
}

impl<T> Clone for Protected<T> {
    fn clone(&self) -> Self {
        Self {
            ward: Arc::clone(&self.ward),
            writer: self.writer.clone(),
        }
    }
}

impl<T: Send + Sync + 'static> Protected<T> {
    /// Wrap a value, spawning its writer task
    pub fn new(ward: T) -> Self {
        let ward = Arc::new(RwLock::new(ward));
        let (writer, mut jobs) = mpsc::unbounded_channel::<WriteJob<T>>();

        let worker = Arc::clone(&ward);
        tokio::spawn(async move {
            while let Some(job) = jobs.recv().await {
                {
                    let mut guard = worker.write().await;
                    (job.mutation)(&mut guard);
                }
                // Guard released first: the mutation is visible to reads
                // before the receipt resolves. Receiver may be gone.
                let _ = job.done.send(());
            }
        });

        Self { ward, writer }
    }

    /// Run `block` against the current value and return its result.
    ///
    /// May overlap with other reads; never observes a value mid-mutation.
    pub async fn read<U>(&self, block: impl FnOnce(&T) -> U) -> U {
        let guard = self.ward.read().await;
        block(&guard)
    }

    /// Schedule `mutation` for exclusive execution against the value.
    ///
    /// Returns immediately without blocking the caller. The returned
    /// [`WriteReceipt`] resolves exactly once, strictly after the mutation
    /// is visible to subsequent reads; dropping it does not cancel the
    /// write. A panicking mutation is the caller's concern, not guarded
    /// against here.
    pub fn write<F>(&self, mutation: F) -> WriteReceipt
    where
        F: FnOnce(&mut T) + Send + 'static,
    {
        let (done, receipt) = oneshot::channel();
        let job = WriteJob {
            mutation: Box::new(mutation),
            done,
        };
        // Unbounded send never blocks; the mutation runs on the writer task.
        let _ = self.writer.send(job);
        WriteReceipt { done: receipt }
    }
}

// ----------------------------------------------------------------------------
// Write Receipt
// ----------------------------------------------------------------------------

/// Future resolving once the corresponding write has been applied.
pub struct WriteReceipt {
    done: oneshot::Receiver<()>,
}

impl Future for WriteReceipt {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        Pin::new(&mut self.done).poll(cx).map(|_| ())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
