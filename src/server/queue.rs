use crate::{config::WaitStrategy, server::shutdown::ShutdownListener, Context};
use crossbeam::queue::SegQueue;
use tokio::{task::yield_now, time::sleep as tokio_sleep};

/// Unbounded FIFO between the connection tasks and the consumer.
///
/// Any number of tasks may [`enqueue`](Self::enqueue) at once; pushes are
/// lock-free and never wait. The consumer side polls: an empty queue is
/// retried after the [`WaitStrategy`] delay until an item shows up or
/// shutdown fires.
///
/// # Examples
/// ```
/// use handoff_web::ContextQueue;
///
/// let queue = ContextQueue::<u32>::new();
/// assert_eq!(queue.enqueue(1), 1);
/// assert_eq!(queue.enqueue(2), 2);
///
/// assert_eq!(queue.try_dequeue(), Some(1));
/// assert_eq!(queue.try_dequeue(), Some(2));
/// assert_eq!(queue.try_dequeue(), None);
/// ```
#[derive(Debug)]
pub struct ContextQueue<T = Context> {
    items: SegQueue<T>,
}

impl<T> ContextQueue<T> {
    #[inline]
    pub fn new() -> Self {
        Self {
            items: SegQueue::new(),
        }
    }

    /// Appends `item` to the tail and returns the depth right after the
    /// push. With concurrent producers the depth is approximate.
    #[inline]
    pub fn enqueue(&self, item: T) -> usize {
        self.items.push(item);
        self.items.len()
    }

    /// Takes the head if there is one.
    #[inline]
    pub fn try_dequeue(&self) -> Option<T> {
        self.items.pop()
    }

    /// Waits for the head. Returns `None` once shutdown fires, even if
    /// items are still queued.
    pub async fn dequeue(&self, wait: &WaitStrategy, shutdown: &mut ShutdownListener) -> Option<T> {
        loop {
            if shutdown.is_cancelled() {
                return None;
            }
            if let Some(item) = self.items.pop() {
                return Some(item);
            }

            tokio::select! {
                biased;

                _ = shutdown.cancelled() => return None,
                _ = Self::wait(wait) => {}
            }
        }
    }

    #[inline]
    async fn wait(wait: &WaitStrategy) {
        match wait {
            WaitStrategy::Yield => yield_now().await,
            WaitStrategy::Sleep(time) => tokio_sleep(*time).await,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for ContextQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
