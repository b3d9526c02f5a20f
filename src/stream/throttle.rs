//! Stream throttling utilities

use futures::{Stream, ready};
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior, interval};

/// Extension trait to add throttling to any Stream
pub trait ThrottleExt: Stream {
    /// Throttle the stream to emit at most once per interval
    ///
    /// Uses "latest-wins" semantics - if multiple items arrive
    /// during an interval, only the latest is emitted.
    fn throttle(self, duration: Duration) -> Throttle<Self>
    where
        Self: Sized,
    {
        Throttle::new(self, duration)
    }
}

impl<T: Stream> ThrottleExt for T {}

pin_project! {
    /// A stream combinator that throttles emission rate
    pub struct Throttle<S: Stream> {
        #[pin]
        stream: S,
        interval: Interval,
        pending: Option<S::Item>,
        done: bool,
    }
}

impl<S: Stream> Throttle<S> {
    /// Create a new throttled stream
    pub fn new(stream: S, duration: Duration) -> Self {
        let mut interval = interval(duration);
        // An idle stream emits its next item immediately, then paces again
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self { stream, interval, pending: None, done: false }
    }
}

impl<S: Stream> Stream for Throttle<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        // Drain everything available, keeping only the latest
        while !*this.done {
            match this.stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(item)) => *this.pending = Some(item),
                Poll::Ready(None) => *this.done = true,
                Poll::Pending => break,
            }
        }

        if this.pending.is_some() {
            ready!(this.interval.poll_tick(cx));
            return Poll::Ready(this.pending.take());
        }

        if *this.done { Poll::Ready(None) } else { Poll::Pending }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test(start_paused = true)]
    async fn burst_collapses_to_latest() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<u32>();
        let mut throttled =
            Box::pin(tokio_stream::wrappers::UnboundedReceiverStream::new(rx).throttle(Duration::from_millis(100)));

        tx.send(1).unwrap();
        assert_eq!(throttled.next().await, Some(1));

        for i in 2..=5 {
            tx.send(i).unwrap();
        }
        assert_eq!(throttled.next().await, Some(5));

        drop(tx);
        assert_eq!(throttled.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_stream_stays_open() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<u32>();
        let mut throttled =
            Box::pin(tokio_stream::wrappers::UnboundedReceiverStream::new(rx).throttle(Duration::from_millis(10)));

        let waited = tokio::time::timeout(Duration::from_millis(50), throttled.next()).await;
        assert!(waited.is_err(), "idle stream must not end");

        tx.send(7).unwrap();
        assert_eq!(throttled.next().await, Some(7));
    }
}
