//! Single-slot hand-off between one producer and one consumer.
//!
//! The producer side never waits: [`Publisher::publish`] overwrites any
//! value the consumer has not taken yet. The consumer side only waits up to
//! a caller-supplied bound, and each published value is delivered at most
//! once.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

/// Create a connected publisher/mailbox pair with nothing pending.
pub fn channel<T: Clone>() -> (Publisher<T>, Mailbox<T>) {
    let (tx, rx) = watch::channel(None);
    (Publisher { tx }, Mailbox { rx })
}

/// Deadline `bound` from now, saturating far in the future instead of
/// overflowing `Instant`.
pub fn deadline_after(bound: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(bound).unwrap_or_else(|| now + FAR_FUTURE)
}

const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Producer half.
#[derive(Debug)]
pub struct Publisher<T> {
    tx: watch::Sender<Option<T>>,
}

impl<T> Publisher<T> {
    /// Make `value` the pending value, replacing an unconsumed one.
    ///
    /// Succeeds whether or not a mailbox is still attached.
    pub fn publish(&self, value: T) {
        self.tx.send_replace(Some(value));
    }

    /// Whether the consuming side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half.
#[derive(Debug)]
pub struct Mailbox<T> {
    rx: watch::Receiver<Option<T>>,
}

impl<T: Clone> Mailbox<T> {
    /// Take the pending value, waiting until `deadline` at most.
    ///
    /// Returns `None` when the deadline passes with nothing pending, or
    /// right away when the publisher is gone and nothing is pending.
    pub async fn recv_until(&mut self, deadline: Instant) -> Option<T> {
        match tokio::time::timeout_at(deadline, self.rx.changed()).await {
            Ok(Ok(())) => self.rx.borrow_and_update().clone(),
            Ok(Err(_)) | Err(_) => None,
        }
    }

    /// Take the pending value, waiting `bound` at most.
    pub async fn recv_timeout(&mut self, bound: Duration) -> Option<T> {
        self.recv_until(deadline_after(bound)).await
    }

    /// Take the pending value within `bound`, or return `fallback`.
    pub async fn recv_or(&mut self, bound: Duration, fallback: T) -> T {
        self.recv_timeout(bound).await.unwrap_or(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUND: Duration = Duration::from_millis(100);

    #[tokio::test(start_paused = true)]
    async fn empty_mailbox_falls_back_after_bound() {
        let (_publisher, mut mailbox) = channel::<u32>();

        let started = Instant::now();
        assert_eq!(mailbox.recv_or(BOUND, 7).await, 7);
        let waited = started.elapsed();
        assert!(waited >= BOUND && waited < BOUND + Duration::from_millis(5), "waited {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn pending_value_returns_immediately() {
        let (publisher, mut mailbox) = channel();
        publisher.publish(1u32);

        let started = Instant::now();
        assert_eq!(mailbox.recv_timeout(BOUND).await, Some(1));
        assert!(started.elapsed() < BOUND);
    }

    #[tokio::test(start_paused = true)]
    async fn value_is_delivered_at_most_once() {
        let (publisher, mut mailbox) = channel();
        publisher.publish(1u32);

        assert_eq!(mailbox.recv_timeout(BOUND).await, Some(1));
        assert_eq!(mailbox.recv_timeout(BOUND).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn publish_overwrites_unconsumed_value() {
        let (publisher, mut mailbox) = channel();
        publisher.publish(1u32);
        publisher.publish(2u32);
        publisher.publish(3u32);

        assert_eq!(mailbox.recv_timeout(BOUND).await, Some(3));
        assert_eq!(mailbox.recv_timeout(BOUND).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn value_published_during_wait_is_received() {
        let (publisher, mut mailbox) = channel();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(40)).await;
            publisher.publish(9u32);
            // Keep the publisher alive past the receiver's bound.
            tokio::time::sleep(Duration::from_secs(1)).await;
        });

        let started = Instant::now();
        assert_eq!(mailbox.recv_timeout(BOUND).await, Some(9));
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(40) && waited < BOUND, "waited {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn value_published_after_bound_waits_for_next_receive() {
        let (publisher, mut mailbox) = channel();

        assert_eq!(mailbox.recv_timeout(BOUND).await, None);
        publisher.publish(5u32);
        assert_eq!(mailbox.recv_timeout(BOUND).await, Some(5));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_publisher_returns_without_waiting() {
        let (publisher, mut mailbox) = channel::<u32>();
        drop(publisher);

        let started = Instant::now();
        assert_eq!(mailbox.recv_timeout(BOUND).await, None);
        assert!(started.elapsed() < BOUND);
    }

    #[tokio::test]
    async fn pending_value_survives_dropped_publisher() {
        let (publisher, mut mailbox) = channel();
        publisher.publish(4u32);
        drop(publisher);

        assert_eq!(mailbox.recv_timeout(BOUND).await, Some(4));
    }

    #[test]
    fn publish_without_mailbox_does_not_fail() {
        let (publisher, mailbox) = channel();
        drop(mailbox);
        assert!(publisher.is_closed());
        publisher.publish(1u32);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_saturates_for_huge_bounds() {
        let now = Instant::now();
        assert_eq!(deadline_after(BOUND), now + BOUND);
        assert!(deadline_after(Duration::MAX) > now + Duration::from_secs(86_400 * 365));

        let (publisher, mut mailbox) = channel();
        publisher.publish(9u32);
        assert_eq!(mailbox.recv_timeout(Duration::MAX).await, Some(9));
    }
}
