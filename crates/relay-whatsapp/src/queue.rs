//! Bounded background dispatch
//!
//! The webhook acknowledges immediately and hands the payload to this
//! queue. A single pump task drains it into handler tasks, keeping at most
//! `capacity` of them outstanding. When the queue is full, new events are
//! dropped.
//!
//! Model concurrency is capped by the reply generator, after the sender's
//! transcript lock is taken, so a busy sender waiting on its own earlier
//! message never holds up anyone else.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Semaphore;
use tracing::{debug, error, info_span, warn, Instrument};
use uuid::Uuid;

use crate::handler::MessageHandler;

struct Job {
    id: Uuid,
    payload: Value,
}

/// Handle for submitting webhook payloads to the background workers
#[derive(Clone)]
pub struct DispatchQueue {
    tx: mpsc::Sender<Job>,
}

impl DispatchQueue {
    /// Start the pump task. Must be called inside a tokio runtime.
    pub fn spawn(handler: Arc<MessageHandler>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        tokio::spawn(run_pump(rx, handler, capacity));
        Self { tx }
    }

    /// Queue a payload without waiting. Returns false if it was dropped.
    pub fn enqueue(&self, payload: Value) -> bool {
        let job = Job {
            id: Uuid::new_v4(),
            payload,
        };
        let id = job.id;

        match self.tx.try_send(job) {
            Ok(()) => {
                debug!("Queued webhook event {}", id);
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!("Dispatch queue full, dropping webhook event {}", id);
                false
            }
            Err(TrySendError::Closed(_)) => {
                error!("Dispatch queue closed, dropping webhook event {}", id);
                false
            }
        }
    }
}

async fn run_pump(mut rx: mpsc::Receiver<Job>, handler: Arc<MessageHandler>, outstanding: usize) {
    let slots = Arc::new(Semaphore::new(outstanding));

    while let Some(job) = rx.recv().await {
        let permit = match Arc::clone(&slots).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        let handler = Arc::clone(&handler);
        let span = info_span!("dispatch", job_id = %job.id);

        tokio::spawn(
            async move {
                let _permit = permit;
                handler.handle(&job.payload).await;
            }
            .instrument(span),
        );
    }

    debug!("Dispatch queue closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::testing::*;
    use async_trait::async_trait;
    use relay_core::{CompletionModel, CompletionParams};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    /// Tracks how many completions run at the same time
    #[derive(Default)]
    struct ConcurrencyProbe {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl CompletionModel for ConcurrencyProbe {
        async fn complete(
            &self,
            _prompt: &str,
            _params: &CompletionParams,
        ) -> relay_core::Result<String> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok("ok".to_string())
        }
    }

    async fn wait_for_texts(sender: &RecordingSender, count: usize) {
        for _ in 0..200 {
            if sender.texts().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} sends, saw {}", count, sender.texts().len());
    }

    #[tokio::test]
    async fn test_enqueued_event_is_dispatched() {
        let sender = Arc::new(RecordingSender::default());
        let handler = Arc::new(handler_with(sender.clone(), Arc::new(EchoModel::default())));
        let queue = DispatchQueue::spawn(handler, 8);

        assert!(queue.enqueue(text_event("15551230001", "ping")));
        wait_for_texts(&sender, 1).await;

        assert_eq!(sender.texts()[0].1, "re: ping");
    }

    #[tokio::test]
    async fn test_in_flight_is_bounded() {
        let sender = Arc::new(RecordingSender::default());
        let probe = Arc::new(ConcurrencyProbe::default());
        let handler = Arc::new(handler_with_limit(sender.clone(), probe.clone(), 2));
        let queue = DispatchQueue::spawn(handler, 16);

        for i in 0..8 {
            assert!(queue.enqueue(text_event(&format!("1555000000{}", i), "hi")));
        }
        wait_for_texts(&sender, 8).await;

        let peak = probe.peak.load(Ordering::SeqCst);
        assert!(peak <= 2, "peak concurrency was {}", peak);
        assert!(peak >= 1);
    }

    #[tokio::test]
    async fn test_full_queue_drops_events() {
        let sender = Arc::new(RecordingSender::default());
        let handler = Arc::new(handler_with(sender.clone(), Arc::new(EchoModel::default())));
        let queue = DispatchQueue::spawn(handler, 1);

        // The pump has not run yet, so the single slot is still taken.
        assert!(queue.enqueue(text_event("15551230001", "first")));
        assert!(!queue.enqueue(text_event("15551230001", "second")));

        wait_for_texts(&sender, 1).await;
        assert_eq!(sender.texts().len(), 1);
    }

    #[tokio::test]
    async fn test_busy_sender_does_not_block_others() {
        let sender = Arc::new(RecordingSender::default());
        let model = Arc::new(EchoModel {
            delay: Some(Duration::from_millis(300)),
        });
        let handler = Arc::new(handler_with_limit(sender.clone(), model, 2));
        let queue = DispatchQueue::spawn(handler, 8);

        let started = Instant::now();
        assert!(queue.enqueue(text_event("15550000001", "a1")));
        assert!(queue.enqueue(text_event("15550000001", "a2")));
        assert!(queue.enqueue(text_event("15550000002", "b1")));

        let mut b_elapsed = None;
        for _ in 0..200 {
            if sender.texts().iter().any(|(to, _)| to == "15550000002") {
                b_elapsed = Some(started.elapsed());
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let b_elapsed = b_elapsed.expect("second sender never got a reply");
        assert!(
            b_elapsed < Duration::from_millis(500),
            "second sender waited {:?}",
            b_elapsed
        );

        wait_for_texts(&sender, 3).await;
        let order: Vec<String> = sender.texts().into_iter().map(|(_, body)| body).collect();
        assert_eq!(order.last().map(String::as_str), Some("re: a2"));
    }
}
