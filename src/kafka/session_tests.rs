#[cfg(test)]
mod session_tests {
    use crate::bus::EventBus;
    use crate::error::AlertError;
    use crate::kafka::claim::{ClaimProcessor, Delivery, OffsetCommitter};
    use crate::kafka::router::TopicRouter;
    use crate::kafka::session::*;
    use crate::models::AlertEvent;
    use crate::services::alerts::EventHandler;
    use async_trait::async_trait;
    use futures_util::stream::{self, Stream};
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::{mpsc, watch, Semaphore};

    const DECISIONS: &str = "trading.decisions";
    const RANKINGS: &str = "trading.rankings";

    type Deliveries = Pin<Box<dyn Stream<Item = Result<Delivery, AlertError>> + Send>>;

    /// Records each subject as it starts, then waits for a permit when gated
    struct GatedHandler {
        started: Mutex<Vec<String>>,
        gate: Option<Semaphore>,
    }

    impl GatedHandler {
        fn open() -> Self {
            Self {
                started: Mutex::new(Vec::new()),
                gate: None,
            }
        }

        fn closed() -> Self {
            Self {
                started: Mutex::new(Vec::new()),
                gate: Some(Semaphore::new(0)),
            }
        }

        fn started(&self) -> Vec<String> {
            self.started.lock().unwrap().clone()
        }

        fn release(&self) {
            if let Some(gate) = &self.gate {
                gate.add_permits(16);
            }
        }
    }

    #[async_trait]
    impl EventHandler for GatedHandler {
        async fn handle(&self, event: &AlertEvent) -> Result<(), AlertError> {
            self.started.lock().unwrap().push(event.subject().to_string());
            if let Some(gate) = &self.gate {
                let _permit = gate.acquire().await.unwrap();
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingCommitter {
        committed: Mutex<Vec<(String, i32, i64)>>,
    }

    impl RecordingCommitter {
        fn committed(&self) -> Vec<(String, i32, i64)> {
            self.committed.lock().unwrap().clone()
        }
    }

    impl OffsetCommitter for RecordingCommitter {
        fn commit(&self, delivery: &Delivery) -> Result<(), AlertError> {
            self.committed.lock().unwrap().push((
                delivery.topic.clone(),
                delivery.partition,
                delivery.offset,
            ));
            Ok(())
        }
    }

    struct Harness {
        handler: Arc<GatedHandler>,
        committer: Arc<RecordingCommitter>,
        processor: ClaimProcessor,
        deliveries: mpsc::UnboundedSender<Result<Delivery, AlertError>>,
        stream: Deliveries,
        membership: watch::Sender<Membership>,
        shutdown: watch::Sender<bool>,
    }

    impl Harness {
        fn new(handler: GatedHandler, initial: Membership) -> Self {
            let handler = Arc::new(handler);
            let processor = ClaimProcessor::new(
                TopicRouter::new(DECISIONS, RANKINGS),
                handler.clone(),
                EventBus::new(64),
            );
            let (deliveries, rx) = mpsc::unbounded_channel();
            let stream: Deliveries = Box::pin(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            }));
            let (membership, _) = watch::channel(initial);
            let (shutdown, _) = watch::channel(false);

            Self {
                handler,
                committer: Arc::new(RecordingCommitter::default()),
                processor,
                deliveries,
                stream,
                membership,
                shutdown,
            }
        }

        fn deliver(&self, delivery: Delivery) {
            self.deliveries.send(Ok(delivery)).unwrap();
        }

        /// Run one session on its own task, keeping the senders here
        fn spawn_session(&mut self) -> tokio::task::JoinHandle<SessionEnd> {
            let mut stream = std::mem::replace(&mut self.stream, Box::pin(stream::empty()));
            let processor = self.processor.clone();
            let committer: Arc<dyn OffsetCommitter> = self.committer.clone();
            let mut membership = self.membership.subscribe();
            let shutdown = self.shutdown.subscribe();

            tokio::spawn(async move {
                run_session(&mut stream, &processor, &committer, &mut membership, shutdown).await
            })
        }
    }

    fn assigned(generation: u64) -> Membership {
        Membership {
            generation,
            assigned: true,
        }
    }

    fn decision(partition: i32, offset: i64, symbol: &str) -> Delivery {
        let payload = format!(
            r#"{{"timestamp":"2024-03-15T14:30:00Z","data":{{"symbol":"{}","signal":"BUY","confidence":0.8}}}}"#,
            symbol
        );
        Delivery {
            topic: DECISIONS.to_string(),
            partition,
            offset,
            payload: Some(payload.into_bytes()),
        }
    }

    fn ranking(partition: i32, offset: i64) -> Delivery {
        Delivery {
            topic: RANKINGS.to_string(),
            partition,
            offset,
            payload: Some(
                br#"{"timestamp":"2024-03-15T21:00:00Z","data":{"signal_type":"BUY","timestamp":"2024-03-15T21:00:00Z","rankings":[]}}"#.to_vec(),
            ),
        }
    }

    async fn wait_until<F: Fn() -> bool>(condition: F) {
        for _ in 0..100 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    async fn finish(session: tokio::task::JoinHandle<SessionEnd>) -> SessionEnd {
        tokio::time::timeout(Duration::from_secs(2), session)
            .await
            .expect("session did not end")
            .unwrap()
    }

    // ============= Membership Tests =============

    #[test]
    fn test_membership_assign_bumps_generation() {
        let mut m = Membership::default();
        assert!(!m.assigned);

        m.on_assign();
        assert_eq!(m, assigned(1));

        m.on_revoke();
        assert_eq!(m.generation, 1);
        assert!(!m.assigned);
    }

    #[test]
    fn test_revoke_and_assign_in_one_poll_ends_session() {
        let mut m = assigned(3);
        assert!(!m.ends_session(Some(3)));

        // Both callbacks fire before the session observes either
        m.on_revoke();
        m.on_assign();

        assert!(m.assigned);
        assert_eq!(m.generation, 4);
        assert!(m.ends_session(Some(3)));
        assert!(!m.ends_session(Some(4)));
    }

    #[test]
    fn test_unassigned_always_ends_session() {
        let m = Membership::default();
        assert!(m.ends_session(None));
        assert!(m.ends_session(Some(0)));
    }

    // ============= wait_until_assigned() Tests =============

    #[tokio::test]
    async fn test_ready_after_first_assignment() {
        let (tx, mut rx) = watch::channel(Membership::default());

        let waiter = tokio::spawn(async move { wait_until_assigned(&mut rx, 0).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        tx.send_modify(Membership::on_assign);

        let state = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("not ready after assignment")
            .unwrap()
            .unwrap();
        assert_eq!(state, assigned(1));
    }

    #[tokio::test]
    async fn test_ready_waits_for_newer_generation() {
        // A restarted consumer must not mistake the old assignment for readiness
        let (tx, mut rx) = watch::channel(assigned(2));

        let early = tokio::time::timeout(Duration::from_millis(30), wait_until_assigned(&mut rx, 2)).await;
        assert!(early.is_err());

        tx.send_modify(|m| {
            m.on_revoke();
            m.on_assign();
        });

        let state = wait_until_assigned(&mut rx, 2).await.unwrap();
        assert_eq!(state, assigned(3));
    }

    #[tokio::test]
    async fn test_ready_fails_when_membership_closes() {
        let (tx, mut rx) = watch::channel(Membership::default());
        drop(tx);

        let err = wait_until_assigned(&mut rx, 0).await.unwrap_err();
        assert!(matches!(err, AlertError::Consumer(_)));
    }

    // ============= run_session() Tests =============

    #[tokio::test]
    async fn test_session_commits_every_partition_then_closes() {
        let mut h = Harness::new(GatedHandler::open(), assigned(1));
        h.deliver(decision(0, 10, "AAPL"));
        h.deliver(decision(1, 20, "MSFT"));
        h.deliver(ranking(0, 5));
        h.deliver(decision(0, 11, "NVDA"));
        let session = h.spawn_session();

        drop(h.deliveries);
        let end = finish(session).await;

        assert!(matches!(end, SessionEnd::Closed));
        let committed = h.committer.committed();
        assert_eq!(committed.len(), 4);
        // Order holds within a partition
        let p0: Vec<i64> = committed
            .iter()
            .filter(|(t, p, _)| t == DECISIONS && *p == 0)
            .map(|(_, _, o)| *o)
            .collect();
        assert_eq!(p0, vec![10, 11]);
        assert!(committed.contains(&(DECISIONS.to_string(), 1, 20)));
        assert!(committed.contains(&(RANKINGS.to_string(), 0, 5)));
    }

    #[tokio::test]
    async fn test_revoke_cancels_without_draining() {
        let mut h = Harness::new(GatedHandler::closed(), assigned(1));
        let session = h.spawn_session();

        h.deliver(decision(0, 0, "AAPL"));
        h.deliver(decision(0, 1, "MSFT"));
        h.deliver(decision(0, 2, "NVDA"));
        let handler = h.handler.clone();
        wait_until(|| handler.started() == vec!["AAPL".to_string()]).await;

        h.membership.send_modify(Membership::on_revoke);
        tokio::time::sleep(Duration::from_millis(20)).await;
        // The in-flight delivery holds the session open
        assert!(!session.is_finished());

        h.handler.release();
        let end = finish(session).await;

        assert!(matches!(end, SessionEnd::Revoked));
        assert_eq!(h.handler.started(), vec!["AAPL".to_string()]);
        assert_eq!(h.committer.committed(), vec![(DECISIONS.to_string(), 0, 0)]);
    }

    #[tokio::test]
    async fn test_new_generation_alone_ends_session() {
        let mut h = Harness::new(GatedHandler::open(), assigned(1));
        let session = h.spawn_session();

        h.membership.send_modify(|m| {
            m.on_revoke();
            m.on_assign();
        });

        assert!(matches!(finish(session).await, SessionEnd::Revoked));
        assert_eq!(*h.membership.borrow(), assigned(2));
    }

    #[tokio::test]
    async fn test_session_adopts_first_assignment() {
        let mut h = Harness::new(GatedHandler::open(), Membership::default());
        let session = h.spawn_session();

        h.membership.send_modify(Membership::on_assign);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!session.is_finished());

        h.deliver(decision(2, 7, "AMD"));
        let committer = h.committer.clone();
        wait_until(|| committer.committed().len() == 1).await;

        drop(h.deliveries);
        assert!(matches!(finish(session).await, SessionEnd::Closed));
        assert_eq!(h.committer.committed(), vec![(DECISIONS.to_string(), 2, 7)]);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_session() {
        let mut h = Harness::new(GatedHandler::open(), assigned(1));
        let session = h.spawn_session();

        h.deliver(decision(0, 0, "AAPL"));
        let committer = h.committer.clone();
        wait_until(|| committer.committed().len() == 1).await;

        h.shutdown.send_replace(true);

        assert!(matches!(finish(session).await, SessionEnd::Cancelled));
        assert_eq!(h.committer.committed(), vec![(DECISIONS.to_string(), 0, 0)]);
    }

    #[tokio::test]
    async fn test_shutdown_already_raised_consumes_nothing() {
        let mut h = Harness::new(GatedHandler::open(), assigned(1));
        h.shutdown.send_replace(true);
        h.deliver(decision(0, 0, "AAPL"));

        let end = finish(h.spawn_session()).await;

        assert!(matches!(end, SessionEnd::Cancelled));
        assert!(h.handler.started().is_empty());
        assert!(h.committer.committed().is_empty());
    }

    #[tokio::test]
    async fn test_stream_error_fails_after_draining() {
        let mut h = Harness::new(GatedHandler::open(), assigned(1));
        h.deliver(decision(0, 0, "AAPL"));
        h.deliver(decision(0, 1, "MSFT"));
        h.deliveries
            .send(Err(AlertError::Consumer("broker transport failure".to_string())))
            .unwrap();

        let end = finish(h.spawn_session()).await;

        match end {
            SessionEnd::Failed(AlertError::Consumer(msg)) => assert!(msg.contains("transport")),
            other => panic!("Expected Failed, got {:?}", other),
        }
        // Partitions are still owned, so buffered work is finished
        assert_eq!(
            h.committer.committed(),
            vec![(DECISIONS.to_string(), 0, 0), (DECISIONS.to_string(), 0, 1)]
        );
    }

    // ============= SessionHandle Tests =============

    fn counting_loop(
        runs: Arc<AtomicUsize>,
        flags: Arc<Mutex<Vec<bool>>>,
    ) -> impl FnOnce(watch::Receiver<bool>) -> Pin<Box<dyn std::future::Future<Output = ()> + Send>> {
        move |mut shutdown| {
            Box::pin(async move {
                runs.fetch_add(1, Ordering::SeqCst);
                flags.lock().unwrap().push(*shutdown.borrow());
                let _ = shutdown.wait_for(|stop| *stop).await;
            })
        }
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let runs = Arc::new(AtomicUsize::new(0));
        let flags = Arc::new(Mutex::new(Vec::new()));
        let mut handle = SessionHandle::new();

        assert!(!handle.stop().await);
        assert!(handle.spawn(counting_loop(runs.clone(), flags.clone())));
        assert!(handle.is_running());

        assert!(handle.stop().await);
        assert!(!handle.is_running());
        assert!(!handle.stop().await);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_spawn_while_running_is_refused() {
        let runs = Arc::new(AtomicUsize::new(0));
        let flags = Arc::new(Mutex::new(Vec::new()));
        let mut handle = SessionHandle::new();

        assert!(handle.spawn(counting_loop(runs.clone(), flags.clone())));
        assert!(!handle.spawn(counting_loop(runs.clone(), flags.clone())));

        assert!(handle.stop().await);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_restart_after_stop_runs_with_fresh_flag() {
        let runs = Arc::new(AtomicUsize::new(0));
        let flags = Arc::new(Mutex::new(Vec::new()));
        let mut handle = SessionHandle::new();

        assert!(handle.spawn(counting_loop(runs.clone(), flags.clone())));
        let r = runs.clone();
        wait_until(move || r.load(Ordering::SeqCst) == 1).await;
        assert!(handle.stop().await);

        assert!(handle.spawn(counting_loop(runs.clone(), flags.clone())));
        let r = runs.clone();
        wait_until(move || r.load(Ordering::SeqCst) == 2).await;

        // The second loop must not see the first stop's flag
        assert_eq!(*flags.lock().unwrap(), vec![false, false]);
        assert!(handle.is_running());

        let stopped = tokio::time::timeout(Duration::from_secs(1), handle.stop())
            .await
            .expect("restarted loop did not stop");
        assert!(stopped);
    }
}
