use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use pushvisor::dispatch::{ChannelTransport, Dispatcher, Handler};
use pushvisor::{Bus, DispatchError, EventKind, JobFn, Priority, Service, ServiceError};

/// Echoes the body and counts how often each body was seen.
#[derive(Default)]
struct Counting {
    seen: Mutex<HashMap<Vec<u8>, usize>>,
}

#[async_trait]
impl Handler for Counting {
    async fn handle(&self, _peer: &str, body: &[u8]) -> Result<Vec<u8>, DispatchError> {
        *self.seen.lock().entry(body.to_vec()).or_default() += 1;
        tokio::task::yield_now().await;
        Ok(body.to_vec())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn thousand_requests_four_workers_each_handled_once() {
    let (transport, client) = ChannelTransport::new();
    let handler = Arc::new(Counting::default());
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(transport), handler.clone(), 4));
    let svc = Service::new(dispatcher.clone(), Priority::DISPATCHER, Bus::default());
    svc.start().await.unwrap();

    let mut replies = Vec::with_capacity(1000);
    for i in 0..1000u32 {
        let body = format!("req-{i}").into_bytes();
        replies.push((body.clone(), client.send(body).unwrap()));
    }
    for (body, rx) in replies {
        let reply = tokio::time::timeout(Duration::from_secs(10), rx)
            .await
            .expect("reply in time")
            .expect("reply sent");
        assert_eq!(reply, body);
    }

    let seen = handler.seen.lock().clone();
    assert_eq!(seen.len(), 1000);
    assert!(seen.values().all(|&n| n == 1));

    for _ in 0..200 {
        if dispatcher.served() == 1000 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(dispatcher.served(), 1000);
    assert_eq!(dispatcher.failed(), 0);
    assert_eq!(dispatcher.queued(), 0);
    svc.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn queued_requests_survive_a_dispatcher_restart() {
    let (transport, client) = ChannelTransport::new();
    let handler = Arc::new(Counting::default());
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(transport), handler.clone(), 2));
    let svc = Service::new(dispatcher.clone(), Priority::DISPATCHER, Bus::default());

    // Sent while nothing is bound; picked up once the dispatcher is up.
    let pending = client.send(b"early".to_vec()).unwrap();
    svc.start().await.unwrap();
    assert_eq!(pending.await.unwrap(), b"early");

    svc.restart().await.unwrap();
    assert_eq!(client.call(b"late".to_vec()).await.unwrap(), b"late");
    svc.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn repeated_stops_are_never_crashes() {
    let (transport, client) = ChannelTransport::new();
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::new(transport),
        Arc::new(Counting::default()),
        4,
    ));
    let bus = Bus::default();
    let mut events = bus.subscribe();
    let svc = Service::new(dispatcher, Priority::DISPATCHER, bus);

    let mut crashes = 0;
    for i in 0..50u32 {
        svc.start().await.unwrap();
        let body = format!("round-{i}").into_bytes();
        assert_eq!(client.call(body.clone()).await.unwrap(), body);
        svc.stop().await;

        while let Ok(ev) = events.try_recv() {
            if ev.kind == EventKind::ServiceCrashed {
                crashes += 1;
            }
        }
    }
    assert_eq!(crashes, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_joins_a_blocked_loop() {
    let exited = Arc::new(Mutex::new(false));
    let flag = exited.clone();
    let job = JobFn::arc("blocked", move |ctx: CancellationToken| {
        let flag = flag.clone();
        async move {
            // Parked with nothing to do until the stop signal.
            ctx.cancelled().await;
            tokio::time::sleep(Duration::from_millis(50)).await;
            *flag.lock() = true;
            Ok::<_, ServiceError>(())
        }
    });
    let svc = Service::new(job, Priority(1), Bus::default());
    svc.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(svc.is_alive());

    tokio::time::timeout(Duration::from_secs(5), svc.stop())
        .await
        .expect("stop returns");
    assert!(*exited.lock(), "stop returned before the loop exited");
    assert!(!svc.is_alive());
}
