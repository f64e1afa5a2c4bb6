use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use pushvisor::{
    BackoffPolicy, Bus, EventKind, JobFn, Priority, RestartPolicy, Service, ServiceError,
    ServiceGroup, ServiceState, Supervisor,
};

/// Idle service that fails as soon as its trigger fires.
fn crashable(name: &'static str, bus: &Bus) -> (Service, Arc<Notify>) {
    let trigger = Arc::new(Notify::new());
    let t = trigger.clone();
    let job = JobFn::arc(name, move |ctx: CancellationToken| {
        let t = t.clone();
        async move {
            tokio::select! {
                _ = ctx.cancelled() => Ok(()),
                _ = t.notified() => Err(ServiceError::fail("triggered")),
            }
        }
    });
    (Service::new(job, Priority(10), bus.clone()), trigger)
}

fn fast_backoff() -> BackoffPolicy {
    BackoffPolicy {
        first: Duration::from_millis(5),
        max: Duration::from_millis(50),
        ..BackoffPolicy::default()
    }
}

async fn wait_for(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition reached in time");
}

#[tokio::test(flavor = "multi_thread")]
async fn crash_restarts_only_the_crashed_service() {
    let bus = Bus::default();
    let mut events = bus.subscribe();
    let sup = Supervisor::new(bus.clone(), RestartPolicy::OnCrash, fast_backoff());

    let mut group = ServiceGroup::new(bus.clone());
    let mut triggers = Vec::new();
    for name in ["a", "b", "c"] {
        let (svc, trigger) = crashable(name, &bus);
        sup.register(&svc).unwrap();
        group.push(svc).unwrap();
        triggers.push(trigger);
    }
    group
        .push(Service::new(Arc::new(sup.clone()), Priority::SUPERVISOR, bus.clone()))
        .unwrap();
    group.start_all().await.unwrap();

    let ids = || -> Vec<u64> {
        ["a", "b", "c"]
            .iter()
            .map(|n| sup.service(n).unwrap().context_id())
            .collect()
    };
    let before = ids();

    triggers[1].notify_one();
    let b = sup.service("b").unwrap();
    wait_for(|| b.context_id() > before[1] && b.state() == ServiceState::Running).await;

    let after = ids();
    assert_eq!(after[0], before[0]);
    assert_eq!(after[1], before[1] + 1);
    assert_eq!(after[2], before[2]);
    assert!(sup.service("a").unwrap().is_alive());
    assert!(sup.service("c").unwrap().is_alive());

    let mut kinds = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), async {
        while !kinds.contains(&EventKind::ServiceRestarted) {
            let ev = events.recv().await.unwrap();
            if ev.service.as_deref() == Some("b") {
                kinds.push(ev.kind);
            }
        }
    })
    .await
    .expect("restart event published");
    assert!(kinds.contains(&EventKind::ServiceCrashed));
    assert!(kinds.contains(&EventKind::RestartScheduled));
    assert!(kinds.contains(&EventKind::ServiceRestarted));

    group.stop_all().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn forced_crash_goes_through_the_supervisor() {
    let bus = Bus::default();
    let sup = Supervisor::new(bus.clone(), RestartPolicy::OnCrash, fast_backoff());
    let (svc, _trigger) = crashable("forced", &bus);
    sup.register(&svc).unwrap();
    let sup_svc = Service::new(Arc::new(sup.clone()), Priority::SUPERVISOR, bus.clone());
    sup_svc.start().await.unwrap();

    let first = svc.start().await.unwrap();
    svc.crash_immediately();
    let forced = svc.restart().await.unwrap();
    assert_eq!(forced, first + 1);

    wait_for(|| svc.context_id() == forced + 1 && svc.is_alive()).await;
    assert!(svc.should_run());

    svc.stop().await;
    sup_svc.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn intentional_stop_is_not_restarted() {
    let bus = Bus::default();
    let sup = Supervisor::new(bus.clone(), RestartPolicy::OnCrash, fast_backoff());
    let (svc, _trigger) = crashable("quiet", &bus);
    sup.register(&svc).unwrap();
    let sup_svc = Service::new(Arc::new(sup.clone()), Priority::SUPERVISOR, bus.clone());
    sup_svc.start().await.unwrap();

    let id = svc.start().await.unwrap();
    svc.stop().await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(svc.context_id(), id);
    assert_eq!(svc.state(), ServiceState::Stopped);

    sup_svc.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn stopping_the_supervisor_cancels_pending_backoff() {
    let bus = Bus::default();
    let slow = BackoffPolicy {
        first: Duration::from_secs(60),
        max: Duration::from_secs(60),
        ..BackoffPolicy::default()
    };
    let sup = Supervisor::new(bus.clone(), RestartPolicy::OnCrash, slow);
    let (svc, trigger) = crashable("slow", &bus);
    sup.register(&svc).unwrap();
    let sup_svc = Service::new(Arc::new(sup.clone()), Priority::SUPERVISOR, bus.clone());
    sup_svc.start().await.unwrap();

    let id = svc.start().await.unwrap();
    trigger.notify_one();
    wait_for(|| svc.state() == ServiceState::Stopped).await;

    tokio::time::timeout(Duration::from_secs(5), sup_svc.stop())
        .await
        .expect("supervisor stops without waiting out the backoff");
    assert_eq!(svc.context_id(), id);
    svc.stop().await;
}
