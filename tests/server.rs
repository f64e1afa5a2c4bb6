use std::time::Duration;

use serde_json::Value;

use pushvisor::catalog::{DirectorySource, Notification, Version};
use pushvisor::dispatch::tcp_request;
use pushvisor::{NotificationServer, ServerConfig, ServiceState};

fn seed(dir: &std::path::Path) {
    let source = DirectorySource::open(dir).unwrap();
    source
        .write(Some("app"), Version::new(6, 2, 1), &Notification::new(1, "upgrade now", 2))
        .unwrap();
    source
        .write(None, Version::new(9, 9, 9), &Notification::new(2, "notice", 1))
        .unwrap();
}

fn messages(reply: &[u8]) -> Vec<String> {
    let v: Value = serde_json::from_slice(reply).unwrap();
    v["Notifications"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["Message"].as_str().unwrap().to_string())
        .collect()
}

async fn bound_addr(server: &NotificationServer) -> String {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(addr) = server.local_addr() {
                return addr;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("dispatcher bound")
}

#[tokio::test(flavor = "multi_thread")]
async fn serves_version_gated_notifications_over_tcp() {
    let tmp = tempfile::tempdir().unwrap();
    let notifications = tmp.path().join("Notifications");
    seed(&notifications);

    let server = NotificationServer::new(ServerConfig {
        bind: "127.0.0.1:0".to_string(),
        threads: 2,
        notification_dir: notifications,
        log_dir: tmp.path().join("logs"),
        ..ServerConfig::default()
    })
    .unwrap();
    assert_eq!(server.catalog().len(), 2);
    server.start().await.unwrap();
    let addr = bound_addr(&server).await;

    let reply = tcp_request(&addr, br#"{"Version":"6.2.0","Product":"app"}"#)
        .await
        .unwrap();
    assert_eq!(messages(&reply), ["upgrade now", "notice"]);

    let reply = tcp_request(&addr, br#"{"version":"6.3.0","product":"app"}"#)
        .await
        .unwrap();
    assert_eq!(messages(&reply), ["notice"]);

    let reply = tcp_request(&addr, br#"{"Version":"6.x.0"}"#).await.unwrap();
    let v: Value = serde_json::from_slice(&reply).unwrap();
    assert!(v["Error"].as_str().unwrap().contains("6.x.0"));

    let dispatcher = server.service("Notification Dispatch Server").unwrap();
    server.shutdown().await;
    assert_eq!(dispatcher.state(), ServiceState::Stopped);
}

#[tokio::test(flavor = "multi_thread")]
async fn crashed_dispatcher_comes_back_and_serves_again() {
    let tmp = tempfile::tempdir().unwrap();
    let notifications = tmp.path().join("Notifications");
    seed(&notifications);

    let mut cfg = ServerConfig {
        bind: "127.0.0.1:0".to_string(),
        notification_dir: notifications,
        log_dir: tmp.path().join("logs"),
        write_logs: false,
        ..ServerConfig::default()
    };
    cfg.restart.first_ms = 5;
    cfg.restart.max_ms = 50;
    let server = NotificationServer::new(cfg).unwrap();
    server.start().await.unwrap();
    bound_addr(&server).await;

    let dispatcher = server.service("Notification Dispatch Server").unwrap();
    let loader = server.service("Notification Loader").unwrap();
    let loader_id = loader.context_id();

    dispatcher.crash_immediately();
    let forced = dispatcher.restart().await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while !(dispatcher.context_id() > forced && dispatcher.is_alive()) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("dispatcher restarted by the supervisor");
    assert_eq!(loader.context_id(), loader_id);

    let addr = bound_addr(&server).await;
    let reply = tcp_request(&addr, br#"{"Version":"1.0.0","Product":null}"#)
        .await
        .unwrap();
    assert_eq!(messages(&reply), ["upgrade now", "notice"]);
    server.shutdown().await;
}
