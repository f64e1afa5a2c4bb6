//! # NotificationServer: the facade wiring everything together.
//!
//! ```text
//! ServerBuilder::build()
//!   ├─ Bus ──► event pump ──► SubscriberSet [LogWriter, extra subscribers...]
//!   ├─ NotificationCatalog (initial load)
//!   ├─ ServiceGroup
//!   │    ├─ Logger                        Priority::LOGGER
//!   │    ├─ Notification Loader           Priority::CATALOG
//!   │    ├─ Notification Dispatch Server  Priority::DISPATCHER
//!   │    └─ Supervisor                    Priority::SUPERVISOR
//!   └─ Supervisor.register(every service but itself)
//! ```
//!
//! `start`, `stop` and `restart` apply to the whole group in priority order.
//! `stop` logs the transition before tearing anything down, and the Logger
//! goes down last so it drains what the others wrote on their way out.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::catalog::{CatalogRefresh, CatalogSource, DirectorySource, NotificationCatalog};
use crate::config::ServerConfig;
use crate::core::{ServiceGroup, Supervisor};
use crate::dispatch::{Dispatcher, NotificationHandler, TcpTransport, Transport};
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::logging::{LogFileWriter, LogQueue};
use crate::service::{JobRef, Priority, Service};
use crate::subscribers::{LogWriter, Subscribe, SubscriberSet};

/// Builder for [`NotificationServer`]; everything not set comes from the config.
pub struct ServerBuilder {
    config: ServerConfig,
    transport: Option<Arc<dyn Transport>>,
    source: Option<Arc<dyn CatalogSource>>,
    log_queue: Option<Arc<LogQueue>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl ServerBuilder {
    /// Creates a builder over `config`.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            transport: None,
            source: None,
            log_queue: None,
            subscribers: Vec::new(),
        }
    }

    /// Serves requests from `transport` instead of TCP on `config.bind`.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Loads notifications from `source` instead of `config.notification_dir`.
    pub fn with_source(mut self, source: Arc<dyn CatalogSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Queue the Logger drains; usually the one returned by [`logging::init`](crate::logging::init).
    pub fn with_log_queue(mut self, queue: Arc<LogQueue>) -> Self {
        self.log_queue = Some(queue);
        self
    }

    /// Additional event subscribers, next to the built-in [`LogWriter`].
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the server; nothing runs until [`NotificationServer::start`].
    ///
    /// Must be called inside a tokio runtime. Performs the initial catalog
    /// load synchronously.
    pub fn build(self) -> Result<NotificationServer, RuntimeError> {
        let cfg = self.config;
        let bus = Bus::new(cfg.bus_capacity_clamped());

        let source: Arc<dyn CatalogSource> = match self.source {
            Some(s) => s,
            None => Arc::new(DirectorySource::open(&cfg.notification_dir)?),
        };

        let mut subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
        subs.extend(self.subscribers);
        let pump = EventPump::spawn(SubscriberSet::new(subs, bus.clone()), &bus);
        let catalog = Arc::new(NotificationCatalog::new(source, bus.clone()));

        let transport: Arc<dyn Transport> = match self.transport {
            Some(t) => t,
            None => Arc::new(TcpTransport::new(cfg.bind.clone())),
        };
        let handler = Arc::new(NotificationHandler::new(Arc::clone(&catalog)));
        let dispatcher = Arc::new(Dispatcher::new(transport, handler, cfg.worker_count()));

        let queue = self.log_queue.unwrap_or_default();
        let logger = LogFileWriter::new(
            queue,
            cfg.log_dir.clone(),
            cfg.write_logs,
            cfg.log_flush_interval(),
        );
        let refresh = CatalogRefresh::new(Arc::clone(&catalog), cfg.refresh_interval());

        let settle = cfg.restart_settle();
        let service = |job: JobRef, priority: Priority| {
            Service::new(job, priority, bus.clone()).with_settle(settle)
        };
        let supervised = [
            service(Arc::new(logger) as JobRef, Priority::LOGGER),
            service(Arc::new(refresh) as JobRef, Priority::CATALOG),
            service(Arc::clone(&dispatcher) as JobRef, Priority::DISPATCHER),
        ];

        let supervisor = Supervisor::new(bus.clone(), cfg.restart.policy(), cfg.restart.backoff())
            .with_liveness(cfg.liveness_interval());
        let mut group = ServiceGroup::new(bus.clone());
        for svc in supervised {
            supervisor.register(&svc)?;
            group.push(svc)?;
        }
        group.push(Service::new(
            Arc::new(supervisor.clone()),
            Priority::SUPERVISOR,
            bus.clone(),
        ))?;

        Ok(NotificationServer {
            config: cfg,
            bus,
            catalog,
            dispatcher,
            supervisor,
            group,
            pump: Mutex::new(Some(pump)),
        })
    }
}

/// Forwards bus events into the subscriber set.
struct EventPump {
    token: CancellationToken,
    handle: JoinHandle<SubscriberSet>,
}

impl EventPump {
    fn spawn(set: SubscriberSet, bus: &Bus) -> Self {
        let mut rx = bus.subscribe();
        let token = CancellationToken::new();
        let stop = token.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    msg = rx.recv() => match msg {
                        Ok(ev) => set.emit_arc(Arc::new(ev)),
                        Err(RecvError::Lagged(n)) => {
                            tracing::warn!(skipped = n, "event pump lagged behind the bus");
                        }
                        Err(RecvError::Closed) => break,
                    },
                    _ = stop.cancelled() => break,
                }
            }
            set
        });
        Self { token, handle }
    }

    async fn shutdown(self) {
        self.token.cancel();
        if let Ok(set) = self.handle.await {
            set.shutdown().await;
        }
    }
}

/// The push notification server: logger, catalog refresh, dispatcher and
/// supervisor managed as one unit.
pub struct NotificationServer {
    config: ServerConfig,
    bus: Bus,
    catalog: Arc<NotificationCatalog>,
    dispatcher: Arc<Dispatcher>,
    supervisor: Supervisor,
    group: ServiceGroup,
    pump: Mutex<Option<EventPump>>,
}

impl NotificationServer {
    /// Builder over `config`.
    pub fn builder(config: ServerConfig) -> ServerBuilder {
        ServerBuilder::new(config)
    }

    /// Server built from `config` alone (TCP transport, directory catalog).
    pub fn new(config: ServerConfig) -> Result<Self, RuntimeError> {
        ServerBuilder::new(config).build()
    }

    /// Starts every service, highest priority first.
    ///
    /// If one fails to start, those already started are stopped again.
    pub async fn start(&self) -> Result<(), RuntimeError> {
        tracing::info!("Starting server...");
        self.group.start_all().await?;
        tracing::info!(
            bind = %self.config.bind,
            threads = self.config.worker_count(),
            "Server started."
        );
        Ok(())
    }

    /// Stops every service, lowest priority first. Returns once all
    /// contexts have exited.
    pub async fn stop(&self) {
        tracing::info!("Stopping server...");
        self.group.stop_all().await;
    }

    /// Stops and starts the whole group.
    pub async fn restart(&self) -> Result<(), RuntimeError> {
        tracing::info!("Restarting server...");
        self.stop().await;
        self.start().await
    }

    /// Stops the server and drains the event subscribers.
    pub async fn shutdown(self) {
        self.stop().await;
        let pump = self.pump.lock().take();
        if let Some(pump) = pump {
            pump.shutdown().await;
        }
    }

    /// Publishes `ShutdownRequested` with the cause.
    pub fn request_shutdown(&self, reason: impl Into<Arc<str>>) {
        self.bus
            .publish(Event::new(EventKind::ShutdownRequested).with_reason(reason));
    }

    /// The live catalog.
    pub fn catalog(&self) -> &Arc<NotificationCatalog> {
        &self.catalog
    }

    /// The dispatcher, for counters and the bound address.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// A supervised service by name.
    pub fn service(&self, name: &str) -> Result<Service, RuntimeError> {
        self.supervisor.service(name)
    }

    /// Names of the supervised services.
    pub fn service_names(&self) -> Vec<String> {
        self.supervisor.service_names()
    }

    /// Address the dispatcher is listening on, once bound.
    pub fn local_addr(&self) -> Option<String> {
        self.dispatcher.local_addr()
    }

    /// Event bus of this server.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Configuration the server was built from.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
