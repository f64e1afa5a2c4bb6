//! # NotificationCatalog: version-gated notifications grouped by product.
//!
//! The catalog keeps an immutable [`Snapshot`] behind an [`ArcSwap`]. Loads
//! build a complete new snapshot and swap it in; readers hold whichever
//! snapshot they loaded for the whole of one `resolve`, so they never observe
//! a half-built catalog.
//!
//! ```text
//! resolve(query)
//!   ├─ refresh_if_stale()                     (lazy refresh, flag set by CatalogRefresh)
//!   └─ resolve_current(query)
//!
//! resolve_current(query)
//!   ├─ snapshot = ArcSwap::load()
//!   ├─ cache hit (version, product)? → return cached list
//!   └─ filter eligible → stable sort by Type desc → cache → return
//! ```
//!
//! ## Rules
//! - The cache lives inside the snapshot: replacing the snapshot drops it.
//!   It holds at most [`CACHE_CAPACITY`] lists and is emptied when full.
//! - Product set and known: that product's entries plus unscoped ones.
//!   Otherwise every entry is searched.
//! - Equal `Type`: scoped entries before unscoped ones, each in load order.
//! - A failed load keeps the previous snapshot.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwap;
use parking_lot::{Mutex, RwLock};

use super::entry::{Notification, NotificationEntry};
use super::source::{CatalogSource, Listing};
use super::version::Version;
use crate::error::{CatalogError, VersionError};
use crate::events::{Bus, Event, EventKind};

/// A client's eligibility query.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClientQuery {
    /// Client version.
    pub version: Version,
    /// Client product, if it sent one.
    pub product: Option<String>,
}

impl ClientQuery {
    /// Builds a query from an already parsed version.
    pub fn new(version: Version, product: Option<&str>) -> Self {
        Self {
            version,
            product: product.map(str::to_string),
        }
    }

    /// Parses a dotted version string.
    pub fn parse(version: &str, product: Option<&str>) -> Result<Self, VersionError> {
        Ok(Self::new(version.parse()?, product))
    }
}

/// Outcome of a successful load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadSummary {
    /// Entries in the new snapshot.
    pub loaded: usize,
    /// Items that failed and were left out.
    pub skipped: usize,
}

/// Cached lists per snapshot before the cache is emptied.
pub const CACHE_CAPACITY: usize = 1024;

type CacheKey = (Version, Option<Arc<str>>);

/// Immutable catalog content plus its resolve cache.
#[derive(Default)]
struct Snapshot {
    /// Every entry in load order.
    entries: Vec<NotificationEntry>,
    /// Scoped entries per product, load order.
    by_product: HashMap<Arc<str>, Vec<NotificationEntry>>,
    cache: RwLock<HashMap<CacheKey, Arc<[Notification]>>>,
}

impl Snapshot {
    fn build(entries: Vec<NotificationEntry>) -> Self {
        let mut by_product: HashMap<Arc<str>, Vec<NotificationEntry>> = HashMap::new();
        for e in &entries {
            if let Some(p) = &e.product {
                by_product.entry(Arc::clone(p)).or_default().push(e.clone());
            }
        }
        Self {
            entries,
            by_product,
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn resolve(&self, query: &ClientQuery) -> Arc<[Notification]> {
        let product = query
            .product
            .as_deref()
            .and_then(|p| self.by_product.get_key_value(p))
            .map(|(k, _)| Arc::clone(k));
        let key: CacheKey = (query.version, product);

        if let Some(hit) = self.cache.read().get(&key) {
            return Arc::clone(hit);
        }

        let scoped: Box<dyn Iterator<Item = &NotificationEntry>> = match &key.1 {
            Some(p) => Box::new(self.by_product.get(p).into_iter().flatten()),
            None => Box::new(self.entries.iter().filter(|e| e.product.is_some())),
        };
        let unscoped = self.entries.iter().filter(|e| e.product.is_none());

        let mut out: Vec<Notification> = scoped
            .chain(unscoped)
            .filter(|e| query.version.is_eligible_for(e.bound))
            .map(|e| e.notification.clone())
            .collect();
        out.sort_by(|a, b| b.kind.cmp(&a.kind));

        let list: Arc<[Notification]> = Arc::from(out);
        let mut cache = self.cache.write();
        if cache.len() >= CACHE_CAPACITY {
            cache.clear();
        }
        cache.insert(key, Arc::clone(&list));
        list
    }
}

/// Authoritative set of notifications; shared by handle.
pub struct NotificationCatalog {
    source: Arc<dyn CatalogSource>,
    snapshot: ArcSwap<Snapshot>,
    rescan: AtomicBool,
    write_lock: Mutex<()>,
    bus: Bus,
}

impl NotificationCatalog {
    /// Creates the catalog and performs the initial load.
    ///
    /// A failed initial load leaves an empty catalog.
    pub fn new(source: Arc<dyn CatalogSource>, bus: Bus) -> Self {
        let catalog = Self {
            source,
            snapshot: ArcSwap::from_pointee(Snapshot::default()),
            rescan: AtomicBool::new(false),
            write_lock: Mutex::new(()),
            bus,
        };
        if let Err(e) = catalog.reload() {
            tracing::warn!(error = %e, "initial notification load failed; starting empty");
        }
        catalog
    }

    /// Reads the whole source and swaps in a new snapshot.
    pub fn load(&self) -> Result<LoadSummary, CatalogError> {
        let _guard = self.write_lock.lock();
        let result = self.source.enumerate().and_then(|listing| {
            let Listing { items, skipped } = listing;
            for e in &skipped {
                tracing::warn!(label = e.as_label(), error = %e, "skipping notification");
            }
            if items.is_empty() && !skipped.is_empty() {
                return Err(CatalogError::Unavailable {
                    details: format!("all {} items failed to load", skipped.len()),
                });
            }
            let summary = LoadSummary {
                loaded: items.len(),
                skipped: skipped.len(),
            };
            self.snapshot.store(Arc::new(Snapshot::build(items)));
            Ok(summary)
        });

        match &result {
            Ok(s) => {
                tracing::info!(
                    "Loaded {} notifications from {}. Type 'list' to view.",
                    s.loaded,
                    self.source.describe()
                );
                self.bus.publish(
                    Event::new(EventKind::CatalogReloaded).with_counts(s.loaded, s.skipped),
                );
            }
            Err(e) => {
                tracing::error!(label = e.as_label(), error = %e, "notification load failed; keeping previous catalog");
                self.bus
                    .publish(Event::new(EventKind::CatalogReloadFailed).with_reason(e.to_string()));
            }
        }
        result
    }

    /// Discards the cache and loads again.
    pub fn reload(&self) -> Result<LoadSummary, CatalogError> {
        self.rescan.store(false, Ordering::Release);
        self.load()
    }

    /// Eligible notifications for `query`, highest `Type` first.
    ///
    /// Triggers a reload first when a rescan is pending.
    pub fn resolve(&self, query: &ClientQuery) -> Arc<[Notification]> {
        self.refresh_if_stale();
        self.resolve_current(query)
    }

    /// Like [`resolve`](Self::resolve) but never touches the source.
    pub fn resolve_current(&self, query: &ClientQuery) -> Arc<[Notification]> {
        self.snapshot.load().resolve(query)
    }

    /// Runs the pending rescan, if any. Returns true if one was pending.
    ///
    /// Blocks on the source; async callers go through `spawn_blocking`.
    pub fn refresh_if_stale(&self) -> bool {
        if !self.rescan.swap(false, Ordering::AcqRel) {
            return false;
        }
        let _ = self.load();
        true
    }

    /// Requests a reload on the next `resolve`.
    pub fn mark_stale(&self) {
        self.rescan.store(true, Ordering::Release);
    }

    /// True if a rescan is pending.
    pub fn is_stale(&self) -> bool {
        self.rescan.load(Ordering::Acquire)
    }

    /// Appends one entry to the live catalog.
    pub fn add(&self, product: Option<&str>, bound: Version, notification: Notification) {
        let _guard = self.write_lock.lock();
        let mut entries = self.snapshot.load().entries.clone();
        entries.push(NotificationEntry::new(product, bound, notification));
        self.snapshot.store(Arc::new(Snapshot::build(entries)));
    }

    /// Writes every live entry back to the source.
    pub fn write_all(&self) -> Result<usize, CatalogError> {
        let snap = self.snapshot.load_full();
        self.source.store(&snap.entries)
    }

    /// Copy of the live entries in load order.
    pub fn entries(&self) -> Vec<NotificationEntry> {
        self.snapshot.load().entries.clone()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.snapshot.load().entries.len()
    }

    /// True when the catalog holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Text dump for the `list` command.
    pub fn describe(&self) -> String {
        let snap = self.snapshot.load();
        let mut out = String::new();
        for (i, e) in snap.entries.iter().enumerate() {
            let b = e.bound;
            let _ = writeln!(
                out,
                "Notification {i}, for version: ({}, {}, {}) and lower of product {}:",
                b.major,
                b.minor,
                b.patch,
                e.product.as_deref().unwrap_or("all")
            );
            let _ = writeln!(out, "\"\"\"\n{}\n\"\"\"", e.notification.message);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticSource;

    fn entry(product: Option<&str>, bound: (u32, u32, u32), id: i64, kind: i32, msg: &str) -> NotificationEntry {
        NotificationEntry::new(
            product,
            Version::new(bound.0, bound.1, bound.2),
            Notification::new(id, msg, kind),
        )
    }

    fn catalog(entries: Vec<NotificationEntry>) -> (Arc<StaticSource>, NotificationCatalog) {
        let src = Arc::new(StaticSource::new(entries));
        let cat = NotificationCatalog::new(src.clone(), Bus::new(16));
        (src, cat)
    }

    fn messages(list: &[Notification]) -> Vec<&str> {
        list.iter().map(|n| n.message.as_str()).collect()
    }

    #[test]
    fn upgrade_notice_scenario() {
        let (_src, cat) = catalog(vec![
            entry(Some("app"), (6, 2, 1), 1, 2, "upgrade now"),
            entry(None, (9, 9, 9), 2, 1, "notice"),
        ]);
        let q = ClientQuery::parse("6.2.0", Some("app")).unwrap();
        assert_eq!(messages(&cat.resolve(&q)), ["upgrade now", "notice"]);
        let q = ClientQuery::parse("6.3.0", Some("app")).unwrap();
        assert_eq!(messages(&cat.resolve(&q)), ["notice"]);
    }

    #[test]
    fn repeated_queries_hit_the_cache() {
        let (src, cat) = catalog(vec![entry(None, (2, 0, 0), 1, 0, "a")]);
        let q = ClientQuery::parse("1.0.0", None).unwrap();
        let first = cat.resolve(&q);
        src.replace(vec![entry(None, (2, 0, 0), 2, 0, "b")]);
        let second = cat.resolve(&q);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(messages(&second), ["a"]);
    }

    #[test]
    fn reload_serves_new_data() {
        let (src, cat) = catalog(vec![entry(None, (2, 0, 0), 1, 0, "a")]);
        let q = ClientQuery::parse("1.0.0", None).unwrap();
        assert_eq!(messages(&cat.resolve(&q)), ["a"]);

        src.replace(vec![entry(None, (2, 0, 0), 2, 0, "b")]);
        cat.reload().unwrap();
        assert_eq!(messages(&cat.resolve(&q)), ["b"]);
    }

    #[test]
    fn stale_flag_reloads_on_next_resolve() {
        let (src, cat) = catalog(vec![entry(None, (2, 0, 0), 1, 0, "a")]);
        let q = ClientQuery::parse("1.0.0", None).unwrap();
        cat.resolve(&q);

        src.replace(vec![entry(None, (2, 0, 0), 2, 0, "b")]);
        cat.mark_stale();
        assert!(cat.is_stale());
        assert_eq!(messages(&cat.resolve(&q)), ["b"]);
        assert!(!cat.is_stale());
    }

    #[test]
    fn resolve_current_ignores_pending_rescan() {
        let (src, cat) = catalog(vec![entry(None, (2, 0, 0), 1, 0, "a")]);
        let q = ClientQuery::parse("1.0.0", None).unwrap();

        src.replace(vec![entry(None, (2, 0, 0), 2, 0, "b")]);
        cat.mark_stale();
        assert_eq!(messages(&cat.resolve_current(&q)), ["a"]);
        assert!(cat.is_stale());

        assert!(cat.refresh_if_stale());
        assert!(!cat.refresh_if_stale());
        assert_eq!(messages(&cat.resolve_current(&q)), ["b"]);
    }

    #[test]
    fn cache_stays_bounded() {
        let (_src, cat) = catalog(vec![entry(None, (9, 0, 0), 1, 0, "a")]);
        for patch in 0..(CACHE_CAPACITY as u32 * 2 + 7) {
            let q = ClientQuery::new(Version::new(1, 0, patch), None);
            assert_eq!(messages(&cat.resolve(&q)), ["a"]);
            assert!(cat.snapshot.load().cache.read().len() <= CACHE_CAPACITY);
        }
    }

    #[test]
    fn resolve_during_reload_sees_one_whole_snapshot() {
        let old = vec![
            entry(Some("app"), (9, 0, 0), 1, 2, "old-app"),
            entry(None, (9, 0, 0), 2, 1, "old-all"),
            entry(None, (9, 0, 0), 3, 0, "old-low"),
        ];
        let new = vec![
            entry(Some("app"), (9, 0, 0), 4, 0, "new-app"),
            entry(None, (9, 0, 0), 5, 3, "new-all"),
        ];
        let (src, cat) = catalog(old.clone());
        let done = AtomicBool::new(false);

        std::thread::scope(|s| {
            s.spawn(|| {
                for i in 0..300 {
                    src.replace(if i % 2 == 0 { new.clone() } else { old.clone() });
                    cat.reload().unwrap();
                }
                done.store(true, Ordering::SeqCst);
            });
            for _ in 0..4 {
                s.spawn(|| {
                    let q = ClientQuery::parse("1.0.0", Some("app")).unwrap();
                    while !done.load(Ordering::SeqCst) {
                        let list = cat.resolve(&q);
                        let got = messages(&list);
                        assert!(
                            got == ["old-app", "old-all", "old-low"] || got == ["new-all", "new-app"],
                            "mixed snapshot: {got:?}"
                        );
                    }
                });
            }
        });
    }

    #[test]
    fn product_scoping() {
        let (_src, cat) = catalog(vec![
            entry(Some("app"), (9, 0, 0), 1, 0, "app"),
            entry(Some("tool"), (9, 0, 0), 2, 0, "tool"),
            entry(None, (9, 0, 0), 3, 0, "all"),
        ]);
        let r = |p: Option<&str>| {
            messages(&cat.resolve(&ClientQuery::parse("1.0.0", p).unwrap()))
                .into_iter()
                .map(str::to_string)
                .collect::<Vec<_>>()
        };
        assert_eq!(r(Some("app")), ["app", "all"]);
        assert_eq!(r(Some("tool")), ["tool", "all"]);
        assert_eq!(r(None), ["app", "tool", "all"]);
        assert_eq!(r(Some("unknown")), ["app", "tool", "all"]);
    }

    #[test]
    fn orders_by_descending_type_stably() {
        let (_src, cat) = catalog(vec![
            entry(None, (9, 0, 0), 1, 1, "low-unscoped"),
            entry(Some("app"), (9, 0, 0), 2, 3, "high"),
            entry(Some("app"), (9, 0, 0), 3, 1, "low-scoped"),
            entry(None, (9, 0, 0), 4, 2, "mid"),
        ]);
        let list = cat.resolve(&ClientQuery::parse("1.0.0", Some("app")).unwrap());
        assert_eq!(messages(&list), ["high", "mid", "low-scoped", "low-unscoped"]);
        assert!(list.windows(2).all(|w| w[0].kind >= w[1].kind));
    }

    #[test]
    fn failed_load_keeps_previous_snapshot() {
        struct Flaky(AtomicBool);
        impl CatalogSource for Flaky {
            fn enumerate(&self) -> Result<Listing, CatalogError> {
                if self.0.load(Ordering::SeqCst) {
                    return Err(CatalogError::Unavailable {
                        details: "down".into(),
                    });
                }
                Ok(Listing {
                    items: vec![entry(None, (9, 0, 0), 1, 0, "kept")],
                    skipped: Vec::new(),
                })
            }
            fn describe(&self) -> String {
                "flaky".into()
            }
        }

        let src = Arc::new(Flaky(AtomicBool::new(false)));
        let cat = NotificationCatalog::new(src.clone(), Bus::new(16));
        src.0.store(true, Ordering::SeqCst);
        assert!(cat.reload().is_err());
        let q = ClientQuery::parse("1.0.0", None).unwrap();
        assert_eq!(messages(&cat.resolve(&q)), ["kept"]);
    }

    #[test]
    fn add_invalidates_cache_and_describe_lists_entries() {
        let (_src, cat) = catalog(vec![entry(Some("app"), (6, 2, 1), 0, 0, "first")]);
        let q = ClientQuery::parse("1.0.0", None).unwrap();
        assert_eq!(cat.resolve(&q).len(), 1);

        cat.add(None, Version::new(1, 0, 0), Notification::new(1, "second", 0));
        assert_eq!(cat.resolve(&q).len(), 2);
        assert_eq!(
            cat.describe(),
            "Notification 0, for version: (6, 2, 1) and lower of product app:\n\"\"\"\nfirst\n\"\"\"\n\
             Notification 1, for version: (1, 0, 0) and lower of product all:\n\"\"\"\nsecond\n\"\"\"\n"
        );
    }
}
