//! # Catalog sources.
//!
//! A [`CatalogSource`] enumerates `(product, bound, notification)` items. The
//! catalog never looks behind it; loading the same source twice must give the
//! same result unless the underlying data changed.
//!
//! - [`DirectorySource`]: one JSON file per notification; the first path
//!   component under the root names the product, files in the root are
//!   visible to every product.
//! - [`StaticSource`]: in-memory list, replaceable at runtime.
//!
//! ```text
//! Notifications/
//! ├── 7.txt                 → product = None
//! ├── app/
//! │   ├── 1.txt             → product = "app"
//! │   └── beta/2.txt        → product = "app"
//! └── tool/3.txt            → product = "tool"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::entry::{Notification, NotificationEntry};
use super::version::Version;
use crate::error::CatalogError;

/// Result of one enumeration.
#[derive(Debug, Default)]
pub struct Listing {
    /// Items that loaded, in source order.
    pub items: Vec<NotificationEntry>,
    /// Per-item failures; the rest of the listing is still usable.
    pub skipped: Vec<CatalogError>,
}

/// Provider of catalog items.
pub trait CatalogSource: Send + Sync + 'static {
    /// Reads every item. `Err` means nothing could be read at all.
    fn enumerate(&self) -> Result<Listing, CatalogError>;

    /// Persists entries; sources without storage refuse.
    fn store(&self, entries: &[NotificationEntry]) -> Result<usize, CatalogError> {
        let _ = entries;
        Err(CatalogError::Unavailable {
            details: "source is read-only".to_string(),
        })
    }

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// On-disk record. Written in the tuple form, read in either form.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredRecord {
    Tuple {
        #[serde(rename = "Item1")]
        bound: Version,
        #[serde(rename = "Item2")]
        notification: Notification,
    },
    Pair(Version, Notification),
}

#[derive(Serialize)]
struct StoredRecordRef<'a> {
    #[serde(rename = "Item1")]
    bound: Version,
    #[serde(rename = "Item2")]
    notification: &'a Notification,
}

impl StoredRecord {
    fn into_parts(self) -> (Version, Notification) {
        match self {
            StoredRecord::Tuple {
                bound,
                notification,
            }
            | StoredRecord::Pair(bound, notification) => (bound, notification),
        }
    }
}

/// Directory tree of notification files.
#[derive(Clone, Debug)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    /// Uses `root`, creating it if missing.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| CatalogError::io(&root, e))?;
        Ok(Self { root })
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a notification is stored at.
    pub fn path_for(&self, product: Option<&str>, id: i64) -> PathBuf {
        let mut p = self.root.clone();
        if let Some(product) = product {
            p.push(product);
        }
        p.push(format!("{id}.txt"));
        p
    }

    /// Writes one notification as `<root>[/<product>]/<id>.txt`.
    pub fn write(
        &self,
        product: Option<&str>,
        bound: Version,
        notification: &Notification,
    ) -> Result<PathBuf, CatalogError> {
        let path = self.path_for(product, notification.id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| CatalogError::io(parent, e))?;
        }
        let mut body = serde_json::to_string(&StoredRecordRef {
            bound,
            notification,
        })
        .map_err(|e| CatalogError::Parse {
            path: path.clone(),
            details: e.to_string(),
        })?;
        body.push('\n');
        fs::write(&path, body).map_err(|e| CatalogError::io(&path, e))?;
        Ok(path)
    }

    /// Product owning a file: the first path component below the root.
    fn product_of(&self, file: &Path) -> Result<Option<String>, ()> {
        let rel = file.strip_prefix(&self.root).map_err(|_| ())?;
        let mut comps = rel.components();
        let first = comps.next().ok_or(())?;
        if comps.next().is_none() {
            return Ok(None);
        }
        first.as_os_str().to_str().map(|s| Some(s.to_string())).ok_or(())
    }

    fn load_file(&self, path: &Path) -> Result<NotificationEntry, CatalogError> {
        let raw = fs::read_to_string(path).map_err(|e| CatalogError::io(path, e))?;
        let record: StoredRecord =
            serde_json::from_str(raw.trim()).map_err(|e| CatalogError::Parse {
                path: path.to_path_buf(),
                details: e.to_string(),
            })?;
        let (bound, notification) = record.into_parts();

        let product = match self.product_of(path) {
            Ok(p) => p,
            Err(()) => {
                tracing::warn!(
                    path = %path.display(),
                    id = notification.id,
                    "cannot determine product; notification is visible to all products"
                );
                None
            }
        };
        Ok(NotificationEntry::new(product.as_deref(), bound, notification))
    }

    /// Depth-first: subdirectories before the files of a directory, names sorted.
    fn walk(&self, dir: &Path, out: &mut Listing) -> Result<(), CatalogError> {
        let mut dirs = Vec::new();
        let mut files = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| CatalogError::io(dir, e))? {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    out.skipped.push(CatalogError::io(dir, e));
                    continue;
                }
            };
            let path = entry.path();
            match entry.file_type() {
                Ok(t) if t.is_dir() => dirs.push(path),
                Ok(t) if t.is_file() => files.push(path),
                Ok(_) => {}
                Err(e) => out.skipped.push(CatalogError::io(&path, e)),
            }
        }
        dirs.sort();
        files.sort();

        for d in dirs {
            if let Err(e) = self.walk(&d, out) {
                out.skipped.push(e);
            }
        }
        for f in files {
            match self.load_file(&f) {
                Ok(item) => out.items.push(item),
                Err(e) => out.skipped.push(e),
            }
        }
        Ok(())
    }
}

impl CatalogSource for DirectorySource {
    fn enumerate(&self) -> Result<Listing, CatalogError> {
        fs::create_dir_all(&self.root).map_err(|e| CatalogError::io(&self.root, e))?;
        let mut listing = Listing::default();
        self.walk(&self.root, &mut listing)?;
        Ok(listing)
    }

    fn store(&self, entries: &[NotificationEntry]) -> Result<usize, CatalogError> {
        for e in entries {
            self.write(e.product.as_deref(), e.bound, &e.notification)?;
        }
        Ok(entries.len())
    }

    fn describe(&self) -> String {
        format!("dir {}", self.root.display())
    }
}

/// In-memory source.
#[derive(Debug, Default)]
pub struct StaticSource {
    entries: RwLock<Vec<NotificationEntry>>,
}

impl StaticSource {
    /// Source serving `entries`.
    pub fn new(entries: Vec<NotificationEntry>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Replaces the whole content; visible at the next load.
    pub fn replace(&self, entries: Vec<NotificationEntry>) {
        *self.entries.write() = entries;
    }

    /// Appends one entry; visible at the next load.
    pub fn push(&self, entry: NotificationEntry) {
        self.entries.write().push(entry);
    }
}

impl CatalogSource for StaticSource {
    fn enumerate(&self) -> Result<Listing, CatalogError> {
        Ok(Listing {
            items: self.entries.read().clone(),
            skipped: Vec::new(),
        })
    }

    fn store(&self, entries: &[NotificationEntry]) -> Result<usize, CatalogError> {
        self.replace(entries.to_vec());
        Ok(entries.len())
    }

    fn describe(&self) -> String {
        format!("static ({} entries)", self.entries.read().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_layout_scopes_by_first_component() {
        let tmp = tempfile::tempdir().unwrap();
        let src = DirectorySource::open(tmp.path().join("Notifications")).unwrap();

        src.write(None, Version::new(9, 9, 9), &Notification::new(7, "everyone", 1))
            .unwrap();
        src.write(Some("app"), Version::new(6, 2, 1), &Notification::new(1, "app only", 2))
            .unwrap();
        let nested = src.root().join("app").join("beta");
        fs::create_dir_all(&nested).unwrap();
        fs::write(
            nested.join("2.txt"),
            r#"[[1,0,0],{"Id":2,"Message":"nested","Type":0}]"#,
        )
        .unwrap();

        let listing = src.enumerate().unwrap();
        assert!(listing.skipped.is_empty(), "{:?}", listing.skipped);
        let got: Vec<(Option<&str>, i64)> = listing
            .items
            .iter()
            .map(|e| (e.product.as_deref(), e.notification.id))
            .collect();
        // subdirectories first, root files last
        assert_eq!(got, vec![(Some("app"), 2), (Some("app"), 1), (None, 7)]);
    }

    #[test]
    fn write_uses_tuple_format() {
        let tmp = tempfile::tempdir().unwrap();
        let src = DirectorySource::open(tmp.path()).unwrap();
        let path = src
            .write(Some("app"), Version::new(1, 2, 3), &Notification::new(5, "hi", 1))
            .unwrap();
        assert_eq!(path, tmp.path().join("app").join("5.txt"));
        let raw = fs::read_to_string(path).unwrap();
        assert_eq!(
            raw.trim(),
            r#"{"Item1":[1,2,3],"Item2":{"Id":5,"Message":"hi","Type":1}}"#
        );
    }

    #[test]
    fn malformed_files_are_skipped_not_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let src = DirectorySource::open(tmp.path()).unwrap();
        src.write(None, Version::new(1, 0, 0), &Notification::new(1, "ok", 0))
            .unwrap();
        fs::write(tmp.path().join("broken.txt"), "{not json").unwrap();

        let listing = src.enumerate().unwrap();
        assert_eq!(listing.items.len(), 1);
        assert_eq!(listing.skipped.len(), 1);
        assert_eq!(listing.skipped[0].as_label(), "catalog_parse");
    }

    #[test]
    fn missing_root_is_recreated() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("gone");
        let src = DirectorySource::open(&root).unwrap();
        fs::remove_dir_all(&root).unwrap();
        let listing = src.enumerate().unwrap();
        assert!(listing.items.is_empty());
        assert!(root.is_dir());
    }

    #[test]
    fn static_source_replace_is_seen_on_next_enumerate() {
        let src = StaticSource::default();
        assert!(src.enumerate().unwrap().items.is_empty());
        src.push(NotificationEntry::new(
            None,
            Version::new(1, 0, 0),
            Notification::new(1, "a", 0),
        ));
        assert_eq!(src.enumerate().unwrap().items.len(), 1);
        src.replace(Vec::new());
        assert!(src.enumerate().unwrap().items.is_empty());
    }
}
