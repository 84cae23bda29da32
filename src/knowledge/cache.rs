//! Knowledge cache: the current snapshot of every tab.
//!
//! Each tab's snapshot sits behind an `Arc` that is swapped whole on a
//! successful fetch. Readers clone the `Arc` and keep a complete snapshot
//! for as long as they need it, so a refresh running concurrently can
//! never expose a half-updated tab. A failed fetch leaves the previous
//! snapshot in place.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::{Tab, TabSnapshot};
use crate::sheets::SheetSource;

/// Outcome of refreshing one tab successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabRefreshed {
    pub tab: Tab,
    pub rows: usize,
}

/// Outcome of a failed tab fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabFailed {
    pub tab: Tab,
    pub error: String,
}

/// Per-tab result of a refresh call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub refreshed: Vec<TabRefreshed>,
    pub failed: Vec<TabFailed>,
}

impl RefreshReport {
    /// True when every requested tab was fetched.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Loaded state of one tab, for operator status output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabStatus {
    pub tab: Tab,
    pub rows: Option<usize>,
    pub fetched_at: Option<DateTime<Utc>>,
}

/// Process-wide cache of tab snapshots.
pub struct KnowledgeCache {
    source: Arc<dyn SheetSource>,

    /// The only shared mutable state: which snapshot is current per tab.
    snapshots: RwLock<HashMap<Tab, Arc<TabSnapshot>>>,

    /// Serializes fetches so an older fetch never overwrites a newer one.
    refresh_lock: Mutex<()>,
}

impl KnowledgeCache {
    /// Creates an empty cache. Nothing is loaded until the first refresh.
    #[must_use]
    pub fn new(source: Arc<dyn SheetSource>) -> Self {
        Self {
            source,
            snapshots: RwLock::new(HashMap::new()),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Returns the current snapshot, or `None` while the tab was never loaded.
    ///
    /// Never waits for a refresh in progress.
    #[must_use]
    pub fn get(&self, tab: Tab) -> Option<Arc<TabSnapshot>> {
        self.snapshots.read().get(&tab).cloned()
    }

    /// Re-fetches one tab, or all tabs when `tab` is `None`.
    ///
    /// Each tab is replaced independently; a failing tab keeps its
    /// previous snapshot and is listed in the report.
    pub async fn refresh(&self, tab: Option<Tab>) -> RefreshReport {
        let _guard = self.refresh_lock.lock().await;

        let tabs: Vec<Tab> = tab.map_or_else(|| Tab::ALL.to_vec(), |t| vec![t]);
        let mut report = RefreshReport::default();

        for tab in tabs {
            match self.source.fetch_tab(tab).await {
                Ok(records) => {
                    let snapshot = TabSnapshot::new(tab, records);
                    let rows = snapshot.len();
                    self.install(snapshot);
                    info!("Refreshed tab {}: {} rows", tab, rows);
                    report.refreshed.push(TabRefreshed { tab, rows });
                }
                Err(e) => {
                    let kept = self.get(tab).map_or(0, |s| s.len());
                    warn!(
                        "Failed to refresh tab {}: {} (keeping previous snapshot, {} rows)",
                        tab, e, kept
                    );
                    report.failed.push(TabFailed {
                        tab,
                        error: e.to_string(),
                    });
                }
            }
        }

        report
    }

    /// Makes `snapshot` the current one for its tab.
    pub fn install(&self, snapshot: TabSnapshot) {
        let tab = snapshot.tab();
        self.snapshots.write().insert(tab, Arc::new(snapshot));
    }

    /// Row count and fetch time of every tab.
    #[must_use]
    pub fn status(&self) -> Vec<TabStatus> {
        let snapshots = self.snapshots.read();
        Tab::ALL
            .iter()
            .map(|&tab| {
                let snapshot = snapshots.get(&tab);
                TabStatus {
                    tab,
                    rows: snapshot.map(|s| s.len()),
                    fetched_at: snapshot.map(|s| s.fetched_at()),
                }
            })
            .collect()
    }
}

impl std::fmt::Debug for KnowledgeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeCache")
            .field("loaded_tabs", &self.snapshots.read().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::knowledge::Record;
    use crate::sheets::SheetsError;

    /// In-memory source whose per-tab results can be changed between refreshes.
    #[derive(Default)]
    pub(crate) struct FakeSource {
        tabs: parking_lot::Mutex<HashMap<Tab, Option<Vec<Record>>>>,
    }

    impl FakeSource {
        pub(crate) fn set(&self, tab: Tab, rows: &[&[(&str, &str)]]) {
            let records = rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                        .collect()
                })
                .collect();
            self.tabs.lock().insert(tab, Some(records));
        }

        pub(crate) fn fail(&self, tab: Tab) {
            self.tabs.lock().insert(tab, None);
        }
    }

    #[async_trait]
    impl SheetSource for FakeSource {
        async fn fetch_tab(&self, tab: Tab) -> Result<Vec<Record>, SheetsError> {
            match self.tabs.lock().get(&tab) {
                Some(Some(records)) => Ok(records.clone()),
                _ => Err(SheetsError::Auth(format!("{tab} unavailable"))),
            }
        }
    }

    fn cache_with(source: &Arc<FakeSource>) -> KnowledgeCache {
        KnowledgeCache::new(Arc::clone(source) as Arc<dyn SheetSource>)
    }

    #[test]
    fn test_not_loaded_before_first_refresh() {
        let source = Arc::new(FakeSource::default());
        let cache = cache_with(&source);
        for tab in Tab::ALL {
            assert!(cache.get(tab).is_none());
        }
        assert!(cache.status().iter().all(|s| s.rows.is_none()));
    }

    #[tokio::test]
    async fn test_refresh_all_installs_full_snapshots() {
        let source = Arc::new(FakeSource::default());
        for tab in Tab::ALL {
            source.set(tab, &[&[("nombre", "a")], &[("nombre", "b")]]);
        }
        let cache = cache_with(&source);

        let report = cache.refresh(None).await;
        assert!(report.is_success());
        assert_eq!(report.refreshed.len(), Tab::ALL.len());

        for tab in Tab::ALL {
            let snapshot = cache.get(tab).unwrap();
            assert_eq!(snapshot.len(), 2);
            assert_eq!(snapshot.records()[1]["nombre"], "b");
        }
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let source = Arc::new(FakeSource::default());
        source.set(Tab::Careers, &[&[("nombre", "Derecho")]]);
        let cache = cache_with(&source);
        cache.refresh(Some(Tab::Careers)).await;
        let before = cache.get(Tab::Careers).unwrap();

        source.fail(Tab::Careers);
        let report = cache.refresh(Some(Tab::Careers)).await;

        assert!(!report.is_success());
        assert_eq!(report.failed[0].tab, Tab::Careers);
        let after = cache.get(Tab::Careers).unwrap();
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[tokio::test]
    async fn test_partial_failure_is_isolated_per_tab() {
        let source = Arc::new(FakeSource::default());
        for tab in Tab::ALL {
            source.set(tab, &[&[("k", "v1")]]);
        }
        let cache = cache_with(&source);
        cache.refresh(None).await;

        for tab in Tab::ALL {
            source.set(tab, &[&[("k", "v2")]]);
        }
        source.fail(Tab::Payments);
        let report = cache.refresh(None).await;

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.refreshed.len(), Tab::ALL.len() - 1);
        assert_eq!(cache.get(Tab::Payments).unwrap().records()[0]["k"], "v1");
        assert_eq!(cache.get(Tab::Events).unwrap().records()[0]["k"], "v2");
    }

    #[tokio::test]
    async fn test_reader_keeps_old_snapshot_across_refresh() {
        let source = Arc::new(FakeSource::default());
        source.set(Tab::Events, &[&[("titulo", "old")]]);
        let cache = cache_with(&source);
        cache.refresh(Some(Tab::Events)).await;

        let held = cache.get(Tab::Events).unwrap();
        source.set(Tab::Events, &[&[("titulo", "new")], &[("titulo", "newer")]]);
        cache.refresh(Some(Tab::Events)).await;

        assert_eq!(held.len(), 1);
        assert_eq!(held.records()[0]["titulo"], "old");
        assert_eq!(cache.get(Tab::Events).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_refresh_single_tab_leaves_others_untouched() {
        let source = Arc::new(FakeSource::default());
        source.set(Tab::Contacts, &[&[("sede", "Managua")]]);
        let cache = cache_with(&source);

        cache.refresh(Some(Tab::Contacts)).await;
        assert!(cache.get(Tab::Contacts).is_some());
        assert!(cache.get(Tab::Careers).is_none());

        let status = cache.status();
        let contacts = status.iter().find(|s| s.tab == Tab::Contacts).unwrap();
        assert_eq!(contacts.rows, Some(1));
        assert!(contacts.fetched_at.is_some());
    }
}
