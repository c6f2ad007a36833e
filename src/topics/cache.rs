//! Client-side topic cache: fresh cache → network → last cache (any age) → defaults.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::store::KeyValueStore;
use super::{TopicItem, TopicsPayload, STALE_AFTER_MS};
use crate::notify::{Notifier, Toast, ToastLevel};

pub const TOPICS_CACHE_KEY: &str = "social-topics-cache";
pub const AUTO_REFRESH_EVERY: Duration = Duration::from_secs(8 * 60 * 60);

/// Source of topic payloads (the `/api/social/topics` endpoint in practice).
#[async_trait::async_trait]
pub trait TopicFetcher: Send + Sync {
    /// `force = false` is a passive load (GET), `true` a user-forced refresh (POST).
    async fn fetch_topics(&self, force: bool) -> anyhow::Result<TopicsPayload>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    FreshCache,
    Network,
    StaleCache,
    Defaults,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Loaded {
    pub payload: TopicsPayload,
    pub source: LoadSource,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectionOutcome {
    NoSelection,
    /// Same `value` exists in the new list.
    Preserved(TopicItem),
    /// Selection no longer listed; it is kept anyway and the user is told.
    RetainedStale { value: String, notice: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Refreshed {
    pub loaded: Loaded,
    pub selection: SelectionOutcome,
}

pub struct TopicCache<S, F> {
    store: S,
    fetcher: F,
    stale_after_ms: i64,
    selected: Mutex<Option<String>>,
}

impl<S: KeyValueStore, F: TopicFetcher> TopicCache<S, F> {
    pub fn new(store: S, fetcher: F) -> Self {
        Self {
            store,
            fetcher,
            stale_after_ms: STALE_AFTER_MS,
            selected: Mutex::new(None),
        }
    }

    pub fn select(&self, value: Option<&str>) {
        *self.selected.lock().unwrap_or_else(|p| p.into_inner()) = value.map(str::to_string);
    }

    pub fn selected(&self) -> Option<String> {
        self.selected
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Cached entry, if present and decodable. Garbage counts as missing.
    pub fn cached(&self) -> Option<TopicsPayload> {
        let raw = self.store.get(TOPICS_CACHE_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(p) => Some(p),
            Err(e) => {
                warn!(target: "topics", error = %e, "ignoring unreadable topics cache");
                None
            }
        }
    }

    /// Initial load: prefer a non-stale cache; otherwise fetch.
    pub async fn load(&self, now: DateTime<Utc>) -> Loaded {
        let cached = self.cached();
        if let Some(c) = &cached {
            if !c.is_stale(now, self.stale_after_ms) {
                debug!(target: "topics", age_ms = c.age_ms(now), "using fresh topics cache");
                return Loaded {
                    payload: c.clone(),
                    source: LoadSource::FreshCache,
                };
            }
        }
        self.fetch_or_fallback(now, false, cached).await
    }

    /// User-forced (or timer-driven) refresh; the current selection is reconciled.
    pub async fn refresh(&self, now: DateTime<Utc>) -> Refreshed {
        let cached = self.cached();
        let loaded = self.fetch_or_fallback(now, true, cached).await;
        let selection = reconcile_selection(self.selected().as_deref(), &loaded.payload);
        Refreshed { loaded, selection }
    }

    async fn fetch_or_fallback(
        &self,
        now: DateTime<Utc>,
        force: bool,
        cached: Option<TopicsPayload>,
    ) -> Loaded {
        match self.fetcher.fetch_topics(force).await {
            Ok(mut payload) => {
                // lastUpdated in the cache entry is when we fetched it.
                payload.last_updated = now.timestamp_millis();
                match serde_json::to_string(&payload) {
                    Ok(json) => {
                        if let Err(e) = self.store.set(TOPICS_CACHE_KEY, &json) {
                            warn!(target: "topics", error = %e, "failed to persist topics cache");
                        }
                    }
                    Err(e) => warn!(target: "topics", error = %e, "failed to encode topics cache"),
                }
                info!(target: "topics", count = payload.topics.len(), force, "topics fetched");
                Loaded {
                    payload,
                    source: LoadSource::Network,
                }
            }
            Err(e) => {
                warn!(target: "topics", error = %e, "topic fetch failed");
                match cached {
                    Some(payload) => Loaded {
                        payload,
                        source: LoadSource::StaleCache,
                    },
                    None => Loaded {
                        payload: TopicsPayload::defaults(now),
                        source: LoadSource::Defaults,
                    },
                }
            }
        }
    }
}

/// Keep the user's selection across a list replacement, matching on `value`.
pub fn reconcile_selection(selected: Option<&str>, payload: &TopicsPayload) -> SelectionOutcome {
    let Some(value) = selected else {
        return SelectionOutcome::NoSelection;
    };
    match payload.find(value) {
        Some(item) => SelectionOutcome::Preserved(item.clone()),
        None => SelectionOutcome::RetainedStale {
            value: value.to_string(),
            notice: format!(
                "Your selected topic \"{value}\" is no longer in the refreshed list. It is kept until you pick another."
            ),
        },
    }
}

/// Refresh every `every` (first refresh one period after start) and surface
/// selection notices through `notifier`.
pub fn spawn_auto_refresh<S, F>(
    cache: Arc<TopicCache<S, F>>,
    every: Duration,
    notifier: Arc<dyn Notifier>,
) -> JoinHandle<()>
where
    S: KeyValueStore + 'static,
    F: TopicFetcher + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let out = cache.refresh(Utc::now()).await;
            if let SelectionOutcome::RetainedStale { notice, .. } = out.selection {
                notifier.notify(Toast::new(ToastLevel::Info, notice));
            }
            debug!(target: "topics", source = ?out.loaded.source, "auto refresh tick");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use crate::topics::store::InMemoryStore;
    use crate::topics::default_topics;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeFetcher {
        reply: Mutex<anyhow::Result<TopicsPayload>>,
        calls: AtomicUsize,
        forced: AtomicUsize,
    }

    impl FakeFetcher {
        fn ok(p: TopicsPayload) -> Self {
            Self {
                reply: Mutex::new(Ok(p)),
                calls: AtomicUsize::new(0),
                forced: AtomicUsize::new(0),
            }
        }
        fn failing() -> Self {
            Self {
                reply: Mutex::new(Err(anyhow::anyhow!("offline"))),
                calls: AtomicUsize::new(0),
                forced: AtomicUsize::new(0),
            }
        }
        fn set(&self, p: TopicsPayload) {
            *self.reply.lock().unwrap() = Ok(p);
        }
    }

    #[async_trait::async_trait]
    impl TopicFetcher for Arc<FakeFetcher> {
        async fn fetch_topics(&self, force: bool) -> anyhow::Result<TopicsPayload> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if force {
                self.forced.fetch_add(1, Ordering::SeqCst);
            }
            match &*self.reply.lock().unwrap() {
                Ok(p) => Ok(p.clone()),
                Err(e) => Err(anyhow::anyhow!("{e}")),
            }
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    fn payload(values: &[&str], at: DateTime<Utc>) -> TopicsPayload {
        let mut topics = default_topics(at);
        topics.truncate(values.len());
        for (t, v) in topics.iter_mut().zip(values) {
            t.value = v.to_string();
        }
        TopicsPayload {
            topics,
            last_updated: at.timestamp_millis(),
            source: "gemini".into(),
        }
    }

    fn seed(store: &InMemoryStore, p: &TopicsPayload) {
        store
            .set(TOPICS_CACHE_KEY, &serde_json::to_string(p).unwrap())
            .unwrap();
    }

    #[tokio::test]
    async fn fresh_cache_skips_network() {
        let f = Arc::new(FakeFetcher::ok(payload(&["net"], t0())));
        let store = InMemoryStore::new();
        seed(&store, &payload(&["cached"], t0()));
        let cache = TopicCache::new(store, f.clone());

        let out = cache.load(t0() + chrono::Duration::minutes(359)).await;
        assert_eq!(out.source, LoadSource::FreshCache);
        assert_eq!(out.payload.topics[0].value, "cached");
        assert_eq!(f.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn six_hour_old_cache_triggers_fetch_and_is_replaced() {
        let f = Arc::new(FakeFetcher::ok(payload(&["net"], t0())));
        let store = InMemoryStore::new();
        seed(&store, &payload(&["cached"], t0()));
        let cache = TopicCache::new(store, f.clone());

        let now = t0() + chrono::Duration::hours(6);
        let out = cache.load(now).await;
        assert_eq!(out.source, LoadSource::Network);
        assert_eq!(f.calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.forced.load(Ordering::SeqCst), 0);

        let stored = cache.cached().unwrap();
        assert_eq!(stored.topics[0].value, "net");
        assert_eq!(stored.last_updated, now.timestamp_millis());
    }

    #[tokio::test]
    async fn fetch_failure_uses_stale_cache_then_defaults() {
        let store = InMemoryStore::new();
        seed(&store, &payload(&["old"], t0() - chrono::Duration::days(30)));
        let cache = TopicCache::new(store, Arc::new(FakeFetcher::failing()));
        let out = cache.load(t0()).await;
        assert_eq!(out.source, LoadSource::StaleCache);
        assert_eq!(out.payload.topics[0].value, "old");

        let empty = TopicCache::new(InMemoryStore::new(), Arc::new(FakeFetcher::failing()));
        let out = empty.load(t0()).await;
        assert_eq!(out.source, LoadSource::Defaults);
        assert_eq!(out.payload.topics, default_topics(t0()));
    }

    #[tokio::test]
    async fn unreadable_cache_counts_as_missing() {
        let store = InMemoryStore::new();
        store.set(TOPICS_CACHE_KEY, "{not json").unwrap();
        let cache = TopicCache::new(store, Arc::new(FakeFetcher::failing()));
        assert_eq!(cache.load(t0()).await.source, LoadSource::Defaults);
    }

    #[tokio::test]
    async fn refresh_preserves_or_retains_selection() {
        let f = Arc::new(FakeFetcher::ok(payload(&["a", "b"], t0())));
        let cache = TopicCache::new(InMemoryStore::new(), f.clone());
        cache.select(Some("b"));

        let r = cache.refresh(t0()).await;
        assert_eq!(f.forced.load(Ordering::SeqCst), 1);
        match r.selection {
            SelectionOutcome::Preserved(item) => assert_eq!(item.value, "b"),
            other => panic!("expected Preserved, got {other:?}"),
        }

        f.set(payload(&["c"], t0()));
        let r = cache.refresh(t0()).await;
        match r.selection {
            SelectionOutcome::RetainedStale { value, notice } => {
                assert_eq!(value, "b");
                assert!(notice.contains("\"b\""));
            }
            other => panic!("expected RetainedStale, got {other:?}"),
        }
        assert_eq!(cache.selected().as_deref(), Some("b"));

        cache.select(None);
        assert_eq!(cache.refresh(t0()).await.selection, SelectionOutcome::NoSelection);
    }

    #[tokio::test(start_paused = true)]
    async fn auto_refresh_runs_once_per_period() {
        let f = Arc::new(FakeFetcher::ok(payload(&["x"], t0())));
        let cache = Arc::new(TopicCache::new(InMemoryStore::new(), f.clone()));
        cache.select(Some("gone"));
        let notifier = Arc::new(RecordingNotifier::new());

        let handle = spawn_auto_refresh(cache.clone(), AUTO_REFRESH_EVERY, notifier.clone());
        tokio::time::sleep(AUTO_REFRESH_EVERY - Duration::from_secs(1)).await;
        assert_eq!(f.calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert_eq!(f.forced.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.messages().len(), 1);
        handle.abort();
    }
}
