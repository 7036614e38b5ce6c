//! Per-game highscore cache with single-flight loading.
//!
//! One slot per game id. A slot holds `Some(highscore)` once resolved, or
//! `None` as the negative cache ("known absent": no source, or the source
//! decoded to nothing). Concurrent lookups for the same id share one
//! in-flight load through the slot's `OnceCell`. Transient load errors
//! evict the unset slot so the next lookup retries; definitive misses are
//! cached.
//!
//! No eviction policy: the map is bounded by the number of tables.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;

use vpin_core::{GameId, Highscore, HighscoreError};

type Slot = Arc<OnceCell<Option<Highscore>>>;

#[derive(Default)]
pub struct HighscoreCache {
    slots: Mutex<HashMap<GameId, Slot>>,
}

impl HighscoreCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value for `id`, loading it through `load` on a
    /// miss. At most one load per id is in flight at a time; concurrent
    /// callers await that result.
    pub async fn get_or_load<F, Fut>(
        &self,
        id: GameId,
        load: F,
    ) -> Result<Option<Highscore>, HighscoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<Highscore>, HighscoreError>>,
    {
        let mut load = Some(load);
        loop {
            let slot = self.slot(id);
            let evicted = AtomicBool::new(false);
            let result = slot
                .get_or_try_init(|| async {
                    // A waiter retries initialization on the same cell
                    // after a failure, but the failure handler below may
                    // already have evicted it. Loading through a detached
                    // cell would run alongside a load on the replacement
                    // slot, so restart on the mapped one instead.
                    if !self.holds(id, &slot) {
                        evicted.store(true, Ordering::Relaxed);
                        return Err(HighscoreError::SourceMissing);
                    }
                    match load.take() {
                        Some(load) => load().await,
                        None => Err(HighscoreError::SourceMissing),
                    }
                })
                .await;
            if evicted.load(Ordering::Relaxed) {
                continue;
            }
            return match result {
                Ok(value) => Ok(value.clone()),
                Err(err) => {
                    // Leave no empty slot behind after a transient failure,
                    // otherwise the next lookup would wait on a dead cell.
                    let mut slots = self.slots.lock().unwrap();
                    if let Some(current) = slots.get(&id) {
                        if Arc::ptr_eq(current, &slot) && current.get().is_none() {
                            slots.remove(&id);
                        }
                    }
                    Err(err)
                }
            };
        }
    }

    /// Cached value without loading: `None` when the id was never resolved,
    /// `Some(None)` for a cached miss.
    pub fn peek(&self, id: GameId) -> Option<Option<Highscore>> {
        let slots = self.slots.lock().unwrap();
        slots.get(&id).and_then(|slot| slot.get().cloned())
    }

    /// Drop the entry for `id`. Idempotent; the next lookup reloads.
    pub fn invalidate(&self, id: GameId) {
        let removed = self.slots.lock().unwrap().remove(&id);
        if removed.is_some() {
            log::info!("Invalidated cached highscore of game {id}");
        }
    }

    pub fn invalidate_all(&self) {
        let mut slots = self.slots.lock().unwrap();
        let count = slots.len();
        slots.clear();
        log::info!("Invalidated all {count} cached highscores");
    }

    /// Ids with a resolved entry (positive or negative).
    pub fn cached_ids(&self) -> Vec<GameId> {
        let slots = self.slots.lock().unwrap();
        let mut ids: Vec<GameId> =
            slots.iter().filter(|(_, s)| s.get().is_some()).map(|(id, _)| *id).collect();
        ids.sort();
        ids
    }

    /// Immutable view of all resolved entries.
    pub fn snapshot(&self) -> HashMap<GameId, Option<Highscore>> {
        let slots = self.slots.lock().unwrap();
        slots
            .iter()
            .filter_map(|(id, slot)| slot.get().map(|v| (*id, v.clone())))
            .collect()
    }

    fn slot(&self, id: GameId) -> Slot {
        self.slots.lock().unwrap().entry(id).or_default().clone()
    }

    /// Whether `slot` is still the mapped cell for `id`.
    fn holds(&self, id: GameId, slot: &Slot) -> bool {
        self.slots.lock().unwrap().get(&id).is_some_and(|current| Arc::ptr_eq(current, slot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vpin_core::Score;

    fn highscore(id: GameId) -> Highscore {
        Highscore {
            game_id: id,
            scores: vec![Score::new(1, "ABC", 100)],
            raw: "1) ABC 100\n".into(),
            source_path: "nvram/abc.nv".into(),
            loaded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn caches_positive_and_negative_results() {
        let cache = HighscoreCache::new();
        let loads = AtomicUsize::new(0);

        let hit = cache
            .get_or_load(GameId(1), || async {
                loads.fetch_add(1, Ordering::SeqCst);
                Ok(Some(highscore(GameId(1))))
            })
            .await
            .unwrap();
        assert!(hit.is_some());

        let miss = cache
            .get_or_load(GameId(2), || async {
                loads.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            })
            .await
            .unwrap();
        assert!(miss.is_none());

        // Both are now served from the cache; the loaders must not run.
        let hit = cache
            .get_or_load(GameId(1), || async {
                loads.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            })
            .await
            .unwrap();
        assert!(hit.is_some());
        let miss = cache
            .get_or_load(GameId(2), || async {
                loads.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            })
            .await
            .unwrap();
        assert!(miss.is_none());
        assert_eq!(loads.load(Ordering::SeqCst), 2);
        assert_eq!(cache.cached_ids(), vec![GameId(1), GameId(2)]);
    }

    #[tokio::test]
    async fn transient_error_leaves_slot_empty() {
        let cache = HighscoreCache::new();

        let err = cache
            .get_or_load(GameId(5), || async {
                Err(HighscoreError::DecoderTimeout { timeout_secs: 10 })
            })
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert!(cache.peek(GameId(5)).is_none());
        assert!(cache.cached_ids().is_empty());

        // Next lookup retries and succeeds.
        let value = cache
            .get_or_load(GameId(5), || async { Ok(Some(highscore(GameId(5)))) })
            .await
            .unwrap();
        assert!(value.is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_lookups_share_one_load() {
        let cache = Arc::new(HighscoreCache::new());
        let loads = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let loads = loads.clone();
                tokio::spawn(async move {
                    cache
                        .get_or_load(GameId(7), || async move {
                            loads.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
                            Ok(Some(highscore(GameId(7))))
                        })
                        .await
                        .unwrap()
                })
            })
            .collect();

        for task in tasks {
            assert!(task.await.unwrap().is_some());
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn waiter_after_failure_loads_into_the_mapped_slot() {
        let cache = Arc::new(HighscoreCache::new());
        let (gate_tx, gate_rx) = tokio::sync::oneshot::channel::<()>();

        // First caller holds the init permit until the gate opens, then
        // fails; its slot gets evicted.
        let first = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get_or_load(GameId(9), || async move {
                        let _ = gate_rx.await;
                        Err(HighscoreError::DecoderTimeout { timeout_secs: 1 })
                    })
                    .await
            })
        };
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        // Second caller queues up behind the same cell.
        let second = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get_or_load(GameId(9), || async move { Ok(Some(highscore(GameId(9)))) })
                    .await
            })
        };
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        gate_tx.send(()).unwrap();

        assert!(first.await.unwrap().is_err());
        assert!(second.await.unwrap().unwrap().is_some());
        // The retried load landed in the map, not on an evicted cell.
        assert!(matches!(cache.peek(GameId(9)), Some(Some(_))));
        assert_eq!(cache.cached_ids(), vec![GameId(9)]);
    }

    #[tokio::test]
    async fn invalidate_forces_reload() {
        let cache = HighscoreCache::new();
        let loads = AtomicUsize::new(0);

        for _ in 0..2 {
            cache
                .get_or_load(GameId(3), || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(Some(highscore(GameId(3))))
                })
                .await
                .unwrap();
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        cache.invalidate(GameId(3));
        cache.invalidate(GameId(3)); // idempotent
        assert!(cache.peek(GameId(3)).is_none());

        cache
            .get_or_load(GameId(3), || async {
                loads.fetch_add(1, Ordering::SeqCst);
                Ok(Some(highscore(GameId(3))))
            })
            .await
            .unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn snapshot_reflects_resolved_entries() {
        let cache = HighscoreCache::new();
        cache
            .get_or_load(GameId(1), || async { Ok(Some(highscore(GameId(1)))) })
            .await
            .unwrap();
        cache.get_or_load(GameId(2), || async { Ok(None) }).await.unwrap();

        let snapshot = cache.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot[&GameId(1)].is_some());
        assert!(snapshot[&GameId(2)].is_none());

        cache.invalidate_all();
        assert!(cache.snapshot().is_empty());
    }
}
