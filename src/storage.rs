use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use dirs_next::data_dir;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub const BOOKMARKS_KEY: &str = "sukanime_bookmarks";
pub const HISTORY_KEY: &str = "sukanime_history";
const MAX_HISTORY_ITEMS: usize = 50;

/// Key-value persistence capability backing the watch-state store.
///
/// Both methods are best-effort: `get` answers `None` for a missing key or
/// an unreadable medium, and `set` swallows write failures. The store is
/// UX sugar, not a critical dependency, so persistence trouble must never
/// surface to the caller.
pub trait StoragePort {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}

/// Production port: one file per key under the platform data directory.
pub struct FileStore {
    dir: Option<PathBuf>,
}

impl FileStore {
    pub fn open() -> Self {
        Self {
            dir: data_dir().map(|base| base.join("sukanime")),
        }
    }

    fn key_path(&self, key: &str) -> Option<PathBuf> {
        self.dir.as_ref().map(|dir| dir.join(format!("{key}.json")))
    }
}

impl StoragePort for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        let path = self.key_path(key)?;
        fs::read_to_string(path).ok()
    }

    fn set(&self, key: &str, value: &str) {
        let Some(path) = self.key_path(key) else {
            return;
        };
        if let Some(parent) = path.parent() {
            if fs::create_dir_all(parent).is_err() {
                return;
            }
        }
        let _ = fs::write(path, value);
    }
}

/// A saved title, keyed by slug.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkEntry {
    pub slug: String,
    pub title: String,
    pub poster: String,
    pub added_at: i64,
}

/// One watched episode. Anime identity fields are denormalized at write
/// time so history rows render without a catalog lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchHistoryEntry {
    pub anime_slug: String,
    pub anime_title: String,
    pub anime_poster: String,
    pub episode_slug: String,
    pub episode_number: String,
    pub watched_at: i64,
}

/// Input to `record_watch`; the store stamps `watched_at` itself.
#[derive(Debug, Clone)]
pub struct WatchedEpisode {
    pub anime_slug: String,
    pub anime_title: String,
    pub anime_poster: String,
    pub episode_slug: String,
    pub episode_number: String,
}

/// Bookmark and watch-history store over an injected storage port.
///
/// Both collections are persisted as whole JSON arrays, most recent first.
/// A record that fails to parse is treated as empty; the corrupt value is
/// left in place until the next write replaces it.
pub struct WatchState<S: StoragePort> {
    store: S,
}

impl<S: StoragePort> WatchState<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    fn read_list<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        self.store
            .get(key)
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    fn write_list<T: Serialize>(&self, key: &str, list: &[T]) {
        if let Ok(raw) = serde_json::to_string(list) {
            self.store.set(key, &raw);
        }
    }

    pub fn bookmarks(&self) -> Vec<BookmarkEntry> {
        self.read_list(BOOKMARKS_KEY)
    }

    /// Idempotent on slug: re-adding an existing bookmark keeps the original
    /// entry, `added_at` included.
    pub fn add_bookmark(&self, slug: &str, title: &str, poster: &str) {
        self.add_bookmark_at(slug, title, poster, Utc::now().timestamp_millis());
    }

    fn add_bookmark_at(&self, slug: &str, title: &str, poster: &str, now_ms: i64) {
        let mut bookmarks = self.bookmarks();
        if bookmarks.iter().any(|b| b.slug == slug) {
            return;
        }
        bookmarks.insert(
            0,
            BookmarkEntry {
                slug: slug.to_string(),
                title: title.to_string(),
                poster: poster.to_string(),
                added_at: now_ms,
            },
        );
        self.write_list(BOOKMARKS_KEY, &bookmarks);
    }

    pub fn remove_bookmark(&self, slug: &str) {
        let mut bookmarks = self.bookmarks();
        bookmarks.retain(|b| b.slug != slug);
        self.write_list(BOOKMARKS_KEY, &bookmarks);
    }

    pub fn is_bookmarked(&self, slug: &str) -> bool {
        self.bookmarks().iter().any(|b| b.slug == slug)
    }

    /// Watch history, most recently watched first. Recency ordering is the
    /// store's contract, not an insertion artifact.
    pub fn history(&self) -> Vec<WatchHistoryEntry> {
        self.read_list(HISTORY_KEY)
    }

    /// Re-watching an episode moves it to the front instead of duplicating
    /// it. History is capped at 50 entries, oldest evicted first.
    pub fn record_watch(&self, episode: WatchedEpisode) {
        self.record_watch_at(episode, Utc::now().timestamp_millis());
    }

    fn record_watch_at(&self, episode: WatchedEpisode, now_ms: i64) {
        let mut history = self.history();
        history.retain(|h| h.episode_slug != episode.episode_slug);
        history.insert(
            0,
            WatchHistoryEntry {
                anime_slug: episode.anime_slug,
                anime_title: episode.anime_title,
                anime_poster: episode.anime_poster,
                episode_slug: episode.episode_slug,
                episode_number: episode.episode_number,
                watched_at: now_ms,
            },
        );
        history.truncate(MAX_HISTORY_ITEMS);
        self.write_list(HISTORY_KEY, &history);
    }

    /// Bookmarks are untouched.
    pub fn clear_history(&self) {
        self.write_list::<WatchHistoryEntry>(HISTORY_KEY, &[]);
    }

    /// Most recent history entry for a title. The history is already
    /// recency-ordered, so the first match is the answer.
    pub fn last_watched(&self, anime_slug: &str) -> Option<WatchHistoryEntry> {
        self.history()
            .into_iter()
            .find(|h| h.anime_slug == anime_slug)
    }

    /// "Continue watching": the latest episode per distinct title, in
    /// recency order, capped at `limit`.
    pub fn continue_watching(&self, limit: usize) -> Vec<WatchHistoryEntry> {
        let mut latest: Vec<WatchHistoryEntry> = Vec::new();
        for entry in self.history() {
            if latest.len() == limit {
                break;
            }
            if latest.iter().all(|e| e.anime_slug != entry.anime_slug) {
                latest.push(entry);
            }
        }
        latest
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use super::*;

    #[derive(Default)]
    struct MemStore {
        records: RefCell<HashMap<String, String>>,
    }

    impl StoragePort for MemStore {
        fn get(&self, key: &str) -> Option<String> {
            self.records.borrow().get(key).cloned()
        }

        fn set(&self, key: &str, value: &str) {
            self.records
                .borrow_mut()
                .insert(key.to_string(), value.to_string());
        }
    }

    /// Port that always fails, standing in for an unavailable medium.
    struct DeadStore;

    impl StoragePort for DeadStore {
        fn get(&self, _key: &str) -> Option<String> {
            None
        }

        fn set(&self, _key: &str, _value: &str) {}
    }

    fn watched(anime_slug: &str, episode_slug: &str, episode_number: &str) -> WatchedEpisode {
        WatchedEpisode {
            anime_slug: anime_slug.to_string(),
            anime_title: format!("{anime_slug} title"),
            anime_poster: format!("https://img.example/{anime_slug}.jpg"),
            episode_slug: episode_slug.to_string(),
            episode_number: episode_number.to_string(),
        }
    }

    #[test]
    fn add_bookmark_is_idempotent_per_slug() {
        let state = WatchState::new(MemStore::default());
        state.add_bookmark_at("frieren", "Frieren", "poster-a.jpg", 100);
        state.add_bookmark_at("frieren", "Different Title", "poster-b.jpg", 999);

        let bookmarks = state.bookmarks();
        assert_eq!(bookmarks.len(), 1);
        assert_eq!(bookmarks[0].title, "Frieren");
        assert_eq!(bookmarks[0].poster, "poster-a.jpg");
        assert_eq!(bookmarks[0].added_at, 100);
    }

    #[test]
    fn newest_bookmark_goes_to_front() {
        let state = WatchState::new(MemStore::default());
        state.add_bookmark_at("first", "First", "a.jpg", 100);
        state.add_bookmark_at("second", "Second", "b.jpg", 200);

        let slugs: Vec<_> = state.bookmarks().into_iter().map(|b| b.slug).collect();
        assert_eq!(slugs, vec!["second", "first"]);
    }

    #[test]
    fn remove_bookmark_is_noop_on_absent_slug() {
        let state = WatchState::new(MemStore::default());
        state.add_bookmark_at("frieren", "Frieren", "a.jpg", 100);
        state.remove_bookmark("nonexistent");

        assert_eq!(state.bookmarks().len(), 1);
        assert!(state.is_bookmarked("frieren"));
        assert!(!state.is_bookmarked("nonexistent"));
    }

    #[test]
    fn remove_bookmark_deletes_matching_entry() {
        let state = WatchState::new(MemStore::default());
        state.add_bookmark_at("frieren", "Frieren", "a.jpg", 100);
        state.add_bookmark_at("boruto", "Boruto", "b.jpg", 200);
        state.remove_bookmark("frieren");

        let bookmarks = state.bookmarks();
        assert_eq!(bookmarks.len(), 1);
        assert_eq!(bookmarks[0].slug, "boruto");
    }

    #[test]
    fn rewatching_moves_entry_to_front_without_duplicating() {
        let state = WatchState::new(MemStore::default());
        state.record_watch_at(watched("boruto", "b", "2"), 50);
        state.record_watch_at(watched("frieren", "a", "1"), 100);

        state.record_watch_at(watched("frieren", "a", "1"), 200);

        let history = state.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].episode_slug, "a");
        assert_eq!(history[0].watched_at, 200);
        assert_eq!(history[1].episode_slug, "b");
        assert_eq!(history[1].watched_at, 50);
    }

    #[test]
    fn history_is_bounded_to_fifty_entries() {
        let state = WatchState::new(MemStore::default());
        for i in 0..55 {
            state.record_watch_at(
                watched("anime", &format!("ep-{i}"), &i.to_string()),
                i as i64,
            );
        }

        let history = state.history();
        assert_eq!(history.len(), 50);
        assert_eq!(history[0].episode_slug, "ep-54");
        assert_eq!(history[49].episode_slug, "ep-5");
        assert!(!history.iter().any(|h| h.episode_slug == "ep-4"));
    }

    #[test]
    fn last_watched_returns_most_recent_entry_for_anime() {
        let state = WatchState::new(MemStore::default());
        state.record_watch_at(watched("frieren", "frieren-ep-1", "1"), 100);
        state.record_watch_at(watched("boruto", "boruto-ep-9", "9"), 150);
        state.record_watch_at(watched("frieren", "frieren-ep-2", "2"), 200);

        let last = state.last_watched("frieren").unwrap();
        assert_eq!(last.episode_slug, "frieren-ep-2");
        assert_eq!(last.watched_at, 200);
        assert!(state.last_watched("unknown").is_none());
    }

    #[test]
    fn clear_history_leaves_bookmarks_alone() {
        let state = WatchState::new(MemStore::default());
        state.add_bookmark_at("frieren", "Frieren", "a.jpg", 100);
        state.record_watch_at(watched("frieren", "a", "1"), 200);

        state.clear_history();

        assert!(state.history().is_empty());
        assert_eq!(state.bookmarks().len(), 1);
    }

    #[test]
    fn continue_watching_keeps_latest_episode_per_anime() {
        let state = WatchState::new(MemStore::default());
        state.record_watch_at(watched("frieren", "frieren-ep-1", "1"), 100);
        state.record_watch_at(watched("boruto", "boruto-ep-9", "9"), 150);
        state.record_watch_at(watched("frieren", "frieren-ep-2", "2"), 200);

        let lanes = state.continue_watching(20);
        assert_eq!(lanes.len(), 2);
        assert_eq!(lanes[0].episode_slug, "frieren-ep-2");
        assert_eq!(lanes[1].episode_slug, "boruto-ep-9");

        assert_eq!(state.continue_watching(1).len(), 1);
    }

    #[test]
    fn corrupt_bookmark_record_reads_as_empty() {
        let store = MemStore::default();
        store.set(BOOKMARKS_KEY, "{not json at all");
        let state = WatchState::new(store);

        assert!(state.bookmarks().is_empty());
        assert!(!state.is_bookmarked("frieren"));
    }

    #[test]
    fn corrupt_history_record_reads_as_empty() {
        let store = MemStore::default();
        store.set(HISTORY_KEY, r#"[{"watchedAt": "wrong shape"}]"#);
        let state = WatchState::new(store);

        assert!(state.history().is_empty());
        assert!(state.last_watched("frieren").is_none());
    }

    #[test]
    fn corrupt_record_is_left_in_place_until_next_write() {
        let store = MemStore::default();
        store.set(BOOKMARKS_KEY, "{not json at all");
        let state = WatchState::new(store);

        assert!(state.bookmarks().is_empty());
        assert_eq!(
            state.store.get(BOOKMARKS_KEY).as_deref(),
            Some("{not json at all")
        );

        state.add_bookmark_at("frieren", "Frieren", "a.jpg", 100);
        assert_eq!(state.bookmarks().len(), 1);
    }

    #[test]
    fn unavailable_medium_degrades_to_empty_and_noop() {
        let state = WatchState::new(DeadStore);
        state.add_bookmark_at("frieren", "Frieren", "a.jpg", 100);
        state.record_watch_at(watched("frieren", "a", "1"), 200);

        assert!(state.bookmarks().is_empty());
        assert!(state.history().is_empty());
    }

    #[test]
    fn persisted_layout_matches_the_published_shape() {
        let store = MemStore::default();
        let state = WatchState::new(store);
        state.record_watch_at(watched("frieren", "frieren-ep-1", "1"), 1700000000000);

        let raw = state.store.get(HISTORY_KEY).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let entry = &value.as_array().unwrap()[0];
        assert_eq!(entry["animeSlug"], "frieren");
        assert_eq!(entry["episodeSlug"], "frieren-ep-1");
        assert_eq!(entry["episodeNumber"], "1");
        assert_eq!(entry["watchedAt"], 1700000000000_i64);
    }
}
