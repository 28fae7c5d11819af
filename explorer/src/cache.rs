//! In-memory cache of filtered lookups, keyed by position and filters.

use std::collections::HashMap;

use chess::PositionKey;
use tokio::sync::Mutex;

use crate::filters::QueryFilters;
use crate::traits::DatabaseMove;

type CacheKey = (PositionKey, String);

#[derive(Debug, Default)]
pub struct QueryCache {
    entries: Mutex<HashMap<CacheKey, Vec<DatabaseMove>>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(fen: &str, filters: &QueryFilters) -> CacheKey {
        (PositionKey::from_fen(fen), filters.cache_key())
    }

    pub async fn get(&self, fen: &str, filters: &QueryFilters) -> Option<Vec<DatabaseMove>> {
        self.entries.lock().await.get(&Self::key(fen, filters)).cloned()
    }

    pub async fn insert(&self, fen: &str, filters: &QueryFilters, moves: Vec<DatabaseMove>) {
        self.entries.lock().await.insert(Self::key(fen, filters), moves);
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_key_ignores_clocks_and_en_passant() {
        let cache = QueryCache::new();
        let filters = QueryFilters::default();
        let moves = vec![DatabaseMove {
            uci: "c7c5".into(),
            san: "c5".into(),
            game_count: 42,
        }];
        cache
            .insert(
                "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1",
                &filters,
                moves.clone(),
            )
            .await;

        let hit = cache
            .get("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 4 9", &filters)
            .await;
        assert_eq!(hit, Some(moves));

        let other_filters = QueryFilters {
            min_games: 1,
            ..Default::default()
        };
        assert!(cache
            .get("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1", &other_filters)
            .await
            .is_none());
        assert_eq!(cache.len().await, 1);
    }
}
