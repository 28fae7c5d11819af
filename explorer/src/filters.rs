//! Client-side filters applied to database results.

use crate::traits::DatabaseMove;

/// Rating buckets understood by the Lichess games explorer.
pub const RATING_BUCKETS: [u32; 9] = [0, 1000, 1200, 1400, 1600, 1800, 2000, 2200, 2500];

#[derive(Debug, Clone, PartialEq)]
pub struct QueryFilters {
    /// Keep at most this many moves, most played first.
    pub max_moves: usize,
    /// Drop moves seen in fewer games.
    pub min_games: u64,
    /// Drop moves below this share of all games in the position, in percent.
    pub min_percent_share: f32,
    pub rating_min: Option<u32>,
    pub rating_max: Option<u32>,
}

impl Default for QueryFilters {
    fn default() -> Self {
        Self {
            max_moves: 10,
            min_games: 10,
            min_percent_share: 1.0,
            rating_min: None,
            rating_max: None,
        }
    }
}

impl QueryFilters {
    pub fn has_rating_band(&self) -> bool {
        self.rating_min.is_some() || self.rating_max.is_some()
    }

    /// Explorer rating buckets covering the configured band.
    ///
    /// A bucket is named by its lower bound, so the bucket containing
    /// `rating_min` is included even if it starts below it.
    pub fn rating_buckets(&self) -> Vec<u32> {
        let min = self.rating_min.unwrap_or(0);
        let max = self.rating_max.unwrap_or(u32::MAX);
        let floor = RATING_BUCKETS
            .iter()
            .copied()
            .filter(|b| *b <= min)
            .max()
            .unwrap_or(0);
        let buckets: Vec<u32> = RATING_BUCKETS
            .iter()
            .copied()
            .filter(|b| *b >= floor && *b <= max)
            .collect();
        if buckets.is_empty() {
            RATING_BUCKETS.to_vec()
        } else {
            buckets
        }
    }

    /// Stable string form used as part of the cache key.
    pub fn cache_key(&self) -> String {
        format!(
            "{}:{}:{:.2}:{}:{}",
            self.max_moves,
            self.min_games,
            self.min_percent_share,
            self.rating_min.map(|r| r.to_string()).unwrap_or_default(),
            self.rating_max.map(|r| r.to_string()).unwrap_or_default(),
        )
    }

    /// Apply the thresholds to raw results. `total_games` is the number of
    /// games reaching the position, used for the percentage share.
    pub fn apply(&self, mut moves: Vec<DatabaseMove>, total_games: u64) -> Vec<DatabaseMove> {
        moves.sort_by(|a, b| b.game_count.cmp(&a.game_count));
        moves
            .into_iter()
            .filter(|m| m.game_count >= self.min_games)
            .filter(|m| {
                if total_games == 0 {
                    return false;
                }
                let share = m.game_count as f64 * 100.0 / total_games as f64;
                share >= f64::from(self.min_percent_share)
            })
            .take(self.max_moves)
            .collect()
    }
}
