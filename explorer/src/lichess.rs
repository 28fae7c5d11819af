//! Lichess opening explorer client.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::cache::QueryCache;
use crate::error::{ExplorerError, ExplorerResult};
use crate::filters::QueryFilters;
use crate::traits::{DatabaseMove, OpeningDatabase};

pub const DEFAULT_EXPLORER_URL: &str = "https://explorer.lichess.ovh";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Fetch at least this many moves so client-side filtering has room to work.
const MIN_FETCHED_MOVES: usize = 12;

#[derive(Debug, Deserialize)]
struct ExplorerResponse {
    #[serde(default)]
    white: u64,
    #[serde(default)]
    draws: u64,
    #[serde(default)]
    black: u64,
    #[serde(default)]
    moves: Vec<ExplorerMove>,
}

#[derive(Debug, Deserialize)]
struct ExplorerMove {
    uci: String,
    san: String,
    #[serde(default)]
    white: u64,
    #[serde(default)]
    draws: u64,
    #[serde(default)]
    black: u64,
}

impl ExplorerResponse {
    fn total_games(&self) -> u64 {
        let total = self.white + self.draws + self.black;
        if total > 0 {
            total
        } else {
            self.moves.iter().map(ExplorerMove::game_count).sum()
        }
    }
}

impl ExplorerMove {
    fn game_count(&self) -> u64 {
        self.white + self.draws + self.black
    }
}

/// Decode an explorer response body into `(moves, total games)`.
fn parse_response(body: &str) -> ExplorerResult<(Vec<DatabaseMove>, u64)> {
    let response: ExplorerResponse =
        serde_json::from_str(body).map_err(|e| ExplorerError::InvalidData(e.to_string()))?;
    let total = response.total_games();
    let moves = response
        .moves
        .into_iter()
        .map(|m| DatabaseMove {
            game_count: m.game_count(),
            uci: m.uci,
            san: m.san,
        })
        .collect();
    Ok((moves, total))
}

/// Queries `masters` when no rating band is configured, otherwise the
/// `lichess` games database restricted to the matching rating buckets.
pub struct LichessExplorer {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    cache: QueryCache,
}

impl LichessExplorer {
    pub fn new(base_url: impl Into<String>) -> ExplorerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("bookmate/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            cache: QueryCache::new(),
        })
    }

    /// Bearer token sent with every request.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    fn request(&self, fen: &str, filters: &QueryFilters) -> reqwest::RequestBuilder {
        let fetched = filters.max_moves.max(MIN_FETCHED_MOVES).to_string();
        let builder = if filters.has_rating_band() {
            let ratings = filters
                .rating_buckets()
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(",");
            self.client.get(format!("{}/lichess", self.base_url)).query(&[
                ("variant", "standard"),
                ("fen", fen),
                ("moves", fetched.as_str()),
                ("topGames", "0"),
                ("recentGames", "0"),
                ("ratings", ratings.as_str()),
            ])
        } else {
            self.client.get(format!("{}/masters", self.base_url)).query(&[
                ("fen", fen),
                ("moves", fetched.as_str()),
                ("topGames", "0"),
            ])
        };
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[async_trait]
impl OpeningDatabase for LichessExplorer {
    #[tracing::instrument(skip(self, filters))]
    async fn query(&self, fen: &str, filters: &QueryFilters) -> ExplorerResult<Vec<DatabaseMove>> {
        if let Some(hit) = self.cache.get(fen, filters).await {
            tracing::debug!(moves = hit.len(), "Explorer cache hit");
            return Ok(hit);
        }

        let response = self.request(fen, filters).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!("Explorer rate limit reached");
            return Err(ExplorerError::RateLimited);
        }
        if !status.is_success() {
            return Err(ExplorerError::Unavailable(format!("HTTP {}", status)));
        }

        let body = response.text().await?;
        let (moves, total) = parse_response(&body)?;
        let filtered = filters.apply(moves, total);
        tracing::debug!(total, kept = filtered.len(), "Explorer lookup");

        self.cache.insert(fen, filters, filtered.clone()).await;
        Ok(filtered)
    }
}
