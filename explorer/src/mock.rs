//! Mock OpeningDatabase implementation for testing

use crate::error::{ExplorerError, ExplorerResult};
use crate::filters::QueryFilters;
use crate::traits::{DatabaseMove, OpeningDatabase};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Responder = Box<dyn Fn(&str) -> ExplorerResult<Vec<DatabaseMove>> + Send>;

/// Scripted database - only compiled in test mode or with mock feature
#[derive(Clone, Default)]
pub struct MockOpeningDatabase {
    responder: Arc<Mutex<Option<Responder>>>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Query { fen: String, filters: QueryFilters },
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockOpeningDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every query through `f`, which receives the queried FEN.
    pub fn with_response<F>(self, f: F) -> Self
    where
        F: Fn(&str) -> ExplorerResult<Vec<DatabaseMove>> + Send + 'static,
    {
        *lock(&self.responder) = Some(Box::new(f));
        self
    }

    /// Answer every query with the same moves.
    pub fn with_moves(self, moves: Vec<DatabaseMove>) -> Self {
        self.with_response(move |_| Ok(moves.clone()))
    }

    /// Answer every query with a rate-limit error.
    pub fn rate_limited(self) -> Self {
        self.with_response(|_| Err(ExplorerError::RateLimited))
    }

    /// Get recorded calls for verification
    pub fn get_calls(&self) -> Vec<MockCall> {
        lock(&self.call_log).clone()
    }
}

#[async_trait]
impl OpeningDatabase for MockOpeningDatabase {
    async fn query(&self, fen: &str, filters: &QueryFilters) -> ExplorerResult<Vec<DatabaseMove>> {
        lock(&self.call_log).push(MockCall::Query {
            fen: fen.to_string(),
            filters: filters.clone(),
        });
        match lock(&self.responder).as_ref() {
            Some(f) => f(fen),
            None => Err(ExplorerError::NotConfigured("query".to_string())),
        }
    }
}
