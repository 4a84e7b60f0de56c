//! In-process scan-state store.
//!
//! All rows live in a `Mutex<HashMap>` and are lost when the process exits.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use crate::error::AppError;
use super::{ScanState, ScanStateStore};

pub struct MemoryScanStateStore<P> {
    rows: Mutex<HashMap<Uuid, ScanState<P>>>,
}

impl<P> MemoryScanStateStore<P> {
    pub fn new() -> Self {
        Self { rows: Mutex::new(HashMap::new()) }
    }

    fn rows(&self) -> Result<MutexGuard<'_, HashMap<Uuid, ScanState<P>>>, AppError> {
        self.rows
            .lock()
            .map_err(|_| AppError::Store("scan state lock poisoned".into()))
    }

    /// Number of targets with a stored row.
    pub fn len(&self) -> Result<usize, AppError> {
        Ok(self.rows()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, AppError> {
        Ok(self.rows()?.is_empty())
    }
}

impl<P> Default for MemoryScanStateStore<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Clone + Send> ScanStateStore<P> for MemoryScanStateStore<P> {
    fn upsert(&self, state: ScanState<P>) -> Result<(), AppError> {
        self.rows()?.insert(state.target_id, state);
        Ok(())
    }

    fn get(&self, target_id: Uuid) -> Result<Option<ScanState<P>>, AppError> {
        Ok(self.rows()?.get(&target_id).cloned())
    }

    fn get_many(&self, target_ids: &[Uuid]) -> Result<HashMap<Uuid, ScanState<P>>, AppError> {
        let rows = self.rows()?;
        Ok(target_ids
            .iter()
            .filter_map(|id| rows.get(id).map(|s| (*id, s.clone())))
            .collect())
    }
}
