//! Data quality metric sources.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::Result;
use crate::models::UniqueValueSet;
use crate::stores::{RowCollection, RowStore};

use super::EmptyValueStats;

/// Empty-count histogram over one dataset.
///
/// Bound to a row collection and dataset at construction; evaluators call
/// [`aggregate`](Self::aggregate) with the dimensions and window of the
/// monitor condition.
#[derive(Clone)]
pub struct CountEmptyHistogram {
    rows: Arc<dyn RowStore>,
    collection: RowCollection,
    dataset_id: Uuid,
}

impl CountEmptyHistogram {
    /// Binds the histogram to a dataset in a row collection.
    pub fn new(rows: Arc<dyn RowStore>, collection: RowCollection, dataset_id: Uuid) -> Self {
        Self {
            rows,
            collection,
            dataset_id,
        }
    }

    /// Computes per-dimension empty-value stats as of now.
    ///
    /// Dimensions with no rows in the window are absent from the result; a
    /// dataset with no rows at all yields an empty mapping, not an error.
    pub async fn aggregate(
        &self,
        dimensions: &[String],
        window: &str,
    ) -> Result<HashMap<String, EmptyValueStats>> {
        self.rows
            .empty_value_counts(self.collection, self.dataset_id, dimensions, window)
            .await
    }
}

/// Unique-value-count histogram over one dataset.
#[derive(Clone)]
pub struct UniqueValueCountHistogram {
    rows: Arc<dyn RowStore>,
    collection: RowCollection,
    dataset_id: Uuid,
}

impl UniqueValueCountHistogram {
    /// Binds the histogram to a dataset in a row collection.
    pub fn new(rows: Arc<dyn RowStore>, collection: RowCollection, dataset_id: Uuid) -> Self {
        Self {
            rows,
            collection,
            dataset_id,
        }
    }

    /// Computes the per-dimension distinct value sets as of now.
    ///
    /// A dimension that never appears maps to no entry; callers treat that
    /// as the empty set.
    pub async fn aggregate(
        &self,
        dimensions: &[String],
        window: &str,
    ) -> Result<HashMap<String, UniqueValueSet>> {
        self.rows
            .unique_values(self.collection, self.dataset_id, dimensions, window)
            .await
    }
}
