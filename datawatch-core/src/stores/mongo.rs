//! MongoDB store backend.
//!
//! Documents round-trip through serde, so the persisted shapes are exactly
//! the model shapes in [`crate::models`]. Alert deduplication and the row
//! aggregation kernels run server-side as aggregation pipelines; the
//! pipeline builders are pure functions, unit-tested without a server.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{Bson, Document, doc};
use mongodb::{Client, Database};
use uuid::Uuid;

use crate::Result;
use crate::config::{CollectionNames, StoreConfig};
use crate::error::DataWatchError;
use crate::metrics::{EmptyValueStats, window_duration};
use crate::models::{
    Alert, Dataset, Integration, IntegrationConfig, Monitor, UniqueValueSet,
};

use super::{
    AlertDedupQuery, AlertStore, DatasetQuery, DatasetStore, IntegrationStore, MonitorQuery,
    MonitorStore, RowCollection, RowStore,
};

/// Document store backend over MongoDB.
pub struct MongoBackend {
    database: Database,
    collections: CollectionNames,
}

impl MongoBackend {
    /// Connects to the store described by the configuration.
    ///
    /// # Errors
    /// Returns a configuration error for an invalid config and a store error
    /// when the client cannot be created.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::with_uri_str(&config.mongo_url).await.map_err(|e| {
            DataWatchError::store_failed(
                format!("Failed to connect to {}", config.redacted_url()),
                e,
            )
        })?;
        tracing::info!("Connected to document store at {}", config.redacted_url());

        Ok(Self {
            database: client.database(&config.database),
            collections: config.collections.clone(),
        })
    }

    fn collection(&self, name: &str) -> mongodb::Collection<Document> {
        self.database.collection::<Document>(name)
    }

    fn row_collection_name(&self, collection: RowCollection) -> &str {
        match collection {
            RowCollection::EventRows => &self.collections.event_rows,
            RowCollection::BatchRows => &self.collections.batch_rows,
        }
    }
}

fn to_document<T: serde::Serialize>(value: &T, context: &str) -> Result<Document> {
    mongodb::bson::to_document(value)
        .map_err(|e| DataWatchError::store_failed(format!("Serializing {context}"), e))
}

fn from_document<T: serde::de::DeserializeOwned>(document: Document, context: &str) -> Result<T> {
    mongodb::bson::from_document(document)
        .map_err(|e| DataWatchError::store_failed(format!("Deserializing {context}"), e))
}

/// Reads an integer aggregation field, tolerating the i32/i64/f64 variants
/// the server may produce.
fn count_field(document: &Document, name: &str) -> u64 {
    match document.get(name) {
        Some(Bson::Int32(v)) => u64::try_from(*v).unwrap_or(0),
        Some(Bson::Int64(v)) => u64::try_from(*v).unwrap_or(0),
        Some(Bson::Double(v)) if *v >= 0.0 => *v as u64,
        _ => 0,
    }
}

/// `$match` pipeline for the alert deduplication key. Shape matches the
/// persisted alert layout: the four key fields identify "the same condition
/// re-alerting".
fn dedup_pipeline(query: &AlertDedupQuery) -> Vec<Document> {
    vec![
        doc! {
            "$match": {
                "alert_identification.model_version_id": query.model_version_id.to_string(),
                "violation.field": &query.field,
                "violation.focal_time_window": &query.focal_time_window,
                "violation.max_threshold": query.max_threshold,
            }
        },
        doc! { "$count": "matches" },
    ]
}

/// Per-dimension empty-value counts over a row collection.
fn empty_counts_pipeline(
    dataset_id: Uuid,
    dimensions: &[String],
    since: DateTime<Utc>,
) -> Result<Vec<Document>> {
    let since = mongodb::bson::to_bson(&since)
        .map_err(|e| DataWatchError::store_failed("Serializing window bound", e))?;
    Ok(vec![
        doc! {
            "$match": {
                "dataset_id": dataset_id.to_string(),
                "created_at": { "$gte": since },
            }
        },
        doc! { "$unwind": "$columns" },
        doc! { "$match": { "columns.name": { "$in": dimensions.to_vec() } } },
        doc! {
            "$group": {
                "_id": "$columns.name",
                "total_count": { "$sum": 1 },
                "empty_count": {
                    "$sum": {
                        "$cond": [
                            {
                                "$or": [
                                    { "$eq": ["$columns.value", Bson::Null] },
                                    { "$eq": ["$columns.value", ""] },
                                ]
                            },
                            1,
                            0,
                        ]
                    }
                },
            }
        },
    ])
}

/// Per-dimension distinct value sets over a row collection. Null and empty
/// values do not contribute.
fn unique_values_pipeline(
    dataset_id: Uuid,
    dimensions: &[String],
    since: DateTime<Utc>,
) -> Result<Vec<Document>> {
    let since = mongodb::bson::to_bson(&since)
        .map_err(|e| DataWatchError::store_failed("Serializing window bound", e))?;
    Ok(vec![
        doc! {
            "$match": {
                "dataset_id": dataset_id.to_string(),
                "created_at": { "$gte": since },
            }
        },
        doc! { "$unwind": "$columns" },
        doc! {
            "$match": {
                "columns.name": { "$in": dimensions.to_vec() },
                "columns.value": { "$nin": [Bson::Null, ""] },
            }
        },
        doc! {
            "$group": {
                "_id": "$columns.name",
                "values": { "$addToSet": "$columns.value" },
            }
        },
    ])
}

#[async_trait]
impl DatasetStore for MongoBackend {
    async fn find_datasets(&self, query: &DatasetQuery) -> Result<Vec<Dataset>> {
        let filter = doc! {
            "model_version_id": query.model_version_id.to_string(),
            "dataset_type": query.dataset_type.to_string(),
        };
        let mut cursor = self
            .collection(&self.collections.datasets)
            .find(filter)
            .sort(doc! { "created_at": 1 })
            .await
            .map_err(|e| DataWatchError::store_failed("Querying datasets", e))?;

        let mut datasets = Vec::new();
        while let Some(document) = cursor
            .try_next()
            .await
            .map_err(|e| DataWatchError::store_failed("Streaming datasets", e))?
        {
            datasets.push(from_document(document, "dataset")?);
        }
        Ok(datasets)
    }
}

#[async_trait]
impl AlertStore for MongoBackend {
    async fn insert_alert(&self, alert: Alert) -> Result<Alert> {
        let document = to_document(&alert, "alert")?;
        self.collection(&self.collections.alerts)
            .insert_one(document)
            .await
            .map_err(|e| DataWatchError::store_failed("Inserting alert", e))?;
        Ok(alert)
    }

    async fn count_matching(&self, query: &AlertDedupQuery) -> Result<u64> {
        let mut cursor = self
            .collection(&self.collections.alerts)
            .aggregate(dedup_pipeline(query))
            .await
            .map_err(|e| DataWatchError::store_failed("Running alert dedup query", e))?;

        let count = match cursor
            .try_next()
            .await
            .map_err(|e| DataWatchError::store_failed("Streaming alert dedup result", e))?
        {
            Some(document) => count_field(&document, "matches"),
            None => 0,
        };
        Ok(count)
    }
}

#[async_trait]
impl MonitorStore for MongoBackend {
    async fn insert_monitor(&self, monitor: Monitor) -> Result<Monitor> {
        let document = to_document(&monitor, "monitor")?;
        self.collection(&self.collections.monitors)
            .insert_one(document)
            .await
            .map_err(|e| DataWatchError::store_failed("Inserting monitor", e))?;
        Ok(monitor)
    }

    async fn get_monitor(&self, monitor_id: Uuid) -> Result<Monitor> {
        let document = self
            .collection(&self.collections.monitors)
            .find_one(doc! { "monitor_id": monitor_id.to_string() })
            .await
            .map_err(|e| DataWatchError::store_failed("Querying monitor", e))?
            .ok_or_else(|| {
                DataWatchError::entity_not_found("monitor", monitor_id.to_string())
            })?;
        from_document(document, "monitor")
    }

    async fn find_monitors(&self, query: &MonitorQuery) -> Result<Vec<Monitor>> {
        let mut filter = Document::new();
        if let Some(model_id) = query.model_id {
            filter.insert("monitor_identification.model_id", model_id.to_string());
        }
        if let Some(model_version_id) = query.model_version_id {
            filter.insert(
                "monitor_identification.model_version_id",
                model_version_id.to_string(),
            );
        }

        let mut cursor = self
            .collection(&self.collections.monitors)
            .find(filter)
            .sort(doc! { "created_at": -1 })
            .await
            .map_err(|e| DataWatchError::store_failed("Querying monitors", e))?;

        let mut monitors = Vec::new();
        while let Some(document) = cursor
            .try_next()
            .await
            .map_err(|e| DataWatchError::store_failed("Streaming monitors", e))?
        {
            monitors.push(from_document(document, "monitor")?);
        }
        Ok(monitors)
    }

    async fn count_monitors(&self) -> Result<u64> {
        self.collection(&self.collections.monitors)
            .count_documents(doc! {})
            .await
            .map_err(|e| DataWatchError::store_failed("Counting monitors", e))
    }

    async fn delete_monitor(&self, monitor_id: Uuid) -> Result<()> {
        self.collection(&self.collections.monitors)
            .delete_one(doc! { "monitor_id": monitor_id.to_string() })
            .await
            .map_err(|e| DataWatchError::store_failed("Deleting monitor", e))?;
        Ok(())
    }

    async fn update_last_run(&self, monitor_id: Uuid, last_run: DateTime<Utc>) -> Result<()> {
        let last_run = mongodb::bson::to_bson(&last_run)
            .map_err(|e| DataWatchError::store_failed("Serializing last_run", e))?;
        self.collection(&self.collections.monitors)
            .update_one(
                doc! { "monitor_id": monitor_id.to_string() },
                doc! { "$set": { "last_run": last_run } },
            )
            .await
            .map_err(|e| DataWatchError::store_failed("Updating monitor last_run", e))?;
        Ok(())
    }
}

#[async_trait]
impl IntegrationStore for MongoBackend {
    async fn insert_integration(&self, integration: Integration) -> Result<Integration> {
        let document = to_document(&integration, "integration")?;
        self.collection(&self.collections.integrations)
            .insert_one(document)
            .await
            .map_err(|e| DataWatchError::store_failed("Inserting integration", e))?;
        Ok(integration)
    }

    async fn get_integration(&self, integration_id: Uuid) -> Result<Integration> {
        let document = self
            .collection(&self.collections.integrations)
            .find_one(doc! { "integration_id": integration_id.to_string() })
            .await
            .map_err(|e| DataWatchError::store_failed("Querying integration", e))?
            .ok_or_else(|| {
                DataWatchError::entity_not_found("integration", integration_id.to_string())
            })?;
        from_document(document, "integration")
    }

    async fn list_integrations(&self) -> Result<Vec<Integration>> {
        let mut cursor = self
            .collection(&self.collections.integrations)
            .find(doc! {})
            .await
            .map_err(|e| DataWatchError::store_failed("Querying integrations", e))?;

        let mut integrations = Vec::new();
        while let Some(document) = cursor
            .try_next()
            .await
            .map_err(|e| DataWatchError::store_failed("Streaming integrations", e))?
        {
            integrations.push(from_document(document, "integration")?);
        }
        Ok(integrations)
    }

    async fn delete_integration(&self, integration_id: Uuid) -> Result<()> {
        self.collection(&self.collections.integrations)
            .delete_one(doc! { "integration_id": integration_id.to_string() })
            .await
            .map_err(|e| DataWatchError::store_failed("Deleting integration", e))?;
        Ok(())
    }

    async fn find_by_configuration(
        &self,
        configuration: &IntegrationConfig,
    ) -> Result<Option<Integration>> {
        let configuration = mongodb::bson::to_bson(configuration)
            .map_err(|e| DataWatchError::store_failed("Serializing configuration", e))?;
        let document = self
            .collection(&self.collections.integrations)
            .find_one(doc! { "configuration": configuration })
            .await
            .map_err(|e| DataWatchError::store_failed("Querying integrations", e))?;
        document
            .map(|document| from_document(document, "integration"))
            .transpose()
    }
}

#[async_trait]
impl RowStore for MongoBackend {
    async fn empty_value_counts(
        &self,
        collection: RowCollection,
        dataset_id: Uuid,
        dimensions: &[String],
        window: &str,
    ) -> Result<HashMap<String, EmptyValueStats>> {
        let since = Utc::now() - window_duration(window)?;
        let pipeline = empty_counts_pipeline(dataset_id, dimensions, since)?;
        let mut cursor = self
            .collection(self.row_collection_name(collection))
            .aggregate(pipeline)
            .await
            .map_err(|e| DataWatchError::store_failed("Aggregating empty-value counts", e))?;

        let mut result = HashMap::new();
        while let Some(document) = cursor
            .try_next()
            .await
            .map_err(|e| DataWatchError::store_failed("Streaming empty-value counts", e))?
        {
            let dimension = document.get_str("_id").unwrap_or_default().to_string();
            let stats = EmptyValueStats::from_counts(
                count_field(&document, "empty_count"),
                count_field(&document, "total_count"),
            );
            result.insert(dimension, stats);
        }
        Ok(result)
    }

    async fn unique_values(
        &self,
        collection: RowCollection,
        dataset_id: Uuid,
        dimensions: &[String],
        window: &str,
    ) -> Result<HashMap<String, UniqueValueSet>> {
        let since = Utc::now() - window_duration(window)?;
        let pipeline = unique_values_pipeline(dataset_id, dimensions, since)?;
        let mut cursor = self
            .collection(self.row_collection_name(collection))
            .aggregate(pipeline)
            .await
            .map_err(|e| DataWatchError::store_failed("Aggregating unique values", e))?;

        let mut result = HashMap::new();
        while let Some(document) = cursor
            .try_next()
            .await
            .map_err(|e| DataWatchError::store_failed("Streaming unique values", e))?
        {
            let dimension = document.get_str("_id").unwrap_or_default().to_string();
            let values: UniqueValueSet = document
                .get_array("values")
                .map(|values| {
                    values
                        .iter()
                        .filter_map(|value| value.as_str().map(ToString::to_string))
                        .collect()
                })
                .unwrap_or_default();
            result.insert(dimension, values);
        }
        Ok(result)
    }
}
