use crate::error::{ProcessingError, Result};
use crate::models::{GriddedDataset, Indexers};
use crate::sources::retry::RetryPolicy;
use async_trait::async_trait;
use futures::future::try_join_all;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// What to read from a remote dataset: a coordinate selection and,
/// optionally, a subset of variables. Engines read only what is asked for.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetRequest {
    pub indexers: Indexers,
    pub variables: Option<Vec<String>>,
}

impl DatasetRequest {
    pub fn new(indexers: Indexers) -> Self {
        Self {
            indexers,
            variables: None,
        }
    }

    pub fn with_variables(mut self, variables: &[&str]) -> Self {
        self.variables = Some(variables.iter().map(|v| v.to_string()).collect());
        self
    }

    /// Apply the request to an already materialized dataset.
    pub fn apply(&self, dataset: &GriddedDataset) -> Result<GriddedDataset> {
        let selected = dataset.sel(&self.indexers)?;
        match &self.variables {
            Some(names) => {
                let names: Vec<&str> = names.iter().map(String::as_str).collect();
                selected.retain_variables(&names)
            }
            None => Ok(selected),
        }
    }
}

/// Remote gridded-data access. Implementations own the wire protocol.
#[async_trait]
pub trait DatasetEngine: Send + Sync {
    async fn open_dataset(&self, url: &str, request: &DatasetRequest) -> Result<GriddedDataset>;
}

/// Opens datasets through an engine, retrying transient transport failures.
#[derive(Clone)]
pub struct DatasetOpener {
    engine: Arc<dyn DatasetEngine>,
    policy: RetryPolicy,
}

impl DatasetOpener {
    pub fn new(engine: Arc<dyn DatasetEngine>) -> Self {
        Self {
            engine,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn open_dataset(&self, url: &str, request: &DatasetRequest) -> Result<GriddedDataset> {
        debug!(url = %url, indexers = request.indexers.len(), "Opening dataset");
        self.policy
            .retry(url, || self.engine.open_dataset(url, request))
            .await
    }

    /// Open several datasets concurrently and concatenate them along time.
    pub async fn open_mfdataset(
        &self,
        urls: &[String],
        request: &DatasetRequest,
    ) -> Result<GriddedDataset> {
        if urls.is_empty() {
            return Err(ProcessingError::MissingData("No files to open".to_string()));
        }

        info!(files = urls.len(), "Opening multi-file dataset");
        let what = format!("{} files starting at {}", urls.len(), urls[0]);
        let parts = self
            .policy
            .retry(&what, || {
                try_join_all(urls.iter().map(|url| self.engine.open_dataset(url, request)))
            })
            .await?;

        GriddedDataset::concat_time(parts)
    }
}

/// Engine serving datasets registered in memory under their URL.
#[derive(Debug, Default)]
pub struct InMemoryEngine {
    datasets: RwLock<HashMap<String, GriddedDataset>>,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dataset(self, url: impl Into<String>, dataset: GriddedDataset) -> Self {
        self.insert(url, dataset);
        self
    }

    pub fn insert(&self, url: impl Into<String>, dataset: GriddedDataset) {
        if let Ok(mut datasets) = self.datasets.write() {
            datasets.insert(url.into(), dataset);
        }
    }
}

#[async_trait]
impl DatasetEngine for InMemoryEngine {
    async fn open_dataset(&self, url: &str, request: &DatasetRequest) -> Result<GriddedDataset> {
        let datasets = self
            .datasets
            .read()
            .map_err(|_| ProcessingError::Config("In-memory dataset registry poisoned".to_string()))?;
        let dataset = datasets
            .get(url)
            .ok_or_else(|| ProcessingError::MissingData(format!("No dataset at '{}'", url)))?;
        request.apply(dataset)
    }
}
