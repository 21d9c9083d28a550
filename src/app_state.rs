use crate::cli::CommandLineArgs;
use crate::partition::{PartitionedRangeReader, ReadPolicy};
use crate::resource_manager::ResourceManager;
use crate::series_store::{RangeRead, SeriesWrite, StoreError, TimezoneLookup};
use crate::series_store_memory::MemoryStore;
use crate::series_store_sled::SledStore;
use crate::service::TimeSeriesService;

use expanduser::expanduser;
use std::sync::Arc;

/// Shared application state passed to each query request handler.
pub struct AppState {
    /// Command line arguments.
    pub args: CommandLineArgs,

    /// Resource manager.
    pub resource_manager: ResourceManager,

    /// Query service.
    pub service: TimeSeriesService,

    /// Ingestion of samples and project settings.
    pub writer: Arc<dyn SeriesWrite>,
}

impl AppState {
    /// Create and return an [AppState].
    ///
    /// Serves the sled database at `--db-path` if set, otherwise an empty in-memory store.
    pub fn new(args: &CommandLineArgs) -> Result<Self, StoreError> {
        match &args.db_path {
            Some(path) => {
                let path = expanduser(path).map_err(|err| {
                    StoreError::Unavailable(format!("cannot expand {}: {}", path, err))
                })?;
                let store = Arc::new(SledStore::open(path)?);
                Ok(Self::with_store(args, store.clone(), store.clone(), store))
            }
            None => {
                let store = Arc::new(MemoryStore::new());
                Ok(Self::with_store(args, store.clone(), store.clone(), store))
            }
        }
    }

    /// Create and return an [AppState] serving the given stores.
    pub fn with_store(
        args: &CommandLineArgs,
        series: Arc<dyn RangeRead>,
        timezones: Arc<dyn TimezoneLookup>,
        writer: Arc<dyn SeriesWrite>,
    ) -> Self {
        let task_limit = args
            .thread_limit
            .or_else(|| Some(num_cpus::get().saturating_sub(1).max(1)));
        let resource_manager = ResourceManager::new(args.storage_connection_limit, task_limit);
        let reader = PartitionedRangeReader::new(series, ReadPolicy::from(args));
        Self {
            args: args.clone(),
            resource_manager,
            service: TimeSeriesService::new(reader, timezones),
            writer,
        }
    }
}

/// AppState wrapped in an Atomic Reference Count (Arc) to allow multiple references.
pub type SharedAppState = Arc<AppState>;
