//! # Assembly Configuration
//!
//! Settings and collaborators required to run sector jobs against one
//! catalogue.
//!
//! ## Overview
//!
//! [`AssemblyConfig`] bundles the catalogue key, batching and shutdown
//! settings, and every collaborator bridge the engine calls into. Use
//! [`AssemblyConfig::builder()`] to assemble one; `build()` fails fast with an
//! actionable message when a required collaborator is missing or a setting is
//! out of range.
//!
//! ## Required collaborators
//!
//! - `CatalogueStore`: reads and transactional writes
//! - `UsageCopier`: physical copy of usages and owned entities
//! - `SearchIndex`: re-indexing and removal of sector content
//! - `NameMatcher`: rematching of displaced children and nested sectors
//! - `NameParser`: reparsing of names replaced by editorial decisions
//!
//! `ImportMonitor` and `TreeSnapshots` are optional. Without a monitor no
//! dataset is considered busy; without snapshots no cached exports are refreshed.
//!
//! ## Example
//!
//! ```ignore
//! use core_runtime::config::AssemblyConfig;
//! use core_model::DatasetKey;
//! use std::sync::Arc;
//!
//! let config = AssemblyConfig::builder()
//!     .catalogue_key(DatasetKey(3))
//!     .store(Arc::new(store))
//!     .copier(Arc::new(copier))
//!     .search_index(Arc::new(index))
//!     .matcher(Arc::new(matcher))
//!     .parser(Arc::new(parser))
//!     .batch_size(500)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{
    CatalogueStore, ImportMonitor, NameMatcher, NameParser, SearchIndex, TreeSnapshots, UsageCopier,
};
use core_model::DatasetKey;
use std::sync::Arc;
use std::time::Duration;

/// Records cloned between two commits of a sync
pub const DEFAULT_BATCH_SIZE: usize = 1000;
/// Parent updates between two commits while displacing foreign children
pub const DEFAULT_RELINK_COMMIT_INTERVAL: usize = 10_000;
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = crate::events::DEFAULT_EVENT_BUFFER_SIZE;
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

const MAX_BATCH_SIZE: usize = 100_000;

/// Configuration of the sector assembly engine.
#[derive(Clone)]
pub struct AssemblyConfig {
    /// The catalogue all sectors assemble into
    pub catalogue_key: DatasetKey,

    /// Records cloned per transaction, also the cursor batch size
    pub batch_size: usize,

    /// Parent updates per transaction while relinking foreign children
    pub relink_commit_interval: usize,

    /// Buffer size of the event bus
    pub event_buffer_size: usize,

    /// Time to wait for the worker to stop on shutdown
    pub shutdown_timeout: Duration,

    pub store: Arc<dyn CatalogueStore>,
    pub copier: Arc<dyn UsageCopier>,
    pub search_index: Arc<dyn SearchIndex>,
    pub matcher: Arc<dyn NameMatcher>,
    pub parser: Arc<dyn NameParser>,

    /// Detects source datasets being imported (optional)
    pub import_monitor: Option<Arc<dyn ImportMonitor>>,

    /// Refreshes cached tree and name exports (optional)
    pub snapshots: Option<Arc<dyn TreeSnapshots>>,
}

impl std::fmt::Debug for AssemblyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssemblyConfig")
            .field("catalogue_key", &self.catalogue_key)
            .field("batch_size", &self.batch_size)
            .field("relink_commit_interval", &self.relink_commit_interval)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("store", &"CatalogueStore { ... }")
            .field("copier", &"UsageCopier { ... }")
            .field("search_index", &"SearchIndex { ... }")
            .field("matcher", &"NameMatcher { ... }")
            .field("parser", &"NameParser { ... }")
            .field(
                "import_monitor",
                &self.import_monitor.as_ref().map(|_| "ImportMonitor { ... }"),
            )
            .field(
                "snapshots",
                &self.snapshots.as_ref().map(|_| "TreeSnapshots { ... }"),
            )
            .finish()
    }
}

impl AssemblyConfig {
    /// Creates a new builder for constructing an `AssemblyConfig`.
    pub fn builder() -> AssemblyConfigBuilder {
        AssemblyConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Batch size is within 1..=100,000
    /// - Relink commit interval is not zero
    /// - Event buffer size is not zero
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("Batch size must be greater than 0".to_string()));
        }

        if self.batch_size > MAX_BATCH_SIZE {
            return Err(Error::Config(format!(
                "Batch size exceeds maximum of {}",
                MAX_BATCH_SIZE
            )));
        }

        if self.relink_commit_interval == 0 {
            return Err(Error::Config(
                "Relink commit interval must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn missing_collaborator(collaborator: &str, setter: &str, purpose: &str) -> Error {
    Error::MissingCollaborator {
        collaborator: collaborator.to_string(),
        message: format!(
            "{} implementation is required {}. Inject one with .{}(); \
             bridge-memory provides an in-process implementation for tests and embedding.",
            collaborator, purpose, setter
        ),
    }
}

/// Builder for constructing [`AssemblyConfig`] instances.
///
/// Call [`build()`](AssemblyConfigBuilder::build) once every required
/// collaborator has been set.
#[derive(Default)]
pub struct AssemblyConfigBuilder {
    catalogue_key: Option<DatasetKey>,
    batch_size: Option<usize>,
    relink_commit_interval: Option<usize>,
    event_buffer_size: Option<usize>,
    shutdown_timeout: Option<Duration>,
    store: Option<Arc<dyn CatalogueStore>>,
    copier: Option<Arc<dyn UsageCopier>>,
    search_index: Option<Arc<dyn SearchIndex>>,
    matcher: Option<Arc<dyn NameMatcher>>,
    parser: Option<Arc<dyn NameParser>>,
    import_monitor: Option<Arc<dyn ImportMonitor>>,
    snapshots: Option<Arc<dyn TreeSnapshots>>,
}

impl AssemblyConfigBuilder {
    /// Sets the catalogue sectors assemble into.
    pub fn catalogue_key(mut self, key: impl Into<DatasetKey>) -> Self {
        self.catalogue_key = Some(key.into());
        self
    }

    /// Sets the number of records cloned per transaction (default 1000).
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    /// Sets the number of parent updates per transaction while relinking (default 10,000).
    pub fn relink_commit_interval(mut self, interval: usize) -> Self {
        self.relink_commit_interval = Some(interval);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Sets how long shutdown waits for the running job (default 30s).
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = Some(timeout);
        self
    }

    pub fn store(mut self, store: Arc<dyn CatalogueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn copier(mut self, copier: Arc<dyn UsageCopier>) -> Self {
        self.copier = Some(copier);
        self
    }

    pub fn search_index(mut self, index: Arc<dyn SearchIndex>) -> Self {
        self.search_index = Some(index);
        self
    }

    pub fn matcher(mut self, matcher: Arc<dyn NameMatcher>) -> Self {
        self.matcher = Some(matcher);
        self
    }

    pub fn parser(mut self, parser: Arc<dyn NameParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    pub fn import_monitor(mut self, monitor: Arc<dyn ImportMonitor>) -> Self {
        self.import_monitor = Some(monitor);
        self
    }

    pub fn snapshots(mut self, snapshots: Arc<dyn TreeSnapshots>) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    /// Builds the final `AssemblyConfig` instance.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The catalogue key is not set
    /// - A required collaborator is missing ([`Error::MissingCollaborator`])
    /// - A setting is out of range
    pub fn build(self) -> Result<AssemblyConfig> {
        let catalogue_key = self.catalogue_key.ok_or_else(|| {
            Error::Config("Catalogue key is required. Use .catalogue_key() to set it.".to_string())
        })?;

        let store = self.store.ok_or_else(|| {
            missing_collaborator("CatalogueStore", "store", "to read sectors and persist catalogue records")
        })?;
        let copier = self.copier.ok_or_else(|| {
            missing_collaborator("UsageCopier", "copier", "to copy source usages into the catalogue")
        })?;
        let search_index = self.search_index.ok_or_else(|| {
            missing_collaborator("SearchIndex", "search_index", "to index synced sectors")
        })?;
        let matcher = self.matcher.ok_or_else(|| {
            missing_collaborator("NameMatcher", "matcher", "to relink content after a sync")
        })?;
        let parser = self.parser.ok_or_else(|| {
            missing_collaborator("NameParser", "parser", "to apply editorial name changes")
        })?;

        let config = AssemblyConfig {
            catalogue_key,
            batch_size: self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
            relink_commit_interval: self
                .relink_commit_interval
                .unwrap_or(DEFAULT_RELINK_COMMIT_INTERVAL),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            shutdown_timeout: self.shutdown_timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT),
            store,
            copier,
            search_index,
            matcher,
            parser,
            import_monitor: self.import_monitor,
            snapshots: self.snapshots,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::{
        BridgeError, CopiedUsage, ReferenceLookup, TreeTraversal, UnitOfWork, UsageCursor,
    };
    use core_model::{
        DatasetScopedId, EditorialDecision, EntityType, Name, NameUsage, NomCode, ParsedAuthorship,
        Rank, Reference, Sector, SectorKey, SectorMetrics, SimpleName, SyncAttempt, VernacularName,
        Distribution,
    };

    type BResult<T> = std::result::Result<T, BridgeError>;

    fn unavailable<T>() -> BResult<T> {
        Err(BridgeError::Unavailable("test double".to_string()))
    }

    struct NullStore;

    #[async_trait]
    impl CatalogueStore for NullStore {
        async fn has_data(&self, _: DatasetKey) -> BResult<bool> {
            Ok(false)
        }
        async fn get_sector(&self, _: SectorKey) -> BResult<Option<Sector>> {
            Ok(None)
        }
        async fn list_sectors(&self, _: DatasetKey) -> BResult<Vec<Sector>> {
            Ok(Vec::new())
        }
        async fn list_sectors_by_subject_dataset(&self, _: DatasetKey, _: DatasetKey) -> BResult<Vec<Sector>> {
            Ok(Vec::new())
        }
        async fn child_sectors(&self, _: DatasetKey, _: SectorKey) -> BResult<Vec<Sector>> {
            Ok(Vec::new())
        }
        async fn decisions(&self, _: DatasetKey, _: DatasetKey) -> BResult<Vec<EditorialDecision>> {
            Ok(Vec::new())
        }
        async fn get_usage(&self, _: DatasetKey, _: &str) -> BResult<Option<NameUsage>> {
            Ok(None)
        }
        async fn get_reference(&self, _: DatasetKey, _: &str) -> BResult<Option<Reference>> {
            Ok(None)
        }
        async fn vernaculars(&self, _: DatasetKey, _: &str) -> BResult<Vec<VernacularName>> {
            Ok(Vec::new())
        }
        async fn distributions(&self, _: DatasetKey, _: &str) -> BResult<Vec<Distribution>> {
            Ok(Vec::new())
        }
        async fn foreign_children(&self, _: DatasetKey, _: SectorKey) -> BResult<Vec<NameUsage>> {
            Ok(Vec::new())
        }
        async fn open_tree(&self, _: TreeTraversal) -> BResult<Box<dyn UsageCursor>> {
            unavailable()
        }
        async fn sector_metrics(&self, _: DatasetKey, _: SectorKey) -> BResult<SectorMetrics> {
            Ok(SectorMetrics::default())
        }
        async fn next_attempt(&self, _: SectorKey) -> BResult<u32> {
            Ok(1)
        }
        async fn list_attempts(&self, _: SectorKey) -> BResult<Vec<SyncAttempt>> {
            Ok(Vec::new())
        }
        async fn begin(&self) -> BResult<Arc<dyn UnitOfWork>> {
            unavailable()
        }
    }

    struct NullCopier;

    #[async_trait]
    impl UsageCopier for NullCopier {
        async fn copy_usage(
            &self,
            _: &dyn UnitOfWork,
            _: NameUsage,
            _: &DatasetScopedId,
            _: &[EntityType],
            _: &mut dyn ReferenceLookup,
        ) -> BResult<CopiedUsage> {
            unavailable()
        }
    }

    struct NullIndex;

    #[async_trait]
    impl SearchIndex for NullIndex {
        async fn index_sector(&self, _: &Sector) -> BResult<u64> {
            Ok(0)
        }
        async fn delete_sector(&self, _: SectorKey) -> BResult<()> {
            Ok(())
        }
    }

    struct NullMatcher;

    #[async_trait]
    impl NameMatcher for NullMatcher {
        async fn match_sector(&self, _: &SimpleName, _: SectorKey) -> BResult<Vec<SimpleName>> {
            Ok(Vec::new())
        }
    }

    struct NullParser;

    impl NameParser for NullParser {
        fn parse(&self, _: &str, _: Rank, _: Option<NomCode>) -> Option<Name> {
            None
        }
        fn parse_authorship(&self, _: &str) -> Option<ParsedAuthorship> {
            None
        }
    }

    fn complete_builder() -> AssemblyConfigBuilder {
        AssemblyConfig::builder()
            .catalogue_key(DatasetKey(3))
            .store(Arc::new(NullStore))
            .copier(Arc::new(NullCopier))
            .search_index(Arc::new(NullIndex))
            .matcher(Arc::new(NullMatcher))
            .parser(Arc::new(NullParser))
    }

    #[test]
    fn test_build_with_defaults() {
        let config = complete_builder().build().unwrap();
        assert_eq!(config.catalogue_key, DatasetKey(3));
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.relink_commit_interval, DEFAULT_RELINK_COMMIT_INTERVAL);
        assert_eq!(config.event_buffer_size, DEFAULT_EVENT_BUFFER_SIZE);
        assert_eq!(config.shutdown_timeout, DEFAULT_SHUTDOWN_TIMEOUT);
        assert!(config.import_monitor.is_none());
        assert!(config.snapshots.is_none());
    }

    #[test]
    fn test_missing_catalogue_key() {
        let result = AssemblyConfig::builder()
            .store(Arc::new(NullStore))
            .build();
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("catalogue_key")));
    }

    #[test]
    fn test_missing_store_is_reported() {
        let result = AssemblyConfig::builder().catalogue_key(DatasetKey(3)).build();
        match result {
            Err(Error::MissingCollaborator { collaborator, message }) => {
                assert_eq!(collaborator, "CatalogueStore");
                assert!(message.contains(".store()"));
            }
            other => panic!("expected MissingCollaborator, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_parser_is_reported() {
        let result = AssemblyConfig::builder()
            .catalogue_key(DatasetKey(3))
            .store(Arc::new(NullStore))
            .copier(Arc::new(NullCopier))
            .search_index(Arc::new(NullIndex))
            .matcher(Arc::new(NullMatcher))
            .build();
        assert!(matches!(
            result,
            Err(Error::MissingCollaborator { collaborator, .. }) if collaborator == "NameParser"
        ));
    }

    #[test]
    fn test_batch_size_range() {
        assert!(complete_builder().batch_size(0).build().is_err());
        assert!(complete_builder().batch_size(100_001).build().is_err());
        assert_eq!(complete_builder().batch_size(100_000).build().unwrap().batch_size, 100_000);
    }

    #[test]
    fn test_zero_intervals_rejected() {
        assert!(complete_builder().relink_commit_interval(0).build().is_err());
        assert!(complete_builder().event_buffer_size(0).build().is_err());
    }

    #[test]
    fn test_debug_elides_collaborators() {
        let config = complete_builder().build().unwrap();
        let rendered = format!("{:?}", config);
        assert!(rendered.contains("CatalogueStore { ... }"));
        assert!(rendered.contains("import_monitor: None"));
    }
}
