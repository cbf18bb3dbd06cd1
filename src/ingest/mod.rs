//! End-to-end ingestion of a remote collection.
//!
//! [`Ingestor::ingest`] runs every stage inside one database transaction:
//!
//! ```text
//! stats ─▶ drop old derived tables ─▶ raw table ─▶ scan ─▶ create tables
//!       ─▶ materialize ─▶ catalog ─▶ indexes ─▶ load history ─▶ commit
//! ```
//!
//! Any error rolls the whole run back, leaving the previous run's tables
//! as they were.

pub mod catalog;
pub mod error;
pub mod history;
pub mod index;
pub mod raw;

pub use error::{IngestError, IngestResult};
pub use history::LoadHistory;

use tracing::{info, info_span, warn};

use crate::config::{Settings, MAX_EXPANSION_DEPTH};
use crate::db::{self, Database, Prefix};
use crate::fetch::{HttpTransport, Paginator, QueryFilter, RecordQuery, RecordStream, Transport, TransportSetupError};
use crate::sql::SqlDialect;
use crate::transform::{infer, materialize, TransformOptions};

/// Knobs fixed for the lifetime of an [`Ingestor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOptions {
    pub page_size: u32,
    pub retries: u32,
    pub create_indexes: bool,
    pub scan_batch_size: u64,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            page_size: 1000,
            retries: 2,
            create_indexes: true,
            scan_batch_size: 1000,
        }
    }
}

impl IngestOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            page_size: settings.remote.page_size,
            retries: settings.remote.retries,
            create_indexes: settings.ingest.create_indexes,
            scan_batch_size: u64::from(settings.ingest.scan_batch_size),
        }
    }
}

/// One ingestion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestRequest {
    /// `table` or `schema.table`; names the raw table and prefixes the rest.
    pub prefix: String,
    /// Collection path, e.g. `/users`.
    pub path: String,
    pub filter: QueryFilter,
    pub max_depth: u32,
    /// Stop after this many records.
    pub row_limit: Option<u64>,
    pub keep_raw: bool,
    pub page_by: Option<String>,
}

impl IngestRequest {
    pub fn new(prefix: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            path: path.into(),
            filter: QueryFilter::None,
            max_depth: 3,
            row_limit: None,
            keep_raw: true,
            page_by: None,
        }
    }

    #[must_use]
    pub fn filter(mut self, filter: QueryFilter) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub fn max_depth(mut self, depth: u32) -> Self {
        self.max_depth = depth;
        self
    }

    #[must_use]
    pub fn row_limit(mut self, limit: u64) -> Self {
        self.row_limit = Some(limit);
        self
    }

    #[must_use]
    pub fn keep_raw(mut self, keep: bool) -> Self {
        self.keep_raw = keep;
        self
    }

    #[must_use]
    pub fn page_by(mut self, field: impl Into<String>) -> Self {
        self.page_by = Some(field.into());
        self
    }

    /// Reject the request before any I/O.
    pub fn validate(&self) -> IngestResult<()> {
        if self.max_depth > MAX_EXPANSION_DEPTH {
            return Err(IngestError::InvalidConfig(format!(
                "max_depth must be at most {}, got {}",
                MAX_EXPANSION_DEPTH, self.max_depth
            )));
        }
        if self.path.trim().is_empty() {
            return Err(IngestError::InvalidConfig("collection path is empty".into()));
        }
        if self.page_by.as_deref().is_some_and(|f| f.trim().is_empty()) {
            return Err(IngestError::InvalidConfig("page_by field is empty".into()));
        }
        Prefix::parse(&self.prefix)?;
        Ok(())
    }

    fn record_query(&self) -> RecordQuery {
        RecordQuery {
            path: self.path.clone(),
            filter: self.filter.clone(),
            page_by: self.page_by.clone(),
        }
    }
}

/// Reported to the progress callback after each stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub pkey: i64,
    pub ingested: u64,
    pub total: Option<u64>,
}

/// Whether loading should go on after a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IngestOutcome {
    /// Raw table (if kept), derived tables and catalog, sorted.
    pub tables: Vec<String>,
    /// Total reported by the remote.
    pub total: Option<u64>,
    /// Records written to the raw table.
    pub ingested: u64,
}

/// Runs ingestions and drops against one database.
pub struct Ingestor {
    db: Box<dyn Database>,
    transport: Box<dyn Transport>,
    options: IngestOptions,
}

impl Ingestor {
    pub fn new(db: Box<dyn Database>, transport: Box<dyn Transport>, options: IngestOptions) -> Self {
        Self {
            db,
            transport,
            options,
        }
    }

    /// Connect the database and HTTP transport described by `settings`.
    pub fn from_settings(settings: &Settings) -> IngestResult<Self> {
        settings
            .validate_remote()
            .map_err(|e| IngestError::InvalidConfig(e.to_string()))?;
        let transport = HttpTransport::from_settings(&settings.remote).map_err(|e| match e {
            TransportSetupError::Settings(e) => IngestError::InvalidConfig(e.to_string()),
            TransportSetupError::Fetch(e) => IngestError::Fetch(e),
        })?;
        let config = settings
            .database
            .to_connection_config()
            .map_err(|e| IngestError::InvalidConfig(e.to_string()))?;
        let db = db::open(&config)?;
        Ok(Self::new(db, Box::new(transport), IngestOptions::from_settings(settings)))
    }

    pub fn options(&self) -> &IngestOptions {
        &self.options
    }

    pub fn database_mut(&mut self) -> &mut dyn Database {
        self.db.as_mut()
    }

    /// Give back the connection, dropping the transport.
    pub fn into_database(self) -> Box<dyn Database> {
        self.db
    }

    /// Ingest `request` without a progress callback.
    pub fn ingest(&mut self, request: &IngestRequest) -> IngestResult<IngestOutcome> {
        self.ingest_with_progress(request, |_| Flow::Continue)
    }

    /// Ingest `request`, calling `progress` after each stored record.
    pub fn ingest_with_progress<F>(
        &mut self,
        request: &IngestRequest,
        mut progress: F,
    ) -> IngestResult<IngestOutcome>
    where
        F: FnMut(&Progress) -> Flow,
    {
        request.validate()?;
        let Self {
            db,
            transport,
            options,
        } = self;
        let db = db.as_mut();
        let prefix = Prefix::parse_for(&request.prefix, db.dialect())?;
        let span = info_span!("ingest", prefix = %prefix);
        let _enter = span.enter();

        let paginator = Paginator::new(&**transport, options.page_size, options.retries);
        let records = paginator.records(&request.record_query())?;
        let options = options.clone();
        in_transaction(db, |db| {
            run(db, &prefix, request, &options, records, &mut progress)
        })
    }

    /// Drop a prefix's raw table, derived tables, catalog and history row.
    /// Unknown prefixes are a no-op.
    pub fn drop_prefix(&mut self, prefix: &str) -> IngestResult<()> {
        drop_prefix(self.db.as_mut(), prefix)
    }
}

/// [`Ingestor::drop_prefix`] for callers that hold only a connection.
pub fn drop_prefix(db: &mut dyn Database, prefix: &str) -> IngestResult<()> {
    let prefix = Prefix::parse_for(prefix, db.dialect())?;
    let span = info_span!("drop_prefix", prefix = %prefix);
    let _enter = span.enter();
    in_transaction(db, |db| {
        catalog::drop_extracted_tables(db, &prefix)?;
        raw::drop_raw_table(db, &prefix)?;
        history::remove_load(db, &prefix.history_key())?;
        info!("prefix dropped");
        Ok(())
    })
}

fn in_transaction<T>(
    db: &mut dyn Database,
    f: impl FnOnce(&mut dyn Database) -> IngestResult<T>,
) -> IngestResult<T> {
    db.begin()?;
    match f(db) {
        Ok(value) => {
            db.commit()?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = db.rollback() {
                warn!(error = %rollback, "rollback failed");
            }
            Err(e)
        }
    }
}

fn run(
    db: &mut dyn Database,
    prefix: &Prefix,
    request: &IngestRequest,
    options: &IngestOptions,
    records: RecordStream<'_>,
    progress: &mut dyn FnMut(&Progress) -> Flow,
) -> IngestResult<IngestOutcome> {
    let mut history = LoadHistory::start(prefix.history_key(), request.filter.describe());
    let total = records.total();

    catalog::drop_extracted_tables(db, prefix)?;
    raw::prepare_raw_table(db, prefix)?;

    let mut loader = raw::RawLoader::new(db, prefix);
    let limit = request.row_limit.unwrap_or(u64::MAX);
    let mut records = records;
    let mut ingested = 0u64;
    while ingested < limit {
        let Some(record) = records.next() else {
            break;
        };
        let record = record?;
        let pkey = record.pkey;
        loader.push(db, record)?;
        ingested += 1;
        let flow = progress(&Progress {
            pkey,
            ingested,
            total,
        });
        if flow == Flow::Stop {
            break;
        }
    }
    let loaded = loader.finish(db)?;
    history.download_complete_utc = Some(history::now_utc());
    history.row_count = i64::try_from(loaded).unwrap_or(i64::MAX);
    info!(rows = loaded, "raw records ingested");

    let mut tables = Vec::new();
    if request.max_depth > 0 {
        let transform = TransformOptions {
            max_depth: request.max_depth,
            native_uuid: db.dialect().supports_native_uuid(),
            batch_size: options.scan_batch_size,
        };
        let root = prefix.root_table_name();
        let derived = infer::scan(db, prefix.raw_table(), &root, &transform)?;
        history.scan_complete_utc = Some(history::now_utc());
        info!(tables = derived.len(), "tables inferred");

        if !derived.is_empty() {
            infer::create_tables(db, prefix.schema(), &derived)?;
            materialize::materialize(db, prefix.raw_table(), &root, &derived, &transform)?;
            history.transformation_complete_utc = Some(history::now_utc());

            let names: Vec<String> = derived.table_names().map(str::to_string).collect();
            let catalog_table = catalog::write_catalog(db, prefix, &names)?;
            tables.extend(names.iter().map(|n| prefix.table(n.clone()).to_string()));
            tables.push(catalog_table.to_string());

            if options.create_indexes {
                index::create_indexes(db, prefix.schema(), &derived)?;
                history.index_complete_utc = Some(history::now_utc());
            }
        }
    }

    history::record_load(db, &history)?;

    if request.keep_raw {
        tables.push(prefix.raw_table().to_string());
    } else {
        raw::drop_raw_table(db, prefix)?;
    }
    tables.sort();
    Ok(IngestOutcome {
        tables,
        total,
        ingested: loaded,
    })
}
