//! Reading JSON records from a paged remote collection.

pub mod error;
pub mod pager;
pub mod query;
pub mod stream;
pub mod transport;

pub use error::{FetchError, FetchResult};
pub use pager::{Paginator, PagingMode, RecordQuery, RecordStream};
pub use query::QueryFilter;
pub use stream::FragmentAssembler;
pub use transport::{HttpTransport, QueryParams, Response, Transport, TransportSetupError};

/// One fetched record: its 1-based arrival number and its JSON text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub pkey: i64,
    pub json: Vec<u8>,
}

impl Record {
    /// The JSON as text. Records are UTF-8 by construction.
    pub fn text(&self) -> &str {
        std::str::from_utf8(&self.json).unwrap_or_default()
    }
}
