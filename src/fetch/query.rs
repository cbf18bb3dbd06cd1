//! Query parameters for collection requests.
//!
//! Okapi modules disagree on how they page and filter, so every page
//! request sends the CQL form (`query`, `limit`, `offset`) alongside the
//! parameter form some modules use instead (`sort`, `filters`, `perPage`).

use super::transport::QueryParams;

/// CQL that matches every record.
pub const ALL_RECORDS: &str = "cql.allRecords=1";

/// Largest limit the stream endpoint accepts.
pub const STREAM_LIMIT: u32 = 2_147_483_646;

/// How a caller narrows a collection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum QueryFilter {
    /// Every record.
    #[default]
    None,
    /// A CQL expression.
    Cql(String),
    /// Raw query-string pairs, passed through verbatim.
    Params(Vec<(String, String)>),
}

impl QueryFilter {
    /// Whether the filter already fixes an ordering, which rules out
    /// keyset paging.
    pub fn imposes_order(&self) -> bool {
        match self {
            QueryFilter::None => false,
            QueryFilter::Cql(cql) => cql.to_lowercase().contains("sortby"),
            QueryFilter::Params(params) => params
                .iter()
                .any(|(k, _)| k == "sort" || k.eq_ignore_ascii_case("sortby")),
        }
    }

    /// The CQL expression, if the filter has one.
    pub fn cql(&self) -> Option<&str> {
        match self {
            QueryFilter::Cql(cql) if !cql.trim().is_empty() => Some(cql.trim()),
            QueryFilter::Params(params) => params
                .iter()
                .find(|(k, _)| k == "query")
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    /// Text recorded in the load history.
    pub fn describe(&self) -> String {
        match self {
            QueryFilter::None => String::new(),
            QueryFilter::Cql(cql) => cql.clone(),
            QueryFilter::Params(params) => params
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("&"),
        }
    }

    /// Pass-through pairs other than `query`, which is rebuilt per request.
    fn extra_params(&self) -> impl Iterator<Item = (String, String)> + '_ {
        let params: &[(String, String)] = match self {
            QueryFilter::Params(params) => params,
            _ => &[],
        };
        params.iter().filter(|(k, _)| k != "query").cloned()
    }

    fn base_cql(&self) -> String {
        self.cql().unwrap_or(ALL_RECORDS).to_string()
    }
}

fn pair(k: &str, v: impl ToString) -> (String, String) {
    (k.to_string(), v.to_string())
}

/// The one-record request that reports `totalRecords`.
pub fn stats_params(filter: &QueryFilter) -> QueryParams {
    let mut params: QueryParams = filter.extra_params().collect();
    params.push(pair("query", filter.base_cql()));
    params.push(pair("limit", 1));
    params.push(pair("perPage", 1));
    params.push(pair("stats", true));
    params
}

/// A page of records with `id` greater than `last_id`, in id order.
pub fn keyset_params(filter: &QueryFilter, last_id: &str, page_size: u32) -> QueryParams {
    let mut params: QueryParams = filter.extra_params().collect();
    let cql = match filter.cql() {
        Some(cql) => format!("{} and id>{} sortBy id asc", cql, last_id),
        None => format!("id>{} sortBy id asc", last_id),
    };
    params.push(pair("query", cql));
    params.push(pair("sort", "id;asc"));
    params.push(pair("filters", format!("id>{}", last_id)));
    params.push(pair("limit", page_size));
    params.push(pair("perPage", page_size));
    params.push(pair("stats", true));
    params
}

/// Page `page` (from 0) of `page_size` records, optionally sorted by a field.
pub fn offset_params(
    filter: &QueryFilter,
    sort_by: Option<&str>,
    page: u64,
    page_size: u32,
) -> QueryParams {
    let mut params: QueryParams = filter.extra_params().collect();
    let cql = match sort_by {
        Some(field) => format!("{} sortBy {}", filter.base_cql(), field),
        None => filter.base_cql(),
    };
    params.push(pair("query", cql));
    params.push(pair("offset", page * u64::from(page_size)));
    params.push(pair("limit", page_size));
    params.push(pair("perPage", page_size));
    params
}

/// The single request against the bulk stream endpoint.
pub fn stream_params(filter: &QueryFilter) -> QueryParams {
    let mut params: QueryParams = filter.extra_params().collect();
    params.push(pair("query", filter.base_cql()));
    params.push(pair("limit", STREAM_LIMIT));
    params
}
