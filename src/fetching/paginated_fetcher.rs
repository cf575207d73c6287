use crate::fetching::error::FetchError;
use crate::fetching::page_source::PageSource;
use crate::soql::where_clause::build_where_clause;
use crate::types::filter::FilterSpec;
use bon::bon;
use log::{debug, error, info, warn};
use polars::prelude::*;
use std::error::Error as _;
use std::io::Cursor;

pub const DEFAULT_PAGE_SIZE: usize = 5000;

/// Drives `$limit`/`$offset` pagination against a SODA CSV endpoint.
///
/// Pages are requested strictly one after another: the next offset is only known to be
/// useful once the current page has been seen. Each call owns its own accumulator, so a
/// single fetcher can be shared between independent fetches.
pub struct PaginatedFetcher<S> {
    source: S,
}

#[bon]
impl<S: PageSource> PaginatedFetcher<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fetches every page matching the filters and returns them concatenated.
    ///
    /// This never fails: a transport error on any page is logged together with the
    /// offending URL and an empty frame is returned. Pages fetched before the failure
    /// are discarded and nothing is retried. Use [`PaginatedFetcher::try_fetch`] to get
    /// the error instead.
    ///
    /// # Arguments
    ///
    /// * `.endpoint(&str)`: **Required.** Query endpoint; `.csv` is appended when missing.
    /// * `.filters(&FilterSpec)`: Optional structured filters.
    /// * `.raw_filter(&str)`: Optional pre-formed `$where` clause, takes precedence over `filters`.
    /// * `.page_size(usize)`: Optional. Rows per request, defaults to `5000`.
    /// * `.max_rows(usize)`: Optional. Stop once at least this many rows were accumulated.
    #[builder]
    pub async fn fetch(
        &self,
        endpoint: &str,
        filters: Option<&FilterSpec>,
        raw_filter: Option<&str>,
        page_size: Option<usize>,
        max_rows: Option<usize>,
    ) -> DataFrame {
        let where_clause = build_where_clause(filters, raw_filter);
        info!(
            "Starting data fetch from {} with filters: {:?}",
            endpoint, where_clause
        );
        match self
            .fetch_pages(endpoint, &where_clause, page_size, max_rows)
            .await
        {
            Ok(frame) => frame,
            Err(e) => {
                let reason = e
                    .source()
                    .map(|source| source.to_string())
                    .unwrap_or_else(|| "unknown reason".to_string());
                error!("{}: {}", e, reason);
                DataFrame::empty()
            }
        }
    }

    /// Same pagination as [`PaginatedFetcher::fetch`], but transport failures are returned.
    #[builder]
    pub async fn try_fetch(
        &self,
        endpoint: &str,
        filters: Option<&FilterSpec>,
        raw_filter: Option<&str>,
        page_size: Option<usize>,
        max_rows: Option<usize>,
    ) -> Result<DataFrame, FetchError> {
        let where_clause = build_where_clause(filters, raw_filter);
        self.fetch_pages(endpoint, &where_clause, page_size, max_rows)
            .await
    }

    async fn fetch_pages(
        &self,
        endpoint: &str,
        where_clause: &str,
        page_size: Option<usize>,
        max_rows: Option<usize>,
    ) -> Result<DataFrame, FetchError> {
        let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1);
        let mut offset = 0;
        let mut pages: Vec<DataFrame> = Vec::new();
        let mut total_rows = 0;

        loop {
            let url = page_url(endpoint, page_size, offset, where_clause);
            debug!("Fetching URL: {}", url);

            let body = self.source.get_page(&url).await?;
            let page = match parse_page(body, &url) {
                Ok(Some(page)) => page,
                Ok(None) => {
                    info!("No more data to fetch; exiting loop.");
                    break;
                }
                Err(e) => {
                    error!("{}; treating it as the end of the data.", e);
                    break;
                }
            };

            let rows = page.height();
            total_rows += rows;
            pages.push(page);
            offset += page_size;

            if max_rows.is_some_and(|max_rows| total_rows >= max_rows) {
                info!("Reached max_rows limit of {:?}; stopping fetch.", max_rows);
                break;
            }
            if rows < page_size {
                info!("Received less rows than limit; assuming last page.");
                break;
            }
        }

        if pages.is_empty() {
            warn!("No data fetched from {}, returning empty DataFrame.", endpoint);
            return Ok(DataFrame::empty());
        }

        let frame = concat_pages(pages, endpoint)?;
        info!("Fetched total {} rows from {}", frame.height(), endpoint);
        Ok(frame)
    }
}

/// `<endpoint>.csv?$limit=..[&$offset=..][&$where=..]` with percent-encoded values.
pub(crate) fn page_url(endpoint: &str, page_size: usize, offset: usize, where_clause: &str) -> String {
    let base = if endpoint.ends_with(".csv") {
        endpoint.to_string()
    } else {
        format!("{}.csv", endpoint)
    };

    let mut params = vec![format!("$limit={}", page_size)];
    if offset > 0 {
        params.push(format!("$offset={}", offset));
    }
    if !where_clause.is_empty() {
        params.push(format!("$where={}", urlencoding::encode(where_clause)));
    }
    format!("{}?{}", base, params.join("&"))
}

/// Parses one CSV page with every column read as text.
///
/// Reading everything as text keeps the page schemas identical so they can be stacked;
/// typing is left to the standardizer. Returns `None` for an empty or header-only body.
fn parse_page(body: Vec<u8>, url: &str) -> Result<Option<DataFrame>, FetchError> {
    let text = String::from_utf8_lossy(&body);
    let trimmed = text.trim();
    if trimmed.is_empty() || !trimmed.contains('\n') {
        return Ok(None);
    }

    let frame = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(Cursor::new(trimmed.as_bytes().to_vec()))
        .finish()
        .map_err(|e| FetchError::CsvParse {
            url: url.to_string(),
            source: e,
        })?;

    if frame.height() == 0 {
        return Ok(None);
    }
    Ok(Some(frame))
}

fn concat_pages(pages: Vec<DataFrame>, endpoint: &str) -> Result<DataFrame, FetchError> {
    let mut pages = pages.into_iter();
    let Some(mut frame) = pages.next() else {
        return Ok(DataFrame::empty());
    };
    for page in pages {
        frame
            .vstack_mut(&page)
            .map_err(|e| FetchError::PageConcat {
                url: endpoint.to_string(),
                source: e,
            })?;
    }
    frame.as_single_chunk_par();
    Ok(frame)
}
