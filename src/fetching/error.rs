use polars::error::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to build HTTP client")]
    ClientBuild(#[source] reqwest::Error),

    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    // Stream errors while reading the (possibly decompressed) body
    #[error("Failed to read response body from {url}")]
    DownloadIo {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse CSV page from {url}")]
    CsvParse {
        url: String,
        #[source]
        source: PolarsError,
    },

    #[error("Failed to append page fetched from {url}")]
    PageConcat {
        url: String,
        #[source]
        source: PolarsError,
    },
}
