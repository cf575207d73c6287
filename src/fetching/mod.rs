pub mod error;
pub mod page_source;
pub mod paginated_fetcher;
