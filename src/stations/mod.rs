pub mod geodesy;
pub mod radius_filter;
