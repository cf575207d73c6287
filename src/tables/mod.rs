pub mod error;
pub mod table_io;
