pub mod standardizer;
