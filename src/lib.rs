pub mod compactor;
pub mod engine;
pub mod http;
pub mod limits;
pub mod model;
pub mod observability;
pub mod wal;
