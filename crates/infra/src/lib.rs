pub mod apify;
pub mod graph;
pub mod transport;
