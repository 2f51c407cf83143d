pub mod compose;
pub mod domain;
pub mod error;
pub mod mock;
pub mod normalize;
pub mod types;
