pub mod comments;
pub mod harvest;
