pub mod batch;
pub mod engine;
pub mod fetch;
pub mod ordering;
