pub mod catalog;
pub mod dsl_model;
pub mod metrics;
