pub mod dataset;
pub mod error;
pub mod geo_core;
pub mod pipeline;
