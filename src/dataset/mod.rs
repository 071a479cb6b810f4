pub mod conversion;
pub mod grid;
pub mod isochrone;
pub mod points;
pub mod store;
