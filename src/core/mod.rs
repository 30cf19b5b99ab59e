//! Analysis building blocks: raster stretch/composite processing, polygon
//! join/aggregation and overlay masks, plus their parameter structs. These are
//! pure in-memory primitives consumed by the high-level `api` module.
pub mod params;
pub mod processing;
pub mod vector;
