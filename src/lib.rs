//! Nearest-parcel lookup and wetland risk annotation for parcel polygons.
//!
//! Geometries carry their coordinate reference system in their type: queries, buffers and
//! distances only accept [`crs::crs_utils::Projected`] data, and [`crs::reproject::Reprojector`]
//! is the only way between geographic and projected coordinates.
pub mod config;
pub mod crs;
pub mod error;
pub mod geofile;
pub mod parcels;
