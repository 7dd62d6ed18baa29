pub mod api;
pub mod boundary;
pub mod farm;
pub mod geofile;
