//! GFS forecast mailer pipeline.
//!
//! A single-pass batch workflow with three stages run in sequence:
//! - Fetch a regional GFS GRIB2 subset from NOMADS (skipped when a fresh
//!   copy is already on disk)
//! - Render one map PNG per forecast product
//! - Zip the images and deliver them by e-mail
//!
//! Each run is independent; the only state between runs is the downloaded
//! GRIB2 files and rendered images on the local filesystem.

pub mod config;
pub mod error;
pub mod fetch;
pub mod grib;
pub mod mail;
pub mod package;
pub mod pipeline;
pub mod render;
