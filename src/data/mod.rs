//! Data layer module
//!
//! This crate owns no storage. It types the remote tables and maps
//! their rows into view models:
//! - `models`: remote row/insert/update shapes
//! - `views`: UI-ready view models
//! - `converters`: row → view model mapping

mod converters;
mod models;
mod views;

pub use converters::*;
pub use models::*;
pub use views::*;
