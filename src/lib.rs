//! pagesnap - capture document pages as raster images by driving an
//! external viewer's GUI
//!
//! The document renderer is a black box reachable only through its GUI, so
//! pages are extracted the blunt way: open the document in the default
//! viewer, press the page-turn key, screenshot the screen, repeat. The
//! interesting part is knowing when to stop - [`capture::session`] watches
//! for consecutive near-identical captures, takes that as the end of the
//! document and trims the duplicate tail.

pub mod capture;
pub mod config;
pub mod input;
pub mod viewer;
