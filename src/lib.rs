pub mod cli;
pub mod config;
pub mod core;
pub mod suites;
pub mod utils;

pub use self::core::{
    registry, Error, Field, FieldValue, OrderBy, Registry, Result, Scraper, SearchQuery, Suite,
    VideoFeed, VideoRecord,
};
pub use suites::{BlipSuite, GoogleVideoSuite, VimeoSuite};
