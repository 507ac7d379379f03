#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod convert;
pub mod crawl;
pub mod extract;
pub mod fetch;
pub mod formats;
pub mod logging;
pub mod page_store;
pub mod probe;
