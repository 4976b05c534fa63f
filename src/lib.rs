//! nurseTracker
//!
//! Scrapes hospital career sites (Workday, eRecruit, Njoyn), filters the
//! postings against a role profile and emails a digest of new matches.

pub mod config;
pub mod digest;
pub mod fetch;
pub mod filter;
pub mod job_type;
pub mod logger;
pub mod normalize;
pub mod notify;
pub mod pipeline;
pub mod scrapers;
pub mod storage;
pub mod types;
pub mod url_state;

pub use types::*;
