//! Fake-news detection: baseline detectors, the improved pipeline built on
//! top of them, and the HTTP handlers that persist each run.

pub mod baseline;
pub mod consistency;
pub mod fusion;
pub mod handlers;
pub mod improved;
pub mod report;
pub mod rhetorical;
pub mod text;
pub mod verdict;
