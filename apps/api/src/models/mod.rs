pub mod activity;
pub mod detection;
pub mod generation;
pub mod user;
