//! Keeps track of the days you went for a walk.
//! Walks are detected from exported health data or marked by hand, stored locally as plain
//! files and mirrored to a cloud table so several devices agree on manual marks.

pub mod cli;
pub mod cloud;
pub mod config;
pub mod detector;
pub mod health;
pub mod repository;
pub mod stats;
pub mod storage;
pub mod sync;
pub mod utils;
