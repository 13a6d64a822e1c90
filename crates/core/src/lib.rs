#![deny(warnings)]

pub mod api;
pub mod artifact;
pub mod config;
pub mod progress;
pub mod samples;
pub mod storage;
pub mod timeline;
pub mod workflow;
