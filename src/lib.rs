//! Finds which upstream jobs gate a Concourse job's triggers, and how their
//! latest builds stand against the newest version of each gated resource.

pub mod auth;
pub mod cli;
pub mod concourse;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod report;
