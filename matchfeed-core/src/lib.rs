#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod config;
pub mod entities;
pub mod events;
pub mod feed;
pub mod framework;
pub mod ports;
pub mod processors;
pub mod session;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use feed::{Anomaly, IngestReport, MatchFeed};
