//! This crate exposes the internal functionality of the reachscan TCP
//! reachability checker.
//!
//! reachscan reads a compact target file of address ranges, port ranges and
//! `key:value` directives, expands it into concrete endpoints and tries one
//! TCP connection to each, with a fixed cap on how many attempts run at
//! once.
//!
//! ## Architecture Overview
//!
//! 1. **Parsing**: [`Parser`](crate::parser::Parser) walks the input byte by
//!    byte and yields directives and endpoint records.
//! 2. **Expansion**: [`TargetExpander`](crate::target::TargetExpander)
//!    applies directives in order and expands records into an
//!    [`EndpointSet`](crate::endpoint::EndpointSet).
//! 3. **Scanning**: [`Scanner`](crate::scanner::Scanner) connects to every
//!    endpoint and settles it as reachable or unreachable.
//!
//! ## Basic Usage Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use reachscan::input::RunningConfig;
//! use reachscan::scanner::Scanner;
//! use reachscan::target::load;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let spec = "timeout:1\nport:22\n192.168.1.1-192.168.1.20\n192.168.1.1:80-81\n";
//!     let targets = load(spec.as_bytes(), RunningConfig::default())?;
//!
//!     let timeout = Duration::from_secs(targets.config.timeout_secs);
//!     let results = Scanner::new(targets.endpoints, timeout, 5).run().await;
//!
//!     for (endpoint, reachable) in results.to_liveness_map() {
//!         println!("{endpoint} - {reachable}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Loading is all-or-nothing: the first malformed line aborts it with a
//! [`SpecError`](crate::error::SpecError) naming the line. Failed
//! connections are not errors; they are recorded as unreachable.
#![allow(clippy::needless_doctest_main)]

pub mod tui;

pub mod address;

pub mod endpoint;

pub mod error;

pub mod input;

pub mod parser;

pub mod scanner;

pub mod target;
