//! Streaming parser for target files.
//!
//! A target file is line oriented. Each line is empty, a `#` comment, a
//! `key:value` directive, or an endpoint line of the form
//! `A[-A2][:P[-P2]]`. A `;` ends a record early, so several records can
//! share one line.
//!
//! ```text
//! # web tier
//! port:443
//! 10.0.0.1-10.0.0.5
//! 10.0.1.7:20-25 ; 10.0.1.8:22
//! ```
//!
//! The parser pulls bytes from any [`Read`] and yields items as soon as each
//! record closes. The first error ends the stream.
mod machine;

pub use machine::{finish, step, RawRecord, State};

use std::io::{self, BufReader, Read};

use log::debug;

use crate::address::AddressRange;
use crate::error::SpecError;
use crate::input::PortRange;

/// One closed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Directive(Directive),
    Record(EndpointRecord),
}

/// A validated `key:value` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// `timeout:<seconds>`
    Timeout(u64),
    /// `port:<default port>`
    Port(u16),
    /// Any other key. Kept so newer files still load.
    Other { key: String, value: String },
}

impl Directive {
    /// Validates a raw key and value. Keys match case-insensitively.
    pub fn interpret(key: String, value: String, line: usize) -> Result<Self, SpecError> {
        match key.to_ascii_lowercase().as_str() {
            "timeout" => match value.parse::<u64>() {
                Ok(secs) if secs >= 1 => Ok(Self::Timeout(secs)),
                _ => Err(SpecError::InvalidTimeout { line, value }),
            },
            "port" => value
                .parse::<u16>()
                .map(Self::Port)
                .map_err(|_| SpecError::InvalidPort { line, value }),
            _ => Ok(Self::Other { key, value }),
        }
    }
}

/// An endpoint line: an address range and, optionally, a port range.
///
/// Without a port range the record uses whatever default port is in effect
/// when it is expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointRecord {
    pub addresses: AddressRange,
    pub ports: Option<PortRange>,
    pub line: usize,
}

/// Lazily parses a target file.
///
/// Single pass and not restartable. After an error or the end of input every
/// call to `next` returns `None`.
pub struct Parser<R> {
    bytes: io::Bytes<BufReader<R>>,
    state: Option<State>,
    line: usize,
}

impl<R: Read> Parser<R> {
    pub fn new(reader: R) -> Self {
        Self {
            bytes: BufReader::new(reader).bytes(),
            state: Some(State::Start),
            line: 1,
        }
    }

    /// The line currently being read.
    pub const fn line(&self) -> usize {
        self.line
    }
}

impl<R: Read> Iterator for Parser<R> {
    type Item = Result<Item, SpecError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let state = self.state.take()?;

            let byte = match self.bytes.next() {
                Some(Ok(byte)) => byte,
                Some(Err(source)) => {
                    return Some(Err(SpecError::Io {
                        line: self.line,
                        source,
                    }))
                }
                // the end of input closes an unterminated last line
                None => {
                    debug!("Reached end of targets at line {}", self.line);
                    return finish(state, self.line).transpose();
                }
            };

            let (next, item) = match step(state, byte, self.line) {
                Ok(stepped) => stepped,
                Err(err) => return Some(Err(err)),
            };
            if byte == b'\n' {
                self.line += 1;
            }
            self.state = Some(next);

            if let Some(item) = item {
                return Some(Ok(item));
            }
        }
    }
}

impl<R: Read> std::iter::FusedIterator for Parser<R> {}
