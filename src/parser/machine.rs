//! The byte-level state machine behind [`Parser`](super::Parser).
//!
//! [`step`] is a pure function from the current state and one input byte to
//! the next state plus, when the byte closes a record, the item that record
//! produced. Feeding it a byte sequence by hand is enough to test any
//! transition.
use crate::address::{encode, AddressRange};
use crate::error::SpecError;
use crate::input::PortRange;

use super::{Directive, EndpointRecord, Item};

/// Where the machine is within the current line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    /// Nothing consumed on this record yet.
    Start,
    /// Inside a `#` comment; everything up to the newline is dropped.
    Comment,
    /// Reading the first address of an endpoint line.
    AddrLeft(RawRecord),
    /// Reading the address after `-`.
    AddrRight(RawRecord),
    /// Reading the first port after `:`.
    PortLeft(RawRecord),
    /// Reading the port after the port `-`.
    PortRight(RawRecord),
    /// Reading a directive key.
    ConfigKey(String),
    /// Reading a directive value after `:`.
    ConfigValue { key: String, value: String },
}

/// Unvalidated text of an endpoint line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    addr_start: String,
    addr_end: Option<String>,
    port_start: Option<String>,
    port_end: Option<String>,
}

/// Advances the machine by one byte.
///
/// `line` is only used to tag errors and emitted records.
pub fn step(state: State, byte: u8, line: usize) -> Result<(State, Option<Item>), SpecError> {
    match byte {
        b' ' | b'\t' | b'\r' => return Ok((state, None)),
        b'\n' => return finish(state, line).map(|item| (State::Start, item)),
        _ => {}
    }

    if state == State::Comment {
        return Ok((State::Comment, None));
    }

    match byte {
        b';' => return finish(state, line).map(|item| (State::Start, item)),
        b'#' => return finish(state, line).map(|item| (State::Comment, item)),
        _ => {}
    }

    let next = match state {
        State::Start if byte.is_ascii_digit() => State::AddrLeft(RawRecord {
            addr_start: char::from(byte).to_string(),
            ..RawRecord::default()
        }),
        State::Start => State::ConfigKey(char::from(byte).to_string()),
        State::Comment => State::Comment,

        State::AddrLeft(mut raw) => match byte {
            b'0'..=b'9' | b'.' => {
                raw.addr_start.push(char::from(byte));
                State::AddrLeft(raw)
            }
            b'-' => {
                raw.addr_end = Some(String::new());
                State::AddrRight(raw)
            }
            b':' => {
                raw.port_start = Some(String::new());
                State::PortLeft(raw)
            }
            _ => return Err(malformed_address(line, &raw.addr_start, byte)),
        },

        State::AddrRight(mut raw) => {
            let token = raw.addr_end.get_or_insert_with(String::new);
            match byte {
                b'0'..=b'9' | b'.' => {
                    token.push(char::from(byte));
                    State::AddrRight(raw)
                }
                b':' => {
                    raw.port_start = Some(String::new());
                    State::PortLeft(raw)
                }
                _ => return Err(malformed_address(line, token, byte)),
            }
        }

        State::PortLeft(mut raw) => {
            let token = raw.port_start.get_or_insert_with(String::new);
            match byte {
                b'0'..=b'9' => {
                    token.push(char::from(byte));
                    State::PortLeft(raw)
                }
                b'-' => {
                    raw.port_end = Some(String::new());
                    State::PortRight(raw)
                }
                _ => return Err(malformed_port(line, token, byte)),
            }
        }

        State::PortRight(mut raw) => {
            let token = raw.port_end.get_or_insert_with(String::new);
            if byte.is_ascii_digit() {
                token.push(char::from(byte));
                State::PortRight(raw)
            } else {
                return Err(malformed_port(line, token, byte));
            }
        }

        State::ConfigKey(key) if byte == b':' => State::ConfigValue {
            key,
            value: String::new(),
        },
        State::ConfigKey(mut key) => {
            key.push(char::from(byte));
            State::ConfigKey(key)
        }

        State::ConfigValue { key, mut value } => {
            value.push(char::from(byte));
            State::ConfigValue { key, value }
        }
    };

    Ok((next, None))
}

/// Closes the record in progress, yielding its item if it had one.
pub fn finish(state: State, line: usize) -> Result<Option<Item>, SpecError> {
    match state {
        State::Start | State::Comment => Ok(None),
        State::AddrLeft(raw) | State::AddrRight(raw) | State::PortLeft(raw) | State::PortRight(raw) => {
            raw.into_record(line).map(|record| Some(Item::Record(record)))
        }
        State::ConfigKey(key) => Err(SpecError::EmptyDirectiveValue { line, key }),
        State::ConfigValue { key, value } if value.is_empty() => {
            Err(SpecError::EmptyDirectiveValue { line, key })
        }
        State::ConfigValue { key, value } => {
            Directive::interpret(key, value, line).map(|directive| Some(Item::Directive(directive)))
        }
    }
}

impl RawRecord {
    fn into_record(self, line: usize) -> Result<EndpointRecord, SpecError> {
        let address = |token: &str| {
            encode(token).map_err(|_| SpecError::MalformedAddress {
                line,
                token: token.to_owned(),
            })
        };

        let start = address(&self.addr_start)?;
        let end = match &self.addr_end {
            Some(token) => address(token)?,
            None => start,
        };
        let addresses = AddressRange::new(start, end).ok_or_else(|| SpecError::InvalidAddressRange {
            line,
            start: self.addr_start.clone(),
            end: self.addr_end.clone().unwrap_or_default(),
        })?;

        let ports = match self.port_start {
            None => None,
            Some(start) => {
                let end = self.port_end.unwrap_or_else(|| start.clone());
                Some(port_range(&start, &end, line)?)
            }
        };

        Ok(EndpointRecord {
            addresses,
            ports,
            line,
        })
    }
}

fn port_range(start: &str, end: &str, line: usize) -> Result<PortRange, SpecError> {
    for token in [start, end] {
        if token.is_empty() {
            return Err(SpecError::MalformedPort {
                line,
                token: token.to_owned(),
            });
        }
    }

    let invalid = || SpecError::InvalidPortRange {
        line,
        start: start.to_owned(),
        end: end.to_owned(),
    };
    // tokens are digits only, so a failed parse means the value is above 65535
    let low: u16 = start.parse().map_err(|_| invalid())?;
    let high: u16 = end.parse().map_err(|_| invalid())?;
    PortRange::new(low, high).ok_or_else(invalid)
}

fn malformed_address(line: usize, token: &str, byte: u8) -> SpecError {
    SpecError::MalformedAddress {
        line,
        token: format!("{token}{}", char::from(byte)),
    }
}

fn malformed_port(line: usize, token: &str, byte: u8) -> SpecError {
    SpecError::MalformedPort {
        line,
        token: format!("{token}{}", char::from(byte)),
    }
}
