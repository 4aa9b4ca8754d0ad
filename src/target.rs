//! Turns parsed records into the set of endpoints to scan.
use std::io::Read;

use itertools::Itertools;
use log::{debug, info};

use crate::endpoint::{Endpoint, EndpointSet};
use crate::error::SpecError;
use crate::input::{PortRange, RunningConfig};
use crate::parser::{Directive, EndpointRecord, Item, Parser};

/// A fully loaded target file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Targets {
    /// Every endpoint to scan, all [`Unknown`](crate::endpoint::EndpointStatus::Unknown).
    pub endpoints: EndpointSet,
    /// The configuration as it stood after the last directive.
    pub config: RunningConfig,
}

/// Applies directives and expands records in stream order.
///
/// Directives change the config for the records that follow them only. A
/// record without ports is expanded with the default port current at the
/// moment it is seen.
#[derive(Debug)]
pub struct TargetExpander {
    config: RunningConfig,
    endpoints: EndpointSet,
}

impl TargetExpander {
    pub fn new(config: RunningConfig) -> Self {
        Self {
            config,
            endpoints: EndpointSet::new(),
        }
    }

    pub const fn config(&self) -> &RunningConfig {
        &self.config
    }

    /// Feeds one parsed item.
    pub fn apply(&mut self, item: Item) -> Result<(), SpecError> {
        match item {
            Item::Directive(directive) => {
                self.direct(directive);
                Ok(())
            }
            Item::Record(record) => self.expand(&record),
        }
    }

    fn direct(&mut self, directive: Directive) {
        match directive {
            Directive::Timeout(secs) => {
                debug!("Timeout set to {secs}s");
                self.config.timeout_secs = secs;
            }
            Directive::Port(port) => {
                debug!("Default port set to {port}");
                self.config.default_port = port;
            }
            Directive::Other { key, value } => {
                debug!("Ignoring unknown directive {key}:{value}");
            }
        }
    }

    /// Inserts every address × port of `record`.
    ///
    /// Cost is the product of both range sizes. Unless `max_endpoints` is
    /// set nothing stops a record like `0.0.0.0-255.255.255.255:0-65535`
    /// from exhausting memory.
    pub fn expand(&mut self, record: &EndpointRecord) -> Result<(), SpecError> {
        let ports = record
            .ports
            .unwrap_or_else(|| PortRange::single(self.config.default_port));

        if let Some(limit) = self.config.max_endpoints {
            let upper_bound = record.addresses.len().saturating_mul(ports.len());
            let room = limit.saturating_sub(self.endpoints.len()) as u64;
            if upper_bound > room && self.would_overflow(record, ports, limit) {
                return Err(SpecError::RangeTooLarge {
                    line: record.line,
                    limit,
                });
            }
        }

        let before = self.endpoints.len();
        for (address, port) in record.addresses.iter().cartesian_product(ports.iter()) {
            self.endpoints.insert(Endpoint::new(address, port));
        }
        debug!(
            "Line {}: {}-{} ports {}-{} added {} endpoints",
            record.line,
            record.addresses.start,
            record.addresses.end,
            ports.start,
            ports.end,
            self.endpoints.len() - before
        );
        Ok(())
    }

    /// Counts the genuinely new endpoints, stopping once the limit is crossed.
    fn would_overflow(&self, record: &EndpointRecord, ports: PortRange, limit: usize) -> bool {
        let room = limit.saturating_sub(self.endpoints.len());
        record
            .addresses
            .iter()
            .cartesian_product(ports.iter())
            .filter(|(address, port)| !self.endpoints.contains(&Endpoint::new(*address, *port)))
            .nth(room)
            .is_some()
    }

    pub fn finish(self) -> Targets {
        Targets {
            endpoints: self.endpoints,
            config: self.config,
        }
    }
}

/// Reads a whole target file, starting from `config`.
///
/// Any error aborts the load; no partial set is returned.
pub fn load<R: Read>(reader: R, config: RunningConfig) -> Result<Targets, SpecError> {
    expand(Parser::new(reader), config)
}

/// Drives a [`TargetExpander`] over a stream of parsed items.
pub fn expand<I>(items: I, config: RunningConfig) -> Result<Targets, SpecError>
where
    I: IntoIterator<Item = Result<Item, SpecError>>,
{
    let mut expander = TargetExpander::new(config);
    for item in items {
        expander.apply(item?)?;
    }

    let targets = expander.finish();
    info!(
        "Loaded {} endpoints (default port {}, timeout {}s)",
        targets.endpoints.len(),
        targets.config.default_port,
        targets.config.timeout_secs
    );
    Ok(targets)
}
