#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::doc_markdown, clippy::if_not_else, clippy::non_ascii_literal)]

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use log::debug;

use reachscan::endpoint::EndpointSet;
use reachscan::input::{Config, Opts};
use reachscan::scanner::Scanner;
use reachscan::target::load;
use reachscan::{detail, output, warning};

#[cfg(unix)]
const DEFAULT_FILE_DESCRIPTORS_LIMIT: u64 = 8000;

#[tokio::main]
/// Reads the target file, scans it and prints each endpoint as it settles.
async fn main() -> anyhow::Result<()> {
    #[cfg(not(unix))]
    let _ = ansi_term::enable_ansi_support();

    env_logger::init();

    let mut opts: Opts = Opts::read();
    let config = Config::read(opts.config_path.clone()).context("Failed to read the config file")?;
    opts.merge(&config);

    debug!("Main() `opts` arguments are {opts:?}");

    let reader = open_targets(&opts.targets)?;
    let targets = load(reader, opts.running_config())
        .with_context(|| format!("Failed to load targets from {}", opts.targets.display()))?;

    if targets.endpoints.is_empty() {
        warning!("No endpoints to scan.", opts.greppable, opts.accessible);
        return Ok(());
    }

    #[cfg(unix)]
    let ceiling = infer_ceiling(&opts, adjust_ulimit_size(&opts));
    #[cfg(not(unix))]
    let ceiling = opts.batch_size;

    detail!(
        format!(
            "Scanning {} endpoints, {} at a time, {}s timeout.",
            targets.endpoints.len(),
            ceiling,
            targets.config.timeout_secs
        ),
        opts.greppable,
        opts.accessible
    );

    let timeout = Duration::from_secs(targets.config.timeout_secs);
    let results = Scanner::new(targets.endpoints, timeout, ceiling)
        .order(opts.scan_order)
        .output(opts.greppable, opts.accessible)
        .run()
        .await;

    print_summary(&results, &opts);
    Ok(())
}

fn open_targets(path: &Path) -> anyhow::Result<Box<dyn Read>> {
    if path == Path::new("-") {
        return Ok(Box::new(io::stdin()));
    }
    let file = File::open(path).with_context(|| format!("Could not open {}", path.display()))?;
    Ok(Box::new(file))
}

fn print_summary(results: &EndpointSet, opts: &Opts) {
    output!(
        format!(
            "{} of {} endpoints reachable.",
            results.reachable().count(),
            results.len()
        ),
        opts.greppable,
        opts.accessible
    );
}

#[cfg(unix)]
fn adjust_ulimit_size(opts: &Opts) -> u64 {
    use rlimit::Resource;

    if let Some(limit) = opts.ulimit {
        if Resource::NOFILE.set(limit, limit).is_ok() {
            detail!(
                format!("Automatically increasing ulimit value to {limit}."),
                opts.greppable,
                opts.accessible
            );
        } else {
            warning!(
                "ERROR. Failed to set ulimit value.",
                opts.greppable,
                opts.accessible
            );
        }
    }

    Resource::NOFILE
        .get()
        .map_or(DEFAULT_FILE_DESCRIPTORS_LIMIT, |(soft, _)| soft)
}

/// Keeps the ceiling below the open file limit so connect attempts fail as
/// unreachable endpoints rather than as exhausted descriptors.
#[cfg(unix)]
fn infer_ceiling(opts: &Opts, ulimit: u64) -> usize {
    let ceiling = opts.batch_size;
    let Ok(ulimit) = usize::try_from(ulimit) else {
        return ceiling;
    };

    if ceiling < ulimit {
        return ceiling;
    }

    let lowered = (ulimit / 2).max(1);
    warning!(
        format!("Batch size {ceiling} is above your file limit {ulimit}. Lowering it to {lowered}."),
        opts.greppable,
        opts.accessible
    );
    lowered
}

#[cfg(test)]
mod tests {
    #[cfg(unix)]
    use super::infer_ceiling;
    use super::open_targets;
    use reachscan::input::Opts;
    use std::path::Path;

    #[test]
    #[cfg(unix)]
    fn ceiling_below_limit_is_kept() {
        let opts = Opts {
            batch_size: 50,
            ..Opts::default()
        };
        assert_eq!(infer_ceiling(&opts, 1024), 50);
    }

    #[test]
    #[cfg(unix)]
    fn ceiling_above_limit_is_lowered() {
        let opts = Opts {
            batch_size: 5_000,
            ..Opts::default()
        };
        assert_eq!(infer_ceiling(&opts, 1024), 512);
    }

    #[test]
    fn missing_target_file_is_an_error() {
        assert!(open_targets(Path::new("does/not/exist.targets")).is_err());
    }
}
