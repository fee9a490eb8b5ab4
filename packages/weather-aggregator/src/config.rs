//! CLI surface and expiry configuration.
//!
//! The distilled design names its expiry thresholds as bare magic
//! constants (30s age, 20 update-gap, 120s sweep interval); this rewrite
//! exposes them as configuration, defaulting to exactly those values, per
//! the design notes' open question.

use std::path::PathBuf;

use clap::Parser;

/// Command-line arguments for the Aggregator binary.
#[derive(Debug, Parser)]
#[command(name = "weather-aggregator", about = "Central weather record aggregator")]
pub struct Args {
    /// TCP port to listen on.
    #[arg(short = 'p', long, value_parser = clap::value_parser!(u16).range(1..=65535))]
    pub port: u16,

    /// Directory persisted records are read from and written to. Defaults
    /// to the current working directory, though that collides with other
    /// instances sharing the same directory -- pass an explicit path to
    /// run more than one Aggregator per host.
    #[arg(long, default_value = ".")]
    pub data_dir: PathBuf,

    /// Age, in milliseconds, past which a record is eligible for expiry.
    #[arg(long, default_value_t = ExpiryPolicy::default().max_age_ms)]
    pub expiry_max_age_ms: i64,

    /// Global update-sequence gap past which a record is eligible for
    /// expiry even if recently touched by age.
    #[arg(long, default_value_t = ExpiryPolicy::default().max_seq_gap)]
    pub expiry_max_seq_gap: u64,

    /// Interval, in milliseconds, between expiry sweeps.
    #[arg(long, default_value_t = ExpiryPolicy::default().sweep_interval_ms)]
    pub expiry_sweep_interval_ms: u64,
}

impl Args {
    #[must_use]
    pub fn expiry_policy(&self) -> ExpiryPolicy {
        ExpiryPolicy {
            max_age_ms: self.expiry_max_age_ms,
            max_seq_gap: self.expiry_max_seq_gap,
            sweep_interval_ms: self.expiry_sweep_interval_ms,
        }
    }
}

/// Record expiry thresholds. A record expires when either threshold is
/// exceeded: it combines age and staleness-in-traffic so a low-traffic
/// record with recent updates survives, while one untouched through many
/// cluster-wide writes does not.
#[derive(Debug, Clone, Copy)]
pub struct ExpiryPolicy {
    pub max_age_ms: i64,
    pub max_seq_gap: u64,
    pub sweep_interval_ms: u64,
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self {
            max_age_ms: 30_000,
            max_seq_gap: 20,
            sweep_interval_ms: 120_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn default_expiry_policy_matches_spec_constants() {
        let policy = ExpiryPolicy::default();
        assert_eq!(policy.max_age_ms, 30_000);
        assert_eq!(policy.max_seq_gap, 20);
        assert_eq!(policy.sweep_interval_ms, 120_000);
    }

    #[test]
    fn parses_required_port() {
        let args = Args::parse_from(["weather-aggregator", "-p", "9000"]);
        assert_eq!(args.port, 9000);
        assert_eq!(args.data_dir, PathBuf::from("."));
    }

    #[test]
    fn rejects_out_of_range_port() {
        let result = Args::try_parse_from(["weather-aggregator", "-p", "0"]);
        assert!(result.is_err());
    }
}
