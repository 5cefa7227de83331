//! Benchmark parameter table
//!
//! Deserialized from the benchmark task document and rendered into the
//! argument vector of the benchmark program, one token per value.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::FleetConfig;
use crate::models::{NodeRole, TaskError};

/// Benchmark task parameters
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct BenchParams {
    /// Client roles to run on
    pub clients: Vec<NodeRole>,
    /// Number of operations to perform
    pub operations: u64,
    /// Number of entries to start with
    pub entries: u64,
    /// Each object holds between k and 2k pairs
    pub k: u64,
    /// Characters per object map key
    pub keysize: u64,
    /// Characters per object map value
    pub valsize: u64,
    pub cachesize: u64,
    pub cacherefresh: u64,
    /// Histogram interval in ms
    pub increment: u64,
    /// `d <ms>` kills clients, `w <ms>` makes them wait; empty disables
    #[serde(alias = "injection")]
    pub interrupt: String,
    /// Percentages of inserts, updates, deletes and reads
    pub distribution: String,
    /// Operations in flight per client
    pub in_flight: u64,
    /// Random seed; defaults to the client's numeric id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rand: Option<u64>,
}

impl Default for BenchParams {
    fn default() -> Self {
        Self {
            clients: NodeRole::parse("client.0").into_iter().collect(),
            operations: 100,
            entries: 30,
            k: 2,
            keysize: 10,
            valsize: 1000,
            cachesize: 1000,
            cacherefresh: 20,
            increment: 10,
            interrupt: String::new(),
            distribution: "25 25 25 25".to_string(),
            in_flight: 256,
            rand: None,
        }
    }
}

impl BenchParams {
    /// Check every parameter that the benchmark program would reject
    pub fn validate(&self) -> Result<(), TaskError> {
        for client in &self.clients {
            if !client.is_client() {
                return Err(TaskError::config(format!(
                    "benchmark role '{client}' must start with 'client.'"
                )));
            }
            self.seed_for(client)?;
        }
        self.distribution.parse::<Distribution>()?;
        self.fault_injection()?;
        Ok(())
    }

    pub fn fault_injection(&self) -> Result<Option<FaultInjection>, TaskError> {
        if self.interrupt.trim().is_empty() {
            return Ok(None);
        }
        self.interrupt.parse().map(Some)
    }

    fn seed_for(&self, node: &NodeRole) -> Result<u64, TaskError> {
        match self.rand.or_else(|| node.numeric_id()) {
            Some(seed) => Ok(seed),
            None => Err(TaskError::config(format!(
                "'rand' is required because '{node}' has no numeric id"
            ))),
        }
    }

    /// Full argument vector for `node`
    pub fn to_args(&self, fleet: &FleetConfig, node: &NodeRole) -> Result<Vec<String>, TaskError> {
        let settings = &fleet.benchmark;
        let distribution: Distribution = self.distribution.parse()?;

        let mut args = vec!["env".to_string()];
        args.extend(fleet.expand_all(&settings.env, node));
        args.extend(fleet.expand_all(&settings.wrapper, node));
        args.push(fleet.expand(&settings.program, node));
        args.extend([
            "-k".to_string(),
            fleet.expand(&settings.keyring, node),
            "--name".to_string(),
            node.id().to_string(),
        ]);

        let numeric = [
            ("--ops", self.operations),
            ("--entries", self.entries),
            ("--kval", self.k),
            ("--keysize", self.keysize),
            ("--valsize", self.valsize),
            ("--cache-size", self.cachesize),
            ("--cache-refresh", self.cacherefresh),
            ("--inc", self.increment),
        ];
        for (flag, value) in numeric {
            args.push(flag.to_string());
            args.push(value.to_string());
        }

        if let Some(injection) = self.fault_injection()? {
            args.push("--inj".to_string());
            args.push(injection.mode.flag().to_string());
            args.push(injection.delay_ms.to_string());
        }

        args.push("-d".to_string());
        args.extend(distribution.percentages().iter().map(u64::to_string));
        args.push("-t".to_string());
        args.push(self.in_flight.to_string());
        args.push("-r".to_string());
        args.push(self.seed_for(node)?.to_string());

        Ok(args)
    }
}

/// Operation mix in percent
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Distribution {
    pub inserts: u64,
    pub updates: u64,
    pub deletes: u64,
    pub reads: u64,
}

impl Distribution {
    pub fn percentages(&self) -> [u64; 4] {
        [self.inserts, self.updates, self.deletes, self.reads]
    }
}

impl FromStr for Distribution {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split_whitespace()
            .map(|v| v.parse::<u64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| {
                TaskError::config(format!(
                    "distribution '{s}' must be four non-negative integers"
                ))
            })?;

        let [inserts, updates, deletes, reads] = values[..] else {
            return Err(TaskError::config(format!(
                "distribution '{s}' must have exactly four values"
            )));
        };
        let total = [inserts, updates, deletes, reads]
            .iter()
            .try_fold(0u64, |sum, v| sum.checked_add(*v));
        if total != Some(100) {
            return Err(TaskError::config(format!(
                "distribution '{s}' must sum to 100"
            )));
        }

        Ok(Self {
            inserts,
            updates,
            deletes,
            reads,
        })
    }
}

/// What happens to clients at the injection point
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InjectionMode {
    Kill,
    Wait,
}

impl InjectionMode {
    pub fn flag(&self) -> &'static str {
        match self {
            InjectionMode::Kill => "d",
            InjectionMode::Wait => "w",
        }
    }
}

/// Parsed `interrupt` value
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaultInjection {
    pub mode: InjectionMode,
    pub delay_ms: u64,
}

impl FromStr for FaultInjection {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TaskError::config(format!("interrupt '{s}' must look like 'd <ms>' or 'w <ms>'"));

        let mut parts = s.split_whitespace();
        let mode = match parts.next() {
            Some("d") => InjectionMode::Kill,
            Some("w") => InjectionMode::Wait,
            _ => return Err(invalid()),
        };
        let delay_ms = parts
            .next()
            .and_then(|ms| ms.parse().ok())
            .ok_or_else(invalid)?;
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self { mode, delay_ms })
    }
}

impl fmt::Display for FaultInjection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.mode.flag(), self.delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(s: &str) -> NodeRole {
        NodeRole::parse(s).unwrap()
    }

    fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_defaults() {
        let params = BenchParams::default();
        assert_eq!(params.clients, vec![role("client.0")]);
        assert_eq!(params.operations, 100);
        assert_eq!(params.in_flight, 256);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_render_args_for_client() {
        let params = BenchParams {
            operations: 50,
            ..Default::default()
        };
        let args = params.to_args(&FleetConfig::default(), &role("client.1")).unwrap();

        assert_eq!(args[0], "env");
        assert_eq!(args[1], "CEPH_CONF=/tmp/cephtest/ceph.conf");
        assert!(args.contains(&"/tmp/cephtest/binary/usr/local/bin/kvstorebench".to_string()));
        assert_eq!(flag_value(&args, "-k"), Some("/tmp/cephtest/data/client.1.keyring"));
        assert_eq!(flag_value(&args, "--name"), Some("1"));
        assert_eq!(flag_value(&args, "--ops"), Some("50"));
        assert_eq!(flag_value(&args, "--cache-refresh"), Some("20"));
        assert_eq!(flag_value(&args, "-r"), Some("1"));
        assert!(!args.contains(&"--inj".to_string()));

        let d = args.iter().position(|a| a == "-d").unwrap();
        assert_eq!(&args[d + 1..d + 5], &["25", "25", "25", "25"]);
        assert_eq!(args.last().unwrap(), "1");
    }

    #[test]
    fn test_render_injection_and_seed() {
        let params = BenchParams {
            interrupt: "w 1000".to_string(),
            rand: Some(7),
            ..Default::default()
        };
        let args = params.to_args(&FleetConfig::default(), &role("client.3")).unwrap();
        let inj = args.iter().position(|a| a == "--inj").unwrap();
        assert_eq!(&args[inj + 1..inj + 3], &["w", "1000"]);
        assert_eq!(flag_value(&args, "-r"), Some("7"));
    }

    #[test]
    fn test_deserialize_kebab_and_alias() {
        let params: BenchParams =
            serde_yaml::from_str("in-flight: 8\ninjection: d 50\ndistribution: 40 20 20 20\n").unwrap();
        assert_eq!(params.in_flight, 8);
        assert_eq!(
            params.fault_injection().unwrap(),
            Some(FaultInjection {
                mode: InjectionMode::Kill,
                delay_ms: 50
            })
        );
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_validation_errors() {
        let bad = [
            BenchParams {
                distribution: "50 50 50 50".to_string(),
                ..Default::default()
            },
            BenchParams {
                distribution: "18446744073709551615 1 0 0".to_string(),
                ..Default::default()
            },
            BenchParams {
                distribution: "18446744073709551615 101 0 0".to_string(),
                ..Default::default()
            },
            BenchParams {
                distribution: "25 25 50".to_string(),
                ..Default::default()
            },
            BenchParams {
                distribution: "25 25 25 -25".to_string(),
                ..Default::default()
            },
            BenchParams {
                interrupt: "x 100".to_string(),
                ..Default::default()
            },
            BenchParams {
                interrupt: "w soon".to_string(),
                ..Default::default()
            },
            BenchParams {
                clients: vec![role("osd.0")],
                ..Default::default()
            },
            BenchParams {
                clients: vec![role("client.a")],
                ..Default::default()
            },
        ];
        for params in bad {
            assert!(params.validate().is_err(), "{params:?}");
        }

        let named = BenchParams {
            clients: vec![role("client.a")],
            rand: Some(3),
            ..Default::default()
        };
        assert!(named.validate().is_ok());
    }
}
