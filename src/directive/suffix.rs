//! Suffix generation for conflicting directive keys.
//!
//! Two sources are available:
//! - `Secure`: a PRNG seeded once from the OS CSPRNG at startup. If the OS
//!   source fails, the seed comes from `fastrand`'s process state instead and
//!   the degradation is logged once.
//! - `Seeded`: a PRNG with a fixed seed, identical across processes.
//!
//! Either way the PRNG is rewound at the start of every cycle, so identical
//! input yields identical suffixes, and so identical output.

use std::str::FromStr;

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Where conflict suffixes come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase", tag = "kind", content = "seed")]
pub enum SuffixSource {
    /// Seed drawn from the OS at startup.
    #[default]
    Secure,
    /// Fixed seed.
    Seeded(u64),
}

impl FromStr for SuffixSource {
    type Err = String;

    /// Accepts `secure`, `seeded` (seed 0) and `seeded:<u64>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("secure") {
            return Ok(Self::Secure);
        }
        match s.split_once(':') {
            None if s.eq_ignore_ascii_case("seeded") => Ok(Self::Seeded(0)),
            Some((kind, seed)) if kind.eq_ignore_ascii_case("seeded") => seed
                .parse()
                .map(Self::Seeded)
                .map_err(|e| format!("invalid seed {:?}: {}", seed, e)),
            _ => Err(format!("unknown suffix source {:?}", s)),
        }
    }
}

/// Produces non-negative 63-bit suffixes.
///
/// Both sources end up as a seeded PRNG rewound by [`reset`](Self::reset),
/// so unchanged input gets the same suffixes on every cycle of a process.
#[derive(Debug)]
pub struct SuffixGenerator {
    source: SuffixSource,
    seed: u64,
    rng: fastrand::Rng,
}

impl SuffixGenerator {
    pub fn new(source: SuffixSource) -> Self {
        let seed = match source {
            SuffixSource::Secure => startup_seed(),
            SuffixSource::Seeded(seed) => seed,
        };
        Self {
            source,
            seed,
            rng: fastrand::Rng::with_seed(seed),
        }
    }

    pub fn source(&self) -> SuffixSource {
        self.source
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Rewind to the start of the sequence.
    pub fn reset(&mut self) {
        self.rng.seed(self.seed);
    }

    /// Next suffix value.
    pub fn next_suffix(&mut self) -> u64 {
        self.rng.u64(..=i64::MAX as u64)
    }
}

impl Default for SuffixGenerator {
    fn default() -> Self {
        Self::new(SuffixSource::Secure)
    }
}

/// Seed for the secure source, drawn once per generator.
fn startup_seed() -> u64 {
    let mut buf = [0u8; 8];
    match OsRng.try_fill_bytes(&mut buf) {
        Ok(()) => u64::from_le_bytes(buf),
        Err(e) => {
            tracing::warn!(
                error = %e,
                "OS random source unavailable, conflict suffixes seeded from process state"
            );
            fastrand::u64(..)
        }
    }
}
