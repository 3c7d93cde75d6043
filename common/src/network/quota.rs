//! Per-range sampling quotas, written as `n`, `n+m` or `n-m` meaning 2^n ± m.

use std::fmt;
use std::str::FromStr;

use crate::error::QuotaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quota {
    /// Every address of the block.
    All,
    /// 2^exponent + offset addresses.
    Count { exponent: u32, offset: i64 },
}

impl Quota {
    pub fn power(exponent: u32) -> Self {
        Quota::Count {
            exponent,
            offset: 0,
        }
    }

    /// Number of addresses to draw from a block holding `available` addresses.
    ///
    /// The exponent is clamped to `max_exponent` first, then the count is
    /// clamped into `0..=available`.
    pub fn resolve(&self, max_exponent: u32, available: u128) -> u128 {
        match *self {
            Quota::All => available,
            Quota::Count { exponent, offset } => {
                let exponent: u32 = exponent.min(max_exponent).min(126);
                let wanted: i128 = (1i128 << exponent).saturating_add(i128::from(offset));
                let wanted: u128 = u128::try_from(wanted.max(0)).unwrap_or(0);
                wanted.min(available)
            }
        }
    }

    /// Keeps whichever quota asks for fewer addresses.
    pub fn smaller(self, other: Quota, max_exponent: u32) -> Quota {
        if other.resolve(max_exponent, u128::MAX) < self.resolve(max_exponent, u128::MAX) {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for Quota {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quota::All => write!(f, "all"),
            Quota::Count { exponent, offset: 0 } => write!(f, "2^{exponent}"),
            Quota::Count { exponent, offset } if *offset > 0 => write!(f, "2^{exponent}+{offset}"),
            Quota::Count { exponent, offset } => write!(f, "2^{exponent}{offset}"),
        }
    }
}

impl FromStr for Quota {
    type Err = QuotaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s: &str = s.trim();
        if s.is_empty() {
            return Err(QuotaError::Empty);
        }
        if s.eq_ignore_ascii_case("all") {
            return Ok(Quota::All);
        }

        let malformed = || QuotaError::Malformed {
            input: s.to_string(),
        };

        let (base, offset) = match s.find(['+', '-']) {
            Some(idx) => (&s[..idx], &s[idx..]),
            None => (s, "+0"),
        };

        let exponent: u32 = base.parse::<u32>().map_err(|_| malformed())?;
        let offset: i64 = offset.parse::<i64>().map_err(|_| malformed())?;

        Ok(Quota::Count { exponent, offset })
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
