//! Tree configuration.
//!
//! A [`TreeConfig`] is consumed once, at tree-creation time, and baked into
//! the root bucket's prefix; it is not carried around separately afterwards.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The conservative bound on tree height from the design notes. The source
/// oscillates between 100, 1000, and 10000; anything beyond a dozen or two
/// levels indicates a pathological `average` or a bug, never legitimate data.
pub const MAX_LEVEL: u32 = 12;

/// The default target bucket size used by [`TreeConfig::default`].
pub const DEFAULT_AVERAGE: u32 = 32;

/// Tunables for a single tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Target expected bucket size; controls boundary rarity (`1/average`).
    #[serde(default = "default_average")]
    pub average: u32,
}

const fn default_average() -> u32 {
    DEFAULT_AVERAGE
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            average: DEFAULT_AVERAGE,
        }
    }
}

impl TreeConfig {
    /// Construct a config, validating `average` per §4.1: integral and in
    /// `[1, u32::MAX]`. `u32` is already integral, so this only rejects zero.
    pub fn new(average: u32) -> Result<Self> {
        if average == 0 {
            return Err(Error::InvalidAverage { average });
        }
        Ok(Self { average })
    }
}
