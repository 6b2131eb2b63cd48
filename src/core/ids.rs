//! Identifier generator
//!
//! Produces time-ordered UUIDv7 row identifiers. Identifiers minted within the
//! same millisecond stay strictly increasing by bumping the random tail of the
//! previous one, so the hyphenated strings sort in generation order for the
//! lifetime of a generator.

use crate::domain::{IdError, RowId};
use rand::rngs::OsRng;
use rand::RngCore;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Builder;

/// UUIDv7 leaves 74 bits for randomness once version and variant are set:
/// 12 bits of `rand_a` followed by 62 bits of `rand_b`
const RANDOM_BITS: u32 = 74;
const RANDOM_BITS_MASK: u128 = (1u128 << RANDOM_BITS) - 1;
const RAND_B_BITS: u32 = 62;

#[derive(Debug, Default)]
struct LastIssued {
    millis: u64,
    random: u128,
}

/// Generates sortable, unique [`RowId`]s
///
/// A generator is cheap to share behind an `Arc`; all state sits behind a
/// short-lived mutex.
///
/// # Examples
///
/// ```
/// use gpxload::core::ids::IdGenerator;
///
/// let ids = IdGenerator::new();
/// let a = ids.generate().unwrap();
/// let b = ids.generate().unwrap();
/// assert!(a.to_string() < b.to_string());
/// ```
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: Mutex<LastIssued>,
}

impl IdGenerator {
    /// Creates a generator
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a fresh identifier
    ///
    /// # Errors
    ///
    /// [`IdError::Clock`] when the system clock reads before the Unix epoch,
    /// [`IdError::Entropy`] when the OS random source fails.
    pub fn generate(&self) -> Result<RowId, IdError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| IdError::Clock(e.to_string()))?;
        let now_millis = u64::try_from(now.as_millis())
            .map_err(|_| IdError::Clock("timestamp out of range".to_string()))?;

        let mut fresh = [0u8; 10];
        OsRng
            .try_fill_bytes(&mut fresh)
            .map_err(|e| IdError::Entropy(e.to_string()))?;

        let mut last = self
            .last
            .lock()
            .map_err(|_| IdError::Clock("identifier state poisoned".to_string()))?;

        let (millis, random) = if now_millis > last.millis {
            (now_millis, u128_from_bytes(&fresh))
        } else {
            // Same millisecond, or the clock stepped back
            let next = (last.random + 1) & RANDOM_BITS_MASK;
            if next == 0 {
                (last.millis + 1, u128_from_bytes(&fresh))
            } else {
                (last.millis, next)
            }
        };

        last.millis = millis;
        last.random = random;
        drop(last);

        Ok(RowId::from_uuid(
            Builder::from_unix_timestamp_millis(millis, &bytes_from_u128(random)).into_uuid(),
        ))
    }
}

/// Fresh values start in the lower half of the range so a burst of
/// same-millisecond increments rarely spills into the next millisecond
fn u128_from_bytes(bytes: &[u8; 10]) -> u128 {
    bytes
        .iter()
        .fold(0u128, |acc, byte| (acc << 8) | u128::from(*byte))
        & (RANDOM_BITS_MASK >> 1)
}

/// Lays the random value out around the version and variant bits
fn bytes_from_u128(value: u128) -> [u8; 10] {
    let rand_a = (value >> RAND_B_BITS) as u16 & 0x0fff;
    let rand_b = value & ((1u128 << RAND_B_BITS) - 1);

    let mut out = [0u8; 10];
    out[0] = (rand_a >> 8) as u8;
    out[1] = rand_a as u8;
    for (i, byte) in out[2..].iter_mut().enumerate() {
        *byte = (rand_b >> (8 * (7 - i))) as u8;
    }
    out
}
