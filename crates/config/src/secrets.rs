//! Random token generation.
//!
//! Passwords, default colours, and fallback aliases are generated exactly
//! once: by a migration edge that introduces the field, by a dependency
//! auto-fix, or by the caller before compiling. The compiler never draws from
//! a [`SecretSource`].

use lnpkg_shared::SecretString;
use rand::rngs::{StdRng, ThreadRng};
use rand::{Rng, SeedableRng};

/// `a-z,A-Z,0-9`.
pub const ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
/// `a-f,0-9`.
pub const HEX_LOWER: &[u8] = b"abcdef0123456789";
/// Lowercase base-36 digits.
pub const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Length of generated passwords.
pub const PASSWORD_LEN: usize = 22;
/// Prefix of generated fallback aliases.
pub const ALIAS_PREFIX: &str = "start9-";
/// Random characters after [`ALIAS_PREFIX`].
pub const ALIAS_SUFFIX_LEN: usize = 9;

/// Source of random strings handed to transforms and fixes.
pub trait SecretSource {
    /// Draw `len` characters uniformly from `charset`.
    fn random_from(&mut self, charset: &[u8], len: usize) -> String;

    /// A fresh 22-character alphanumeric password.
    fn password(&mut self) -> SecretString {
        SecretString::from(self.random_from(ALPHANUMERIC, PASSWORD_LEN))
    }

    /// A random 6-digit RGB colour.
    fn color(&mut self) -> String {
        self.random_from(HEX_LOWER, 6)
    }

    /// A fallback node alias (`start9-` followed by 9 base-36 characters).
    fn alias(&mut self) -> String {
        let mut alias = String::from(ALIAS_PREFIX);
        alias.push_str(&self.random_from(BASE36, ALIAS_SUFFIX_LEN));
        alias
    }
}

/// [`SecretSource`] backed by any `rand` generator.
#[derive(Debug, Clone)]
pub struct RngSecrets<R> {
    rng: R,
}

impl RngSecrets<ThreadRng> {
    /// OS-seeded thread-local generator.
    #[must_use]
    pub fn os() -> Self {
        Self { rng: rand::rng() }
    }
}

impl RngSecrets<StdRng> {
    /// Deterministic generator for reproducible fixtures.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl<R: Rng> SecretSource for RngSecrets<R> {
    fn random_from(&mut self, charset: &[u8], len: usize) -> String {
        if charset.is_empty() {
            return String::new();
        }
        (0..len)
            .filter_map(|_| charset.get(self.rng.random_range(0..charset.len())))
            .map(|byte| char::from(*byte))
            .collect()
    }
}
