//! Injected dependencies: time and code generation.
//!
//! All external nondeterminism is abstracted behind traits so the lifecycle
//! can run against fixed clocks and scripted codes in tests.

use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use rand::distributions::Uniform;

/// Clock trait - abstracts time operations for testability
///
/// # Examples
///
/// ```
/// use bloodbank_core::environment::{Clock, SystemClock};
///
/// let clock = SystemClock;
/// assert!(clock.today() <= clock.now().date_naive());
/// ```
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;

    /// Get the current calendar day (UTC)
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Production clock backed by the system time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Alphabet for generated codes: uppercase ASCII letters and digits.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of the random suffix in a batch number.
pub const BATCH_SUFFIX_LEN: usize = 4;

/// Source of tracking and batch codes.
pub trait CodeGenerator: Send + Sync {
    /// Generate a random upper-alphanumeric code of `len` characters.
    fn code(&self, len: usize) -> String;

    /// Generate a batch number of the form `YYYYMMDD-XXXX`.
    fn batch_number(&self, day: NaiveDate) -> String {
        format!("{}-{}", day.format("%Y%m%d"), self.code(BATCH_SUFFIX_LEN))
    }
}

/// Code generator backed by the thread-local RNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn code(&self, len: usize) -> String {
        let picker = Uniform::from(0..CODE_ALPHABET.len());
        rand::thread_rng()
            .sample_iter(picker)
            .take(len)
            .map(|i| char::from(CODE_ALPHABET[i]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_codes_use_the_alphabet() {
        let code = RandomCodeGenerator.code(12);
        assert_eq!(code.len(), 12);
        assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
    }

    #[test]
    fn batch_number_format() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap_or_default();
        let batch = RandomCodeGenerator.batch_number(day);
        assert!(batch.starts_with("20250307-"));
        assert_eq!(batch.len(), "20250307-".len() + BATCH_SUFFIX_LEN);
    }
}
