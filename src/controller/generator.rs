//! # Password Generator
//!
//! Produces password material for `Password` resources.

use crate::constants::DEFAULT_PASSWORD_LENGTH;
use crate::crd::PasswordSpec;
use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;
use zeroize::Zeroizing;

const DIGITS: &[u8] = b"0123456789";
const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const SYMBOLS: &[u8] = b"~!@#$%^&*()_-+={}[]|:;<>,.?/";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeneratorError {
    #[error("password length {length} cannot hold the {required} required characters")]
    TooShort { length: usize, required: usize },
}

/// Source of password material
pub trait PasswordGenerator: Send + Sync {
    /// # Errors
    ///
    /// When the spec's constraints cannot be met.
    fn generate(&self, spec: &PasswordSpec) -> Result<Zeroizing<String>, GeneratorError>;
}

/// Generator backed by the thread-local CSPRNG
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomPasswordGenerator;

impl PasswordGenerator for RandomPasswordGenerator {
    fn generate(&self, spec: &PasswordSpec) -> Result<Zeroizing<String>, GeneratorError> {
        let length = spec
            .length
            .filter(|l| *l > 0)
            .and_then(|l| usize::try_from(l).ok())
            .unwrap_or(DEFAULT_PASSWORD_LENGTH);

        let minimums = [
            (DIGITS, count(spec.digits)),
            (UPPERCASE, count(spec.uppercase_letters)),
            (LOWERCASE, count(spec.lowercase_letters)),
            (SYMBOLS, count(spec.symbols)),
        ];
        let required: usize = minimums.iter().map(|(_, n)| n).sum();
        if required > length {
            return Err(GeneratorError::TooShort { length, required });
        }

        // Symbols only fill the remainder when asked for
        let mut alphabet: Vec<u8> = [DIGITS, UPPERCASE, LOWERCASE].concat();
        if count(spec.symbols) > 0 {
            alphabet.extend_from_slice(SYMBOLS);
        }

        let mut rng = rand::thread_rng();
        let mut chars = Zeroizing::new(Vec::with_capacity(length));
        for (class, n) in minimums {
            for _ in 0..n {
                chars.push(class[rng.gen_range(0..class.len())]);
            }
        }
        while chars.len() < length {
            chars.push(alphabet[rng.gen_range(0..alphabet.len())]);
        }
        chars.shuffle(&mut rng);

        Ok(Zeroizing::new(chars.iter().map(|b| char::from(*b)).collect()))
    }
}

fn count(minimum: Option<u32>) -> usize {
    minimum
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or_default()
}
