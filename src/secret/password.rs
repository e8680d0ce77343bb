//! # Password Generation
//!
//! New credential material is drawn uniformly from letters, digits and a
//! small symbol set using the operating system CSPRNG.

use crate::constants::{
    DEFAULT_PASSWORD_LENGTH, MAX_PASSWORD_LENGTH, MIN_PASSWORD_LENGTH, PASSWORD_SYMBOLS,
};
use rand::rngs::OsRng;
use rand::Rng;
use zeroize::Zeroizing;

const LETTERS_AND_DIGITS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Generates fixed-length passwords
#[derive(Debug, Clone)]
pub struct PasswordGenerator {
    length: usize,
    alphabet: Vec<char>,
}

impl Default for PasswordGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_PASSWORD_LENGTH)
    }
}

impl PasswordGenerator {
    /// Create a generator; `length` is clamped to the supported range
    #[must_use]
    pub fn new(length: usize) -> Self {
        Self {
            length: length.clamp(MIN_PASSWORD_LENGTH, MAX_PASSWORD_LENGTH),
            alphabet: LETTERS_AND_DIGITS
                .chars()
                .chain(PASSWORD_SYMBOLS.chars())
                .collect(),
        }
    }

    #[must_use]
    pub fn length(&self) -> usize {
        self.length
    }

    /// Characters a generated password may contain
    #[must_use]
    pub fn alphabet(&self) -> &[char] {
        &self.alphabet
    }

    #[must_use]
    pub fn generate(&self) -> Zeroizing<String> {
        let mut rng = OsRng;
        let password = (0..self.length)
            .map(|_| self.alphabet[rng.gen_range(0..self.alphabet.len())])
            .collect();
        Zeroizing::new(password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_length_is_24() {
        let password = PasswordGenerator::default().generate();
        assert_eq!(password.chars().count(), 24);
    }

    #[test]
    fn test_length_is_clamped() {
        assert_eq!(PasswordGenerator::new(8).length(), MIN_PASSWORD_LENGTH);
        assert_eq!(PasswordGenerator::new(4096).length(), MAX_PASSWORD_LENGTH);
        assert_eq!(PasswordGenerator::new(32).generate().len(), 32);
    }

    #[test]
    fn test_only_alphabet_characters_are_used() {
        let generator = PasswordGenerator::new(64);
        for _ in 0..50 {
            let password = generator.generate();
            assert!(password.chars().all(|c| generator.alphabet().contains(&c)));
            assert!(!password.contains('\''));
            assert!(!password.contains('\\'));
        }
    }

    #[test]
    fn test_all_character_classes_appear() {
        let generator = PasswordGenerator::new(MAX_PASSWORD_LENGTH);
        let sample: String = (0..20).map(|_| generator.generate().to_string()).collect();

        assert!(sample.chars().any(|c| c.is_ascii_uppercase()));
        assert!(sample.chars().any(|c| c.is_ascii_lowercase()));
        assert!(sample.chars().any(|c| c.is_ascii_digit()));
        assert!(sample.chars().any(|c| PASSWORD_SYMBOLS.contains(c)));
    }

    #[test]
    fn test_passwords_differ() {
        let generator = PasswordGenerator::default();
        assert_ne!(*generator.generate(), *generator.generate());
    }
}
