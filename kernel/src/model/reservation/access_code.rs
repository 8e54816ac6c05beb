use rand::Rng;
use serde::{Deserialize, Serialize};
use shared::error::{AppError, AppResult};

/// Join code shared verbally with additional players. Four characters in the
/// `AABB` shape built from two digits, so only 100 values exist. It is a
/// convenience handle for short-lived sessions, not a security token; the
/// orchestration layer is responsible for keeping codes unique among the
/// currently active sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessCode(String);

/// Where the two digits of a code come from. Production draws them from the
/// process RNG; tests script the sequence to assert on exact codes.
pub trait DigitSource: Send {
    fn next_digit(&mut self) -> u8;
}

/// `DigitSource` backed by the thread-local RNG.
#[derive(Debug, Default)]
pub struct RandomDigits;

impl DigitSource for RandomDigits {
    fn next_digit(&mut self) -> u8 {
        rand::rng().random_range(0..=9)
    }
}

impl AccessCode {
    pub fn generate(digits: &mut dyn DigitSource) -> Self {
        let a = digits.next_digit() % 10;
        let b = digits.next_digit() % 10;
        Self(format!("{a}{a}{b}{b}"))
    }

    pub fn parse(value: &str) -> AppResult<Self> {
        let bytes = value.as_bytes();
        let well_formed = bytes.len() == 4
            && bytes.iter().all(u8::is_ascii_digit)
            && bytes[0] == bytes[1]
            && bytes[2] == bytes[3];
        if !well_formed {
            return Err(AppError::UnprocessableEntity(format!(
                "malformed access code: {value:?}"
            )));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccessCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Scripted digit source for deterministic codes in tests.
    pub(crate) struct FixedDigits(pub Vec<u8>);

    impl DigitSource for FixedDigits {
        fn next_digit(&mut self) -> u8 {
            self.0.remove(0)
        }
    }

    #[test]
    fn generated_codes_have_paired_digits() {
        let mut digits = RandomDigits;
        for _ in 0..100 {
            let code = AccessCode::generate(&mut digits);
            let bytes = code.as_str().as_bytes();
            assert_eq!(bytes.len(), 4);
            assert!(bytes.iter().all(u8::is_ascii_digit));
            assert_eq!(bytes[0], bytes[1]);
            assert_eq!(bytes[2], bytes[3]);
        }
    }

    #[test]
    fn scripted_digits_produce_the_expected_code() {
        let mut digits = FixedDigits(vec![1, 3]);
        assert_eq!(AccessCode::generate(&mut digits).as_str(), "1133");
    }

    #[test]
    fn parse_accepts_paired_digit_codes_only() {
        assert!(AccessCode::parse("7711").is_ok());
        assert!(AccessCode::parse("7712").is_err());
        assert!(AccessCode::parse("771").is_err());
        assert!(AccessCode::parse("77111").is_err());
        assert!(AccessCode::parse("aabb").is_err());
    }
}
