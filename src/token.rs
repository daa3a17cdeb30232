use std::fmt;
use std::str::FromStr;

pub const DEFAULT_NUM_DIGITS: u32 = 6;
pub const MOTP_TIME_INTERVAL: u32 = 10;
/// Largest supported decimal OTP width.
pub const MAX_DIGITS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Hotp,
    Motp,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::Hotp => f.write_str("HOTP"),
            Algorithm::Motp => f.write_str("MOTP"),
        }
    }
}

/// A parsed token descriptor such as `HOTP/T30/6`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenType {
    pub algorithm: Algorithm,
    /// Seconds per counter step, or zero for event-based tokens.
    pub time_interval: u32,
    pub num_digits: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenTypeError {
    #[error("unknown algorithm \"{0}\"")]
    UnknownAlgorithm(String),
    #[error("invalid counter spec \"{0}\"")]
    InvalidCounter(String),
    #[error("invalid digit count \"{0}\"")]
    InvalidDigits(String),
}

fn parse_number(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

impl FromStr for TokenType {
    type Err = TokenTypeError;

    /// Parse `ALG[/COUNTER[/DIGITS]]`. Omitted segments take per-algorithm
    /// defaults; extra trailing segments are ignored.
    fn from_str(s: &str) -> Result<Self, TokenTypeError> {
        // Legacy bare-token aliases predate the full grammar.
        let s = match s {
            "E" => "HOTP/E",
            "T" => "HOTP/T30",
            other => other,
        };

        let mut parts = s.split('/');
        let alg = parts.next().unwrap_or("");
        let mut token = if alg.eq_ignore_ascii_case("HOTP") {
            TokenType {
                algorithm: Algorithm::Hotp,
                time_interval: 0,
                num_digits: DEFAULT_NUM_DIGITS,
            }
        } else if alg.eq_ignore_ascii_case("MOTP") {
            TokenType {
                algorithm: Algorithm::Motp,
                time_interval: MOTP_TIME_INTERVAL,
                num_digits: DEFAULT_NUM_DIGITS,
            }
        } else {
            return Err(TokenTypeError::UnknownAlgorithm(alg.to_string()));
        };

        let counter = match parts.next() {
            None => return Ok(token),
            Some(c) => c,
        };
        if counter == "E" {
            token.time_interval = 0;
        } else if let Some(secs) = counter.strip_prefix('T') {
            token.time_interval = match parse_number(secs) {
                Some(n) if n > 0 => n,
                _ => return Err(TokenTypeError::InvalidCounter(counter.to_string())),
            };
        } else {
            return Err(TokenTypeError::InvalidCounter(counter.to_string()));
        }

        let digits = match parts.next() {
            None => return Ok(token),
            Some(d) => d,
        };
        token.num_digits = match parse_number(digits) {
            Some(n) if (1..=MAX_DIGITS).contains(&n) => n,
            _ => return Err(TokenTypeError::InvalidDigits(digits.to_string())),
        };

        Ok(token)
    }
}

impl fmt::Display for TokenType {
    /// Render the descriptor, abbreviating when default values apply:
    /// `HOTP` event 6-digit and `MOTP` T10 6-digit both print as the bare
    /// algorithm name.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let default_interval = match self.algorithm {
            Algorithm::Hotp => 0,
            Algorithm::Motp => MOTP_TIME_INTERVAL,
        };
        write!(f, "{}", self.algorithm)?;
        if self.num_digits == DEFAULT_NUM_DIGITS && self.time_interval == default_interval {
            return Ok(());
        }
        if self.time_interval == 0 {
            f.write_str("/E")?;
        } else {
            write!(f, "/T{}", self.time_interval)?;
        }
        if self.num_digits != DEFAULT_NUM_DIGITS {
            write!(f, "/{}", self.num_digits)?;
        }
        Ok(())
    }
}
