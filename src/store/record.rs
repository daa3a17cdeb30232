use std::fmt;

use chrono::NaiveDateTime;

use crate::hex;
use crate::token::{TokenType, TokenTypeError};

/// Layout of the last-auth column, local wall-clock time.
pub const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SL";

// Field size limits. Over-long fields are rejected rather than truncated.
pub const MAX_USERNAME_LEN: usize = 128;
pub const MAX_PIN_LEN: usize = 128;
pub const MAX_KEY_LEN: usize = 256;
pub const MAX_OTP_LEN: usize = 128;

/// One credential's full state, serialized as a single line of the users file:
///
/// ```text
/// <descriptor> <username> <pin-or-dash> <hex-key> [<offset> [<last-otp> <timestamp>]]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub token: TokenType,
    pub username: String,
    /// Empty when no PIN is required; `+` delegates PIN checks to an
    /// external validator.
    pub pin: String,
    pub key: Vec<u8>,
    /// Event tokens: next expected counter. Time tokens: slew added to the
    /// time-derived counter.
    pub offset: i64,
    /// Most recently accepted OTP, in whichever form the user submitted it.
    /// Empty until the first successful authentication.
    pub last_otp: String,
    /// Local time of the last successful authentication.
    pub last_auth: Option<NaiveDateTime>,
}

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("invalid token type: {0}")]
    TokenType(#[from] TokenTypeError),
    #[error("missing {0} field")]
    MissingField(&'static str),
    #[error("{0} field exceeds {1} characters")]
    FieldTooLong(&'static str, usize),
    #[error("invalid key \"{0}\"")]
    InvalidKey(String),
    #[error("invalid offset \"{0}\"")]
    InvalidOffset(String),
    #[error("invalid auth timestamp \"{0}\"")]
    InvalidTimestamp(String),
}

/// One classified line of the users file.
pub enum Line<'a> {
    /// Blank or comment line, preserved verbatim by rewrites.
    Passthrough,
    /// A credential entry: valid descriptor plus username, remaining fields
    /// unparsed. Rewrites match entries on the username alone.
    Entry { token: TokenType, username: &'a str },
    /// A line that cannot be a valid entry. Skipped by lookups, still
    /// preserved verbatim by rewrites.
    Invalid(RecordError),
}

pub fn classify(line: &str) -> Line<'_> {
    let trimmed = line.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Line::Passthrough;
    }
    let mut fields = line.split_whitespace();
    let descriptor = match fields.next() {
        Some(d) => d,
        None => return Line::Passthrough,
    };
    let token = match descriptor.parse::<TokenType>() {
        Ok(t) => t,
        Err(e) => return Line::Invalid(e.into()),
    };
    match fields.next() {
        Some(username) => Line::Entry { token, username },
        None => Line::Invalid(RecordError::MissingField("username")),
    }
}

impl UserRecord {
    /// Parse one users-file line. Returns `Ok(None)` for blank and comment
    /// lines, `Err` for anything else that is not a well-formed entry.
    pub fn parse_line(line: &str) -> Result<Option<UserRecord>, RecordError> {
        let (token, username) = match classify(line) {
            Line::Passthrough => return Ok(None),
            Line::Invalid(e) => return Err(e),
            Line::Entry { token, username } => (token, username),
        };
        if username.len() > MAX_USERNAME_LEN {
            return Err(RecordError::FieldTooLong("username", MAX_USERNAME_LEN));
        }

        let mut fields = line.split_whitespace().skip(2);

        let pin = fields.next().ok_or(RecordError::MissingField("PIN"))?;
        if pin.len() > MAX_PIN_LEN {
            return Err(RecordError::FieldTooLong("PIN", MAX_PIN_LEN));
        }
        let pin = if pin == "-" { String::new() } else { pin.to_string() };

        let key_hex = fields.next().ok_or(RecordError::MissingField("token key"))?;
        if key_hex.len() > MAX_KEY_LEN * 2 {
            return Err(RecordError::FieldTooLong("token key", MAX_KEY_LEN * 2));
        }
        let key = hex::decode(key_hex).ok_or_else(|| RecordError::InvalidKey(key_hex.to_string()))?;

        let mut record = UserRecord {
            token,
            username: username.to_string(),
            pin,
            key,
            offset: 0,
            last_otp: String::new(),
            last_auth: None,
        };

        let offset = match fields.next() {
            None => return Ok(Some(record)),
            Some(s) => s,
        };
        record.offset = offset
            .parse()
            .map_err(|_| RecordError::InvalidOffset(offset.to_string()))?;

        let last_otp = match fields.next() {
            None => return Ok(Some(record)),
            Some(s) => s,
        };
        if last_otp.len() > MAX_OTP_LEN {
            return Err(RecordError::FieldTooLong("last OTP", MAX_OTP_LEN));
        }
        let stamp = fields
            .next()
            .ok_or(RecordError::MissingField("last auth timestamp"))?;
        let last_auth = NaiveDateTime::parse_from_str(stamp, TIME_FORMAT)
            .map_err(|_| RecordError::InvalidTimestamp(stamp.to_string()))?;

        record.last_otp = last_otp.to_string();
        record.last_auth = Some(last_auth);
        Ok(Some(record))
    }
}

impl fmt::Display for UserRecord {
    /// Render the record as fixed-width users-file columns (no trailing
    /// newline). Default-valued descriptors are abbreviated; an empty PIN
    /// renders as `-`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pin = if self.pin.is_empty() { "-" } else { self.pin.as_str() };
        write!(
            f,
            "{:<7} {:<13} {:<7} {} {:<7}",
            self.token.to_string(),
            self.username,
            pin,
            hex::encode(&self.key),
            self.offset
        )?;
        if !self.last_otp.is_empty() {
            if let Some(at) = self.last_auth {
                write!(f, " {:<7} {}", self.last_otp, at.format(TIME_FORMAT))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Algorithm;
    use chrono::NaiveDate;

    #[test]
    fn parse_minimal_entry() {
        let record = UserRecord::parse_line("HOTP fred - 0123456789abcdef")
            .unwrap()
            .unwrap();
        assert_eq!(record.token.algorithm, Algorithm::Hotp);
        assert_eq!(record.username, "fred");
        assert_eq!(record.pin, "");
        assert_eq!(record.key, hex::decode("0123456789abcdef").unwrap());
        assert_eq!(record.offset, 0);
        assert_eq!(record.last_otp, "");
        assert_eq!(record.last_auth, None);
    }

    #[test]
    fn parse_full_entry() {
        let line = "HOTP/T30 barney  1234  00112233445566778899aabbccddeeff -2 518333 2009-06-12T12:34:56L";
        let record = UserRecord::parse_line(line).unwrap().unwrap();
        assert_eq!(record.token.time_interval, 30);
        assert_eq!(record.pin, "1234");
        assert_eq!(record.offset, -2);
        assert_eq!(record.last_otp, "518333");
        assert_eq!(
            record.last_auth,
            NaiveDate::from_ymd_opt(2009, 6, 12)
                .unwrap()
                .and_hms_opt(12, 34, 56)
        );
    }

    #[test]
    fn comments_and_blanks_pass_through() {
        assert!(UserRecord::parse_line("").unwrap().is_none());
        assert!(UserRecord::parse_line("   \n").unwrap().is_none());
        assert!(UserRecord::parse_line("# a comment").unwrap().is_none());
        assert!(UserRecord::parse_line("   # indented comment").unwrap().is_none());
    }

    #[test]
    fn malformed_entries_are_errors() {
        assert!(matches!(
            UserRecord::parse_line("BOGUS fred - 00ff"),
            Err(RecordError::TokenType(_))
        ));
        assert!(matches!(
            UserRecord::parse_line("HOTP fred"),
            Err(RecordError::MissingField("PIN"))
        ));
        assert!(matches!(
            UserRecord::parse_line("HOTP fred - 00f"),
            Err(RecordError::InvalidKey(_))
        ));
        assert!(matches!(
            UserRecord::parse_line("HOTP fred - 00ff ten"),
            Err(RecordError::InvalidOffset(_))
        ));
        assert!(matches!(
            UserRecord::parse_line("HOTP fred - 00ff 10 518333"),
            Err(RecordError::MissingField("last auth timestamp"))
        ));
        assert!(matches!(
            UserRecord::parse_line("HOTP fred - 00ff 10 518333 yesterday"),
            Err(RecordError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn over_long_fields_are_rejected() {
        let long_user = "u".repeat(MAX_USERNAME_LEN + 1);
        assert!(matches!(
            UserRecord::parse_line(&format!("HOTP {long_user} - 00ff")),
            Err(RecordError::FieldTooLong("username", _))
        ));
        let long_key = "ab".repeat(MAX_KEY_LEN + 1);
        assert!(matches!(
            UserRecord::parse_line(&format!("HOTP fred - {long_key}")),
            Err(RecordError::FieldTooLong("token key", _))
        ));
    }

    #[test]
    fn serialization_layout() {
        let mut record = UserRecord {
            token: "HOTP".parse().unwrap(),
            username: "fred".into(),
            pin: "1234".into(),
            key: hex::decode("0123456789abcdef0123456789abcdef").unwrap(),
            offset: 14,
            last_otp: String::new(),
            last_auth: None,
        };
        assert_eq!(
            record.to_string(),
            "HOTP    fred          1234    0123456789abcdef0123456789abcdef 14     "
        );

        record.last_otp = "787372".into();
        record.last_auth = NaiveDate::from_ymd_opt(2023, 11, 14)
            .unwrap()
            .and_hms_opt(22, 13, 20);
        assert_eq!(
            record.to_string(),
            "HOTP    fred          1234    0123456789abcdef0123456789abcdef 14      787372  2023-11-14T22:13:20L"
        );
    }

    #[test]
    fn serialization_round_trips() {
        let line = "MOTP/T10/8 mary - 0123456789abcdef 3 96b3be79 2023-11-14T22:13:20L";
        let record = UserRecord::parse_line(line).unwrap().unwrap();
        let reparsed = UserRecord::parse_line(&record.to_string()).unwrap().unwrap();
        assert_eq!(record, reparsed);
    }
}
