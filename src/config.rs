use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_OFFSET: u32 = 4;
pub const DEFAULT_MAX_LINGER: u32 = 10 * 60;

#[derive(clap::Parser, Debug, Clone)]
pub struct Cli {
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
    /// Path of the one-time password users file.
    #[arg(long)]
    pub users_file: Option<PathBuf>,
    /// Maximum allowed offset from the expected counter value.
    #[arg(long)]
    pub max_offset: Option<u32>,
    /// Maximum time (in seconds) for which the same OTP may be reused.
    #[arg(long)]
    pub max_linger: Option<u32>,
    /// Print the digest-auth realm hash for the user instead of verifying an OTP.
    #[arg(long)]
    pub realm: Option<String>,
    pub username: String,
    pub otp: Option<String>,
}

/// Engine configuration. Unset fields fall back to the documented defaults
/// when read through the accessors.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub users_file: Option<PathBuf>,
    pub max_offset: Option<u32>,
    pub max_linger: Option<u32>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no users file configured")]
    NoUsersFile,
}

impl Config {
    pub fn new(users_file: impl Into<PathBuf>) -> Self {
        Config {
            users_file: Some(users_file.into()),
            max_offset: None,
            max_linger: None,
        }
    }

    pub fn users_file(&self) -> Result<&Path, ConfigError> {
        self.users_file.as_deref().ok_or(ConfigError::NoUsersFile)
    }

    pub fn max_offset(&self) -> i64 {
        i64::from(self.max_offset.unwrap_or(DEFAULT_MAX_OFFSET))
    }

    pub fn max_linger(&self) -> i64 {
        i64::from(self.max_linger.unwrap_or(DEFAULT_MAX_LINGER))
    }
}
