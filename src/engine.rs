use std::path::Path;

use chrono::{DateTime, Duration, Local};
use md5::{Digest, Md5};

use crate::config::Config;
use crate::error::Result;
use crate::hex;
use crate::otp;
use crate::store::{self, UserRecord};
use crate::token::Algorithm;

/// PIN column value that delegates verification to a [`PinValidator`].
pub const PIN_DELEGATE: &str = "+";

/// Externally supplied PIN check, used when a record's PIN field is `+`.
pub trait PinValidator {
    fn validate(&self, username: &str, pin: &str) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Granted,
    Denied,
    UserNotFound,
}

pub fn check_password(
    config: &Config,
    pin_validator: Option<&dyn PinValidator>,
    username: &str,
    otp_given: &str,
) -> Result<Decision> {
    check_password_at(config, pin_validator, username, otp_given, Local::now())
}

/// Verify a submitted OTP against the user's stored state, using `now` as
/// the clock.
///
/// On success the matched counter state is persisted before returning; a
/// persistence failure is logged but the authentication itself still
/// succeeds for this request.
pub fn check_password_at(
    config: &Config,
    pin_validator: Option<&dyn PinValidator>,
    username: &str,
    otp_given: &str,
    now: DateTime<Local>,
) -> Result<Decision> {
    let users_file = config.users_file()?;
    let mut user = match store::lookup(users_file, username)? {
        Some(user) => user,
        None => {
            tracing::info!(user = username, file = %users_file.display(), "user not found in users file");
            return Ok(Decision::UserNotFound);
        }
    };

    // The PIN prefixes the OTP for everything except MOTP, which folds the
    // PIN into its hash input instead.
    let mut otp_given = otp_given;
    if user.token.algorithm != Algorithm::Motp {
        if user.pin == PIN_DELEGATE {
            let digits = user.token.num_digits as usize;
            if otp_given.len() < digits {
                tracing::info!(user = username, "submitted secret shorter than the OTP length");
                return Ok(Decision::Denied);
            }
            let split = otp_given.len() - digits;
            if !otp_given.is_char_boundary(split) {
                tracing::info!(user = username, "submitted secret does not end in an OTP");
                return Ok(Decision::Denied);
            }
            let (pin, rest) = otp_given.split_at(split);
            match pin_validator {
                Some(v) if v.validate(username, pin) => otp_given = rest,
                Some(_) => {
                    tracing::info!(user = username, "PIN rejected by external validator");
                    return Ok(Decision::Denied);
                }
                None => {
                    tracing::warn!(
                        user = username,
                        "record delegates PIN verification but no validator is configured"
                    );
                    return Ok(Decision::Denied);
                }
            }
        } else if let Some(rest) = otp_given.strip_prefix(user.pin.as_str()) {
            otp_given = rest;
        } else {
            tracing::info!(user = username, "PIN does not match");
            return Ok(Decision::Denied);
        }
    }

    if otp_given.len() != user.token.num_digits as usize {
        tracing::info!(
            user = username,
            got = otp_given.len(),
            want = user.token.num_digits,
            "OTP has the wrong length"
        );
        return Ok(Decision::Denied);
    }

    // Reuse of the previously accepted OTP is allowed inside the linger
    // window, without advancing any state. Past the window the stale OTP is
    // never accepted again.
    let max_linger = config.max_linger();
    if !user.last_otp.is_empty() && otp_given == user.last_otp {
        if within_linger(&user, now, max_linger) {
            tracing::info!(
                user = username,
                linger = max_linger,
                "accepting reuse of OTP within linger time"
            );
            return Ok(Decision::Granted);
        }
        tracing::info!(
            user = username,
            linger = max_linger,
            "previous OTP has expired"
        );
        return Ok(Decision::Denied);
    }

    // Expected counter first, then the drift window around it. Event
    // counters only ever advance, so their window is forward-only.
    let base = expected_counter(&user, now);
    let max_offset = config.max_offset();
    let (start, stop) = if user.token.time_interval == 0 {
        (1, max_offset)
    } else {
        (-max_offset, max_offset)
    };
    let adjusts = std::iter::once(0).chain((start..=stop).filter(|&a| a != 0));

    let mut matched = None;
    for adjust in adjusts {
        let counter = base.saturating_add(adjust);
        if code_matches(&user, otp_given, counter) {
            matched = Some((counter, adjust));
            break;
        }
    }
    let (counter, adjust) = match matched {
        Some(m) => m,
        None => {
            tracing::info!(user = username, "wrong OTP");
            return Ok(Decision::Denied);
        }
    };
    tracing::info!(user = username, counter, adjust, "accepting OTP");

    // Advance the stored state so the match cannot replay outside the
    // linger window. Event tokens jump past the matched counter; time
    // tokens absorb the drift into their slew.
    user.offset = if user.token.time_interval == 0 {
        counter.saturating_add(1)
    } else {
        user.offset.saturating_add(adjust)
    };
    user.last_otp = otp_given.to_string();
    user.last_auth = Some(now.naive_local());
    persist(users_file, &user);

    Ok(Decision::Granted)
}

pub fn get_realm_hash(config: &Config, username: &str, realm: &str) -> Result<Option<String>> {
    get_realm_hash_at(config, username, realm, Local::now())
}

/// Digest-auth support: predict the user's current OTP and return the
/// lowercase hex MD5 of `"<username>:<realm>:<pin><otp>"` (the PIN is not
/// included for MOTP). Returns `Ok(None)` when the user is unknown.
///
/// No submitted OTP is available in this mode, so there is no window
/// search: inside the linger window the previous OTP is assumed, otherwise
/// the code at the expected counter is predicted (decimal form for HOTP)
/// and the counter state advanced as if it had been used.
pub fn get_realm_hash_at(
    config: &Config,
    username: &str,
    realm: &str,
    now: DateTime<Local>,
) -> Result<Option<String>> {
    let users_file = config.users_file()?;
    let mut user = match store::lookup(users_file, username)? {
        Some(user) => user,
        None => {
            tracing::info!(user = username, file = %users_file.display(), "user not found in users file");
            return Ok(None);
        }
    };

    let max_linger = config.max_linger();
    let counter = expected_counter(&user, now);
    let linger = !user.last_otp.is_empty() && within_linger(&user, now, max_linger);
    let otp_value = if linger {
        tracing::info!(
            user = username,
            linger = max_linger,
            "generating digest hash assuming reuse of OTP within linger time"
        );
        user.last_otp.clone()
    } else {
        if user.last_auth.is_some() && !user.last_otp.is_empty() {
            tracing::info!(
                user = username,
                linger = max_linger,
                "not using previous expired OTP"
            );
        }
        tracing::info!(
            user = username,
            counter,
            "generating digest hash assuming expected OTP counter"
        );
        match user.token.algorithm {
            Algorithm::Motp => otp::motp(&user.key, &user.pin, counter as u64, user.token.num_digits),
            // The hash commits to exactly one form; assume decimal.
            Algorithm::Hotp => otp::hotp(&user.key, counter as u64, user.token.num_digits).0,
        }
    };

    let pin = match user.token.algorithm {
        Algorithm::Motp => "",
        _ => user.pin.as_str(),
    };
    let digest = Md5::digest(format!("{username}:{realm}:{pin}{otp_value}"));
    let hash = hex::encode(digest.as_slice());

    // Past the linger window, assume the predicted OTP gets used and
    // advance the stored state accordingly.
    if !linger {
        if user.token.time_interval == 0 {
            user.offset = counter.saturating_add(1);
        }
        user.last_otp = otp_value;
        user.last_auth = Some(now.naive_local());
        persist(users_file, &user);
    }

    Ok(Some(hash))
}

fn within_linger(user: &UserRecord, now: DateTime<Local>, max_linger: i64) -> bool {
    let last_auth = match user.last_auth {
        Some(t) => t,
        None => return false,
    };
    let now = now.naive_local();
    now >= last_auth && now < last_auth + Duration::seconds(max_linger)
}

fn expected_counter(user: &UserRecord, now: DateTime<Local>) -> i64 {
    if user.token.time_interval == 0 {
        user.offset
    } else {
        (now.timestamp() / i64::from(user.token.time_interval)).saturating_add(user.offset)
    }
}

/// Decimal codes compare byte-exact, hexadecimal codes case-insensitively.
fn code_matches(user: &UserRecord, otp_given: &str, counter: i64) -> bool {
    match user.token.algorithm {
        Algorithm::Motp => {
            let code = otp::motp(&user.key, &user.pin, counter as u64, user.token.num_digits);
            otp_given.eq_ignore_ascii_case(&code)
        }
        Algorithm::Hotp => {
            let (decimal, hexadecimal) =
                otp::hotp(&user.key, counter as u64, user.token.num_digits);
            otp_given == decimal || otp_given.eq_ignore_ascii_case(&hexadecimal)
        }
    }
}

fn persist(users_file: &Path, user: &UserRecord) {
    match store::update(users_file, user) {
        Ok(true) => {}
        Ok(false) => tracing::warn!(
            user = %user.username,
            file = %users_file.display(),
            "user disappeared from users file during update"
        ),
        Err(e) => tracing::warn!(
            user = %user.username,
            file = %users_file.display(),
            error = %e,
            "failed to persist OTP state"
        ),
    }
}
