use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use sha1::Sha1;

use crate::hex;
use crate::token::MAX_DIGITS;

/// Largest supported hexadecimal OTP width.
const MAX_HEX_DIGITS: usize = 8;

/// Generate an OTP per RFC 4226: HMAC-SHA1 over the big-endian counter,
/// dynamic truncation to a 31-bit value.
///
/// Returns the zero-padded decimal and lowercase hexadecimal forms; the
/// caller compares against whichever the user submitted.
pub fn hotp(key: &[u8], counter: u64, num_digits: u32) -> (String, String) {
    let mut mac =
        Hmac::<Sha1>::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(&counter.to_be_bytes());
    let hash = mac.finalize().into_bytes();

    let offset = (hash[19] & 0x0f) as usize;
    let value = u32::from_be_bytes([
        hash[offset] & 0x7f,
        hash[offset + 1],
        hash[offset + 2],
        hash[offset + 3],
    ]);

    let num_digits = num_digits.max(1);
    let decimal = if num_digits < MAX_DIGITS {
        format!(
            "{:0width$}",
            value % 10u32.pow(num_digits),
            width = num_digits as usize
        )
    } else {
        format!("{:0width$}", value, width = MAX_DIGITS as usize)
    };
    let nd = num_digits as usize;
    let hexadecimal = if nd < MAX_HEX_DIGITS {
        format!(
            "{:0width$x}",
            value & ((1u32 << (4 * nd)) - 1),
            width = nd
        )
    } else {
        format!("{value:08x}")
    };
    (decimal, hexadecimal)
}

/// Generate an OTP using the mOTP algorithm (<https://motp.sourceforge.net/>):
/// the first `num_digits` hex characters of MD5("<counter><hex key><pin>").
pub fn motp(key: &[u8], pin: &str, counter: u64, num_digits: u32) -> String {
    let input = format!("{}{}{}", counter, hex::encode(key), pin);
    let digest = Md5::digest(input.as_bytes());
    hex::encode_truncated(digest.as_slice(), num_digits as usize)
}
