/// Decode a hexadecimal string into raw bytes.
///
/// Case-insensitive; requires a non-empty, even-length input.
pub fn decode(s: &str) -> Option<Vec<u8>> {
    if s.is_empty() || s.len() % 2 != 0 {
        return None;
    }
    let mut out = Vec::with_capacity(s.len() / 2);
    for pair in s.as_bytes().chunks(2) {
        let hi = (pair[0] as char).to_digit(16)?;
        let lo = (pair[1] as char).to_digit(16)?;
        out.push(((hi << 4) | lo) as u8);
    }
    Some(out)
}

pub fn encode(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect()
}

/// First `max_digits` lowercase hex characters of `data` (nibble-wise truncation).
pub fn encode_truncated(data: &[u8], max_digits: usize) -> String {
    let mut s = encode(data);
    s.truncate(max_digits);
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_round_trips() {
        let bytes = decode("0123456789abcdef").unwrap();
        assert_eq!(bytes, vec![0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef]);
        assert_eq!(encode(&bytes), "0123456789abcdef");
    }

    #[test]
    fn decode_is_case_insensitive() {
        assert_eq!(decode("DEADbeef"), decode("deadbeef"));
    }

    #[test]
    fn decode_rejects_bad_input() {
        assert!(decode("").is_none());
        assert!(decode("abc").is_none());
        assert!(decode("zz").is_none());
    }

    #[test]
    fn truncation_takes_leading_nibbles() {
        let digest = [0x96, 0xb3, 0xbe, 0x79];
        assert_eq!(encode_truncated(&digest, 6), "96b3be");
        assert_eq!(encode_truncated(&digest, 100), "96b3be79");
    }
}
