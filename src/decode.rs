//! Lenient base64 decoding for message content.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, NO_PAD};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;

const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    NO_PAD
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::RequireNone),
);

/// Decode standard or URL-safe base64 as found in mail bodies.
///
/// Line breaks and other whitespace are skipped, padding is optional, and a dangling final
/// character (as left by a truncated excerpt) is dropped. Returns `None` if the remaining input
/// is not base64.
pub fn base64(data: &str) -> Option<Vec<u8>> {
    let mut normalized: String = data
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '=')
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            c => c,
        })
        .collect();

    if normalized.len() % 4 == 1 {
        normalized.pop();
    }

    LENIENT.decode(normalized).ok()
}

/// Decode base64 text into a string, replacing invalid UTF-8 sequences.
pub fn base64_text(data: &str) -> Option<String> {
    base64(data).map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}
