use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::{DecodeError, Engine as _};
use mailparse::MailHeaderMap;

/// base64url as the API emits it; padding is accepted but not required.
const URL_SAFE_ANY_PAD: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode a `format=raw` payload into the RFC 822 bytes.
pub fn decode_raw(encoded: &str) -> Result<Vec<u8>, DecodeError> {
    URL_SAFE_ANY_PAD.decode(encoded)
}

/// Subject header of a raw message, RFC 2047 decoded.
pub fn subject_of(raw_rfc822: &[u8]) -> Option<String> {
    let (headers, _) = mailparse::parse_headers(raw_rfc822).ok()?;
    headers
        .get_first_value("Subject")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
