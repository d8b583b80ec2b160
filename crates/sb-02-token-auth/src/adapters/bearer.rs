//! Bearer token extraction.

use shared_types::{header_names, MessageHeaders, BEARER_PREFIX};

/// Token carried in `headers`, if any.
///
/// `Authorization` wins over `X-Auth-Token`. A leading `Bearer ` scheme is
/// stripped; a raw value without the scheme is accepted as is. Blank values
/// count as absent.
pub fn extract_bearer_token(headers: &MessageHeaders) -> Option<&str> {
    let from_authorization = headers.get(header_names::AUTHORIZATION).map(|value| {
        let value = value.trim_start();
        match value.get(..BEARER_PREFIX.len()) {
            Some(scheme) if scheme.eq_ignore_ascii_case(BEARER_PREFIX) => {
                value[BEARER_PREFIX.len()..].trim()
            }
            _ => value.trim(),
        }
    });

    from_authorization
        .filter(|t| !t.is_empty())
        .or_else(|| {
            headers
                .get(header_names::AUTH_TOKEN)
                .map(str::trim)
                .filter(|t| !t.is_empty())
        })
}
