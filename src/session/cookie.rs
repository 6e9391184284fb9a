//! Minimal `Cookie` header parsing, enough to pull the session id out of a
//! WebSocket upgrade request.

use percent_encoding::percent_decode_str;

/// Name of the cookie the session middleware sets by default.
pub const DEFAULT_COOKIE_NAME: &str = "connect.sid";

/// Find the value of cookie `name` in a raw `Cookie` header.
///
/// Surrounding double quotes are stripped and the value is percent-decoded
/// (`s%3Aabc` becomes `s:abc`); a value that does not decode to UTF-8 is kept
/// as sent. An empty value counts as absent.
pub fn session_id(header: &str, name: &str) -> Option<String> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| decode(value.trim().trim_matches('"')))
        .filter(|value| !value.is_empty())
}

fn decode(value: &str) -> String {
    match percent_decode_str(value).decode_utf8() {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => value.to_string(),
    }
}
