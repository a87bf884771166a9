//! Conversion between URL paths and store keys.
//!
//! Keys hold decoded text (`pool/a b.txt`); URLs carry the encoded form.

use crate::{Error, Result};
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};

/// Bytes escaped inside one path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Percent-decode a request path. Invalid UTF-8 is not-found.
pub fn decode_path(raw: &str) -> Result<String> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|path| path.into_owned())
        .map_err(|_| Error::NotFound(format!("path is not UTF-8: {}", raw)))
}

/// Percent-encode a decoded path, segment by segment, keeping `/`.
pub fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_path() {
        assert_eq!(decode_path("/pool/a%20b.txt").unwrap(), "/pool/a b.txt");
        assert_eq!(decode_path("/a/%2e%2e/x").unwrap(), "/a/../x");
        assert_eq!(decode_path("/caf%C3%A9").unwrap(), "/café");
        assert!(decode_path("/bad%ff").unwrap_err().is_not_found());
    }

    #[test]
    fn test_encode_path() {
        assert_eq!(encode_path("/pool/a b.txt"), "/pool/a%20b.txt");
        assert_eq!(encode_path("example.com/100%/x?y"), "example.com/100%25/x%3Fy");
        assert_eq!(encode_path("/café"), "/caf%C3%A9");
        assert_eq!(encode_path("/plain-name_1.0~rc.tar"), "/plain-name_1.0~rc.tar");
    }
}
