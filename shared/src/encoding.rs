//! Credential encoding
//!
//! Credentials never cross the wire in plain text: the client encodes both
//! username and secret, and the broker compares the encoded forms against a
//! file that was produced with the same encoder.
//!
//! Two schemes exist: a letter and digit rotation, and an MD5 digest. Each
//! has its own credential file, since the broker only ever compares encoded
//! values.

use md5::{Digest, Md5};
use std::fmt;
use std::str::FromStr;

/// Deterministic text encoding applied to credentials
pub trait CredentialEncoder: Send + Sync {
    fn encode(&self, text: &str) -> String;
}

impl<T: CredentialEncoder + ?Sized> CredentialEncoder for Box<T> {
    fn encode(&self, text: &str) -> String {
        (**self).encode(text)
    }
}

/// Which encoder a deployment uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialScheme {
    #[default]
    Shift,
    Md5,
}

impl CredentialScheme {
    pub fn encoder(self) -> Box<dyn CredentialEncoder> {
        match self {
            CredentialScheme::Shift => Box::new(ShiftEncoder::default()),
            CredentialScheme::Md5 => Box::new(Md5Encoder),
        }
    }

    /// Credential file the broker reads when none is given
    pub fn default_credentials_file(self) -> &'static str {
        match self {
            CredentialScheme::Shift => "member.txt",
            CredentialScheme::Md5 => "member_extra.txt",
        }
    }
}

impl fmt::Display for CredentialScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialScheme::Shift => write!(f, "shift"),
            CredentialScheme::Md5 => write!(f, "md5"),
        }
    }
}

impl FromStr for CredentialScheme {
    type Err = String;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "shift" => Ok(CredentialScheme::Shift),
            "md5" => Ok(CredentialScheme::Md5),
            other => Err(format!("unknown encoder {:?}, expected shift or md5", other)),
        }
    }
}

/// Rotates letters and digits by a fixed offset, leaving everything else
/// untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftEncoder {
    shift: u8,
}

impl ShiftEncoder {
    pub const fn new(shift: u8) -> Self {
        Self { shift }
    }
}

impl Default for ShiftEncoder {
    fn default() -> Self {
        Self::new(3)
    }
}

impl CredentialEncoder for ShiftEncoder {
    fn encode(&self, text: &str) -> String {
        text.chars()
            .map(|c| match c {
                'a'..='z' => rotate(c, b'a', 26, self.shift),
                'A'..='Z' => rotate(c, b'A', 26, self.shift),
                '0'..='9' => rotate(c, b'0', 10, self.shift),
                other => other,
            })
            .collect()
    }
}

/// MD5 digest written as `0x` followed by 32 lowercase hex digits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Md5Encoder;

impl CredentialEncoder for Md5Encoder {
    fn encode(&self, text: &str) -> String {
        format!("0x{:x}", Md5::digest(text.as_bytes()))
    }
}

fn rotate(c: char, base: u8, span: u8, shift: u8) -> char {
    let offset = (c as u8 - base + shift % span) % span;
    (base + offset) as char
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shift_wraps_within_each_class() {
        let encoder = ShiftEncoder::default();

        assert_eq!(encoder.encode("abc"), "def");
        assert_eq!(encoder.encode("xyz"), "abc");
        assert_eq!(encoder.encode("XYZ"), "ABC");
        assert_eq!(encoder.encode("789"), "012");
        assert_eq!(encoder.encode("a-b_c!"), "d-e_f!");
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let encoder = ShiftEncoder::default();
        assert_eq!(encoder.encode("James2024"), encoder.encode("James2024"));
        assert_eq!(encoder.encode(""), "");
    }

    #[test]
    fn test_custom_shift() {
        assert_eq!(ShiftEncoder::new(1).encode("az9"), "ba0");
        assert_eq!(ShiftEncoder::new(0).encode("same"), "same");
    }

    #[test]
    fn test_md5_known_digests() {
        let encoder = Md5Encoder;

        assert_eq!(encoder.encode(""), "0xd41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(encoder.encode("abc"), "0x900150983cd24fb0d6963f7d28e17f72");
        assert_eq!(encoder.encode("abc").len(), 34);
    }

    #[test]
    fn test_scheme_selection() {
        assert_eq!("md5".parse::<CredentialScheme>(), Ok(CredentialScheme::Md5));
        assert_eq!("shift".parse::<CredentialScheme>(), Ok(CredentialScheme::Shift));
        assert!("rot13".parse::<CredentialScheme>().is_err());
        assert_eq!(CredentialScheme::default().to_string(), "shift");

        assert_eq!(CredentialScheme::Shift.encoder().encode("abc"), "def");
        assert_eq!(
            CredentialScheme::Md5.encoder().encode("abc"),
            Md5Encoder.encode("abc")
        );
        assert_eq!(CredentialScheme::Md5.default_credentials_file(), "member_extra.txt");
        assert_eq!(CredentialScheme::Shift.default_credentials_file(), "member.txt");
    }
}
