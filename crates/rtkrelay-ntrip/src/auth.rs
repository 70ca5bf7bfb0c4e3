use std::fmt;

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Standard base64 with `=` padding.
pub fn base64_encode(input: &[u8]) -> String {
    let mut out = String::with_capacity(input.len().div_ceil(3) * 4);
    for chunk in input.chunks(3) {
        let b0 = chunk[0] as u32;
        let b1 = chunk.get(1).copied().unwrap_or(0) as u32;
        let b2 = chunk.get(2).copied().unwrap_or(0) as u32;
        let triple = (b0 << 16) | (b1 << 8) | b2;

        out.push(ALPHABET[(triple >> 18) as usize & 0x3F] as char);
        out.push(ALPHABET[(triple >> 12) as usize & 0x3F] as char);
        if chunk.len() > 1 {
            out.push(ALPHABET[(triple >> 6) as usize & 0x3F] as char);
        } else {
            out.push('=');
        }
        if chunk.len() > 2 {
            out.push(ALPHABET[triple as usize & 0x3F] as char);
        } else {
            out.push('=');
        }
    }
    out
}

/// Caster account used for HTTP Basic authentication.
///
/// The password is plaintext on the wire and is never logged.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    user: String,
    password: String,
}

impl Credentials {
    /// Returns `None` unless both fields are non-empty; a caster login with
    /// a missing half is treated as anonymous.
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Option<Self> {
        let user = user.into();
        let password = password.into();
        if user.is_empty() || password.is_empty() {
            return None;
        }
        Some(Self { user, password })
    }

    /// Account name.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Value of the `Authorization` header.
    pub fn header_value(&self) -> String {
        let pair = format!("{}:{}", self.user, self.password);
        format!("Basic {}", base64_encode(pair.as_bytes()))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field(
                "password",
                &format_args!("<redacted:{} bytes>", self.password.len()),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_known_vectors() {
        assert_eq!(base64_encode(b""), "");
        assert_eq!(base64_encode(b"f"), "Zg==");
        assert_eq!(base64_encode(b"fo"), "Zm8=");
        assert_eq!(base64_encode(b"foo"), "Zm9v");
        assert_eq!(base64_encode(b"foobar"), "Zm9vYmFy");
        assert_eq!(
            base64_encode(b"Aladdin:open sesame"),
            "QWxhZGRpbjpvcGVuIHNlc2FtZQ=="
        );
    }

    #[test]
    fn base64_high_bytes() {
        assert_eq!(base64_encode(&[0xFF, 0xFE, 0xFD]), "//79");
    }

    #[test]
    fn credentials_require_both_halves() {
        assert!(Credentials::new("", "secret").is_none());
        assert!(Credentials::new("rover", "").is_none());
        assert!(Credentials::new("rover", "secret").is_some());
    }

    #[test]
    fn header_value_is_basic_auth() {
        let creds = Credentials::new("Aladdin", "open sesame").unwrap();
        assert_eq!(creds.header_value(), "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ==");
    }

    #[test]
    fn debug_redacts_password() {
        let creds = Credentials::new("rover", "hunter2").unwrap();
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("rover"));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted:7 bytes>"));
    }
}
