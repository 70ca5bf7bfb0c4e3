use std::fmt;
use std::str::FromStr;

use crate::error::LinkError;

/// Longest identifier a station will advertise.
const MAX_IDENTIFIER_LEN: usize = 32;
/// WPA passphrase bounds.
const MIN_PASSPHRASE_LEN: usize = 8;
const MAX_PASSPHRASE_LEN: usize = 63;
/// A raw 256-bit PSK written as hex.
const RAW_PSK_HEX_LEN: usize = 64;

/// Authentication advertised by an access point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Open,
    Wep,
    WpaPsk,
    Wpa2Psk,
    WpaWpa2Psk,
    Wpa2Enterprise,
    Wpa3Psk,
    Wpa2Wpa3Psk,
    Unknown,
}

impl AuthMethod {
    /// True when the access point offers at least WPA2.
    pub fn meets_wpa2(self) -> bool {
        matches!(
            self,
            AuthMethod::Wpa2Psk
                | AuthMethod::WpaWpa2Psk
                | AuthMethod::Wpa2Enterprise
                | AuthMethod::Wpa3Psk
                | AuthMethod::Wpa2Wpa3Psk
        )
    }
}

/// One access point seen by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    /// Network name.
    pub identifier: String,
    /// Received signal strength in dBm.
    pub rssi: i16,
    /// Advertised authentication.
    pub auth: AuthMethod,
}

/// A network the rover is allowed to join.
///
/// The credential is never logged and is redacted in debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct NetworkProfile {
    identifier: String,
    credential: String,
}

impl NetworkProfile {
    /// Create a profile, checking identifier and passphrase bounds.
    pub fn new(
        identifier: impl Into<String>,
        credential: impl Into<String>,
    ) -> Result<Self, LinkError> {
        let identifier = identifier.into();
        let credential = credential.into();

        if identifier.is_empty() || identifier.len() > MAX_IDENTIFIER_LEN {
            return Err(LinkError::InvalidProfile(format!(
                "identifier must be 1..={MAX_IDENTIFIER_LEN} bytes, got {}",
                identifier.len()
            )));
        }
        if !valid_credential(&credential) {
            return Err(LinkError::InvalidProfile(format!(
                "passphrase for {identifier:?} must be \
                 {MIN_PASSPHRASE_LEN}..={MAX_PASSPHRASE_LEN} bytes \
                 or a {RAW_PSK_HEX_LEN}-digit hex key"
            )));
        }

        Ok(Self {
            identifier,
            credential,
        })
    }

    /// Network name.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Passphrase. Handle with care.
    pub fn credential(&self) -> &str {
        &self.credential
    }
}

fn valid_credential(credential: &str) -> bool {
    (MIN_PASSPHRASE_LEN..=MAX_PASSPHRASE_LEN).contains(&credential.len())
        || (credential.len() == RAW_PSK_HEX_LEN
            && credential.bytes().all(|b| b.is_ascii_hexdigit()))
}

impl fmt::Debug for NetworkProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkProfile")
            .field("identifier", &self.identifier)
            .field(
                "credential",
                &format_args!("<redacted:{} bytes>", self.credential.len()),
            )
            .finish()
    }
}

/// Parses `IDENTIFIER=PASSPHRASE`, splitting at the first `=`.
impl FromStr for NetworkProfile {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (identifier, credential) = s.split_once('=').ok_or_else(|| {
            LinkError::InvalidProfile("expected IDENTIFIER=PASSPHRASE".to_string())
        })?;
        Self::new(identifier, credential)
    }
}

/// Pick the strongest scan result that is both known and at or above
/// `rssi_threshold`.
///
/// Ties keep the first result encountered. Profile order carries no
/// preference. Returns `None` when nothing qualifies.
pub fn select<'a>(
    scan: &[ScanResult],
    known: &'a [NetworkProfile],
    rssi_threshold: i16,
) -> Option<&'a NetworkProfile> {
    let mut best: Option<(i16, &'a NetworkProfile)> = None;

    for result in scan {
        if result.rssi < rssi_threshold {
            continue;
        }
        let Some(profile) = known.iter().find(|p| p.identifier == result.identifier) else {
            continue;
        };
        match best {
            Some((best_rssi, _)) if result.rssi <= best_rssi => {}
            _ => best = Some((result.rssi, profile)),
        }
    }

    best.map(|(_, profile)| profile)
}
