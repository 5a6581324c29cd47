//! Account addresses: 32-byte public keys rendered as 58-character base32
//! strings with a 4-byte SHA-512/256 checksum suffix.

use std::fmt;
use std::str::FromStr;

use data_encoding::BASE32_NOPAD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha512_256};

use crate::errors::ClientError;

pub const PUBLIC_KEY_LEN: usize = 32;
const CHECKSUM_LEN: usize = 4;
const ENCODED_LEN: usize = 58;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; PUBLIC_KEY_LEN]);

impl Address {
    pub const ZERO: Address = Address([0u8; PUBLIC_KEY_LEN]);

    pub fn from_public_key(bytes: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; PUBLIC_KEY_LEN]>::try_from(bytes).ok().map(Self)
    }

    /// Escrow account controlled by the contract `app_id`.
    pub fn for_application(app_id: u64) -> Self {
        let mut hasher = Sha512_256::new();
        hasher.update(b"appID");
        hasher.update(app_id.to_be_bytes());
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    fn checksum(&self) -> [u8; CHECKSUM_LEN] {
        let digest = Sha512_256::digest(self.0);
        let mut out = [0u8; CHECKSUM_LEN];
        out.copy_from_slice(&digest[digest.len() - CHECKSUM_LEN..]);
        out
    }

    /// Display helper: first and last six characters.
    pub fn short(&self) -> String {
        let s = self.to_string();
        format!("{}…{}", &s[..6], &s[s.len() - 6..])
    }
}

/// Cheap validity check used before building anything.
pub fn is_valid_address(s: &str) -> bool {
    s.parse::<Address>().is_ok()
}

impl FromStr for Address {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != ENCODED_LEN {
            return Err(ClientError::InvalidAddress(format!(
                "{s:?}: expected {ENCODED_LEN} characters, got {}",
                s.len()
            )));
        }
        let raw = BASE32_NOPAD
            .decode(s.as_bytes())
            .map_err(|e| ClientError::InvalidAddress(format!("{s:?}: {e}")))?;
        if raw.len() != PUBLIC_KEY_LEN + CHECKSUM_LEN {
            return Err(ClientError::InvalidAddress(format!(
                "{s:?}: decoded to {} bytes",
                raw.len()
            )));
        }
        let (key, checksum) = raw.split_at(PUBLIC_KEY_LEN);
        let address = Self::from_slice(key)
            .ok_or_else(|| ClientError::InvalidAddress(format!("{s:?}: bad key length")))?;
        if address.checksum() != checksum {
            return Err(ClientError::InvalidAddress(format!("{s:?}: checksum mismatch")));
        }
        Ok(address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut raw = Vec::with_capacity(PUBLIC_KEY_LEN + CHECKSUM_LEN);
        raw.extend_from_slice(&self.0);
        raw.extend_from_slice(&self.checksum());
        f.write_str(&BASE32_NOPAD.encode(&raw))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
