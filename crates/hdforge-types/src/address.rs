use crate::error::TypesError;
use std::fmt;
use std::str::FromStr;

/// Network an address is valid on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Discrimination {
    #[default]
    Production,
    Test,
}

impl Discrimination {
    pub const fn network_id(&self) -> u8 {
        match self {
            Discrimination::Production => 0x01,
            Discrimination::Test => 0x00,
        }
    }

    pub const fn hrp(&self) -> &'static str {
        match self {
            Discrimination::Production => "addr",
            Discrimination::Test => "addr_test",
        }
    }

    fn from_network_id(id: u8) -> Option<Self> {
        match id {
            0x01 => Some(Discrimination::Production),
            0x00 => Some(Discrimination::Test),
            _ => None,
        }
    }
}

impl FromStr for Discrimination {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" | "mainnet" => Ok(Discrimination::Production),
            "test" | "testnet" => Ok(Discrimination::Test),
            other => Err(TypesError::InvalidAddressFormat(format!(
                "unknown network: {}",
                other
            ))),
        }
    }
}

/// Single (payment-key only) address.
///
/// # Encoding
/// `header || blake3(public_key)[0..28]` where the header's high nibble is the
/// single-address type and the low nibble the network id.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SingleAddress {
    header: u8,
    key_hash: [u8; 28],
}

impl SingleAddress {
    pub const KEY_HASH_LEN: usize = 28;
    pub const LEN: usize = 1 + Self::KEY_HASH_LEN;

    const TYPE_NIBBLE: u8 = 0x60;

    /// Derive the address of a public key on the given network.
    pub fn from_public_key(public_key: &[u8], discrimination: Discrimination) -> Self {
        let hash = blake3::hash(public_key);
        let mut key_hash = [0u8; Self::KEY_HASH_LEN];
        key_hash.copy_from_slice(&hash.as_bytes()[..Self::KEY_HASH_LEN]);
        Self {
            header: Self::TYPE_NIBBLE | discrimination.network_id(),
            key_hash,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypesError> {
        if bytes.len() != Self::LEN {
            return Err(TypesError::InvalidAddressLength {
                expected: Self::LEN,
                actual: bytes.len(),
            });
        }
        let header = bytes[0];
        if header & 0xf0 != Self::TYPE_NIBBLE
            || Discrimination::from_network_id(header & 0x0f).is_none()
        {
            return Err(TypesError::UnknownAddressHeader(header));
        }
        let mut key_hash = [0u8; Self::KEY_HASH_LEN];
        key_hash.copy_from_slice(&bytes[1..]);
        Ok(Self { header, key_hash })
    }

    pub fn from_hex(s: &str) -> Result<Self, TypesError> {
        Self::from_bytes(&hex::decode(s)?)
    }

    pub fn discrimination(&self) -> Discrimination {
        // header is validated on every constructor
        Discrimination::from_network_id(self.header & 0x0f).unwrap_or_default()
    }

    pub fn key_hash(&self) -> &[u8; 28] {
        &self.key_hash
    }

    pub fn to_bytes(&self) -> [u8; 29] {
        let mut out = [0u8; Self::LEN];
        out[0] = self.header;
        out[1..].copy_from_slice(&self.key_hash);
        out
    }

    /// Hex of the raw byte encoding, as stored in address rows.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

impl fmt::Display for SingleAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hrp = bech32::Hrp::parse_unchecked(self.discrimination().hrp());
        match bech32::encode::<bech32::Bech32m>(hrp, &self.to_bytes()) {
            Ok(encoded) => write!(f, "{}", encoded),
            Err(_) => Err(fmt::Error),
        }
    }
}

impl fmt::Debug for SingleAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SingleAddress({})", self.to_hex())
    }
}

impl FromStr for SingleAddress {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hrp, data) =
            bech32::decode(s).map_err(|e| TypesError::Bech32Error(e.to_string()))?;
        let address = Self::from_bytes(&data)?;

        if hrp.as_str() != address.discrimination().hrp() {
            return Err(TypesError::InvalidAddressFormat(format!(
                "Invalid HRP: expected '{}', got '{}'",
                address.discrimination().hrp(),
                hrp
            )));
        }
        Ok(address)
    }
}
