//! Primitive types shared by every stage.
//!
//! - [`Address`]: 20-byte unit/account address
//! - [`ParamsHash`]: 32-byte configuration lookup key
//! - [`PermissionFlags`]: typed scheme permission mask
//! - [`Value`]: typed call argument / return value
//! - [`EncodedCall`]: payload forwarded through the controller
//! - [`RunId`]: identifier of one pipeline run

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{ProvisionError, ProvisionResult};

fn decode_fixed<const N: usize>(s: &str) -> ProvisionResult<[u8; N]> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(digits)
        .map_err(|e| ProvisionError::InvalidAddress(format!("{s}: {e}")))?;
    bytes.try_into().map_err(|bytes: Vec<u8>| {
        ProvisionError::InvalidAddress(format!("{s}: expected {N} bytes, got {}", bytes.len()))
    })
}

/// Address of a deployed unit or a signing account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 20]);

impl Address {
    /// The zero address, used as "none" in constructor arguments.
    pub const ZERO: Self = Self([0; 20]);

    /// Creates an address from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Parses a `0x`-prefixed (or bare) hex address.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not 20 bytes of hex.
    pub fn parse(s: &str) -> ProvisionResult<Self> {
        decode_fixed::<20>(s).map(Self)
    }

    /// Derives an address from the SHA-256 of the given parts (last 20 bytes).
    #[must_use]
    pub fn derive(parts: &[&[u8]]) -> Self {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part);
        }
        let digest = hasher.finalize();
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest[12..]);
        Self(bytes)
    }

    /// Returns the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Returns true for [`Address::ZERO`].
    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
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
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Content hash used by voting-related units as a configuration lookup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ParamsHash([u8; 32]);

impl ParamsHash {
    /// Sentinel meaning "no configuration".
    pub const ZERO: Self = Self([0; 32]);

    /// Creates a hash from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// SHA-256 over the concatenation of `parts`.
    #[must_use]
    pub fn digest(parts: &[&[u8]]) -> Self {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part);
        }
        Self(hasher.finalize().into())
    }

    /// Parses a `0x`-prefixed (or bare) 32-byte hex string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not 32 bytes of hex.
    pub fn parse(s: &str) -> ProvisionResult<Self> {
        decode_fixed::<32>(s).map(Self)
    }

    /// Returns the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns true for the zero sentinel.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl fmt::Display for ParamsHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for ParamsHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ParamsHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Permissions a scheme holds on the controller.
///
/// Bits follow the controller's wire layout; `ALL` is `0x0000001F`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionFlags(u32);

impl PermissionFlags {
    /// No permissions.
    pub const NONE: Self = Self(0);
    /// Set on every registered scheme.
    pub const REGISTERED: Self = Self(0x01);
    /// May register and unregister other schemes.
    pub const REGISTER_SCHEMES: Self = Self(0x02);
    /// May add and remove global constraints.
    pub const MANAGE_CONSTRAINTS: Self = Self(0x04);
    /// May upgrade the controller.
    pub const UPGRADE_CONTROLLER: Self = Self(0x08);
    /// May forward arbitrary calls with the avatar as sender.
    pub const GENERIC_CALL: Self = Self(0x10);
    /// Every permission.
    pub const ALL: Self = Self(0x1F);

    /// Builds flags from a raw mask, dropping unknown bits.
    #[must_use]
    pub const fn from_bits_truncate(bits: u32) -> Self {
        Self(bits & Self::ALL.0)
    }

    /// Raw mask.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True if every bit of `other` is set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if no bit is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for PermissionFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for PermissionFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for PermissionFlags {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Display for PermissionFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

/// A typed call argument or return value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// No value (void return).
    Unit,
    /// Unit or account address.
    Address(Address),
    /// Unsigned integer.
    Uint(u128),
    /// Parameters hash.
    Hash(ParamsHash),
    /// String.
    Str(String),
    /// Boolean.
    Bool(bool),
    /// Opaque bytes (encoded calls).
    Bytes(Vec<u8>),
    /// Permission mask.
    Flags(PermissionFlags),
    /// List of addresses.
    Addresses(Vec<Address>),
    /// List of unsigned integers.
    Uints(Vec<u128>),
    /// List of hashes.
    Hashes(Vec<ParamsHash>),
}

impl Value {
    /// Returns the address if this is an address value.
    #[must_use]
    pub const fn as_address(&self) -> Option<Address> {
        match self {
            Self::Address(a) => Some(*a),
            _ => None,
        }
    }

    /// Returns the integer if this is a uint value.
    #[must_use]
    pub const fn as_uint(&self) -> Option<u128> {
        match self {
            Self::Uint(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the hash if this is a hash value.
    #[must_use]
    pub const fn as_hash(&self) -> Option<ParamsHash> {
        match self {
            Self::Hash(h) => Some(*h),
            _ => None,
        }
    }

    /// Returns the boolean if this is a bool value.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the flags if this is a flags value.
    #[must_use]
    pub const fn as_flags(&self) -> Option<PermissionFlags> {
        match self {
            Self::Flags(f) => Some(*f),
            _ => None,
        }
    }

    /// Name of the variant, for error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::Address(_) => "address",
            Self::Uint(_) => "uint",
            Self::Hash(_) => "hash",
            Self::Str(_) => "string",
            Self::Bool(_) => "bool",
            Self::Bytes(_) => "bytes",
            Self::Flags(_) => "flags",
            Self::Addresses(_) => "address[]",
            Self::Uints(_) => "uint[]",
            Self::Hashes(_) => "hash[]",
        }
    }
}

impl From<Address> for Value {
    fn from(a: Address) -> Self {
        Self::Address(a)
    }
}

impl From<u128> for Value {
    fn from(v: u128) -> Self {
        Self::Uint(v)
    }
}

impl From<ParamsHash> for Value {
    fn from(h: ParamsHash) -> Self {
        Self::Hash(h)
    }
}

impl From<PermissionFlags> for Value {
    fn from(f: PermissionFlags) -> Self {
        Self::Flags(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

/// A method invocation to be forwarded through the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedCall {
    /// Method name on the target unit
    pub method: String,
    /// Arguments in declaration order
    pub args: Vec<Value>,
}

impl EncodedCall {
    /// Creates a call payload.
    #[must_use]
    pub fn new(method: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            args,
        }
    }

    /// Encodes the payload to bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self) -> ProvisionResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes a payload produced by [`EncodedCall::encode`].
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid payload.
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Identifier of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// Creates a new random run ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
