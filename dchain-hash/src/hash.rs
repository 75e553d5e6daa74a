// Copyright (c) 2024 DCHAIN LABS

use crate::error::DChainHashError;
use crate::settings::HASH_SIZE_BYTES;
use sha2::{Digest, Sha256};
use std::str::FromStr;

/// SHA-256 digest
#[derive(Eq, PartialEq, Ord, PartialOrd, Copy, Clone, Hash, Default)]
pub struct Hash([u8; HASH_SIZE_BYTES]);

impl std::fmt::Display for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_bs58_check())
    }
}

impl std::fmt::Debug for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        // first bytes are enough to tell hashes apart in logs
        let short = bs58::encode(&self.0[..6]).into_string();
        write!(f, "{}..", short)
    }
}

impl Hash {
    /// All-zero hash, used as "no previous" link.
    pub const ZERO: Hash = Hash([0u8; HASH_SIZE_BYTES]);

    /// Compute a hash from data.
    ///
    /// # Example
    ///  ```
    /// # use dchain_hash::Hash;
    /// let hash = Hash::compute_from(&"hello world".as_bytes());
    /// ```
    pub fn compute_from(data: &[u8]) -> Self {
        Hash(Sha256::digest(data).into())
    }

    /// Compute a hash over the concatenation of several byte slices.
    ///
    /// # Example
    ///  ```
    /// # use dchain_hash::Hash;
    /// let a = Hash::compute_from_tuple(&[b"hello ", b"world"]);
    /// assert_eq!(a, Hash::compute_from(b"hello world"));
    /// ```
    pub fn compute_from_tuple(parts: &[&[u8]]) -> Self {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part);
        }
        Hash(hasher.finalize().into())
    }

    /// Hash of two hashes, in order. Used for serial hash chains and merkle roots.
    pub fn chain(first: &Hash, second: &Hash) -> Self {
        Hash::compute_from_tuple(&[&first.0[..], &second.0[..]])
    }

    /// true for the all-zero hash
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; HASH_SIZE_BYTES]
    }

    /// Serialize a Hash using bs58 encoding with checksum.
    pub fn to_bs58_check(&self) -> String {
        bs58::encode(self.0).with_check().into_string()
    }

    /// Serialize a Hash as bytes.
    pub fn to_bytes(&self) -> &[u8; HASH_SIZE_BYTES] {
        &self.0
    }

    /// Convert into bytes.
    pub fn into_bytes(self) -> [u8; HASH_SIZE_BYTES] {
        self.0
    }

    /// Build a Hash from raw bytes.
    pub const fn from_bytes(data: &[u8; HASH_SIZE_BYTES]) -> Hash {
        Hash(*data)
    }

    /// Sum of all bytes. Used to spread hashes over virtual servers.
    pub fn byte_sum(&self) -> u64 {
        self.0.iter().map(|b| u64::from(*b)).sum()
    }

    /// Deserialize using bs58 encoding with checksum.
    ///
    /// # Example
    ///  ```
    /// # use dchain_hash::Hash;
    /// let hash = Hash::compute_from(&"hello world".as_bytes());
    /// let serialized: String = hash.to_bs58_check();
    /// let deserialized: Hash = Hash::from_bs58_check(&serialized).unwrap();
    /// assert_eq!(hash, deserialized);
    /// ```
    pub fn from_bs58_check(data: &str) -> Result<Hash, DChainHashError> {
        let decoded_bs58_check = bs58::decode(data)
            .with_check(None)
            .into_vec()
            .map_err(|err| DChainHashError::ParsingError(format!("{}", err)))?;
        let bytes: [u8; HASH_SIZE_BYTES] = decoded_bs58_check
            .as_slice()
            .try_into()
            .map_err(|err| DChainHashError::ParsingError(format!("{}", err)))?;
        Ok(Hash(bytes))
    }
}

impl FromStr for Hash {
    type Err = DChainHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Hash::from_bs58_check(s)
    }
}

impl ::serde::Serialize for Hash {
    /// Human readable serializers get the bs58 check form, binary ones the raw bytes.
    fn serialize<S: ::serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        if s.is_human_readable() {
            s.collect_str(&self.to_bs58_check())
        } else {
            s.serialize_bytes(&self.0)
        }
    }
}

impl<'de> ::serde::Deserialize<'de> for Hash {
    fn deserialize<D: ::serde::Deserializer<'de>>(d: D) -> Result<Hash, D::Error> {
        if d.is_human_readable() {
            struct Base58CheckVisitor;

            impl<'de> ::serde::de::Visitor<'de> for Base58CheckVisitor {
                type Value = Hash;

                fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                    formatter.write_str("an ASCII base58check string")
                }

                fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
                where
                    E: ::serde::de::Error,
                {
                    Hash::from_bs58_check(v).map_err(E::custom)
                }
            }
            d.deserialize_str(Base58CheckVisitor)
        } else {
            struct BytesVisitor;

            impl<'de> ::serde::de::Visitor<'de> for BytesVisitor {
                type Value = Hash;

                fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                    formatter.write_str("a bytestring")
                }

                fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
                where
                    E: ::serde::de::Error,
                {
                    let bytes: [u8; HASH_SIZE_BYTES] = v
                        .try_into()
                        .map_err(|_| E::invalid_length(v.len(), &self))?;
                    Ok(Hash(bytes))
                }
            }

            d.deserialize_bytes(BytesVisitor)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_is_order_sensitive() {
        let a = Hash::compute_from(b"a");
        let b = Hash::compute_from(b"b");
        assert_ne!(Hash::chain(&a, &b), Hash::chain(&b, &a));
        assert_eq!(
            Hash::chain(&a, &b),
            Hash::compute_from_tuple(&[&a.to_bytes()[..], &b.to_bytes()[..]])
        );
    }

    #[test]
    fn test_serde_human_readable() {
        let hash = Hash::compute_from(b"hello world");
        let serialized = serde_json::to_string(&hash).unwrap();
        let deserialized: Hash = serde_json::from_str(&serialized).unwrap();
        assert_eq!(hash, deserialized);
    }

    #[test]
    fn test_bad_checksum_rejected() {
        let mut s = Hash::compute_from(b"x").to_bs58_check();
        let last = s.pop().unwrap();
        s.push(if last == '1' { '2' } else { '1' });
        assert!(Hash::from_bs58_check(&s).is_err());
    }
}
