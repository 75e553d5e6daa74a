// Copyright (c) 2024 DCHAIN LABS

use crate::error::DChainSignatureError;
use dchain_hash::Hash;
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use std::str::FromStr;

/// Size of a public key
pub const PUBLIC_KEY_SIZE_BYTES: usize = 32;
/// Size of a keypair
pub const KEYPAIR_SIZE_BYTES: usize = 32;
/// Size of a signature
pub const SIGNATURE_SIZE_BYTES: usize = 64;

fn decode_bs58_check<const N: usize>(data: &str) -> Result<[u8; N], DChainSignatureError> {
    let decoded = bs58::decode(data)
        .with_check(None)
        .into_vec()
        .map_err(|err| DChainSignatureError::ParsingError(format!("{}", err)))?;
    decoded
        .as_slice()
        .try_into()
        .map_err(|err| DChainSignatureError::ParsingError(format!("{}", err)))
}

/// `KeyPair` is used for signing
#[derive(Clone)]
pub struct KeyPair(SigningKey);

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "KeyPair({})", self.get_public_key())
    }
}

impl PartialEq for KeyPair {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bytes() == other.0.to_bytes()
    }
}

impl Eq for KeyPair {}

impl std::fmt::Display for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_bs58_check())
    }
}

impl FromStr for KeyPair {
    type Err = DChainSignatureError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KeyPair::from_bs58_check(s)
    }
}

impl KeyPair {
    /// Generate a new `KeyPair`
    ///
    /// # Example
    /// ```
    /// # use dchain_signature::KeyPair;
    /// # use dchain_hash::Hash;
    /// let keypair = KeyPair::generate();
    /// let data = Hash::compute_from("Hello World!".as_bytes());
    /// let signature = keypair.sign(&data);
    /// assert!(keypair.get_public_key().verify_signature(&data, &signature).is_ok());
    /// ```
    pub fn generate() -> KeyPair {
        KeyPair(SigningKey::generate(&mut OsRng))
    }

    /// Deterministic keypair from a 32 byte seed.
    pub fn from_seed(seed: &[u8; KEYPAIR_SIZE_BYTES]) -> KeyPair {
        KeyPair(SigningKey::from_bytes(seed))
    }

    /// Returns the Signature produced by signing data bytes with a `KeyPair`.
    pub fn sign(&self, hash: &Hash) -> Signature {
        Signature(self.0.sign(hash.to_bytes()))
    }

    /// Return the bytes representing the secret part of the keypair
    pub fn to_bytes(&self) -> [u8; KEYPAIR_SIZE_BYTES] {
        self.0.to_bytes()
    }

    /// Get the public key of the keypair
    pub fn get_public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key())
    }

    /// Encode the secret key as bs58 with checksum
    pub fn to_bs58_check(&self) -> String {
        bs58::encode(self.to_bytes()).with_check().into_string()
    }

    /// Decode a keypair from its bs58 check form
    pub fn from_bs58_check(data: &str) -> Result<Self, DChainSignatureError> {
        Ok(KeyPair::from_seed(&decode_bs58_check::<KEYPAIR_SIZE_BYTES>(data)?))
    }
}

/// Public key used to check if a message was encoded
/// by the corresponding `KeyPair`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl std::hash::Hash for PublicKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.as_bytes().hash(state);
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_bs58_check())
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_bs58_check())
    }
}

impl FromStr for PublicKey {
    type Err = DChainSignatureError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PublicKey::from_bs58_check(s)
    }
}

impl PublicKey {
    /// Checks if the `Signature` associated with data bytes
    /// was produced with the `KeyPair` associated to given `PublicKey`
    pub fn verify_signature(
        &self,
        hash: &Hash,
        signature: &Signature,
    ) -> Result<(), DChainSignatureError> {
        self.0.verify_strict(hash.to_bytes(), &signature.0)?;
        Ok(())
    }

    /// Serialize a `PublicKey` using `bs58` encoding with checksum.
    pub fn to_bs58_check(&self) -> String {
        bs58::encode(self.to_bytes()).with_check().into_string()
    }

    /// Serialize a `PublicKey` as bytes.
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE_BYTES] {
        self.0.to_bytes()
    }

    /// Deserialize a `PublicKey` using `bs58` encoding with checksum.
    pub fn from_bs58_check(data: &str) -> Result<PublicKey, DChainSignatureError> {
        PublicKey::from_bytes(&decode_bs58_check::<PUBLIC_KEY_SIZE_BYTES>(data)?)
    }

    /// Deserialize a `PublicKey` from bytes.
    pub fn from_bytes(
        data: &[u8; PUBLIC_KEY_SIZE_BYTES],
    ) -> Result<PublicKey, DChainSignatureError> {
        Ok(PublicKey(VerifyingKey::from_bytes(data)?))
    }
}

/// Signature generated from a message and a `KeyPair`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(ed25519_dalek::Signature);

impl std::hash::Hash for Signature {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.to_bytes().hash(state);
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_bs58_check())
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_bs58_check())
    }
}

impl FromStr for Signature {
    type Err = DChainSignatureError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Signature::from_bs58_check(s)
    }
}

impl Signature {
    /// Serialize a `Signature` using `bs58` encoding with checksum.
    pub fn to_bs58_check(&self) -> String {
        bs58::encode(self.to_bytes()).with_check().into_string()
    }

    /// Serialize a Signature as bytes.
    pub fn to_bytes(&self) -> [u8; SIGNATURE_SIZE_BYTES] {
        self.0.to_bytes()
    }

    /// Deserialize a `Signature` using `bs58` encoding with checksum.
    pub fn from_bs58_check(data: &str) -> Result<Signature, DChainSignatureError> {
        Ok(Signature::from_bytes(&decode_bs58_check::<
            SIGNATURE_SIZE_BYTES,
        >(data)?))
    }

    /// Deserialize a Signature from bytes.
    pub fn from_bytes(data: &[u8; SIGNATURE_SIZE_BYTES]) -> Signature {
        Signature(ed25519_dalek::Signature::from_bytes(data))
    }
}

/// Human readable serializers use the bs58 check string form.
macro_rules! bs58_serde {
    ($type:ty, $what:expr) => {
        impl ::serde::Serialize for $type {
            fn serialize<S: ::serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                s.collect_str(&self.to_bs58_check())
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $type {
            fn deserialize<D: ::serde::Deserializer<'de>>(d: D) -> Result<$type, D::Error> {
                struct Bs58Visitor;

                impl<'de> ::serde::de::Visitor<'de> for Bs58Visitor {
                    type Value = $type;

                    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                        formatter.write_str($what)
                    }

                    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
                    where
                        E: ::serde::de::Error,
                    {
                        <$type>::from_bs58_check(v).map_err(E::custom)
                    }
                }
                d.deserialize_str(Bs58Visitor)
            }
        }
    };
}

bs58_serde!(KeyPair, "a base58check encoded keypair");
bs58_serde!(PublicKey, "a base58check encoded public key");
bs58_serde!(Signature, "a base58check encoded signature");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_rejects_other_key() {
        let keypair = KeyPair::from_seed(&[1u8; 32]);
        let other = KeyPair::from_seed(&[2u8; 32]);
        let data = Hash::compute_from(b"block header");
        let sig = keypair.sign(&data);
        assert!(keypair.get_public_key().verify_signature(&data, &sig).is_ok());
        assert!(other.get_public_key().verify_signature(&data, &sig).is_err());
        let tampered = Hash::compute_from(b"block header!");
        assert!(keypair
            .get_public_key()
            .verify_signature(&tampered, &sig)
            .is_err());
    }

    #[test]
    fn test_keypair_serde() {
        let keypair = KeyPair::generate();
        let serialized = serde_json::to_string(&keypair).unwrap();
        let deserialized: KeyPair = serde_json::from_str(&serialized).unwrap();
        assert_eq!(keypair, deserialized);
        assert_eq!(
            PublicKey::from_bs58_check(&keypair.get_public_key().to_bs58_check()).unwrap(),
            keypair.get_public_key()
        );
    }
}
