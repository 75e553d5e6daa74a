// Copyright (c) 2024 DCHAIN LABS

//! Fixed-width big-endian encoding of the fields that enter a hash or a
//! signature. It is not a wire format: nothing is ever decoded from it.

use dchain_hash::Hash;
use dchain_signature::{PublicKey, Signature};
use dchain_time::ChainTime;

/// Appends the canonical bytes of a `T` to a buffer.
pub trait Serializer<T: ?Sized> {
    /// write the bytes of `value` into `buffer`
    fn serialize(&self, value: &T, buffer: &mut Vec<u8>);

    /// canonical bytes of `value`
    fn to_bytes(&self, value: &T) -> Vec<u8> {
        let mut buffer = Vec::new();
        self.serialize(value, &mut buffer);
        buffer
    }

    /// hash of the canonical bytes of `value`
    fn hash(&self, value: &T) -> Hash {
        Hash::compute_from(&self.to_bytes(value))
    }
}

/// Serializer of every hashed type of the chain.
#[derive(Clone, Copy, Debug, Default)]
pub struct CanonicalSerializer;

impl CanonicalSerializer {
    fn serialize_len(&self, len: usize, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(&(len as u64).to_be_bytes());
    }
}

impl Serializer<u8> for CanonicalSerializer {
    fn serialize(&self, value: &u8, buffer: &mut Vec<u8>) {
        buffer.push(*value);
    }
}

impl Serializer<bool> for CanonicalSerializer {
    fn serialize(&self, value: &bool, buffer: &mut Vec<u8>) {
        buffer.push(u8::from(*value));
    }
}

impl Serializer<u32> for CanonicalSerializer {
    fn serialize(&self, value: &u32, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(&value.to_be_bytes());
    }
}

impl Serializer<u64> for CanonicalSerializer {
    fn serialize(&self, value: &u64, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(&value.to_be_bytes());
    }
}

impl Serializer<i64> for CanonicalSerializer {
    fn serialize(&self, value: &i64, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(&value.to_be_bytes());
    }
}

impl Serializer<Hash> for CanonicalSerializer {
    fn serialize(&self, value: &Hash, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(value.to_bytes());
    }
}

impl Serializer<ChainTime> for CanonicalSerializer {
    fn serialize(&self, value: &ChainTime, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(&value.to_millis().to_be_bytes());
    }
}

impl Serializer<PublicKey> for CanonicalSerializer {
    fn serialize(&self, value: &PublicKey, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(&value.to_bytes());
    }
}

impl Serializer<Signature> for CanonicalSerializer {
    fn serialize(&self, value: &Signature, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(&value.to_bytes());
    }
}

/// Length-prefixed bytes.
impl Serializer<[u8]> for CanonicalSerializer {
    fn serialize(&self, value: &[u8], buffer: &mut Vec<u8>) {
        self.serialize_len(value.len(), buffer);
        buffer.extend_from_slice(value);
    }
}

impl<T: ?Sized> Serializer<&T> for CanonicalSerializer
where
    CanonicalSerializer: Serializer<T>,
{
    fn serialize(&self, value: &&T, buffer: &mut Vec<u8>) {
        Serializer::<T>::serialize(self, *value, buffer);
    }
}

impl<T> Serializer<Vec<T>> for CanonicalSerializer
where
    CanonicalSerializer: Serializer<T>,
{
    fn serialize(&self, value: &Vec<T>, buffer: &mut Vec<u8>) {
        self.serialize_len(value.len(), buffer);
        for item in value {
            Serializer::<T>::serialize(self, item, buffer);
        }
    }
}

impl<T> Serializer<Option<T>> for CanonicalSerializer
where
    CanonicalSerializer: Serializer<T>,
{
    fn serialize(&self, value: &Option<T>, buffer: &mut Vec<u8>) {
        match value {
            Some(inner) => {
                buffer.push(1);
                Serializer::<T>::serialize(self, inner, buffer);
            }
            None => buffer.push(0),
        }
    }
}

impl<A, B> Serializer<(A, B)> for CanonicalSerializer
where
    CanonicalSerializer: Serializer<A> + Serializer<B>,
{
    fn serialize(&self, value: &(A, B), buffer: &mut Vec<u8>) {
        Serializer::<A>::serialize(self, &value.0, buffer);
        Serializer::<B>::serialize(self, &value.1, buffer);
    }
}

/// Binary merkle root, duplicating the last node of odd levels.
/// The root of an empty list is [`Hash::ZERO`].
pub fn merkle_root(leaves: &[Hash]) -> Hash {
    if leaves.is_empty() {
        return Hash::ZERO;
    }
    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| Hash::chain(&pair[0], pair.get(1).unwrap_or(&pair[0])))
            .collect();
    }
    level[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merkle_root_single_and_odd() {
        let a = Hash::compute_from(b"a");
        let b = Hash::compute_from(b"b");
        let c = Hash::compute_from(b"c");
        assert_eq!(merkle_root(&[a]), a);
        let ab = Hash::chain(&a, &b);
        let cc = Hash::chain(&c, &c);
        assert_eq!(merkle_root(&[a, b, c]), Hash::chain(&ab, &cc));
    }

    #[test]
    fn test_vec_is_length_prefixed() {
        let v: Vec<u8> = vec![1, 2];
        assert_eq!(
            CanonicalSerializer.to_bytes(&v),
            vec![0, 0, 0, 0, 0, 0, 0, 2, 1, 2]
        );
        let o: Option<u32> = None;
        assert_eq!(CanonicalSerializer.to_bytes(&o), vec![0]);
    }
}
