// Copyright (c) 2024 DCHAIN LABS
use std::collections::BTreeMap;

use dchain_hash::Hash;
use dchain_models::{Authority, IdentityId};
use dchain_signature::Signature;
use parking_lot::RwLock;

/// Read contract of the identity registry.
#[cfg_attr(any(test, feature = "test-exports"), mockall::automock)]
pub trait AuthorityRegistry: Send + Sync {
    /// Signing key and role of `identity` at `db_height`.
    fn get_authority(&self, identity: &IdentityId, db_height: u32) -> Option<Authority>;

    /// Checks that `signer` signed `data` with its key at `db_height`.
    fn verify_signature(
        &self,
        signer: &IdentityId,
        data: &Hash,
        signature: &Signature,
        db_height: u32,
    ) -> bool;
}

/// Registry with a fixed set of keys, filled at startup.
#[derive(Debug, Default)]
pub struct StaticAuthorityRegistry {
    authorities: RwLock<BTreeMap<IdentityId, Authority>>,
}

impl StaticAuthorityRegistry {
    /// registry holding `authorities`
    pub fn new(authorities: impl IntoIterator<Item = Authority>) -> Self {
        let registry = Self::default();
        for authority in authorities {
            registry.register(authority);
        }
        registry
    }

    /// Adds or replaces the entry of an identity.
    pub fn register(&self, authority: Authority) {
        self.authorities
            .write()
            .insert(authority.identity, authority);
    }
}

impl AuthorityRegistry for StaticAuthorityRegistry {
    fn get_authority(&self, identity: &IdentityId, _db_height: u32) -> Option<Authority> {
        self.authorities.read().get(identity).cloned()
    }

    fn verify_signature(
        &self,
        signer: &IdentityId,
        data: &Hash,
        signature: &Signature,
        _db_height: u32,
    ) -> bool {
        match self.authorities.read().get(signer) {
            Some(authority) => authority
                .public_key
                .verify_signature(data, signature)
                .is_ok(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dchain_models::ServerType;
    use dchain_signature::KeyPair;

    #[test]
    fn test_verify_against_registered_key() {
        let keypair = KeyPair::generate();
        let identity = IdentityId::from_public_key(&keypair.get_public_key());
        let registry = StaticAuthorityRegistry::new([Authority {
            identity,
            public_key: keypair.get_public_key(),
            server_type: ServerType::Federated,
        }]);
        let data = Hash::compute_from(b"payload");
        let signature = keypair.sign(&data);
        assert!(registry.verify_signature(&identity, &data, &signature, 3));

        let stranger = KeyPair::generate();
        let stranger_id = IdentityId::from_public_key(&stranger.get_public_key());
        assert!(!registry.verify_signature(&stranger_id, &data, &stranger.sign(&data), 3));
        assert!(!registry.verify_signature(&identity, &Hash::compute_from(b"other"), &signature, 3));
    }
}
