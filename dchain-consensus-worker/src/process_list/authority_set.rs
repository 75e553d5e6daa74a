// Copyright (c) 2024 DCHAIN LABS
use dchain_models::{blocks::AdminEntry, IdentityId};

/// Federated and audit servers of a height, each list sorted by identity bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthoritySet {
    /// leaders, one virtual server each
    pub fed: Vec<IdentityId>,
    /// standby servers
    pub audit: Vec<IdentityId>,
}

fn insert_sorted(list: &mut Vec<IdentityId>, identity: IdentityId) -> bool {
    match list.binary_search(&identity) {
        Ok(_) => false,
        Err(pos) => {
            list.insert(pos, identity);
            true
        }
    }
}

fn remove(list: &mut Vec<IdentityId>, identity: &IdentityId) -> bool {
    match list.iter().position(|id| id == identity) {
        Some(pos) => {
            list.remove(pos);
            true
        }
        None => false,
    }
}

impl AuthoritySet {
    /// Builds a set; an identity listed in both roles stays federated.
    pub fn new(fed: impl IntoIterator<Item = IdentityId>, audit: impl IntoIterator<Item = IdentityId>) -> Self {
        let mut set = AuthoritySet::default();
        for identity in audit {
            set.add_audit(identity);
        }
        for identity in fed {
            set.add_fed(identity);
        }
        set
    }

    /// Promotes or adds a federated server.
    pub fn add_fed(&mut self, identity: IdentityId) -> bool {
        remove(&mut self.audit, &identity);
        insert_sorted(&mut self.fed, identity)
    }

    /// Demotes or adds an audit server.
    pub fn add_audit(&mut self, identity: IdentityId) -> bool {
        remove(&mut self.fed, &identity);
        insert_sorted(&mut self.audit, identity)
    }

    /// Removes a federated server.
    pub fn remove_fed(&mut self, identity: &IdentityId) -> bool {
        remove(&mut self.fed, identity)
    }

    /// Puts `replacement` at the position of `faulted` so the virtual server
    /// assignment is unchanged, and demotes `faulted` to audit.
    pub fn replace_fed(&mut self, faulted: &IdentityId, replacement: IdentityId) -> bool {
        if self.fed.contains(&replacement) {
            return false;
        }
        let Some(pos) = self.fed.iter().position(|id| id == faulted) else {
            return false;
        };
        remove(&mut self.audit, &replacement);
        self.fed[pos] = replacement;
        insert_sorted(&mut self.audit, *faulted);
        true
    }

    /// Applies an admin line. Returns true if the set changed.
    pub fn apply_admin_entry(&mut self, entry: &AdminEntry) -> bool {
        match entry {
            AdminEntry::AddFederatedServer { identity, .. } => self.add_fed(*identity),
            AdminEntry::AddAuditServer { identity, .. } => self.add_audit(*identity),
            AdminEntry::RemoveFederatedServer { identity, .. } => self.remove_fed(identity),
            AdminEntry::ServerFault {
                faulted,
                replacement,
                ..
            } => self.replace_fed(faulted, *replacement),
            AdminEntry::DBSignature { .. } | AdminEntry::CoinbaseDescriptor { .. } => false,
        }
    }

    /// position of `identity` among the federated servers
    pub fn fed_index(&self, identity: &IdentityId) -> Option<usize> {
        self.fed.iter().position(|id| id == identity)
    }

    /// true if `identity` is a federated server
    pub fn is_fed(&self, identity: &IdentityId) -> bool {
        self.fed.contains(identity)
    }

    /// true if `identity` is an audit server
    pub fn is_audit(&self, identity: &IdentityId) -> bool {
        self.audit.contains(identity)
    }

    /// every authority, federated first
    pub fn all(&self) -> impl Iterator<Item = &IdentityId> {
        self.fed.iter().chain(self.audit.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dchain_hash::Hash;

    fn id(n: u8) -> IdentityId {
        IdentityId(Hash::from_bytes(&[n; 32]))
    }

    #[test]
    fn test_promotion_and_demotion_keep_order() {
        let mut set = AuthoritySet::new([id(3), id(1)], [id(2)]);
        assert_eq!(set.fed, vec![id(1), id(3)]);
        assert!(set.add_fed(id(2)));
        assert_eq!(set.fed, vec![id(1), id(2), id(3)]);
        assert!(set.audit.is_empty());
        assert!(set.add_audit(id(1)));
        assert_eq!(set.fed, vec![id(2), id(3)]);
        assert_eq!(set.audit, vec![id(1)]);
        assert!(!set.add_audit(id(1)));
    }

    #[test]
    fn test_fault_replacement_keeps_position() {
        let mut set = AuthoritySet::new([id(1), id(5), id(9)], [id(7)]);
        assert!(set.replace_fed(&id(5), id(7)));
        assert_eq!(set.fed, vec![id(1), id(7), id(9)]);
        assert_eq!(set.audit, vec![id(5)]);
        // applying the same fault twice changes nothing
        assert!(!set.replace_fed(&id(5), id(7)));
    }
}
