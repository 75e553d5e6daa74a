// Copyright (c) 2024 DCHAIN LABS
//! Moves finished heights to the database: links fixed, effects applied,
//! signatures gathered, then written in height order.
use dchain_db_exports::{DBBatch, CRUD_ERROR};
use dchain_hash::Hash;
use dchain_models::{
    blocks::{AdminEntry, ECEntry, FinalizedBlock},
    messages::{DBStateMissing, DBStateMsg},
    IdentityId, Message,
};
use dchain_signature::Signature;
use tracing::{debug, error, info, warn};

use super::ConsensusState;
use crate::dbstate::DBState;

impl ConsensusState {
    /// One sweep over the unsaved states. Returns true if any state moved.
    pub(crate) fn update_state(&mut self) -> bool {
        let from = self.dbstates.highest_saved() + 1;
        let heights: Vec<u32> = self.dbstates.heights().filter(|h| *h >= from).collect();
        let mut progress = false;
        for db_height in heights {
            progress |= self.fixup_links(db_height);
            progress |= self.process_blocks(db_height);
            progress |= self.sign_db(db_height);
            progress |= self.save_dbstate(db_height);
        }
        if progress && self.dbstates.highest_saved() + 1 > self.leader_height {
            self.jump_to_saved_frontier();
        }
        progress
    }

    /// Blocks from peers passed the height being built: start over above them.
    fn jump_to_saved_frontier(&mut self) {
        let next = self.dbstates.highest_saved() + 1;
        info!("caught up to height {}, leading height {}", next - 1, next);
        self.leader_height = next;
        self.current_minute = 0;
        self.saving = true;
        self.minute_started_at = self.now();
        let limit = self.process_list_limit();
        self.process_lists.get_or_create(next, limit);
        self.mmr.advance_height(next);
    }

    /// Coinbase outputs declared at `db_height`, if it is a payout height.
    fn coinbase_outputs(&self, db_height: u32) -> Option<Vec<(IdentityId, u64)>> {
        let frequency = self.config.coinbase_payout_frequency;
        if frequency == 0
            || db_height % frequency != 0
            || db_height <= self.config.coinbase_declaration_delay
        {
            return None;
        }
        let authorities = match self.process_lists.get(db_height) {
            Some(pl) => &pl.authorities,
            None => self.process_lists.template(),
        };
        Some(
            authorities
                .all()
                .map(|identity| (*identity, self.config.coinbase_payout_amount))
                .collect(),
        )
    }

    /// Links a locally built state to its locked predecessor: entry block
    /// chain heads, coinbase, back references and directory body.
    fn fixup_links(&mut self, db_height: u32) -> bool {
        let Some(state) = self.dbstates.get(db_height) else {
            return false;
        };
        if !state.is_new {
            return false;
        }
        let Some(prev) = db_height.checked_sub(1).and_then(|h| self.dbstates.get(h)) else {
            return false;
        };
        if prev.is_new || !prev.locked {
            return false;
        }
        if self
            .process_lists
            .get(db_height)
            .map_or(false, |pl| !pl.dbsig_majority())
        {
            return false;
        }
        let prev = prev.clone();
        let coinbase = self.coinbase_outputs(db_height);
        let chain_heads = &self.chain_heads;
        let Some(state) = self.dbstates.get_mut(db_height) else {
            return false;
        };
        for entry_block in state.block.entry_blocks.iter_mut() {
            entry_block.prev_keymr = chain_heads
                .get(&entry_block.chain_id)
                .copied()
                .unwrap_or_default();
        }
        if let Some(outputs) = coinbase {
            state.block.factoid_block.coinbase = outputs.clone();
            state
                .block
                .admin_block
                .add_entry(AdminEntry::CoinbaseDescriptor { outputs });
        }
        state.link_to(&prev);
        state.is_new = false;
        debug!("fixed links of height {}: {}", db_height, state.keymr());
        true
    }

    /// Applies the effects of a linked state once its predecessor is saved,
    /// then locks it.
    fn process_blocks(&mut self, db_height: u32) -> bool {
        let Some(state) = self.dbstates.get(db_height) else {
            return false;
        };
        if state.is_new || state.locked {
            return false;
        }
        if db_height > 0 && !self.dbstates.is_saved(db_height - 1) {
            return false;
        }
        let prev_keymr = state.block.directory_block.header.prev_keymr;
        if db_height > 0 && self.saved_keymr(db_height - 1).map_or(false, |keymr| keymr != prev_keymr) {
            warn!(
                "block {} does not follow the saved block {}, dropping it",
                state.keymr(),
                db_height - 1
            );
            self.dbstates.remove_unsaved(db_height);
            return false;
        }
        let repeat = db_height <= self.processed_height;
        if !repeat {
            let block = state.block.clone();
            self.apply_block_effects(&block);
            self.processed_height = db_height;
        }
        let Some(state) = self.dbstates.get_mut(db_height) else {
            return false;
        };
        state.repeat |= repeat;
        state.locked = true;
        state.ready_to_save = true;
        true
    }

    /// Keymr of a saved height, from memory or the database.
    fn saved_keymr(&self, db_height: u32) -> Option<Hash> {
        if let Some(state) = self.dbstates.get(db_height) {
            return state.saved.then(|| state.keymr());
        }
        match self.channels.database.fetch_dblock_by_height(db_height) {
            Ok(block) => block.map(|block| block.keymr()),
            Err(err) => {
                warn!("could not read directory block {}: {}", db_height, err);
                None
            }
        }
    }

    /// Applies what a block changes outside of itself: authorities for the
    /// following heights, balances, chain heads and pending commits.
    pub(crate) fn apply_block_effects(&mut self, block: &FinalizedBlock) {
        let db_height = block.height();
        for entry in &block.admin_block.entries {
            if entry.is_authority_change() || matches!(entry, AdminEntry::ServerFault { .. }) {
                self.process_lists.apply_admin_entry(db_height + 1, entry);
            }
        }
        if db_height == 0 {
            for (address, amount) in &self.config.genesis_ec_balances {
                *self.balances.ec.entry(*address).or_insert(0) += amount;
            }
        }
        for line in &block.ec_block.entries {
            match line {
                ECEntry::CommitChain { address, credits, .. }
                | ECEntry::CommitEntry { address, credits, .. } => {
                    *self.balances.ec.entry(*address).or_insert(0) -= *credits as i64;
                }
                ECEntry::MinuteNumber(_) => {}
            }
        }
        if let Some(outputs) = block.admin_block.coinbase() {
            for (identity, amount) in outputs {
                *self.balances.factoid.entry(*identity).or_insert(0) += amount;
            }
        }
        for entry_block in &block.entry_blocks {
            self.chain_heads.insert(entry_block.chain_id, entry_block.keymr());
        }
        for entry in &block.entries {
            self.commits.remove(&entry.hash());
        }
    }

    /// Marks a locked state signed when its signatures are known to be there.
    fn sign_db(&mut self, db_height: u32) -> bool {
        let Some(state) = self.dbstates.get(db_height) else {
            return false;
        };
        if !state.locked || state.signed {
            return false;
        }
        let next_round_closed = self
            .process_lists
            .get(db_height)
            .map_or(false, |pl| pl.complete())
            && self
                .process_lists
                .get(db_height + 1)
                .map_or(false, |pl| pl.dbsigs_done);
        let signed = db_height == 0
            || state.repeat
            || state.sigs_verified
            || self.dbstates.get(db_height + 1).is_some()
            || next_round_closed;
        if !signed {
            return false;
        }
        if let Some(state) = self.dbstates.get_mut(db_height) {
            state.signed = true;
        }
        true
    }

    /// Writes a signed state once every height below is saved.
    fn save_dbstate(&mut self, db_height: u32) -> bool {
        let Some(state) = self.dbstates.get(db_height) else {
            return false;
        };
        if !state.signed || !state.ready_to_save || state.saved {
            return false;
        }
        if db_height > 0 && !self.dbstates.is_saved(db_height - 1) {
            return false;
        }
        let database = self.channels.database.clone();
        let already_written =
            state.repeat && matches!(database.fetch_dblock_by_height(db_height), Ok(Some(_)));
        let keymr = state.keymr();
        if !already_written {
            let mut batch = DBBatch::new();
            batch.add_block(state.block.clone(), state.included.iter().copied());
            if let Err(err) = database.write_batch(batch) {
                error!("could not save height {}: {}", db_height, err);
                panic!("{}: {}", CRUD_ERROR, err);
            }
        }
        self.dbstates.mark_saved(db_height);
        info!("saved height {}: {}", db_height, keymr);
        if let Err(err) = database.trim() {
            warn!("database trim failed: {}", err);
        }
        true
    }

    /// Accepts a block from peers when it is consistent, follows the saved
    /// chain and carries a majority of federated signatures.
    pub(crate) fn execute_dbstate_msg(&mut self, dbstate: DBStateMsg) {
        let db_height = dbstate.block.height();
        let keymr = dbstate.block.keymr();
        if db_height < self.dbstates.base() || self.dbstates.is_saved(db_height) {
            return;
        }
        if db_height > self.process_list_limit() {
            debug!("block at height {} is past the lookahead", db_height);
            return;
        }
        if let Some(existing) = self.dbstates.get(db_height) {
            if existing.locked || existing.keymr() == keymr {
                return;
            }
        }
        if let Err(err) = dbstate.block.check_consistency() {
            debug!("inconsistent block {} at height {}: {}", keymr, db_height, err);
            return self.mark_invalid(&Message::DBState(dbstate));
        }
        if db_height > 0 {
            let prev_keymr = dbstate.block.directory_block.header.prev_keymr;
            if self
                .saved_keymr(db_height - 1)
                .map_or(false, |saved| saved != prev_keymr)
            {
                return self.mark_invalid(&Message::DBState(dbstate));
            }
        }
        if !self.has_signature_majority(db_height, &keymr, &dbstate.signatures) {
            return self.mark_invalid(&Message::DBState(dbstate));
        }
        if db_height > self.dbstates.highest_saved().saturating_add(self.config.catchup_max_range) {
            self.holding.insert(Message::DBState(dbstate));
            return;
        }
        debug!("received block {} at height {}", keymr, db_height);
        let DBStateMsg {
            block, signatures, ..
        } = dbstate;
        self.dbstates.put(DBState::from_network(*block, signatures));
    }

    /// True if more than half of the federated servers that sign `db_height`
    /// signed `keymr`. They sit in the process list of the next height.
    fn has_signature_majority(
        &self,
        db_height: u32,
        keymr: &Hash,
        signatures: &[(IdentityId, Signature)],
    ) -> bool {
        let Some(signing_height) = db_height.checked_add(1) else {
            return false;
        };
        let authorities = self.process_lists.authorities_at(signing_height);
        let mut signers: Vec<&IdentityId> = signatures
            .iter()
            .filter(|(identity, signature)| {
                authorities.is_fed(identity)
                    && self
                        .channels
                        .authorities
                        .verify_signature(identity, keymr, signature, signing_height)
            })
            .map(|(identity, _)| identity)
            .collect();
        signers.sort_unstable();
        signers.dedup();
        !authorities.fed.is_empty() && signers.len() * 2 > authorities.fed.len()
    }

    /// Signatures vouching for saved height `db_height`.
    fn block_signatures(&self, db_height: u32) -> Vec<(IdentityId, Signature)> {
        if let Ok(Some(next)) = self.channels.database.fetch_block_by_height(db_height + 1) {
            return next
                .admin_block
                .entries
                .iter()
                .filter_map(|entry| match entry {
                    AdminEntry::DBSignature {
                        identity,
                        signature,
                    } => Some((*identity, *signature)),
                    _ => None,
                })
                .collect();
        }
        self.process_lists
            .get(db_height + 1)
            .map(|pl| pl.dbsigs.clone())
            .unwrap_or_default()
    }

    /// Sends saved blocks of the requested range.
    pub(crate) fn answer_dbstate_missing(&mut self, request: DBStateMissing) {
        let range = self.config.catchup_max_range.max(1);
        let end = request
            .end
            .min(self.dbstates.highest_saved())
            .min(request.start.saturating_add(range - 1));
        let now = self.now();
        for db_height in request.start..=end {
            let block = match self.channels.database.fetch_block_by_height(db_height) {
                Ok(Some(block)) => block,
                Ok(None) => break,
                Err(err) => {
                    warn!("could not read block {}: {}", db_height, err);
                    break;
                }
            };
            let signatures = self.block_signatures(db_height);
            self.channels.network.send_out(Message::DBState(DBStateMsg {
                timestamp: now,
                block: Box::new(block),
                signatures,
            }));
        }
    }

    /// Asks peers for the heights between the saved frontier and the
    /// highest known height, at most once per `catchup_request_interval`.
    pub(crate) fn catchup(&mut self) {
        let now = self.now();
        if let Some(last) = self.last_catchup {
            if now.saturating_sub(last) < self.config.catchup_request_interval {
                return;
            }
        }
        let highest_known = self.highest_known();
        let start = match self.dbstates.first_gap() {
            Some(gap) => gap,
            None if highest_known > self.leader_height => self.dbstates.highest_saved() + 1,
            None => return,
        };
        let end = highest_known.min(start.saturating_add(self.config.catchup_max_range.max(1) - 1));
        if end < start {
            return;
        }
        debug!("asking peers for heights {} to {}", start, end);
        self.channels.network.send_out(Message::DBStateMissing(DBStateMissing {
            timestamp: now,
            start,
            end,
        }));
        self.last_catchup = Some(now);
    }
}
