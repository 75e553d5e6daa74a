// Copyright (c) 2024 DCHAIN LABS
use dchain_time::ChainTime;
use tracing::debug;

use super::ConsensusState;

impl ConsensusState {
    /// Every `holding_review_interval`, drops held messages that left the
    /// replay window or refer to heights long saved, and executes the others
    /// again.
    pub(crate) fn review_holding(&mut self) {
        let now = self.now();
        if now.saturating_sub(self.last_review) < self.config.holding_review_interval {
            return;
        }
        self.last_review = now;
        let highest_saved = self.dbstates.highest_saved();
        let window = ChainTime::from_minutes(self.config.replay_range_minutes);
        let max_age = self.config.holding_max_age_heights;

        for message in self.holding.take_all() {
            let too_old = now.abs_diff(message.timestamp()) > window;
            let height_passed = message
                .db_height()
                .map_or(false, |height| height.saturating_add(max_age) <= highest_saved);
            if too_old || height_passed {
                debug!("dropping held {} message {}", message.kind(), message.msg_hash());
                continue;
            }
            self.execute_msg(message);
        }
        self.holding.prune_dependents();
        self.acks.retain(|_, ack| ack.db_height > highest_saved);
    }
}
