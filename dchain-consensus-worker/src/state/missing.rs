// Copyright (c) 2024 DCHAIN LABS
use dchain_models::{
    messages::{MissingMsg, MissingMsgResponse},
    Message,
};
use tracing::debug;

use super::ConsensusState;

impl ConsensusState {
    /// Sends the requested slots found in the process lists. Returns the
    /// slot heights that could not be answered.
    fn answer_from_lists(&self, request: &MissingMsg) -> Vec<u32> {
        let Some(pl) = self.process_lists.get(request.db_height) else {
            return request.heights.clone();
        };
        let now = self.now();
        let mut unanswered = Vec::new();
        for height in &request.heights {
            match pl.get_slot(request.vm_index, *height as usize) {
                Some((ack, message)) => {
                    self.channels
                        .network
                        .send_out(Message::MissingMsgResponse(MissingMsgResponse {
                            timestamp: now,
                            ack: ack.clone(),
                            message: Box::new(message.clone()),
                        }))
                }
                None => unanswered.push(*height),
            }
        }
        unanswered
    }

    /// Answers a missing message request. What is not known yet is retried
    /// until `missing_response_delay_max` when the request is about the
    /// heights being built.
    pub(crate) fn answer_missing(&mut self, request: MissingMsg) {
        if request.db_height > self.process_list_limit() {
            debug!("missing message request past the lookahead, height {}", request.db_height);
            return;
        }
        if let (Some(asker), Some(me)) = (&request.asker, &self.config.identity) {
            if *asker == me.identity {
                return;
            }
        }
        let unanswered = self.answer_from_lists(&request);
        if unanswered.is_empty() {
            return;
        }
        if self.deferred_missing.len() >= self.config.missing_response_max_pending
            || request.db_height.saturating_add(1) < self.leader_height
        {
            debug!(
                "cannot answer {} slots of vm {} at height {}",
                unanswered.len(),
                request.vm_index,
                request.db_height
            );
            return;
        }
        let deadline = self
            .now()
            .saturating_add(self.config.missing_response_delay_max);
        self.deferred_missing.push_back((
            deadline,
            MissingMsg {
                heights: unanswered,
                ..request
            },
        ));
    }

    /// Tries the deferred requests again, dropping the expired ones.
    pub(crate) fn retry_deferred_missing(&mut self) {
        if self.deferred_missing.is_empty() {
            return;
        }
        let now = self.now();
        let pending = std::mem::take(&mut self.deferred_missing);
        for (deadline, request) in pending {
            if deadline < now {
                continue;
            }
            let unanswered = self.answer_from_lists(&request);
            if !unanswered.is_empty() {
                self.deferred_missing.push_back((
                    deadline,
                    MissingMsg {
                        heights: unanswered,
                        ..request
                    },
                ));
            }
        }
    }
}
