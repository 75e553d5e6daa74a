// Copyright (c) 2024 DCHAIN LABS
use std::{
    sync::{atomic::AtomicBool, Arc},
    thread::{self, JoinHandle},
};

use dchain_channel::{receiver::DChainReceiver, DChainChannel};
use dchain_consensus_exports::{
    error::ConsensusError, ConsensusChannels, ConsensusConfig, ConsensusController,
    ConsensusManager,
};
use dchain_models::{messages::DBStateMsg, Ack, Message};
use parking_lot::{Mutex, RwLock};

use crate::{
    commands::ConsensusCommand,
    controller::ConsensusControllerImpl,
    manager::ConsensusManagerImpl,
    mmr::{ask_delay, mmr_channels, start_mmr_thread},
    replay::ReplayFilter,
    state::{ConsensusState, ConsensusStatus},
};

mod main_loop;

/// The consensus driver thread: drains the inbound queues into the state and
/// runs its passes.
pub struct ConsensusWorker {
    command_receiver: DChainReceiver<ConsensusCommand>,
    msg_receiver: DChainReceiver<Message>,
    ack_receiver: DChainReceiver<Ack>,
    dbstate_receiver: DChainReceiver<DBStateMsg>,
    state: ConsensusState,
    mmr_thread: Option<JoinHandle<()>>,
}

/// Create a new consensus worker thread.
///
/// The state is loaded from the database before the thread starts, so a
/// broken database is reported here.
///
/// # Arguments:
/// * `config`: Configuration of the consensus
/// * `channels`: Collaborators of the driver (network, authorities, database, clock)
///
/// # Returns:
/// * The consensus controller to communicate with the consensus worker thread
/// * The consensus manager to manage the consensus worker thread
pub fn start_consensus_worker(
    config: ConsensusConfig,
    channels: ConsensusChannels,
) -> Result<(Box<dyn ConsensusController>, Box<dyn ConsensusManager>), ConsensusError> {
    if config.block_time.to_millis() < 10 {
        return Err(ConsensusError::InvalidConfig(format!(
            "block time of {} ms is too short",
            config.block_time.to_millis()
        )));
    }
    let replay = Arc::new(Mutex::new(ReplayFilter::new(config.replay_range_minutes)));
    let status = Arc::new(RwLock::new(ConsensusStatus::default()));
    let dbstate_flood = Arc::new(AtomicBool::new(false));

    let (mmr_senders, mmr_receivers) = mmr_channels();
    let mmr_thread = start_mmr_thread(
        mmr_receivers,
        channels.network.clone(),
        channels.clock.clone(),
        config.identity.as_ref().map(|node| node.identity),
        ask_delay(config.block_time),
        config.lookahead_heights,
    );

    let clock = channels.clock.clone();
    let state = ConsensusState::new(
        config.clone(),
        channels,
        mmr_senders,
        replay.clone(),
        status.clone(),
        dbstate_flood.clone(),
    )?;

    let (command_sender, command_receiver) =
        DChainChannel::new("consensus_command".to_string(), Some(config.command_queue_size));
    let (msg_sender, msg_receiver) =
        DChainChannel::new("consensus_msg".to_string(), Some(config.msg_queue_size));
    let (ack_sender, ack_receiver) =
        DChainChannel::new("consensus_ack".to_string(), Some(config.ack_queue_size));
    let (dbstate_sender, dbstate_receiver) =
        DChainChannel::new("consensus_dbstate".to_string(), Some(config.dbstate_queue_size));

    let worker = ConsensusWorker {
        command_receiver,
        msg_receiver,
        ack_receiver,
        dbstate_receiver,
        state,
        mmr_thread: Some(mmr_thread),
    };
    let consensus_thread = thread::Builder::new()
        .name("consensus-worker".into())
        .spawn(move || worker.run())
        .expect("OS failed to start consensus worker thread");

    let controller = ConsensusControllerImpl::new(
        command_sender.clone(),
        msg_sender,
        ack_sender,
        dbstate_sender,
        status,
        replay,
        clock,
        config.queue_policy,
        dbstate_flood,
        config.query_timeout,
    );
    let manager = ConsensusManagerImpl {
        consensus_thread: Some((command_sender, consensus_thread)),
    };

    Ok((Box::new(controller), Box::new(manager)))
}
