// Copyright (c) 2024 DCHAIN LABS
//! DChain devnet node: one consensus driver over an in-memory database,
//! its outbound messages looped back to it.
#![warn(unused_crate_dependencies)]

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::RecvTimeoutError;
use dchain_channel::DChainChannel;
use dchain_consensus_exports::{
    ChannelNetworkController, ConsensusChannels, ConsensusController, ConsensusManager,
    StaticAuthorityRegistry,
};
use dchain_consensus_worker::start_consensus_worker;
use dchain_db_worker::MemoryDB;
use dchain_models::Message;
use dchain_time::SystemClock;
use tracing::{info, warn};
use tracing_subscriber::{filter::LevelFilter, prelude::*};

use crate::{
    loopback::start_loopback,
    node_config::{consensus_config, db_config},
    settings::{build_settings, Settings, OVERRIDE_CONFIG_PATH, SETTINGS},
};

mod loopback;
mod node_config;
mod settings;

#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Base configuration file, replaces `base_config/config.toml`
    #[arg(long)]
    config: Option<String>,
    /// Run without signing, only following the federation
    #[arg(long)]
    follower: bool,
}

fn log_level(level: usize) -> LevelFilter {
    match level {
        0 => LevelFilter::ERROR,
        1 => LevelFilter::WARN,
        2 => LevelFilter::INFO,
        3 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

struct Node {
    controller: Box<dyn ConsensusController>,
    manager: Box<dyn ConsensusManager>,
    loopback: std::thread::JoinHandle<()>,
}

fn launch(settings: &Settings, follower: bool) -> Result<Node> {
    let config = consensus_config(settings, follower)?;
    match &config.identity {
        Some(identity) => info!("signing as {}", identity.identity),
        None => info!("running as a follower"),
    }

    let (outbound_sender, outbound_receiver) =
        DChainChannel::new::<Message>("network_loopback".to_string(), None);
    let channels = ConsensusChannels {
        network: Box::new(ChannelNetworkController::new(
            outbound_sender,
            config.queue_policy,
        )),
        authorities: Arc::new(StaticAuthorityRegistry::new(
            config.genesis_authorities.clone(),
        )),
        database: Arc::new(MemoryDB::new(db_config(settings))),
        clock: Arc::new(SystemClock::new()),
        invalid_message_sender: None,
    };
    let (controller, manager) =
        start_consensus_worker(config, channels).context("could not start consensus worker")?;
    let loopback = start_loopback(outbound_receiver, controller.clone());
    Ok(Node {
        controller,
        manager,
        loopback,
    })
}

fn stop(node: Node) {
    let Node {
        controller,
        mut manager,
        loopback,
    } = node;
    manager.stop();
    drop(controller);
    if loopback.join().is_err() {
        warn!("network loopback thread panicked");
    }
    info!("node stopped");
}

fn run(args: Args) -> Result<()> {
    let settings = match &args.config {
        Some(path) => build_settings(path, OVERRIDE_CONFIG_PATH)
            .with_context(|| format!("failed to read the node configuration {}", path))?,
        None => SETTINGS.clone(),
    };

    let tracing_layer =
        tracing_subscriber::fmt::layer().with_filter(log_level(settings.logging.level));
    tracing_subscriber::registry().with(tracing_layer).init();

    let node = launch(&settings, args.follower)?;

    let (stop_sender, stop_receiver) = crossbeam_channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = stop_sender.try_send(());
    })
    .context("failed to set the interrupt handler")?;

    let status_interval = Duration::from_millis(settings.node.status_interval.to_millis());
    loop {
        match stop_receiver.recv_timeout(status_interval) {
            Ok(()) => {
                info!("interrupt signal received");
                break;
            }
            Err(RecvTimeoutError::Timeout) => info!(
                "saved {} / known {} / building {}",
                node.controller.get_highest_saved_blk(),
                node.controller.get_highest_known_block(),
                node.controller.get_leader_height()
            ),
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    stop(node);
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    // run the default hook, then shut down
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        default_panic(info);
        std::process::exit(1);
    }));

    run(args)
}
