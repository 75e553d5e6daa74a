// Copyright (c) 2024 DCHAIN LABS

mod scenarios_catchup;
mod scenarios_faults;
mod scenarios_follower;
mod scenarios_leader;
mod scenarios_worker;
pub mod tools;
