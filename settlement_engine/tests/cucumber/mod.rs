mod setups;
mod steps;
mod world;

pub use world::{SettlementSystem, SettlementWorld};
