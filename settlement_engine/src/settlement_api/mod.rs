//! # Settlement API
//!
//! The `settlement_api` module is the public face of the settlement core.
//!
//! * [`settlement_flow_api`] holds [`SettlementApi`], which takes a gateway notification from payload to committed
//!   order state.
//! * [`order_resolver`] maps a notification onto an order.
//! * [`line_item_resolver`] decides which items a paid order takes out of stock.
//! * [`notification`] parses and validates the gateway payload.
//!
//! # API usage
//!
//! An API instance is created by supplying a database backend that implements the store traits.
//!
//! ```rust,ignore
//! use settlement_engine::{events::{EventHandlers, EventHooks}, SettlementApi, SettlementConfig, SqliteDatabase};
//! let config = SettlementConfig::from_env_or_default();
//! let db = SqliteDatabase::new(&config).await?;
//! let mut hooks = EventHooks::default();
//! hooks.on_order_settled(|ev| Box::pin(async move { send_receipt(ev).await }));
//! let handlers = EventHandlers::from_config(&config, hooks);
//! let api = SettlementApi::new(db, &config, handlers.producers());
//! let _tasks = handlers.start_handlers();
//! let outcome = api.settle_json(payload).await?;
//! ```
pub mod errors;
pub mod line_item_resolver;
pub mod notification;
pub mod order_resolver;
pub mod settlement_flow_api;
pub mod settlement_objects;

pub use settlement_flow_api::SettlementApi;
