use std::{collections::HashMap, fmt::Debug};

use cucumber::World;
use log::*;
use settlement_engine::{
    db_types::{ItemId, Money, Order, VoucherId},
    events::EventProducers,
    test_utils::{create_database, random_db_path, run_migrations},
    SettlementApi,
    SettlementConfig,
    SettlementError,
    SettlementOutcome,
    SqliteDatabase,
};

#[derive(Default, Debug, World)]
pub struct SettlementWorld {
    pub system: Option<SettlementSystem>,
    pub items: HashMap<String, ItemId>,
    pub vouchers: HashMap<String, VoucherId>,
    /// Running subtotal of each customer's working selection
    pub selections: HashMap<i64, Money>,
    pub orders: HashMap<String, Order>,
    pub last_result: Option<Result<SettlementOutcome, SettlementError>>,
}

pub struct SettlementSystem {
    pub db_path: String,
    pub api: SettlementApi<SqliteDatabase>,
}

impl Debug for SettlementSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettlementSystem({})", self.db_path)
    }
}

impl SettlementWorld {
    pub fn api(&self) -> &SettlementApi<SqliteDatabase> {
        &self.system.as_ref().expect("SettlementApi not initialised").api
    }

    pub fn db(&self) -> &SqliteDatabase {
        self.api().db()
    }

    pub fn item_id(&self, name: &str) -> ItemId {
        *self.items.get(name).unwrap_or_else(|| panic!("No item called {name}"))
    }

    pub fn voucher_id(&self, code: &str) -> VoucherId {
        *self.vouchers.get(code).unwrap_or_else(|| panic!("No voucher called {code}"))
    }

    pub fn order(&self, name: &str) -> &Order {
        self.orders.get(name).unwrap_or_else(|| panic!("No order called {name}"))
    }

    pub fn last_result(&self) -> &Result<SettlementOutcome, SettlementError> {
        self.last_result.as_ref().expect("No notification has been settled yet")
    }
}

impl SettlementSystem {
    pub async fn new() -> Self {
        Self::with_config(SettlementConfig::default()).await
    }

    pub async fn strict() -> Self {
        Self::with_config(SettlementConfig::default().with_fallbacks(false, false)).await
    }

    async fn with_config(config: SettlementConfig) -> Self {
        let url = prepare_test_env().await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
        debug!("Created database: {url}");
        let api = SettlementApi::new(db, &config, EventProducers::default());
        Self { db_path: url, api }
    }
}

pub async fn prepare_test_env() -> String {
    let path = random_db_path();
    create_database(&path).await;
    run_migrations(&path).await;
    path
}
