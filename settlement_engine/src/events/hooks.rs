use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::task::JoinHandle;

use crate::{
    config::SettlementConfig,
    events::{EventHandler, EventProducer, Handler, HandlerReport, OrderSettledEvent},
};

/// The publishing side handed to [`crate::SettlementApi`]. Empty by default, in which case nothing is published.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_settled_producer: Vec<EventProducer<OrderSettledEvent>>,
}

impl EventProducers {
    pub fn is_empty(&self) -> bool {
        self.order_settled_producer.is_empty()
    }

    pub async fn publish_order_settled(&self, event: OrderSettledEvent) {
        for producer in &self.order_settled_producer {
            producer.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_order_settled: Option<EventHandler<OrderSettledEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_order_settled = hooks.on_order_settled.map(|f| EventHandler::new("order settled", buffer_size, f));
        Self { on_order_settled }
    }

    pub fn from_config(config: &SettlementConfig, hooks: EventHooks) -> Self {
        Self::new(config.event_buffer_size, hooks)
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_settled {
            result.order_settled_producer.push(handler.subscribe());
        }
        result
    }

    /// Spawns a task per registered hook. Each task finishes once every producer for it has been dropped.
    pub fn start_handlers(self) -> Vec<JoinHandle<HandlerReport>> {
        let mut tasks = Vec::new();
        if let Some(handler) = self.on_order_settled {
            debug!("📬️ Spawning the {} handler", handler.name());
            tasks.push(tokio::spawn(handler.start_handler()));
        }
        tasks
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_settled: Option<Handler<OrderSettledEvent>>,
}

impl EventHooks {
    pub fn on_order_settled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderSettledEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_settled = Some(Arc::new(f));
        self
    }
}
