use std::{pin::Pin, sync::Arc};

use crate::events::{EventHandler, EventProducer, GroupCompletedEvent, Handler, RefundIssuedEvent};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub group_completed_producer: Vec<EventProducer<GroupCompletedEvent>>,
    pub refund_issued_producer: Vec<EventProducer<RefundIssuedEvent>>,
}

pub struct EventHandlers {
    pub on_group_completed: Option<EventHandler<GroupCompletedEvent>>,
    pub on_refund_issued: Option<EventHandler<RefundIssuedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_group_completed = hooks.on_group_completed.map(|f| EventHandler::new(buffer_size, f));
        let on_refund_issued = hooks.on_refund_issued.map(|f| EventHandler::new(buffer_size, f));
        Self { on_group_completed, on_refund_issued }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_group_completed {
            result.group_completed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_refund_issued {
            result.refund_issued_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_group_completed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_refund_issued {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_group_completed: Option<Handler<GroupCompletedEvent>>,
    pub on_refund_issued: Option<Handler<RefundIssuedEvent>>,
}

impl EventHooks {
    pub fn on_group_completed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(GroupCompletedEvent) -> Pin<Box<dyn std::future::Future<Output = ()> + Send>>) + Send + Sync + 'static
    {
        self.on_group_completed = Some(Arc::new(f));
        self
    }

    pub fn on_refund_issued<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(RefundIssuedEvent) -> Pin<Box<dyn std::future::Future<Output = ()> + Send>>) + Send + Sync + 'static
    {
        self.on_refund_issued = Some(Arc::new(f));
        self
    }
}
