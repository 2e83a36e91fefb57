use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::events::{CheckoutCreatedEvent, EventHandler, EventProducer, Handler, PaymentStatusChangedEvent};

/// The subscriber functions the host application wants wired in, declared before startup.
/// Each hook becomes one [`EventHandler`] with its own channel.
#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_status_changed: Option<Handler<PaymentStatusChangedEvent>>,
    pub on_checkout_created: Option<Handler<CheckoutCreatedEvent>>,
}

impl EventHooks {
    pub fn on_status_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentStatusChangedEvent) -> BoxFuture<'static, ()>) + Send + Sync + 'static {
        self.on_status_changed = Some(Arc::new(f));
        self
    }

    pub fn on_checkout_created<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(CheckoutCreatedEvent) -> BoxFuture<'static, ()>) + Send + Sync + 'static {
        self.on_checkout_created = Some(Arc::new(f));
        self
    }
}

/// The channel-owning side of the bus, built once from [`EventHooks`]. Call [`producers`] for
/// the sending halves before [`start_handlers`] consumes this and spawns the receive loops.
///
/// [`producers`]: EventHandlers::producers
/// [`start_handlers`]: EventHandlers::start_handlers
pub struct EventHandlers {
    pub on_status_changed: Option<EventHandler<PaymentStatusChangedEvent>>,
    pub on_checkout_created: Option<EventHandler<CheckoutCreatedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        Self {
            on_status_changed: hooks.on_status_changed.map(|f| EventHandler::new(buffer_size, f)),
            on_checkout_created: hooks.on_checkout_created.map(|f| EventHandler::new(buffer_size, f)),
        }
    }

    pub fn producers(&self) -> EventProducers {
        EventProducers {
            status_changed_producer: self.on_status_changed.iter().map(EventHandler::subscribe).collect(),
            checkout_created_producer: self.on_checkout_created.iter().map(EventHandler::subscribe).collect(),
        }
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_status_changed {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_checkout_created {
            tokio::spawn(handler.start_handler());
        }
    }
}

/// Cloneable bundle of sending halves, one clone per API instance. Publishing to an event type
/// nobody subscribed to is a no-op.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub status_changed_producer: Vec<EventProducer<PaymentStatusChangedEvent>>,
    pub checkout_created_producer: Vec<EventProducer<CheckoutCreatedEvent>>,
}
