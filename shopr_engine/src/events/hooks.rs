use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{BidAwardedEvent, BiddingClosedEvent, EventHandler, EventProducer, Handler, ReviewRecordedEvent};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub bid_awarded_producer: Vec<EventProducer<BidAwardedEvent>>,
    pub review_recorded_producer: Vec<EventProducer<ReviewRecordedEvent>>,
    pub bidding_closed_producer: Vec<EventProducer<BiddingClosedEvent>>,
}

pub struct EventHandlers {
    pub on_bid_awarded: Option<EventHandler<BidAwardedEvent>>,
    pub on_review_recorded: Option<EventHandler<ReviewRecordedEvent>>,
    pub on_bidding_closed: Option<EventHandler<BiddingClosedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_bid_awarded = hooks.on_bid_awarded.map(|f| EventHandler::new(buffer_size, f));
        let on_review_recorded = hooks.on_review_recorded.map(|f| EventHandler::new(buffer_size, f));
        let on_bidding_closed = hooks.on_bidding_closed.map(|f| EventHandler::new(buffer_size, f));
        Self { on_bid_awarded, on_review_recorded, on_bidding_closed }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_bid_awarded {
            result.bid_awarded_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_review_recorded {
            result.review_recorded_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_bidding_closed {
            result.bidding_closed_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_bid_awarded {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_review_recorded {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_bidding_closed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_bid_awarded: Option<Handler<BidAwardedEvent>>,
    pub on_review_recorded: Option<Handler<ReviewRecordedEvent>>,
    pub on_bidding_closed: Option<Handler<BiddingClosedEvent>>,
}

impl EventHooks {
    pub fn on_bid_awarded<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(BidAwardedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_bid_awarded = Some(Arc::new(f));
        self
    }

    pub fn on_review_recorded<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(ReviewRecordedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_review_recorded = Some(Arc::new(f));
        self
    }

    pub fn on_bidding_closed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(BiddingClosedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_bidding_closed = Some(Arc::new(f));
        self
    }
}
