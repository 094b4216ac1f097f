//! Synchronous publish/subscribe between the exchange and the strategies.
//!
//! A bar produces three events, always in this order:
//!
//! | Topic               | Payload                    | When                          |
//! |---------------------|----------------------------|-------------------------------|
//! | `NewHourStarted`    | open price and open time   | before matching               |
//! | `OrdersExecuted`    | filled orders              | after matching, if any filled |
//! | `CurrentHourEnded`  | the whole candle           | after matching                |
//!
//! Publishing runs every live subscriber of the topic to completion, in subscription order.
//! Handlers get the exchange by mutable reference. An order placed on `NewHourStarted` is
//! matched against the same bar; one placed on `OrdersExecuted` or `CurrentHourEnded` is
//! matched against the next bar.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use chrono::{DateTime, Utc};

use crate::{
    engine::{Candle, Exchange, Order},
    errors::Result,
};

/// The three event kinds a bar produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// A bar opened.
    NewHourStarted,
    /// Resting orders were filled.
    OrdersExecuted,
    /// A bar closed.
    CurrentHourEnded,
}

impl Topic {
    /// Every topic, in publication order.
    pub const ALL: [Topic; 3] = [Topic::NewHourStarted, Topic::OrdersExecuted, Topic::CurrentHourEnded];
}

/// Payload of a published event.
#[derive(Debug, Clone, Copy)]
pub enum Event<'a> {
    /// A bar opened at `open_price`.
    NewHourStarted {
        /// Open price of the bar.
        open_price: f64,
        /// Open time of the bar.
        open_time: DateTime<Utc>,
    },
    /// Orders filled during the bar, in fill order.
    OrdersExecuted(&'a [Order]),
    /// The bar closed.
    CurrentHourEnded(&'a Candle),
}

impl Event<'_> {
    /// Returns the topic the event is published on.
    pub fn topic(&self) -> Topic {
        match self {
            Self::NewHourStarted { .. } => Topic::NewHourStarted,
            Self::OrdersExecuted(_) => Topic::OrdersExecuted,
            Self::CurrentHourEnded(_) => Topic::CurrentHourEnded,
        }
    }
}

/// Receiver of bus events.
pub trait Subscriber {
    /// Handles one event. An error stops the dispatch and the run.
    fn on_event(&mut self, event: &Event<'_>, exchange: &mut Exchange) -> Result<()>;
}

struct FnSubscriber<F>(F);

impl<F> Subscriber for FnSubscriber<F>
where
    F: FnMut(&Event<'_>, &mut Exchange) -> Result<()>,
{
    fn on_event(&mut self, event: &Event<'_>, exchange: &mut Exchange) -> Result<()> {
        (self.0)(event, exchange)
    }
}

/// Handle on a registration. Clones share the same liveness flag.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: usize,
    live: Rc<Cell<bool>>,
}

impl Subscription {
    /// Identifier of the registration, unique per bus.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Returns `false` once cancelled.
    pub fn is_active(&self) -> bool {
        self.live.get()
    }

    /// Stops every future delivery, including later ones in a dispatch already running.
    pub fn cancel(&self) {
        self.live.set(false);
    }
}

struct Entry {
    topics: Vec<Topic>,
    subscription: Subscription,
    subscriber: Rc<RefCell<dyn Subscriber>>,
}

/// In-process event bus. Build one per run.
#[derive(Default)]
pub struct EventBus {
    entries: Vec<Entry>,
    next_id: usize,
}

impl EventBus {
    /// Creates a bus without subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `subscriber` for `topics`.
    pub fn subscribe(&mut self, topics: &[Topic], subscriber: Rc<RefCell<dyn Subscriber>>) -> Subscription {
        let subscription = Subscription {
            id: self.next_id,
            live: Rc::new(Cell::new(true)),
        };
        self.next_id += 1;

        self.entries.push(Entry {
            topics: topics.to_vec(),
            subscription: subscription.clone(),
            subscriber,
        });

        subscription
    }

    /// Registers a closure for `topics`.
    pub fn subscribe_fn<F>(&mut self, topics: &[Topic], handler: F) -> Subscription
    where
        F: FnMut(&Event<'_>, &mut Exchange) -> Result<()> + 'static,
    {
        self.subscribe(topics, Rc::new(RefCell::new(FnSubscriber(handler))))
    }

    /// Returns the number of live subscribers of `topic`.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.subscription.is_active() && entry.topics.contains(&topic))
            .count()
    }

    /// Delivers `event` to every live subscriber of its topic.
    ///
    /// Liveness is checked right before each call, so a handler cancelled earlier in the same
    /// dispatch is skipped. Cancelled entries are dropped once the dispatch is over.
    pub fn publish(&mut self, event: &Event<'_>, exchange: &mut Exchange) -> Result<()> {
        let topic = event.topic();

        for entry in &self.entries {
            if !entry.subscription.is_active() || !entry.topics.contains(&topic) {
                continue;
            }
            entry.subscriber.borrow_mut().on_event(event, exchange)?;
        }

        self.entries.retain(|entry| entry.subscription.is_active());
        Ok(())
    }
}
