//! Strategy runtime and the bundled trading policies.
//!
//! A [`Trader`] wraps a [`Policy`] and takes care of everything the policies share: the
//! activity window, the statistics and the bus subscription. Policies only decide which
//! orders to place.
//!
//! | Policy                     | Idea                                                        |
//! |----------------------------|-------------------------------------------------------------|
//! | [`BalancePolicy`]          | Keep the base coins at half of the net worth                |
//! | [`AssetsAllocationPolicy`] | Allocation table keyed by the deviation from a moving average |
//! | [`GridPolicy`]             | Ladder of buy and sell orders between two prices            |

mod assets_allocation;
mod balance;
mod grid;

use std::{cell::RefCell, rc::Rc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    engine::{Candle, Exchange, Order},
    errors::{Error, Result},
    events::{Event, EventBus, Subscriber, Subscription, Topic},
    statistics::TradingStatistic,
};

pub use assets_allocation::*;
pub use balance::*;
pub use grid::*;

/// Dates bounding the activity of a strategy, both inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityWindow {
    /// Bars opening before this date are ignored.
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    /// The strategy stops on the first bar opening after this date.
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}

impl ActivityWindow {
    fn has_started(&self, date: DateTime<Utc>) -> bool {
        self.start_date.is_none_or(|start| start <= date)
    }

    fn has_ended(&self, date: DateTime<Utc>) -> bool {
        self.end_date.is_some_and(|end| end < date)
    }
}

/// What a policy can see and touch from a hook.
pub struct Context<'a> {
    /// The exchange, to read balances and place or cancel orders.
    pub exchange: &'a mut Exchange,
    /// Figures collected so far.
    pub statistic: &'a TradingStatistic,
}

/// Trading decisions of a strategy.
pub trait Policy {
    /// Display name of the strategy.
    fn name(&self) -> &'static str;

    /// Dates bounding the activity.
    fn activity_window(&self) -> ActivityWindow;

    /// A bar opened at `open_price`. Orders placed here can fill on the same bar.
    fn on_new_hour_started(&mut self, ctx: &mut Context<'_>, open_price: f64, open_time: DateTime<Utc>) -> Result<()>;

    /// Resting orders were filled.
    fn on_orders_executed(&mut self, _ctx: &mut Context<'_>, _orders: &[Order]) -> Result<()> {
        Ok(())
    }

    /// A bar closed.
    fn on_current_hour_ended(&mut self, _ctx: &mut Context<'_>, _candle: &Candle) -> Result<()> {
        Ok(())
    }

    /// A bar closed before the start date. Lets indicators fill their window.
    fn warm_up(&mut self, _candle: &Candle) -> Result<()> {
        Ok(())
    }
}

/// Strategy runtime: statistics, activity window and bus plumbing around a [`Policy`].
#[derive(Debug)]
pub struct Trader<P> {
    policy: P,
    window: ActivityWindow,
    statistic: TradingStatistic,
    subscription: Option<Subscription>,
    bar_in_window: bool,
    stopped: bool,
}

impl<P: Policy + 'static> Trader<P> {
    /// Creates the runtime.
    ///
    /// ### Returns
    /// [`Error::ZeroInitialBalance`] when the exchange holds neither base nor quote coins.
    pub fn new(exchange: &Exchange, policy: P) -> Result<Self> {
        let pair = exchange.pair();
        if exchange.total_base_coins() == 0.0 && exchange.total_quoted_coins() == 0.0 {
            return Err(Error::ZeroInitialBalance(pair.base().to_string(), pair.quote().to_string()));
        }

        Ok(Self {
            window: policy.activity_window(),
            policy,
            statistic: TradingStatistic::new(pair.clone()),
            subscription: None,
            bar_in_window: false,
            stopped: false,
        })
    }

    /// Subscribes the runtime to every topic of `bus`.
    pub fn attach(self, bus: &mut EventBus) -> Rc<RefCell<Self>> {
        let name = self.policy.name();
        let trader = Rc::new(RefCell::new(self));
        let subscription = bus.subscribe(&Topic::ALL, trader.clone());
        trader.borrow_mut().subscription = Some(subscription);

        debug!(strategy = name, "Strategy attached");
        trader
    }

    /// Records the final balances once the run is over.
    pub fn finish(&mut self, exchange: &Exchange) {
        self.statistic
            .set_final_balances(exchange.total_base_coins(), exchange.total_quoted_coins());
    }
}

impl<P: Policy> Trader<P> {
    /// Returns the policy.
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Returns the collected statistic.
    pub fn statistic(&self) -> &TradingStatistic {
        &self.statistic
    }

    /// Returns `true` once the end date was passed.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    fn stop(&mut self, exchange: &mut Exchange) -> Result<()> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;

        exchange.cancel_all_orders()?;
        if let Some(subscription) = &self.subscription {
            subscription.cancel();
        }

        info!(strategy = self.policy.name(), "End date passed, strategy stopped");
        Ok(())
    }

    fn on_new_hour_started(&mut self, exchange: &mut Exchange, open_price: f64, open_time: DateTime<Utc>) -> Result<()> {
        self.bar_in_window = false;

        if self.stopped || !self.window.has_started(open_time) {
            return Ok(());
        }

        if self.window.has_ended(open_time) {
            return self.stop(exchange);
        }
        self.bar_in_window = true;

        if self.statistic.started_at().is_none() {
            self.statistic.set_started_at(open_time)?;
            self.statistic.set_first_processed_price(open_price)?;
        }
        self.statistic.set_last_processed(open_time, open_price);

        let mut ctx = Context {
            exchange,
            statistic: &self.statistic,
        };
        self.policy.on_new_hour_started(&mut ctx, open_price, open_time)
    }

    fn on_orders_executed(&mut self, exchange: &mut Exchange, orders: &[Order]) -> Result<()> {
        if !self.bar_in_window {
            return Ok(());
        }

        self.statistic.add_executed_orders(orders.len());
        self.statistic
            .update_balances(exchange.total_base_coins(), exchange.total_quoted_coins());

        let mut ctx = Context {
            exchange,
            statistic: &self.statistic,
        };
        self.policy.on_orders_executed(&mut ctx, orders)
    }

    fn on_current_hour_ended(&mut self, exchange: &mut Exchange, candle: &Candle) -> Result<()> {
        if !self.bar_in_window {
            if !self.stopped && !self.window.has_started(candle.open_time()) {
                return self.policy.warm_up(candle);
            }
            return Ok(());
        }

        let net_worth = exchange.total_quoted_coins() + exchange.total_base_coins() * candle.close();
        self.statistic.update_net_worth(net_worth);

        let mut ctx = Context {
            exchange,
            statistic: &self.statistic,
        };
        self.policy.on_current_hour_ended(&mut ctx, candle)
    }
}

impl<P: Policy> Subscriber for Trader<P> {
    fn on_event(&mut self, event: &Event<'_>, exchange: &mut Exchange) -> Result<()> {
        match *event {
            Event::NewHourStarted { open_price, open_time } => self.on_new_hour_started(exchange, open_price, open_time),
            Event::OrdersExecuted(orders) => self.on_orders_executed(exchange, orders),
            Event::CurrentHourEnded(candle) => self.on_current_hour_ended(exchange, candle),
        }
    }
}
