use std::collections::vec_deque::Iter;

use tracing::{debug, info, warn};

use crate::{
    PercentCalculus,
    engine::*,
    errors::{Error, Result},
    events::{Event, EventBus},
};

/// Fee charged on every fill, in percent of the received asset.
pub const DEFAULT_FEE_PERCENT: f64 = 0.1;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The source refused to initialize, nothing was published.
    Aborted,
    /// Every candle of the source was processed.
    Completed {
        /// Number of processed candles.
        candles: usize,
    },
}

/// Simulated spot exchange for one coin pair.
///
/// It owns the balance and the resting limit orders, turns each candle into fills and
/// publishes the bar events on the [`EventBus`].
#[derive(Debug, Clone)]
pub struct Exchange {
    pair: CoinPair,
    balance: Balance,
    book: OrderBook,
    fee_percent: f64,
    current: Option<Candle>,
}

impl Exchange {
    /// Creates an exchange with the default fee.
    ///
    /// ### Arguments
    /// * `pair` - The traded pair.
    /// * `balance` - Initial coins of the account.
    pub fn new(pair: CoinPair, balance: Balance) -> Self {
        Self {
            pair,
            balance,
            book: OrderBook::new(),
            fee_percent: DEFAULT_FEE_PERCENT,
            current: None,
        }
    }

    /// Replaces the fee percentage (e.g. 0.1 for 0.1%).
    pub fn with_fee_percent(mut self, fee_percent: f64) -> Result<Self> {
        if !(fee_percent >= 0.0) {
            return Err(Error::InvalidSettings(format!("fee percent must not be negative (got: {fee_percent})")));
        }
        self.fee_percent = fee_percent;
        Ok(self)
    }

    /// Returns the traded pair.
    pub fn pair(&self) -> &CoinPair {
        &self.pair
    }

    /// Returns the free coins (escrow excluded).
    pub fn balance(&self) -> &Balance {
        &self.balance
    }

    /// Returns the fee percentage.
    pub fn fee_percent(&self) -> f64 {
        self.fee_percent
    }

    /// Returns the candle being processed, if any.
    pub fn current_candle(&self) -> Option<&Candle> {
        self.current.as_ref()
    }

    /// Returns the resting orders.
    pub fn orders(&self) -> Iter<'_, Order> {
        self.book.iter()
    }

    /// Free base coins.
    pub fn base_coins_on_balance(&self) -> f64 {
        self.balance.get(self.pair.base())
    }

    /// Free quote coins.
    pub fn quoted_coins_on_balance(&self) -> f64 {
        self.balance.get(self.pair.quote())
    }

    /// Free base coins plus those escrowed by resting sells.
    pub fn total_base_coins(&self) -> f64 {
        self.base_coins_on_balance() + self.book.escrowed_base()
    }

    /// Free quote coins plus those escrowed by resting buys.
    pub fn total_quoted_coins(&self) -> f64 {
        self.quoted_coins_on_balance() + self.book.escrowed_quote()
    }

    /// Places a limit order and escrows its funds.
    ///
    /// ### Arguments
    /// * `order` - The order to rest in the book.
    ///
    /// ### Returns
    /// An error when a buy is above (or a sell below) the open price of the current candle,
    /// when the order crosses a resting order, or when the balance cannot cover it.
    ///
    /// ### Example
    /// ```rust
    /// use coin_bts::prelude::*;
    ///
    /// let balance = Balance::from_iter([("USDT", 1_000.0)]);
    /// let mut exchange = Exchange::new(CoinPair::new("BTC", "USDT"), balance);
    ///
    /// exchange.add_order(Order::buy(100.0, 2.0).unwrap()).unwrap();
    ///
    /// assert_eq!(exchange.quoted_coins_on_balance(), 800.0);
    /// assert_eq!(exchange.total_quoted_coins(), 1_000.0);
    ///
    /// exchange.cancel_all_orders().unwrap();
    /// assert_eq!(exchange.quoted_coins_on_balance(), 1_000.0);
    /// ```
    pub fn add_order(&mut self, order: Order) -> Result<()> {
        if let Some(candle) = &self.current {
            let against_market = match order.kind() {
                OrderKind::Buy => order.price() > candle.open(),
                OrderKind::Sell => order.price() < candle.open(),
            };
            if against_market {
                return Err(Error::OrderAgainstMarket(order.kind(), order.price(), candle.open()));
            }
        }

        self.book.check_crossing(&order)?;

        match order.kind() {
            OrderKind::Buy => self.balance.take(self.pair.quote(), order.cost())?,
            OrderKind::Sell => self.balance.take(self.pair.base(), order.count())?,
        };

        debug!(kind = %order.kind(), price = order.price(), count = order.count(), "Order placed");
        self.book.insert(order);
        Ok(())
    }

    /// Cancels every resting order and refunds its escrow.
    pub fn cancel_all_orders(&mut self) -> Result<()> {
        let orders = self.book.drain().collect::<Vec<_>>();

        for order in &orders {
            match order.kind() {
                OrderKind::Buy => self.balance.put(self.pair.quote(), order.cost())?,
                OrderKind::Sell => self.balance.put(self.pair.base(), order.count())?,
            }
        }

        if !orders.is_empty() {
            debug!(count = orders.len(), "Orders cancelled");
        }
        Ok(())
    }

    /// Pulls every candle of `source` through the exchange.
    ///
    /// Resting orders left at the end of the stream are cancelled.
    pub fn run<S>(&mut self, source: &mut S, bus: &mut EventBus) -> Result<RunOutcome>
    where
        S: CandleSource + ?Sized,
    {
        if !source.init()? {
            warn!(pair = %self.pair, "Candle source is not ready, nothing to run");
            return Ok(RunOutcome::Aborted);
        }

        info!(pair = %self.pair, "Simulation started");

        let mut candles = 0;
        while let Some(candle) = source.next()? {
            self.process_candle(candle, bus)?;
            candles += 1;
        }

        self.cancel_all_orders()?;
        info!(pair = %self.pair, candles, "Simulation finished");

        Ok(RunOutcome::Completed { candles })
    }

    /// Processes one candle: opens the hour, fills reachable orders, closes the hour.
    pub fn process_candle(&mut self, candle: Candle, bus: &mut EventBus) -> Result<()> {
        if let Some(previous) = &self.current {
            if candle.open_time() <= previous.open_time() {
                return Err(Error::SequenceViolation {
                    previous: previous.open_time(),
                    current: candle.open_time(),
                });
            }
        }
        self.current = Some(candle.clone());

        let opened = Event::NewHourStarted {
            open_price: candle.open(),
            open_time: candle.open_time(),
        };
        bus.publish(&opened, self)?;

        let executed = self.execute_orders(&candle)?;
        if !executed.is_empty() {
            bus.publish(&Event::OrdersExecuted(&executed), self)?;
        }

        bus.publish(&Event::CurrentHourEnded(&candle), self)
    }

    /// Fills every order reached by the candle range and credits the received asset minus
    /// the fee.
    fn execute_orders(&mut self, candle: &Candle) -> Result<Vec<Order>> {
        let filled = self.book.take_fillable(candle);

        for order in &filled {
            match order.kind() {
                OrderKind::Buy => {
                    let received = order.count().subpercent(self.fee_percent);
                    self.balance.put(self.pair.base(), received)?;
                    info!(
                        time = %candle.open_time(),
                        count = order.count(),
                        coin = self.pair.base(),
                        price = order.price(),
                        "Bought"
                    );
                }
                OrderKind::Sell => {
                    let received = order.cost().subpercent(self.fee_percent);
                    self.balance.put(self.pair.quote(), received)?;
                    info!(
                        time = %candle.open_time(),
                        count = order.count(),
                        coin = self.pair.base(),
                        price = order.price(),
                        "Sold"
                    );
                }
            }
        }

        Ok(filled)
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use crate::engine::*;
    use crate::errors::Error;
    use crate::events::{Event, EventBus, Topic};

    use chrono::{DateTime, Duration};

    fn candle(hour: i64, open: f64, high: f64, low: f64, close: f64) -> Candle {
        let open_time = DateTime::from_timestamp_secs(1515150000).unwrap() + Duration::hours(hour);
        CandleBuilder::builder()
            .open(open)
            .high(high)
            .low(low)
            .close(close)
            .volume(1.0)
            .open_time(open_time)
            .close_time(open_time + Duration::minutes(59))
            .build()
            .unwrap()
    }

    fn exchange() -> Exchange {
        Exchange::new(
            CoinPair::new("BTC", "USDT"),
            Balance::from_iter([("USDT", 1000.0), ("BTC", 10.0)]),
        )
    }

    #[test]
    fn scenario_buy_and_sell_fill_on_the_same_bar() {
        let mut exchange = exchange();
        exchange.add_order(Order::buy(95.0, 2.0).unwrap()).unwrap();
        exchange.add_order(Order::sell(108.0, 1.0).unwrap()).unwrap();

        let fills = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();
        let log = fills.clone();
        bus.subscribe_fn(&[Topic::OrdersExecuted], move |event, _| {
            if let Event::OrdersExecuted(orders) = event {
                log.borrow_mut().push(orders.len());
            }
            Ok(())
        });

        exchange
            .process_candle(candle(0, 100.0, 110.0, 90.0, 105.0), &mut bus)
            .unwrap();

        assert_eq!(*fills.borrow(), vec![2]);
        assert_eq!(exchange.orders().len(), 0);
        // 1000 - 190 escrow + 108 * 0.999
        assert!((exchange.quoted_coins_on_balance() - 917.892).abs() < 1e-9);
        // 10 - 1 escrow + 2 * 0.999
        assert!((exchange.base_coins_on_balance() - 10.998).abs() < 1e-9);
    }

    #[test]
    fn scenario_unreached_orders_rest() {
        let mut exchange = exchange();
        exchange.add_order(Order::buy(85.0, 1.0).unwrap()).unwrap();
        exchange.add_order(Order::sell(115.0, 1.0).unwrap()).unwrap();

        let mut bus = EventBus::new();
        let published = Rc::new(RefCell::new(false));
        let flag = published.clone();
        bus.subscribe_fn(&[Topic::OrdersExecuted], move |_, _| {
            *flag.borrow_mut() = true;
            Ok(())
        });

        exchange
            .process_candle(candle(0, 100.0, 110.0, 90.0, 105.0), &mut bus)
            .unwrap();

        assert!(!*published.borrow());
        assert_eq!(exchange.orders().len(), 2);
        assert_eq!(exchange.total_quoted_coins(), 1000.0);
        assert_eq!(exchange.total_base_coins(), 10.0);
    }

    #[test]
    fn events_are_published_in_order() {
        let mut exchange = exchange();
        exchange.add_order(Order::buy(95.0, 1.0).unwrap()).unwrap();

        let topics = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();
        let log = topics.clone();
        bus.subscribe_fn(&Topic::ALL, move |event, _| {
            log.borrow_mut().push(event.topic());
            Ok(())
        });

        exchange
            .process_candle(candle(0, 100.0, 110.0, 90.0, 105.0), &mut bus)
            .unwrap();

        assert_eq!(
            *topics.borrow(),
            vec![Topic::NewHourStarted, Topic::OrdersExecuted, Topic::CurrentHourEnded]
        );
    }

    #[test]
    fn order_placed_on_open_fills_on_the_same_bar() {
        let mut exchange = exchange();
        let mut bus = EventBus::new();
        bus.subscribe_fn(&[Topic::NewHourStarted], |event, exchange| {
            if let Event::NewHourStarted { open_price, .. } = event {
                exchange.add_order(Order::buy(*open_price, 1.0)?)?;
            }
            Ok(())
        });

        exchange
            .process_candle(candle(0, 100.0, 110.0, 90.0, 105.0), &mut bus)
            .unwrap();

        assert_eq!(exchange.orders().len(), 0);
        assert!((exchange.base_coins_on_balance() - 10.999).abs() < 1e-9);
    }

    #[test]
    fn order_placed_on_close_fills_on_the_next_bar() {
        let mut exchange = exchange();
        let mut bus = EventBus::new();
        bus.subscribe_fn(&[Topic::CurrentHourEnded], |event, exchange| {
            if let Event::CurrentHourEnded(candle) = event {
                if candle.close() == 105.0 {
                    exchange.add_order(Order::buy(95.0, 1.0)?)?;
                }
            }
            Ok(())
        });

        exchange
            .process_candle(candle(0, 100.0, 110.0, 90.0, 105.0), &mut bus)
            .unwrap();
        assert_eq!(exchange.orders().len(), 1);

        exchange
            .process_candle(candle(1, 100.0, 110.0, 90.0, 100.0), &mut bus)
            .unwrap();
        assert_eq!(exchange.orders().len(), 0);
        assert!((exchange.base_coins_on_balance() - 10.999).abs() < 1e-9);
    }

    #[test]
    fn reject_orders_against_the_market() {
        let mut exchange = exchange();
        let mut bus = EventBus::new();
        exchange
            .process_candle(candle(0, 100.0, 110.0, 90.0, 105.0), &mut bus)
            .unwrap();

        assert!(matches!(
            exchange.add_order(Order::buy(101.0, 1.0).unwrap()),
            Err(Error::OrderAgainstMarket(OrderKind::Buy, ..))
        ));
        assert!(matches!(
            exchange.add_order(Order::sell(99.0, 1.0).unwrap()),
            Err(Error::OrderAgainstMarket(OrderKind::Sell, ..))
        ));
        assert_eq!(exchange.quoted_coins_on_balance(), 1000.0);
    }

    #[test]
    fn reject_crossing_without_escrow() {
        let mut exchange = exchange();
        exchange.add_order(Order::sell(100.0, 1.0).unwrap()).unwrap();

        assert!(matches!(
            exchange.add_order(Order::buy(100.0, 1.0).unwrap()),
            Err(Error::CrossingOrder(..))
        ));
        assert_eq!(exchange.quoted_coins_on_balance(), 1000.0);
        assert_eq!(exchange.orders().len(), 1);
    }

    #[test]
    fn reject_unfunded_order() {
        let mut exchange = exchange();
        assert!(matches!(
            exchange.add_order(Order::buy(100.0, 20.0).unwrap()),
            Err(Error::InsufficientFunds(..))
        ));
        assert_eq!(exchange.orders().len(), 0);
    }

    #[test]
    fn reject_out_of_order_candles() {
        let mut exchange = exchange();
        let mut bus = EventBus::new();
        exchange
            .process_candle(candle(1, 100.0, 110.0, 90.0, 105.0), &mut bus)
            .unwrap();

        assert!(matches!(
            exchange.process_candle(candle(1, 100.0, 110.0, 90.0, 105.0), &mut bus),
            Err(Error::SequenceViolation { .. })
        ));
        assert!(matches!(
            exchange.process_candle(candle(0, 100.0, 110.0, 90.0, 105.0), &mut bus),
            Err(Error::SequenceViolation { .. })
        ));
    }

    #[test]
    fn run_cancels_resting_orders_at_the_end() {
        let mut exchange = exchange();
        exchange.add_order(Order::buy(50.0, 1.0).unwrap()).unwrap();

        let mut source = MemorySource::from(vec![
            candle(0, 100.0, 110.0, 90.0, 105.0),
            candle(1, 105.0, 112.0, 101.0, 111.0),
        ]);
        let outcome = exchange.run(&mut source, &mut EventBus::new()).unwrap();

        assert_eq!(outcome, RunOutcome::Completed { candles: 2 });
        assert_eq!(exchange.orders().len(), 0);
        assert_eq!(exchange.quoted_coins_on_balance(), 1000.0);
    }

    #[test]
    fn run_aborts_on_empty_source() {
        let mut exchange = exchange();
        let outcome = exchange.run(&mut MemorySource::default(), &mut EventBus::new()).unwrap();
        assert_eq!(outcome, RunOutcome::Aborted);
        assert!(exchange.current_candle().is_none());
    }

    #[test]
    fn negative_fee_is_rejected() {
        assert!(exchange().with_fee_percent(-0.5).is_err());
        assert_eq!(exchange().with_fee_percent(0.0).unwrap().fee_percent(), 0.0);
    }
}
