//! Core simulation components.
//!
//! This module provides the fundamental types for backtesting:
//! - `Candle`: OHLCV data of one hour.
//! - `Order`: Plain limit buy or sell.
//! - `Balance`: Coins held per ticker.
//! - `OrderBook`: Resting orders of the pair.
//! - `Exchange`: Matching engine driving a run.
//! - `CandleSource`: Where the candles come from.

mod book;
mod candle;
mod exchange;
mod order;
mod pair;
mod source;
mod wallet;

pub use book::*;
pub use candle::*;
pub use exchange::*;
pub use order::*;
pub use pair::*;
pub use source::*;
pub use wallet::*;
