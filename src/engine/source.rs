use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use crate::{
    engine::{Candle, CoinPair},
    errors::Result,
    utils::{is_month_file, read_candles},
};

/// Supplier of hourly candles, oldest first.
///
/// The simulation trusts the source for gap-free data but still fails loudly on a candle
/// that goes back in time.
pub trait CandleSource {
    /// Prepares the source. `false` means there is nothing to run on.
    fn init(&mut self) -> Result<bool>;

    /// Returns the next candle, or `None` at the end of the stream.
    fn next(&mut self) -> Result<Option<Candle>>;
}

/// Source backed by candles already in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    candles: VecDeque<Candle>,
}

impl From<Vec<Candle>> for MemorySource {
    fn from(candles: Vec<Candle>) -> Self {
        Self {
            candles: candles.into(),
        }
    }
}

impl FromIterator<Candle> for MemorySource {
    fn from_iter<T: IntoIterator<Item = Candle>>(iter: T) -> Self {
        Self {
            candles: iter.into_iter().collect(),
        }
    }
}

impl CandleSource for MemorySource {
    fn init(&mut self) -> Result<bool> {
        Ok(!self.candles.is_empty())
    }

    fn next(&mut self) -> Result<Option<Candle>> {
        Ok(self.candles.pop_front())
    }
}

/// Source reading persisted JSON candles.
///
/// The path is either one JSON file or a folder of monthly files (`YYYY-MM.json`) read in
/// name order, one month in memory at a time.
#[derive(Debug)]
pub struct JsonFileSource {
    path: PathBuf,
    files: VecDeque<PathBuf>,
    buffer: VecDeque<Candle>,
}

impl JsonFileSource {
    /// Creates a source over a file or a folder of monthly files.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            files: VecDeque::new(),
            buffer: VecDeque::new(),
        }
    }

    /// Creates a source over `data_root/BASE-QUOTE`.
    pub fn for_pair(data_root: &Path, pair: &CoinPair) -> Self {
        Self::new(data_root.join(pair.to_string()))
    }

    fn list_files(&self) -> Result<VecDeque<PathBuf>> {
        if self.path.is_file() {
            return Ok(VecDeque::from([self.path.clone()]));
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.path)? {
            let entry = entry?;
            if entry.file_name().to_str().is_some_and(is_month_file) {
                files.push(entry.path());
            }
        }
        files.sort();

        Ok(files.into())
    }

    fn load_next_file(&mut self) -> Result<bool> {
        let Some(file) = self.files.pop_front() else {
            return Ok(false);
        };

        debug!(file = %file.display(), "Loading candles");
        self.buffer = read_candles(&file)?.into();
        Ok(true)
    }
}

impl CandleSource for JsonFileSource {
    fn init(&mut self) -> Result<bool> {
        if !self.path.exists() {
            warn!(path = %self.path.display(), "No candle data found");
            return Ok(false);
        }

        self.files = self.list_files()?;
        if self.files.is_empty() {
            warn!(path = %self.path.display(), "No monthly candle files found");
            return Ok(false);
        }

        self.load_next_file()
    }

    fn next(&mut self) -> Result<Option<Candle>> {
        loop {
            if let Some(candle) = self.buffer.pop_front() {
                return Ok(Some(candle));
            }

            if !self.load_next_file()? {
                return Ok(None);
            }
        }
    }
}
