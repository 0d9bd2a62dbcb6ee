use chrono::{NaiveDateTime, TimeDelta};

use crate::error::{ChatReelError, ChatReelResult};
use crate::log_parser::ChatRecord;

/// Half-open range `[start, end)` of one-second ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeline {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl Timeline {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> ChatReelResult<Self> {
        if start > end {
            return Err(ChatReelError::config(format!(
                "timeline start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// `[min, max)` over the records' timestamps. The newest second is
    /// excluded, matching how the range is derived when none is given.
    pub fn spanning(records: &[ChatRecord]) -> Option<Self> {
        let min = records.iter().map(ChatRecord::timestamp).min()?;
        let max = records.iter().map(ChatRecord::timestamp).max()?;
        Some(Self {
            start: min,
            end: max,
        })
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn tick_count(&self) -> u64 {
        (self.end - self.start).num_seconds().max(0) as u64
    }

    pub fn is_empty(&self) -> bool {
        self.tick_count() == 0
    }

    pub fn contains(&self, instant: NaiveDateTime) -> bool {
        self.start <= instant && instant < self.end
    }

    pub fn tick(&self, index: u64) -> Option<NaiveDateTime> {
        if index >= self.tick_count() {
            return None;
        }
        let offset = i64::try_from(index).ok()?;
        Some(self.start + TimeDelta::seconds(offset))
    }

    /// Fresh iterator over every tick; call again to restart.
    pub fn ticks(&self) -> Ticks {
        Ticks {
            next: self.start,
            end: self.end,
        }
    }

    /// Pairs every tick with the records stamped exactly at it. `records`
    /// must be chronological (see [`ensure_chronological`]).
    pub fn windows<'a>(&self, records: &'a [ChatRecord]) -> Windows<'a> {
        Windows {
            ticks: self.ticks(),
            remaining: records,
        }
    }

    pub fn filter<'a>(&self, records: &'a [ChatRecord]) -> impl Iterator<Item = &'a ChatRecord> {
        let range = *self;
        records
            .iter()
            .filter(move |record| range.contains(record.timestamp()))
    }
}

#[derive(Debug, Clone)]
pub struct Ticks {
    next: NaiveDateTime,
    end: NaiveDateTime,
}

impl Iterator for Ticks {
    type Item = NaiveDateTime;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let tick = self.next;
        self.next = tick + TimeDelta::seconds(1);
        Some(tick)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.end - self.next).num_seconds().max(0) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Ticks {}

#[derive(Debug, Clone)]
pub struct Windows<'a> {
    ticks: Ticks,
    remaining: &'a [ChatRecord],
}

impl<'a> Iterator for Windows<'a> {
    type Item = (NaiveDateTime, &'a [ChatRecord]);

    fn next(&mut self) -> Option<Self::Item> {
        let tick = self.ticks.next()?;
        let stale = self
            .remaining
            .partition_point(|record| record.timestamp() < tick);
        self.remaining = &self.remaining[stale..];
        let hits = self
            .remaining
            .partition_point(|record| record.timestamp() == tick);
        let (current, rest) = self.remaining.split_at(hits);
        self.remaining = rest;
        Some((tick, current))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ticks.size_hint()
    }
}

/// Records whose timestamp equals `tick`, from a chronological slice.
pub fn records_at(records: &[ChatRecord], tick: NaiveDateTime) -> &[ChatRecord] {
    let lo = records.partition_point(|record| record.timestamp() < tick);
    let hi = records.partition_point(|record| record.timestamp() <= tick);
    &records[lo..hi]
}

pub fn ensure_chronological(records: &[ChatRecord]) -> ChatReelResult<()> {
    match records
        .windows(2)
        .position(|pair| pair[1].timestamp() < pair[0].timestamp())
    {
        Some(position) => Err(ChatReelError::UnorderedInput {
            index: position + 1,
        }),
        None => Ok(()),
    }
}
