use crate::types::{Timestamp, WithTimestamp};
use eyre::{Result, bail};
use std::collections::VecDeque;

/// Forward-only, timestamp-ordered sequence of records on one topic.
///
/// A stream never seeks back. Peeking a timestamp must be cheap and must
/// not decode the payload.
pub trait MessageStream {
    type Item: WithTimestamp;

    /// The topic this stream reads.
    fn topic(&self) -> &str;

    /// Total number of records on the topic, consumed or not.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the topic exists in the underlying source.
    fn has_topic(&self) -> bool {
        !self.is_empty()
    }

    /// Whether every record has been consumed.
    fn at_end(&self) -> bool {
        self.peek_timestamp().is_none()
    }

    /// Timestamp of the next record, or `None` when exhausted.
    fn peek_timestamp(&self) -> Option<Timestamp>;

    /// Decode the next record and move past it.
    fn advance(&mut self) -> Result<Self::Item>;

    /// Move past up to `n` records without decoding them. Returns the
    /// number actually skipped.
    fn skip(&mut self, n: usize) -> Result<usize>;

    /// Skip records while their timestamp is strictly earlier than
    /// `bound`. Returns the number skipped.
    fn skip_before(&mut self, bound: Timestamp) -> Result<usize> {
        let mut skipped = 0;
        while self.peek_timestamp().is_some_and(|ts| ts < bound) {
            if self.skip(1)? == 0 {
                break;
            }
            skipped += 1;
        }
        Ok(skipped)
    }
}

/// In-memory stream over pre-built records.
#[derive(Debug, Clone)]
pub struct VecStream<T> {
    topic: String,
    total: usize,
    records: VecDeque<T>,
}

impl<T> VecStream<T>
where
    T: WithTimestamp,
{
    pub fn new(topic: impl Into<String>, records: impl IntoIterator<Item = T>) -> Self {
        let records: VecDeque<T> = records.into_iter().collect();
        Self {
            topic: topic.into(),
            total: records.len(),
            records,
        }
    }

    /// Number of records not yet consumed.
    pub fn remaining(&self) -> usize {
        self.records.len()
    }
}

impl<T> MessageStream for VecStream<T>
where
    T: WithTimestamp,
{
    type Item = T;

    fn topic(&self) -> &str {
        &self.topic
    }

    fn len(&self) -> usize {
        self.total
    }

    fn peek_timestamp(&self) -> Option<Timestamp> {
        self.records.front().map(|record| record.timestamp())
    }

    fn advance(&mut self) -> Result<T> {
        let Some(record) = self.records.pop_front() else {
            bail!("stream '{}' is exhausted", self.topic);
        };
        Ok(record)
    }

    fn skip(&mut self, n: usize) -> Result<usize> {
        let n = n.min(self.records.len());
        self.records.drain(..n);
        Ok(n)
    }
}
