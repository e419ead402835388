//! Read and write recorded sensor logs in the MCAP container format.
//!
//! Payloads are ROS 2 CDR messages (see [crate::cdr]). Records are
//! visited in file order, and a record's time is the stamp in its message
//! header, not the MCAP log time.

use crate::{
    cdr::{Decode, Encode},
    error::ReplayError,
    stream::MessageStream,
    types::{Timestamp, WithTimestamp},
};
use eyre::{Result, WrapErr, bail};
use indexmap::IndexMap;
use std::{
    borrow::Cow,
    collections::{BTreeMap, HashMap},
    fs::File,
    io::BufWriter,
    marker::PhantomData,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

/// Per-topic summary of a log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicInfo {
    pub message_count: usize,
    pub message_encoding: String,
    pub schema_name: Option<String>,
}

/// An MCAP file loaded into memory.
pub struct McapLog {
    path: PathBuf,
    data: Vec<u8>,
    topics: IndexMap<String, TopicInfo>,
}

impl McapLog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .wrap_err_with(|| format!("unable to read log file {}", path.display()))?;
        let mut log = Self::from_bytes(data)
            .wrap_err_with(|| format!("unable to index log file {}", path.display()))?;
        log.path = path.to_path_buf();
        Ok(log)
    }

    /// Index an MCAP image already in memory.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let mut topics: IndexMap<String, TopicInfo> = IndexMap::new();

        for message in mcap::MessageStream::new(&data)? {
            let message = message.wrap_err("corrupt MCAP record")?;
            let channel = &message.channel;
            topics
                .entry(channel.topic.clone())
                .or_insert_with(|| TopicInfo {
                    message_count: 0,
                    message_encoding: channel.message_encoding.clone(),
                    schema_name: channel.schema.as_ref().map(|schema| schema.name.clone()),
                })
                .message_count += 1;
        }

        debug!(topics = topics.len(), bytes = data.len(), "indexed log");
        Ok(Self {
            path: PathBuf::new(),
            data,
            topics,
        })
    }

    /// File the log was read from. Empty for in-memory logs.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Topics in order of first appearance.
    pub fn topics(&self) -> &IndexMap<String, TopicInfo> {
        &self.topics
    }

    pub fn message_count(&self, topic: &str) -> usize {
        self.topics
            .get(topic)
            .map(|info| info.message_count)
            .unwrap_or(0)
    }

    /// Open a forward-only stream over one topic. A topic absent from the
    /// log yields an empty stream.
    pub fn topic_stream<D>(&self, topic: &str) -> Result<TopicStream<'_, D>>
    where
        D: Decode + WithTimestamp,
    {
        let messages = mcap::MessageStream::new(&self.data)?;
        let mut stream = TopicStream {
            topic: topic.to_string(),
            total: self.message_count(topic),
            messages,
            pending: None,
            last_stamp: None,
            _decode: PhantomData,
        };
        stream.fill()?;
        Ok(stream)
    }
}

struct Pending<'a> {
    stamp: Timestamp,
    data: Cow<'a, [u8]>,
}

/// [MessageStream] over one topic of a [McapLog].
///
/// Only the header stamp of the upcoming record is parsed ahead of time;
/// the payload is decoded on [advance](MessageStream::advance).
pub struct TopicStream<'a, D> {
    topic: String,
    total: usize,
    messages: mcap::MessageStream<'a>,
    pending: Option<Pending<'a>>,
    last_stamp: Option<Timestamp>,
    _decode: PhantomData<fn() -> D>,
}

impl<'a, D> TopicStream<'a, D>
where
    D: Decode + WithTimestamp,
{
    /// Load the next record on this topic into `pending`.
    fn fill(&mut self) -> Result<()> {
        self.pending = None;

        for message in self.messages.by_ref() {
            let message = message
                .wrap_err_with(|| format!("corrupt MCAP record while reading '{}'", self.topic))?;
            if message.channel.topic != self.topic {
                continue;
            }

            let stamp = D::stamp(&message.data).map_err(|reason| ReplayError::MalformedRecord {
                topic: self.topic.clone(),
                reason,
            })?;

            if let Some(last) = self.last_stamp
                && stamp < last
            {
                warn!(
                    topic = %self.topic,
                    %stamp,
                    previous = %last,
                    "record stamp goes backwards"
                );
            }
            self.last_stamp = Some(stamp);
            self.pending = Some(Pending {
                stamp,
                data: message.data,
            });
            break;
        }

        Ok(())
    }
}

impl<'a, D> MessageStream for TopicStream<'a, D>
where
    D: Decode + WithTimestamp,
{
    type Item = D;

    fn topic(&self) -> &str {
        &self.topic
    }

    fn len(&self) -> usize {
        self.total
    }

    fn peek_timestamp(&self) -> Option<Timestamp> {
        self.pending.as_ref().map(|pending| pending.stamp)
    }

    fn advance(&mut self) -> Result<D> {
        let Some(pending) = self.pending.take() else {
            bail!("stream '{}' is exhausted", self.topic);
        };
        let item = D::decode(&pending.data).map_err(|reason| ReplayError::MalformedRecord {
            topic: self.topic.clone(),
            reason,
        })?;
        self.fill()?;
        Ok(item)
    }

    fn skip(&mut self, n: usize) -> Result<usize> {
        let mut skipped = 0;
        while skipped < n && self.pending.is_some() {
            self.fill()?;
            skipped += 1;
        }
        Ok(skipped)
    }
}

/// Writes CDR-encoded sensor messages into a new MCAP file.
pub struct LogWriter {
    writer: mcap::Writer<BufWriter<File>>,
    schemas: HashMap<&'static str, u16>,
    channels: HashMap<String, u16>,
    sequence: u32,
}

impl LogWriter {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .wrap_err_with(|| format!("unable to create log file {}", path.display()))?;
        let writer = mcap::Writer::new(BufWriter::new(file))?;
        Ok(Self {
            writer,
            schemas: HashMap::new(),
            channels: HashMap::new(),
            sequence: 0,
        })
    }

    /// Append a message to `topic`, logged at its header stamp.
    pub fn write<M>(&mut self, topic: &str, message: &M, frame_id: &str) -> Result<()>
    where
        M: Encode + WithTimestamp,
    {
        let channel_id = self.channel_for::<M>(topic)?;
        let stamp = message.timestamp().as_nanos();
        let header = mcap::records::MessageHeader {
            channel_id,
            sequence: self.sequence,
            log_time: stamp,
            publish_time: stamp,
        };
        self.writer
            .write_to_known_channel(&header, &message.encode(frame_id))
            .wrap_err_with(|| format!("unable to write message on '{topic}'"))?;
        self.sequence = self.sequence.wrapping_add(1);
        Ok(())
    }

    fn channel_for<M: Encode>(&mut self, topic: &str) -> Result<u16> {
        if let Some(&id) = self.channels.get(topic) {
            return Ok(id);
        }

        let schema_id = match self.schemas.get(M::SCHEMA_NAME) {
            Some(&id) => id,
            None => {
                let id = self.writer.add_schema(M::SCHEMA_NAME, "ros2msg", &[])?;
                self.schemas.insert(M::SCHEMA_NAME, id);
                id
            }
        };
        let channel_id = self
            .writer
            .add_channel(schema_id, topic, "cdr", &BTreeMap::new())?;
        self.channels.insert(topic.to_string(), channel_id);
        Ok(channel_id)
    }

    /// Write the summary section and flush the file.
    pub fn finish(mut self) -> Result<()> {
        self.writer.finish().wrap_err("unable to finalize log file")?;
        Ok(())
    }
}
