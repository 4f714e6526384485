use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::event::{DdlEvent, Message, MessageType, RowChangedEvent};
use crate::metrics::EncoderMetrics;
use crate::options::SinkOptions;

pub mod canal;
pub mod canal_json;

/// What the caller has to do after an append.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum EncoderResult {
  NoOperation,
  /// Events are ready in the encoder: call `build` and hand the messages to
  /// the transport.
  NeedAsyncWrite,
}

/// Turns the ordered event stream of one partition into wire messages.
///
/// Row events are buffered until a resolved timestamp covers them, DDL and
/// checkpoint events are encoded immediately. One encoder is owned by one
/// sink worker and never shared.
pub trait EventBatchEncoder: Send {
  /// Applies the codec options. Only valid once, before the first append.
  fn set_params(&mut self, params: &BTreeMap<String, String>) -> Result<()>;

  /// Buffers a row event. On error nothing was buffered.
  fn append_row_changed_event(&mut self, e: &RowChangedEvent) -> Result<EncoderResult>;

  /// Marks every buffered event with `commit_ts <= ts` as ready. Always asks
  /// for a write, even if nothing moved, so that checkpoints keep advancing.
  fn append_resolved_event(&mut self, ts: u64) -> Result<EncoderResult>;

  /// Drains the ready events into one message each, in append order.
  fn build(&mut self) -> Result<Vec<Message>>;

  fn encode_ddl_event(&self, e: &DdlEvent) -> Result<Message>;

  /// Watermark marker, if the protocol has a way to carry one.
  fn encode_checkpoint_event(&self, ts: u64) -> Result<Option<Message>>;
}

/// Reads back a batch of messages produced by an [`EventBatchEncoder`].
pub trait EventBatchDecoder {
  /// Kind of the next message, `(MessageType::Unknown, false)` once exhausted.
  fn has_next(&mut self) -> Result<(MessageType, bool)>;

  fn next_row_changed_event(&mut self) -> Result<RowChangedEvent>;

  fn next_ddl_event(&mut self) -> Result<DdlEvent>;

  fn next_resolved_event(&mut self) -> Result<u64>;
}

#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub enum Protocol {
  Default,
  Canal,
  CanalJson,
  Avro,
  Maxwell,
  Craft,
}

impl Protocol {
  pub fn as_str(&self) -> &'static str {
    match self {
      Protocol::Default => "default",
      Protocol::Canal => "canal",
      Protocol::CanalJson => "canal-json",
      Protocol::Avro => "avro",
      Protocol::Maxwell => "maxwell",
      Protocol::Craft => "craft",
    }
  }

  /// Protocols that carry the pre-image and cannot work without old values.
  pub fn requires_old_value(&self) -> bool {
    matches!(self, Protocol::Canal | Protocol::CanalJson | Protocol::Maxwell)
  }
}

impl fmt::Display for Protocol {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Protocol {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s.to_ascii_lowercase().as_str() {
      "default" => Ok(Protocol::Default),
      "canal" => Ok(Protocol::Canal),
      "canal-json" => Ok(Protocol::CanalJson),
      "avro" => Ok(Protocol::Avro),
      "maxwell" => Ok(Protocol::Maxwell),
      "craft" => Ok(Protocol::Craft),
      unknown => Err(Error::config(format!("unknown protocol {}", unknown))),
    }
  }
}

type EncoderConstructor = fn(&EncoderMetrics) -> Box<dyn EventBatchEncoder>;
type DecoderConstructor = fn(Vec<Bytes>, bool) -> Box<dyn EventBatchDecoder>;

struct Codec {
  protocol: Protocol,
  encoder: EncoderConstructor,
  decoder: DecoderConstructor,
}

// Adding a protocol is adding a row here.
const CODECS: &[Codec] = &[Codec {
  protocol: Protocol::CanalJson,
  encoder: canal_json::new_encoder,
  decoder: canal_json::new_decoder,
}];

fn lookup(protocol: Protocol) -> Result<&'static Codec> {
  CODECS
    .iter()
    .find(|c| c.protocol == protocol)
    .ok_or_else(|| Error::config(format!("protocol {} is not supported", protocol)))
}

/// Creates the encoder for one output partition and applies the codec params
/// of `options`.
pub fn new_event_batch_encoder(options: &SinkOptions, metrics: &EncoderMetrics) -> Result<Box<dyn EventBatchEncoder>> {
  options.validate()?;
  let codec = lookup(options.protocol)?;
  let mut encoder = (codec.encoder)(metrics);
  encoder.set_params(&options.params)?;
  Ok(encoder)
}

pub fn new_event_batch_decoder(
  protocol: Protocol,
  values: Vec<Bytes>,
  enable_tidb_extension: bool,
) -> Result<Box<dyn EventBatchDecoder>> {
  let codec = lookup(protocol)?;
  Ok((codec.decoder)(values, enable_tidb_extension))
}
