//! Prometheus metrics of the sink encoders.
//!
//! Built once at startup against the process registry and passed by reference
//! to every encoder constructor.

use prometheus::{exponential_buckets, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

use crate::codec::Protocol;
use crate::error::Result;

#[derive(Clone)]
pub struct EncoderMetrics {
  appended_rows: IntCounterVec,
  messages: IntCounterVec,
  batch_size: HistogramVec,
}

impl EncoderMetrics {
  pub fn new(registry: &Registry) -> Result<Self> {
    let appended_rows = IntCounterVec::new(
      Opts::new("appended_rows_total", "Row events buffered by the encoders")
        .namespace("changefeed")
        .subsystem("sink_codec"),
      &["protocol"],
    )?;
    let messages = IntCounterVec::new(
      Opts::new("messages_total", "Messages produced by the encoders")
        .namespace("changefeed")
        .subsystem("sink_codec"),
      &["protocol", "type"],
    )?;
    let batch_size = HistogramVec::new(
      HistogramOpts::new("batch_rows", "Row messages returned by a single build")
        .namespace("changefeed")
        .subsystem("sink_codec")
        .buckets(exponential_buckets(1.0, 2.0, 16)?),
      &["protocol"],
    )?;

    registry.register(Box::new(appended_rows.clone()))?;
    registry.register(Box::new(messages.clone()))?;
    registry.register(Box::new(batch_size.clone()))?;

    Ok(Self {
      appended_rows,
      messages,
      batch_size,
    })
  }

  pub fn for_protocol(&self, protocol: Protocol) -> ProtocolMetrics {
    let p = protocol.as_str();
    ProtocolMetrics {
      appended_rows: self.appended_rows.with_label_values(&[p]),
      row_messages: self.messages.with_label_values(&[p, "row"]),
      ddl_messages: self.messages.with_label_values(&[p, "ddl"]),
      resolved_messages: self.messages.with_label_values(&[p, "resolved"]),
      batch_size: self.batch_size.with_label_values(&[p]),
    }
  }
}

/// Metric handles with the protocol label already bound.
#[derive(Clone)]
pub struct ProtocolMetrics {
  pub appended_rows: IntCounter,
  pub row_messages: IntCounter,
  pub ddl_messages: IntCounter,
  pub resolved_messages: IntCounter,
  pub batch_size: Histogram,
}
