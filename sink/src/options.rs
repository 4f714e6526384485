use std::collections::BTreeMap;

use tracing::error;
use url::Url;

use crate::codec::Protocol;
use crate::error::{Error, Result};

// Query keys consumed by the MQ transport. They are kept apart so that the
// codec only ever sees its own options.
const TRANSPORT_KEYS: &[&str] = &[
  "partition-num",
  "replication-factor",
  "max-message-bytes",
  "max-batch-size",
  "kafka-version",
  "kafka-client-id",
  "compression",
  "auto-create-topic",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkOptions {
  pub protocol: Protocol,
  pub enable_old_value: bool,
  /// Codec options, handed to `EventBatchEncoder::set_params`.
  pub params: BTreeMap<String, String>,
  /// Transport options, untouched by the codec.
  pub transport: BTreeMap<String, String>,
}

impl Default for SinkOptions {
  fn default() -> Self {
    Self {
      protocol: Protocol::CanalJson,
      enable_old_value: true,
      params: BTreeMap::new(),
      transport: BTreeMap::new(),
    }
  }
}

impl SinkOptions {
  pub fn validate(&self) -> Result<()> {
    if !self.enable_old_value && self.protocol.requires_old_value() {
      error!(
        protocol = %self.protocol,
        "old value is not enabled, please update the changefeed config"
      );
      return Err(Error::config(format!(
        "{} protocol requires old value to be enabled",
        self.protocol
      )));
    }
    Ok(())
  }
}

impl TryFrom<&Url> for SinkOptions {
  type Error = Error;

  fn try_from(url: &Url) -> Result<Self> {
    let mut options = SinkOptions::default();

    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "protocol" => options.protocol = value.parse()?,
        "enable-old-value" => {
          options.enable_old_value = value
            .parse()
            .map_err(|_| Error::config(format!("enable-old-value must be true or false, got {}", value)))?
        }
        k if TRANSPORT_KEYS.contains(&k) => {
          options.transport.insert(key.to_string(), value.to_string());
        }
        _ => {
          options.params.insert(key.to_string(), value.to_string());
        }
      }
    }

    Ok(options)
  }
}
