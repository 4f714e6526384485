use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
  /// Unknown or malformed encoder option, or an unsupported protocol.
  #[error("invalid sink config: {0}")]
  Config(String),

  /// A value or type that cannot be represented in the target wire format.
  #[error("encode failed: {0}")]
  Encode(String),

  /// Malformed payload, kind mismatch, or read past the end of the batch.
  #[error("decode failed: {0}")]
  Decode(String),

  #[error("metrics registration failed: {0}")]
  Metrics(#[from] prometheus::Error),
}

impl Error {
  pub fn config(msg: impl Into<String>) -> Self {
    Self::Config(msg.into())
  }

  pub fn encode(msg: impl Into<String>) -> Self {
    Self::Encode(msg.into())
  }

  pub fn decode(msg: impl Into<String>) -> Self {
    Self::Decode(msg.into())
  }

  pub fn is_config(&self) -> bool {
    matches!(self, Self::Config(_))
  }

  pub fn is_encode(&self) -> bool {
    matches!(self, Self::Encode(_))
  }

  pub fn is_decode(&self) -> bool {
    matches!(self, Self::Decode(_))
  }
}
