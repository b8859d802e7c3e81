/// Errors surfaced by the public API.
///
/// Only [`Error::Config`] is ever returned to a caller: unknown filter ids and malformed or
/// rejected settings abort chain construction. Every other runtime error inside the pipeline
/// (persistence, a misbehaving async filter, a decode failure) is contained so that one bad
/// message or one bad write never brings down the chain; those are logged in place and exposed
/// here only so tests and curious callers can match on them with `downcast_ref`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("configuration error: {0}")]
  Config(#[from] ConfigError),

  #[error("failed to read word database: {0}")]
  PersistenceRead(#[source] anyhow::Error),

  #[error("failed to write word database: {0}")]
  PersistenceWrite(#[source] anyhow::Error),

  #[error("async filter or callback failed: {0}")]
  AsyncClassify(#[source] anyhow::Error),

  #[error("decode failed: {0}")]
  Decode(#[source] anyhow::Error),
}

/// Raised while building or reconfiguring a filter chain.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("unknown filter id {0:?}")]
  UnknownFilter(String),

  #[error("malformed configuration: {0}")]
  Malformed(String),

  #[error("filter {filter:?} rejected its settings: {reason}")]
  InvalidSettings { filter: String, reason: String },
}
