use crate::{error::ConfigError, message::Message, verdict::Verdict};

/// The contract every filter in a [`crate::Chain`] satisfies.
///
/// Filters are shared between the caller's thread (`immediate`) and a background task
/// (`deferred`, `classify`, `reset`), so implementations take `&self` throughout and must
/// synchronize any mutable state internally (see [`crate::filters::bayes::Bayesian`] for an
/// example). Filters that don't learn treat `classify`/`reset` as no-ops and always return
/// [`Verdict::Pass`] from `deferred`.
pub trait Filter: Send + Sync {
  /// A stable identifier, equal to the string this filter was registered under.
  fn id(&self) -> &str;

  /// Parses a filter-specific configuration blob.
  fn apply_settings(&self, settings: serde_json::Value) -> Result<(), ConfigError>;

  /// Serializes the filter's current configuration (may be `serde_json::Value::Null`).
  fn get_settings(&self) -> serde_json::Value;

  /// Non-blocking classification: must not perform I/O nor block.
  fn immediate(&self, message: &Message) -> Verdict;

  /// Named `deferred` because `async` is a reserved word in Rust. May perform I/O or expensive
  /// computation; runs on a background task.
  fn deferred(&self, message: &Message) -> Verdict;

  /// Clears all learned state.
  fn reset(&self);

  /// Updates learned state with the ground-truth label `is_spam`. `undo = true` reverses a
  /// previous `classify(message, is_spam)` call.
  fn classify(&self, message: &Message, is_spam: bool, undo: bool);
}
