// A pluggable spam-classification pipeline: an ordered chain of filters, each contributing a
// verdict, combined under strict precedence and evaluated in two phases (an immediate phase fast
// enough to answer a caller synchronously, and a background phase that may block on I/O and can
// retroactively correct the initial decision).

use std::sync;

mod chain;
mod decode;
mod error;
mod filter;
mod filters;
mod message;
mod registry;
mod spawn;
mod timer;
mod tokenizer;
mod verdict;

pub use chain::Chain;
pub use decode::{DefaultDecoder, Decoder};
pub use error::{ConfigError, Error};
pub use filter::Filter;
pub use filters::bayes::Bayesian;
pub use filters::blacklist::Blacklist;
pub use message::{Headers, Message};
pub use registry::{Factory, FilterContext, Registry};
pub use spawn::{Spawn, Task, ThreadSpawn};
pub use timer::{ThreadTimer, Timer, TimerHandle};
pub use tokenizer::tokenize;
pub use verdict::Verdict;

/// The well-known id the [`Blacklist`] filter registers itself under.
pub const BLACKLIST_ID: &str = "blacklist";
/// The well-known id the [`Bayesian`] filter registers itself under.
pub const BAYESIAN_ID: &str = "bayesian";

/// The process-wide filter registry, lazily seeded with the two built-in filters.
///
/// Most applications only ever need this convenience wrapper; see [`Registry`] for a registry an
/// application builds and owns itself (e.g. for tests that must not share global state).
static GLOBAL: sync::OnceLock<sync::Mutex<Registry>> = sync::OnceLock::new();

fn global_registry() -> &'static sync::Mutex<Registry> {
  GLOBAL.get_or_init(|| {
    let mut registry = Registry::new();
    filters::register_defaults(&mut registry);
    sync::Mutex::new(registry)
  })
}

/// Registers a filter factory in the global registry. Call before building any chain; the
/// registry is read-only once a chain has been constructed from it (see [`Registry`]).
pub fn register(id: impl Into<String>, factory: Factory) {
  global_registry().lock().unwrap().register(id, factory);
}

/// Builds a [`Chain`] from a JSON configuration using the global registry. See
/// [`Registry::build_chain`] for the configuration schema.
pub fn build_chain(config: &serde_json::Value, context: &FilterContext) -> Result<Chain, Error> {
  global_registry().lock().unwrap().build_chain(config, context)
}
