use std::{collections, path, sync::Arc};

use crate::{chain::Chain, decode::Decoder, error::ConfigError, filter::Filter, spawn::Spawn, timer::Timer};

/// Everything a filter factory needs to construct a filter instance. Bundled so that
/// [`Registry::build_chain`] has a single thing to thread through every factory, even though most
/// filters only need a subset of it (the blacklist filter, for instance, ignores `directory` and
/// `timer`).
pub struct FilterContext {
  pub decoder: Arc<dyn Decoder>,
  pub directory: path::PathBuf,
  pub timer: Arc<dyn Timer>,
  pub spawn: Arc<dyn Spawn>,
}

pub type Factory = Box<dyn Fn(&FilterContext) -> Arc<dyn Filter> + Send + Sync>;

/// A string id -> filter factory table: process-wide in spirit, but realized as an explicit
/// object an application builds once, rather than bare global state. See
/// [`crate::register`]/[`crate::build_chain`] for a thin global convenience wrapper around one of
/// these.
#[derive(Default)]
pub struct Registry {
  factories: collections::HashMap<String, Factory>,
}

impl Registry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register(&mut self, id: impl Into<String>, factory: impl Fn(&FilterContext) -> Arc<dyn Filter> + Send + Sync + 'static) {
    self.factories.insert(id.into(), Box::new(factory));
  }

  /// Builds a chain from a JSON configuration. Two shapes are accepted:
  ///
  /// - Array form (order-preserving, preferred): `[{ "filter": id, "settings": ... }, ...]`.
  /// - Object form (legacy, order-undefined): `{ id: settings, ... }`, instantiated in
  ///   lexicographic key order (order is otherwise unspecified for this shape).
  ///
  /// An unknown filter id or a filter that rejects its settings aborts construction with
  /// `Error::Config`; the chain is built atomically into a local `Vec` and only becomes
  /// observable on success, so a failure never leaves a partially-built chain behind.
  pub fn build_chain(&self, config: &serde_json::Value, context: &FilterContext) -> Result<Chain, crate::Error> {
    let entries = Self::entries(config)?;
    let mut filters = Vec::with_capacity(entries.len());
    for (id, settings) in entries {
      let factory = self
        .factories
        .get(id.as_str())
        .ok_or_else(|| ConfigError::UnknownFilter(id.clone()))?;
      let filter = factory(context);
      filter.apply_settings(settings)?;
      filters.push(filter);
    }
    Ok(Chain::new(filters, context.spawn.clone()))
  }

  fn entries(config: &serde_json::Value) -> Result<Vec<(String, serde_json::Value)>, ConfigError> {
    match config {
      serde_json::Value::Array(array) => array
        .iter()
        .map(|entry| {
          let object = entry
            .as_object()
            .ok_or_else(|| ConfigError::Malformed("array entries must be objects".to_string()))?;
          let id = object
            .get("filter")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| ConfigError::Malformed("array entry is missing string field \"filter\"".to_string()))?
            .to_string();
          let settings = object.get("settings").cloned().unwrap_or(serde_json::Value::Null);
          Ok((id, settings))
        })
        .collect(),
      serde_json::Value::Object(object) => {
        let mut ids: Vec<&String> = object.keys().collect();
        ids.sort();
        Ok(
          ids.into_iter()
            .map(|id| (id.clone(), object[id].clone()))
            .collect(),
        )
      }
      other => Err(ConfigError::Malformed(format!(
        "configuration must be a JSON array or object, got {other}"
      ))),
    }
  }
}
