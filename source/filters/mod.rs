pub mod bayes;
pub mod blacklist;

use crate::registry::Registry;

/// Registers the two built-in filters' factories. The Bayesian factory needs a directory and a
/// [`crate::Timer`], supplied through [`crate::registry::FilterContext`] at build time.
pub fn register_defaults(registry: &mut Registry) {
  registry.register(crate::BLACKLIST_ID, |context| {
    std::sync::Arc::new(blacklist::Blacklist::new(context.decoder.clone()))
  });
  registry.register(crate::BAYESIAN_ID, |context| {
    std::sync::Arc::new(bayes::Bayesian::new(
      context.directory.clone(),
      context.decoder.clone(),
      context.timer.clone(),
    ))
  });
}
