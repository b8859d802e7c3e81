use std::{panic, sync::Arc};

use crate::{
  filter::Filter,
  message::Message,
  spawn::{Spawn, Task},
  verdict::Verdict,
};

/// An ordered, configured pipeline of filters.
///
/// Evaluation is two-phase: [`Chain::evaluate`] runs every filter's `immediate` synchronously and
/// returns a verdict the caller can act on right away, alongside a handle to a background task
/// (run on whatever [`Spawn`] the chain was built with) that runs `deferred`, combines it with
/// the immediate result, and trains every filter on the outcome. The callback is invoked only if
/// that combined verdict differs from the immediate one — a message that was accepted on the
/// immediate verdict can still end up `Revoke`d once the background phase finishes, but a filter
/// that only confirms what the immediate phase already decided is not reported again.
pub struct Chain {
  filters: Vec<Arc<dyn Filter>>,
  spawn: Arc<dyn Spawn>,
}

impl Chain {
  pub fn new(filters: Vec<Arc<dyn Filter>>, spawn: Arc<dyn Spawn>) -> Self {
    Self { filters, spawn }
  }

  /// The ids of the filters in this chain, in evaluation order.
  pub fn filter_ids(&self) -> Vec<&str> {
    self.filters.iter().map(|filter| filter.id()).collect()
  }

  /// A filter's current settings, or `None` if no filter with that id is in this chain.
  pub fn get_filter_settings(&self, id: &str) -> Option<serde_json::Value> {
    self.filters.iter().find(|filter| filter.id() == id).map(|filter| filter.get_settings())
  }

  /// Runs the immediate phase synchronously and returns its combined verdict together with a
  /// handle to the background (deferred) phase that was just scheduled. `on_final` is called with
  /// the overall combined verdict once that phase completes, but only if it differs from
  /// `immediate` — a deferred phase that only reconfirms the immediate verdict does not invoke it.
  /// Every filter is trained on the final combined verdict (`Verdict::trains_as_spam`) regardless
  /// of whether it changed — this is the chain's only path to learning; nothing is trained on the
  /// immediate verdict alone.
  pub fn evaluate<F>(&self, message: Message, on_final: F) -> (Verdict, Box<dyn Task>)
  where
    F: FnOnce(Verdict) + Send + 'static,
  {
    let immediate = self.immediate_combine(&message);
    let filters = self.filters.clone();
    let task = self.spawn.spawn(Box::new(move || {
      let verdict = Self::deferred_combine(&filters, &message, immediate);
      Self::train(&filters, &message, verdict);
      if verdict != immediate {
        on_final(verdict);
      }
    }));
    (immediate, task)
  }

  /// Classifies `message` as spam or ham without running it through the chain first (e.g. a user
  /// correcting a mistaken verdict from outside the pipeline).
  pub fn classify(&self, message: &Message, is_spam: bool) {
    for filter in &self.filters {
      filter.classify(message, is_spam, false);
    }
  }

  /// Reverses a previous [`Chain::classify`] call.
  pub fn declassify(&self, message: &Message, is_spam: bool) {
    for filter in &self.filters {
      filter.classify(message, is_spam, true);
    }
  }

  /// Clears all filters' learned state.
  pub fn reset_classification(&self) {
    for filter in &self.filters {
      filter.reset();
    }
  }

  /// Calls `immediate` on each filter in order, combining by precedence and stopping as soon as a
  /// short-circuiting verdict (`Amnesty` or `Block`) is seen — filters after that point are never
  /// called for this phase.
  fn immediate_combine(&self, message: &Message) -> Verdict {
    let mut verdict = Verdict::Pass;
    for filter in &self.filters {
      verdict = verdict.max(filter.immediate(message));
      if verdict.short_circuits() {
        break;
      }
    }
    verdict
  }

  /// Continues combining from the immediate verdict using each filter's `deferred`, with the same
  /// short-circuiting rule. A filter that panics during `deferred` is logged and the verdict
  /// accumulated so far — the immediate one, if the panicking filter was first — is returned as-is,
  /// rather than letting one misbehaving filter take down the rest of the chain.
  fn deferred_combine(filters: &[Arc<dyn Filter>], message: &Message, verdict: Verdict) -> Verdict {
    let mut verdict = verdict;
    if verdict.short_circuits() {
      return verdict;
    }
    for filter in filters {
      match panic::catch_unwind(panic::AssertUnwindSafe(|| filter.deferred(message))) {
        Ok(result) => {
          verdict = verdict.max(result);
          if verdict.short_circuits() {
            break;
          }
        }
        Err(_) => {
          log::warn!(
            "filter {:?} panicked during deferred classification; falling back to the verdict computed so far",
            filter.id()
          );
          break;
        }
      }
    }
    verdict
  }

  fn train(filters: &[Arc<dyn Filter>], message: &Message, verdict: Verdict) {
    let is_spam = verdict.trains_as_spam();
    for filter in filters {
      filter.classify(message, is_spam, false);
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{mpsc, Mutex};

  use super::*;
  use crate::{error::ConfigError, Headers, ThreadSpawn};

  struct Fixed {
    id: &'static str,
    immediate: Verdict,
    deferred: Verdict,
    calls: Arc<Mutex<Vec<(&'static str, bool)>>>,
  }

  impl Filter for Fixed {
    fn id(&self) -> &str {
      self.id
    }
    fn apply_settings(&self, _settings: serde_json::Value) -> Result<(), ConfigError> {
      Ok(())
    }
    fn get_settings(&self) -> serde_json::Value {
      serde_json::Value::Null
    }
    fn immediate(&self, _message: &Message) -> Verdict {
      self.calls.lock().unwrap().push((self.id, true));
      self.immediate
    }
    fn deferred(&self, _message: &Message) -> Verdict {
      self.calls.lock().unwrap().push((self.id, false));
      self.deferred
    }
    fn reset(&self) {}
    fn classify(&self, _message: &Message, is_spam: bool, _undo: bool) {
      self.calls.lock().unwrap().push((self.id, is_spam));
    }
  }

  fn message() -> Message {
    Message::new(Headers::new(), Vec::new(), Vec::new())
  }

  /// Joins the background phase, then returns whatever (if anything) the callback received.
  fn wait_for_final(task: Box<dyn crate::spawn::Task>, receiver: mpsc::Receiver<Verdict>) -> Option<Verdict> {
    task.join();
    receiver.try_recv().ok()
  }

  #[test]
  fn pass_through_with_no_filters() {
    let chain = Chain::new(Vec::new(), Arc::new(ThreadSpawn));
    let (sender, receiver) = mpsc::channel();
    let (immediate, task) = chain.evaluate(message(), move |verdict| sender.send(verdict).unwrap());
    assert_eq!(immediate, Verdict::Pass);
    // The deferred phase only reconfirms Pass, so the callback is never invoked.
    assert_eq!(wait_for_final(task, receiver), None);
  }

  #[test]
  fn immediate_block_short_circuits_later_filters() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let blocker = Arc::new(Fixed { id: "blocker", immediate: Verdict::Block, deferred: Verdict::Pass, calls: calls.clone() });
    let spy = Arc::new(Fixed { id: "spy", immediate: Verdict::Pass, deferred: Verdict::Pass, calls: calls.clone() });
    let chain = Chain::new(vec![blocker, spy], Arc::new(ThreadSpawn));

    let (sender, receiver) = mpsc::channel();
    let (immediate, task) = chain.evaluate(message(), move |verdict| sender.send(verdict).unwrap());
    assert_eq!(immediate, Verdict::Block);
    // Nothing changes the immediate Block, so the callback must not fire.
    assert_eq!(wait_for_final(task, receiver), None);

    let calls = calls.lock().unwrap();
    // The spy's immediate() must never have been invoked.
    assert!(!calls.iter().any(|(id, is_immediate)| *id == "spy" && *is_immediate));
  }

  #[test]
  fn deferred_phase_can_revoke_after_an_immediate_pass() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let slow = Arc::new(Fixed { id: "slow", immediate: Verdict::Pass, deferred: Verdict::Revoke, calls });
    let chain = Chain::new(vec![slow], Arc::new(ThreadSpawn));

    let (sender, receiver) = mpsc::channel();
    let (immediate, task) = chain.evaluate(message(), move |verdict| sender.send(verdict).unwrap());
    assert_eq!(immediate, Verdict::Pass);
    assert_eq!(wait_for_final(task, receiver), Some(Verdict::Revoke));
  }

  #[test]
  fn training_uses_the_final_combined_verdict() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let learner = Arc::new(Fixed { id: "learner", immediate: Verdict::Pass, deferred: Verdict::Block, calls: calls.clone() });
    let chain = Chain::new(vec![learner], Arc::new(ThreadSpawn));

    let (sender, receiver) = mpsc::channel();
    let (_immediate, task) = chain.evaluate(message(), move |verdict| sender.send(verdict).unwrap());
    assert_eq!(wait_for_final(task, receiver), Some(Verdict::Block));

    let calls = calls.lock().unwrap();
    assert!(calls.contains(&("learner", true))); // classify(..., is_spam = true, ...)
  }

  #[test]
  fn a_panicking_deferred_filter_falls_back_to_the_verdict_computed_so_far() {
    struct Panics;
    impl Filter for Panics {
      fn id(&self) -> &str {
        "panics"
      }
      fn apply_settings(&self, _settings: serde_json::Value) -> Result<(), ConfigError> {
        Ok(())
      }
      fn get_settings(&self) -> serde_json::Value {
        serde_json::Value::Null
      }
      fn immediate(&self, _message: &Message) -> Verdict {
        Verdict::Pass
      }
      fn deferred(&self, _message: &Message) -> Verdict {
        panic!("boom")
      }
      fn reset(&self) {}
      fn classify(&self, _message: &Message, _is_spam: bool, _undo: bool) {}
    }

    let chain = Chain::new(vec![Arc::new(Panics)], Arc::new(ThreadSpawn));
    let (sender, receiver) = mpsc::channel();
    let (immediate, task) = chain.evaluate(message(), move |verdict| sender.send(verdict).unwrap());
    assert_eq!(immediate, Verdict::Pass);
    // The panic leaves the verdict at Pass, unchanged from immediate, so no callback fires.
    assert_eq!(wait_for_final(task, receiver), None);
  }

  #[test]
  fn direct_classify_declassify_reset_bypass_evaluation() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let learner = Arc::new(Fixed { id: "learner", immediate: Verdict::Pass, deferred: Verdict::Pass, calls: calls.clone() });
    let chain = Chain::new(vec![learner], Arc::new(ThreadSpawn));

    chain.classify(&message(), true);
    chain.declassify(&message(), true);
    chain.reset_classification();

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], ("learner", true));
    assert_eq!(calls[1], ("learner", true));
  }

  #[test]
  fn filter_ids_reflect_construction_order() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let a = Arc::new(Fixed { id: "a", immediate: Verdict::Pass, deferred: Verdict::Pass, calls: calls.clone() });
    let b = Arc::new(Fixed { id: "b", immediate: Verdict::Pass, deferred: Verdict::Pass, calls });
    let chain = Chain::new(vec![a, b], Arc::new(ThreadSpawn));
    assert_eq!(chain.filter_ids(), vec!["a", "b"]);
  }
}
