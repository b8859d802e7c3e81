pub mod database;
mod writer;

use std::{
  collections,
  path,
  sync::{Arc, Mutex},
};

use database::{WordDatabase, MAX_WORD_LENGTH};
use writer::Writer;

use crate::{
  decode::Decoder,
  error::ConfigError,
  filter::Filter,
  message::Message,
  timer::Timer,
  tokenizer::tokenize,
  verdict::Verdict,
};

/// `P(spam) > REVOKE_THRESHOLD` is a revoke verdict; otherwise the filter abstains.
const REVOKE_THRESHOLD: f64 = 0.75;

/// The self-learning Bayesian word-frequency filter. Reads its word database from
/// `<directory>/bayes-words.json` at construction and schedules a debounced, durable rewrite on
/// every mutation.
pub struct Bayesian {
  directory: path::PathBuf,
  decoder: Arc<dyn Decoder>,
  database: Arc<Mutex<WordDatabase>>,
  writer: Writer,
}

impl Bayesian {
  /// `directory` is where `bayes-words.json` lives (created/read directly, not a separate
  /// per-filter subdirectory convention — the caller decides isolation between chains).
  pub fn new(directory: path::PathBuf, decoder: Arc<dyn Decoder>, timer: Arc<dyn Timer>) -> Self {
    let database = match WordDatabase::read(&directory) {
      Ok(database) => database,
      Err(error) => {
        log::warn!("couldn't read word database from {directory:?}, starting empty: {error:#}");
        WordDatabase::default()
      }
    };
    let database = Arc::new(Mutex::new(database));
    let writer = Writer::new(timer, database.clone(), directory.clone());
    Self {
      directory,
      decoder,
      database,
      writer,
    }
  }

  /// The deduplicated token set extracted from a message's decoded subject and body: each
  /// distinct token contributes at most once, regardless of how many times it occurs in the
  /// message.
  fn words(&self, message: &Message) -> collections::HashSet<String> {
    let subject = message.decoded_subject(&*self.decoder);
    let body = message.decoded_body(&*self.decoder);
    let mut words = collections::HashSet::new();
    for text in [&subject, &body] {
      for token in tokenize(text, Some(MAX_WORD_LENGTH)) {
        words.insert(token.to_string());
      }
    }
    words
  }

  /// `P(spam)` given the message's tokens and the current word database. Read-only: does not
  /// mutate the database.
  pub fn score(&self, message: &Message) -> f64 {
    let database = self.database.lock().unwrap();
    let total_spam = database.total_spam() as f64;
    let total_ham = database.total_ham() as f64;
    let bias = 1.0 / (total_spam + total_ham + 1.0);

    let mut sum_delta = 0.0;
    for word in self.words(message) {
      let Some(entry) = database.get(&word) else {
        continue; // Tokens not in the database are ignored.
      };
      let p_w_s = (entry.spam_count as f64 + bias) / total_spam;
      let p_w_h = (entry.ham_count as f64 + bias) / total_ham;
      // If only one of total_spam/total_ham is zero so far, one of these is +inf and `p` can come
      // out NaN (inf/inf). `NaN > REVOKE_THRESHOLD` is false, so this degrades to PASS rather
      // than panicking.
      let p = p_w_s / (p_w_s + p_w_h);
      sum_delta += (1.0 - p).ln() - p.ln();
    }
    1.0 / (1.0 + sum_delta.exp())
  }
}

impl Filter for Bayesian {
  fn id(&self) -> &str {
    crate::BAYESIAN_ID
  }

  fn apply_settings(&self, settings: serde_json::Value) -> Result<(), ConfigError> {
    // Empty or absent settings only; the Bayesian filter has nothing to configure.
    match settings {
      serde_json::Value::Null => Ok(()),
      serde_json::Value::Object(object) if object.is_empty() => Ok(()),
      other => Err(ConfigError::InvalidSettings {
        filter: self.id().to_string(),
        reason: format!("expected no settings, got {other}"),
      }),
    }
  }

  fn get_settings(&self) -> serde_json::Value {
    serde_json::Value::Null
  }

  fn immediate(&self, message: &Message) -> Verdict {
    if self.score(message) > REVOKE_THRESHOLD {
      Verdict::Revoke
    } else {
      Verdict::Pass
    }
  }

  fn deferred(&self, _message: &Message) -> Verdict {
    Verdict::Pass
  }

  fn reset(&self) {
    self.database.lock().unwrap().reset();
    self.writer.arm();
  }

  fn classify(&self, message: &Message, is_spam: bool, undo: bool) {
    let words = self.words(message);
    let mut database = self.database.lock().unwrap();
    for word in &words {
      database.train(word, is_spam, undo);
    }
    drop(database);
    self.writer.arm();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{DefaultDecoder, Headers, ThreadTimer};

  fn message(subject: &str) -> Message {
    let mut headers = Headers::new();
    headers.insert("subject", subject);
    Message::new(headers, Vec::new(), Vec::new())
  }

  fn filter() -> (tempfile::TempDir, Bayesian) {
    let directory = tempfile::tempdir().unwrap();
    let filter = Bayesian::new(
      directory.path().to_path_buf(),
      Arc::new(DefaultDecoder),
      Arc::new(ThreadTimer),
    );
    (directory, filter)
  }

  #[test]
  fn empty_database_is_neutral() {
    let (_directory, filter) = filter();
    assert_eq!(filter.score(&message("anything at all")), 0.5);
    assert_eq!(filter.immediate(&message("anything at all")), Verdict::Pass);
  }

  #[test]
  fn trains_and_scores_spam_and_ham() {
    let (_directory, filter) = filter();
    for _ in 0..10 {
      filter.classify(&message("buy viagra"), true, false);
      filter.classify(&message("hello friend"), false, false);
    }

    assert!(filter.score(&message("buy viagra now")) > 0.75);
    assert_eq!(filter.immediate(&message("buy viagra now")), Verdict::Revoke);

    assert!(filter.score(&message("hello friend today")) < 0.25);
    assert_eq!(filter.immediate(&message("hello friend today")), Verdict::Pass);
  }

  #[test]
  fn reset_returns_to_neutral() {
    let (_directory, filter) = filter();
    for _ in 0..10 {
      filter.classify(&message("buy viagra"), true, false);
    }
    filter.reset();
    assert_eq!(filter.score(&message("buy viagra")), 0.5);
  }

  #[test]
  fn dedup_counts_each_token_once_per_message() {
    let (_directory, filter) = filter();
    filter.classify(&message("viagra viagra viagra"), true, false);
    let database = filter.database.lock().unwrap();
    assert_eq!(database.get("viagra").unwrap().spam_count, 1);
    assert_eq!(database.total_spam(), 1);
  }

  #[test]
  fn classify_then_declassify_is_the_identity() {
    let (_directory, filter) = filter();
    filter.classify(&message("buy viagra"), true, false);
    filter.classify(&message("buy viagra"), true, true);
    let database = filter.database.lock().unwrap();
    assert_eq!(database.get("buy").unwrap().spam_count, 0);
    assert_eq!(database.total_spam(), 0);
  }

  #[test]
  fn apply_settings_rejects_nonempty_settings() {
    let (_directory, filter) = filter();
    assert!(filter.apply_settings(serde_json::json!({"unexpected": true})).is_err());
    assert!(filter.apply_settings(serde_json::Value::Null).is_ok());
  }

  #[test]
  fn persists_across_reconstruction() {
    let directory = tempfile::tempdir().unwrap();
    {
      let filter = Bayesian::new(directory.path().to_path_buf(), Arc::new(DefaultDecoder), Arc::new(ThreadTimer));
      filter.classify(&message("buy viagra"), true, false);
      std::thread::sleep(std::time::Duration::from_millis(1_200));
    }
    let reopened = Bayesian::new(directory.path().to_path_buf(), Arc::new(DefaultDecoder), Arc::new(ThreadTimer));
    assert!(reopened.score(&message("buy viagra")) > 0.5);
  }
}
