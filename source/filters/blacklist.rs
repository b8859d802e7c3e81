use std::{collections, sync};

use crate::{decode::Decoder, error::ConfigError, filter::Filter, message::Message, tokenizer::tokenize, verdict::Verdict};

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize)]
struct Settings {
  #[serde(default)]
  ips: Vec<String>,
  #[serde(default)]
  words: Vec<String>,
}

#[derive(Debug, Default)]
struct State {
  ips: Vec<String>,
  words: collections::HashSet<String>,
}

/// A simple consumer of the tokenizer and of the filter-chain extension point: blocks on an
/// exact-prefix peer-address match or a case-insensitive word match in the decoded subject/body.
/// Does not learn.
pub struct Blacklist {
  decoder: sync::Arc<dyn Decoder>,
  state: sync::RwLock<State>,
}

impl Blacklist {
  pub fn new(decoder: sync::Arc<dyn Decoder>) -> Self {
    Self {
      decoder,
      state: sync::RwLock::new(State::default()),
    }
  }
}

impl Filter for Blacklist {
  fn id(&self) -> &str {
    crate::BLACKLIST_ID
  }

  fn apply_settings(&self, settings: serde_json::Value) -> Result<(), ConfigError> {
    let settings: Settings = serde_json::from_value(settings).map_err(|error| ConfigError::InvalidSettings {
      filter: self.id().to_string(),
      reason: error.to_string(),
    })?;
    let mut state = self.state.write().unwrap();
    state.ips = settings.ips;
    state.words = settings.words.into_iter().map(|word| word.to_lowercase()).collect();
    Ok(())
  }

  fn get_settings(&self) -> serde_json::Value {
    let state = self.state.read().unwrap();
    serde_json::to_value(Settings {
      ips: state.ips.clone(),
      words: state.words.iter().cloned().collect(),
    })
    .expect("Settings is always representable as JSON")
  }

  fn immediate(&self, message: &Message) -> Verdict {
    let state = self.state.read().unwrap();

    for hop in message.peer_address() {
      if state.ips.iter().any(|prefix| hop.starts_with(prefix.as_str())) {
        return Verdict::Block;
      }
    }

    let subject = message.decoded_subject(&*self.decoder).to_lowercase();
    let body = message.decoded_body(&*self.decoder).to_lowercase();
    for text in [&subject, &body] {
      if tokenize(text, None).into_iter().any(|token| state.words.contains(token)) {
        return Verdict::Block;
      }
    }

    Verdict::Pass
  }

  fn deferred(&self, _message: &Message) -> Verdict {
    Verdict::Pass
  }

  fn reset(&self) {}

  fn classify(&self, _message: &Message, _is_spam: bool, _undo: bool) {}
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{DefaultDecoder, Headers};

  fn filter() -> Blacklist {
    let filter = Blacklist::new(sync::Arc::new(DefaultDecoder));
    filter
      .apply_settings(serde_json::json!({"ips": ["124.51.45."], "words": ["viagra"]}))
      .unwrap();
    filter
  }

  #[test]
  fn blocks_on_ip_prefix() {
    let message = Message::new(Headers::new(), Vec::new(), vec!["124.51.45.7".to_string(), "proxy".to_string()]);
    assert_eq!(filter().immediate(&message), Verdict::Block);
  }

  #[test]
  fn passes_on_ip_miss_and_benign_body() {
    let mut headers = Headers::new();
    headers.insert("subject", "hello friend");
    let message = Message::new(headers, b"nothing interesting".to_vec(), vec!["8.8.8.8".to_string()]);
    assert_eq!(filter().immediate(&message), Verdict::Pass);
  }

  #[test]
  fn blocks_on_word_match_case_insensitively() {
    let mut headers = Headers::new();
    headers.insert("subject", "Buy VIAGRA now");
    let message = Message::new(headers, Vec::new(), vec!["8.8.8.8".to_string()]);
    assert_eq!(filter().immediate(&message), Verdict::Block);
  }

  #[test]
  fn blocks_on_word_match_in_body() {
    let message = Message::new(Headers::new(), b"this email sells viagra".to_vec(), vec!["8.8.8.8".to_string()]);
    assert_eq!(filter().immediate(&message), Verdict::Block);
  }

  #[test]
  fn does_not_learn() {
    let filter = filter();
    let message = Message::new(Headers::new(), Vec::new(), Vec::new());
    filter.classify(&message, true, false); // no-op, must not panic
    filter.reset(); // no-op, must not panic
    assert_eq!(filter.deferred(&message), Verdict::Pass);
  }

  #[test]
  fn settings_default_to_empty() {
    let filter = Blacklist::new(sync::Arc::new(DefaultDecoder));
    filter.apply_settings(serde_json::json!({})).unwrap();
    let message = Message::new(Headers::new(), Vec::new(), vec!["1.2.3.4".to_string()]);
    assert_eq!(filter.immediate(&message), Verdict::Pass);
  }
}
