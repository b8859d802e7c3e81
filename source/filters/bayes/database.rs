use std::{collections, fs, io, io::Write as _, path};

use anyhow::Context as _;

/// The maximum token length (in code points) the Bayesian filter considers.
pub const MAX_WORD_LENGTH: usize = 64;

const WORDS_FILE: &str = "bayes-words.json";
const TMP_FILE: &str = "bayes-words.json.tmp";

/// A single token's learned counts. Serialized with the fixed wire field names `spamCount` and
/// `hamCount`; unknown fields are ignored on read (`serde_json`'s default for structs without
/// `deny_unknown_fields`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct WordEntry {
  #[serde(rename = "spamCount")]
  pub spam_count: u64,
  #[serde(rename = "hamCount")]
  pub ham_count: u64,
}

/// The in-memory word table plus its two aggregate counters. The invariant `total_spam = Σ
/// w.spam_count` (and the `total_ham` equivalent) holds after every call to [`WordDatabase::train`]
/// or [`WordDatabase::reset`] — those are the only two ways to mutate a database.
#[derive(Debug, Default)]
pub struct WordDatabase {
  words: collections::HashMap<String, WordEntry>,
  total_spam: u64,
  total_ham: u64,
}

impl WordDatabase {
  fn from_words(words: collections::HashMap<String, WordEntry>) -> Self {
    let (total_spam, total_ham) = words
      .values()
      .fold((0u64, 0u64), |(s, h), entry| (s + entry.spam_count, h + entry.ham_count));
    Self {
      words,
      total_spam,
      total_ham,
    }
  }

  pub fn total_spam(&self) -> u64 {
    self.total_spam
  }

  pub fn total_ham(&self) -> u64 {
    self.total_ham
  }

  pub fn get(&self, word: &str) -> Option<WordEntry> {
    self.words.get(word).copied()
  }

  pub fn len(&self) -> usize {
    self.words.len()
  }

  pub fn is_empty(&self) -> bool {
    self.words.is_empty()
  }

  /// Increments (or, when `undo`, decrements) `word`'s counter for the `is_spam` direction by
  /// one, keeping the matching aggregate counter in lockstep. Decrementing an already-zero
  /// counter is a logged no-op; the counter saturates at zero instead of underflowing.
  pub fn train(&mut self, word: &str, is_spam: bool, undo: bool) {
    let entry = self.words.entry(word.to_string()).or_default();
    let (count, total) = if is_spam {
      (&mut entry.spam_count, &mut self.total_spam)
    } else {
      (&mut entry.ham_count, &mut self.total_ham)
    };
    if undo {
      match count.checked_sub(1) {
        Some(decremented) => {
          *count = decremented;
          *total -= 1;
        }
        None => log::warn!(
          "declassify: {} counter for {word:?} is already zero, leaving it saturated",
          if is_spam { "spam" } else { "ham" }
        ),
      }
    } else {
      *count += 1;
      *total += 1;
    }
  }

  pub fn reset(&mut self) {
    self.words.clear();
    self.total_spam = 0;
    self.total_ham = 0;
  }

  /// Reads `<directory>/bayes-words.json`. A missing or malformed file is not fatal: the caller
  /// should start from an empty database and log a warning.
  pub fn read(directory: &path::Path) -> anyhow::Result<Self> {
    let path = directory.join(WORDS_FILE);
    let file = fs::File::open(&path).with_context(|| format!("couldn't open {path:?}"))?;
    let words: collections::HashMap<String, WordEntry> = serde_json::from_reader(io::BufReader::new(file))
      .with_context(|| format!("couldn't parse {path:?}"))?;
    Ok(Self::from_words(words))
  }

  /// The durable write protocol: serialize to a temp file, flush and close it, remove the
  /// destination if present, then rename the temp file over it.
  pub fn write(&self, directory: &path::Path) -> anyhow::Result<()> {
    let tmp = directory.join(TMP_FILE);
    let dest = directory.join(WORDS_FILE);
    {
      let file = fs::File::create(&tmp).with_context(|| format!("couldn't create {tmp:?}"))?;
      let mut writer = io::BufWriter::new(file);
      serde_json::to_writer(&mut writer, &self.words).with_context(|| format!("couldn't serialize {tmp:?}"))?;
      writer.flush().with_context(|| format!("couldn't flush {tmp:?}"))?;
      writer
        .into_inner()
        .map_err(|error| error.into_error())
        .with_context(|| format!("couldn't flush {tmp:?}"))?
        .sync_all()
        .with_context(|| format!("couldn't sync {tmp:?}"))?;
    }
    if dest.exists() {
      fs::remove_file(&dest).with_context(|| format!("couldn't remove {dest:?}"))?;
    }
    fs::rename(&tmp, &dest).with_context(|| format!("couldn't rename {tmp:?} to {dest:?}"))?;
    Ok(())
  }
}
