use std::{
  path,
  sync::{Arc, Mutex},
  time,
};

use crossbeam_utils::atomic::AtomicCell;

use super::database::WordDatabase;
use crate::timer::{Timer, TimerHandle};

const DEBOUNCE: time::Duration = time::Duration::from_secs(1);

/// The debounced persistence scheduler's state: mutation transitions `Idle -> Armed`; the timer
/// firing transitions `Armed -> Writing` and performs the write; arming while `Writing`
/// transitions to `WritingAndArmed` so the writer reschedules itself on completion instead of
/// losing the mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
  Idle,
  Armed,
  Writing,
  WritingAndArmed,
}

/// Schedules debounced, at-most-one-concurrent writes of a [`WordDatabase`] to disk.
pub struct Writer {
  state: Arc<AtomicCell<State>>,
  timer: Arc<dyn Timer>,
  handle: TimerHandle,
}

impl Writer {
  pub fn new(timer: Arc<dyn Timer>, database: Arc<Mutex<WordDatabase>>, directory: path::PathBuf) -> Self {
    let state = Arc::new(AtomicCell::new(State::Idle));
    let handle_cell: Arc<Mutex<Option<TimerHandle>>> = Arc::new(Mutex::new(None));

    let state_ = state.clone();
    let timer_ = timer.clone();
    let handle_cell_ = handle_cell.clone();
    let callback: Box<dyn Fn() + Send + Sync> = Box::new(move || {
      if state_.compare_exchange(State::Armed, State::Writing).is_err() {
        // A rearm raced us between the timer firing and this callback running; nothing to do,
        // the writer that wins the race will pick up the latest state.
        return;
      }
      if let Err(error) = database.lock().unwrap().write(&directory) {
        log::warn!("couldn't persist word database to {directory:?}: {error:#}");
      }
      let next = match state_.compare_exchange(State::Writing, State::Idle) {
        Ok(_) => None,
        Err(State::WritingAndArmed) => {
          state_.store(State::Armed);
          Some(())
        }
        Err(other) => {
          log::warn!("word database writer observed unexpected state {other:?}");
          None
        }
      };
      if next.is_some() {
        if let Some(handle) = handle_cell_.lock().unwrap().as_ref() {
          timer_.rearm(handle, DEBOUNCE);
        }
      }
    });

    let handle = timer.create(callback);
    *handle_cell.lock().unwrap() = Some(handle.clone());

    Self { state, timer, handle }
  }

  /// Arms (or re-arms) the debounce timer in response to a mutation. Safe to call from any
  /// thread; at most one write is ever in flight at a time.
  pub fn arm(&self) {
    loop {
      let current = self.state.load();
      let next = match current {
        State::Idle => State::Armed,
        State::Armed => State::Armed,
        State::Writing => State::WritingAndArmed,
        State::WritingAndArmed => State::WritingAndArmed,
      };
      if self.state.compare_exchange(current, next).is_ok() {
        if next == State::Armed {
          self.timer.rearm(&self.handle, DEBOUNCE);
        }
        break;
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::filters::bayes::database::WordEntry;
  use std::thread;

  #[test]
  fn debounces_a_burst_of_mutations_into_one_write() {
    let directory = tempfile::tempdir().unwrap();
    let database = Arc::new(Mutex::new(WordDatabase::default()));
    let writer = Writer::new(Arc::new(crate::ThreadTimer), database.clone(), directory.path().to_path_buf());

    for i in 0..5 {
      database.lock().unwrap().train(&format!("word{i}"), true, false);
      writer.arm();
      thread::sleep(time::Duration::from_millis(10));
    }

    thread::sleep(time::Duration::from_millis(1_200));
    let on_disk = WordDatabase::read(directory.path()).unwrap();
    assert_eq!(on_disk.get("word0"), Some(WordEntry { spam_count: 1, ham_count: 0 }));
    assert_eq!(on_disk.get("word4"), Some(WordEntry { spam_count: 1, ham_count: 0 }));
  }

  #[test]
  fn a_mutation_during_a_write_schedules_another_write() {
    let directory = tempfile::tempdir().unwrap();
    let database = Arc::new(Mutex::new(WordDatabase::default()));
    let writer = Writer::new(Arc::new(crate::ThreadTimer), database.clone(), directory.path().to_path_buf());

    database.lock().unwrap().train("first", true, false);
    writer.arm();
    thread::sleep(time::Duration::from_millis(1_050)); // let the first write start/finish

    database.lock().unwrap().train("second", false, false);
    writer.arm();
    thread::sleep(time::Duration::from_millis(1_200));

    let on_disk = WordDatabase::read(directory.path()).unwrap();
    assert_eq!(on_disk.get("first"), Some(WordEntry { spam_count: 1, ham_count: 0 }));
    assert_eq!(on_disk.get("second"), Some(WordEntry { spam_count: 0, ham_count: 1 }));
  }
}
