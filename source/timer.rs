use std::{sync::mpsc, thread, time};

enum Command {
  Rearm(time::Duration),
  Stop,
}

/// A handle to a single-shot, replayable timer created by [`Timer::create`]. Cheap to clone (it's
/// a channel sender); cloning does not affect the underlying timer's lifetime. There is no
/// automatic cleanup on drop: this background machinery isn't cancellable from within the
/// library. Call [`TimerHandle::stop`] explicitly to retire a timer's thread.
#[derive(Clone)]
pub struct TimerHandle {
  sender: mpsc::Sender<Command>,
}

impl TimerHandle {
  pub fn stop(&self) {
    let _ = self.sender.send(Command::Stop);
  }
}

/// The timer external collaborator: single-shot, and replayable by rearming. Rearming before the
/// timer fires resets the delay (this is what gives the Bayesian writer its debounce behavior);
/// rearming has no effect once the callback has started running for that arming.
pub trait Timer: Send + Sync {
  fn create(&self, callback: Box<dyn Fn() + Send + Sync>) -> TimerHandle;
  fn rearm(&self, handle: &TimerHandle, delay: time::Duration);
}

/// The default, thread-backed timer: one parked worker thread per timer, woken by `rearm`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadTimer;

impl Timer for ThreadTimer {
  fn create(&self, callback: Box<dyn Fn() + Send + Sync>) -> TimerHandle {
    let (sender, receiver) = mpsc::channel::<Command>();
    thread::spawn(move || loop {
      match receiver.recv() {
        Ok(Command::Rearm(mut delay)) => loop {
          match receiver.recv_timeout(delay) {
            Ok(Command::Rearm(new_delay)) => delay = new_delay,
            Ok(Command::Stop) => return,
            Err(mpsc::RecvTimeoutError::Timeout) => {
              callback();
              break;
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => return,
          }
        },
        Ok(Command::Stop) | Err(_) => return,
      }
    });
    TimerHandle { sender }
  }

  fn rearm(&self, handle: &TimerHandle, delay: time::Duration) {
    // A disconnected receiver means the timer's thread already exited (e.g. the handle was
    // dropped concurrently); there's nothing useful to do about that here.
    let _ = handle.sender.send(Command::Rearm(delay));
  }
}
