use std::thread;

/// A handle to a task spawned via [`Spawn::spawn`]. Lets a caller join the background phase
/// without being tied to a particular `Spawn` implementation.
pub trait Task: Send {
  /// Blocks until the task finishes.
  fn join(self: Box<Self>);
}

/// The task spawner external collaborator: hands a closure off to run independently of the
/// caller, returning a handle the caller can join on. The chain's background (deferred) phase
/// runs on whatever `Spawn` the caller supplies.
pub trait Spawn: Send + Sync {
  fn spawn(&self, task: Box<dyn FnOnce() + Send>) -> Box<dyn Task>;
}

/// The default, thread-backed spawner: a synchronous, thread-based concurrency model with no
/// async runtime pulled in.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadSpawn;

impl Spawn for ThreadSpawn {
  fn spawn(&self, task: Box<dyn FnOnce() + Send>) -> Box<dyn Task> {
    Box::new(ThreadTask(thread::spawn(task)))
  }
}

struct ThreadTask(thread::JoinHandle<()>);

impl Task for ThreadTask {
  fn join(self: Box<Self>) {
    // A panicking task is already logged/absorbed at the chain level (see
    // `Chain::deferred_combine`); there's nothing further to do with the join error here.
    let _ = self.0.join();
  }
}
