//! Cross-thread FIFO marshaling of window mutations onto the owning
//! thread.
//!
//! Any thread may schedule a command; only the owning thread drains.
//! Commands queued by one thread run in that thread's submission order,
//! and the shared queue preserves overall arrival order across
//! submitters.

use casement_platform::{OwningThread, PlatformWindow};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

/// A deferred window mutation.
///
/// Commands receive the platform handle when they run; they own
/// everything else they need. A command reports its own failures
/// (typically a log line), the scheduler does not inspect results.
pub type WindowCommand = Box<dyn FnOnce(&mut dyn PlatformWindow) + Send>;

/// FIFO queue of deferred window mutations.
///
/// The receiving half lives with the controller on the owning thread;
/// [`CommandSender`] handles are cloned out to any thread that needs to
/// schedule work.
pub struct CommandScheduler {
    sender: Sender<WindowCommand>,
    receiver: Receiver<WindowCommand>,
    owner: OwningThread,
}

impl CommandScheduler {
    /// Create a scheduler owned by the current thread.
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender,
            receiver,
            owner: OwningThread::capture(),
        }
    }

    /// A cloneable handle for scheduling from other threads.
    pub fn sender(&self) -> CommandSender {
        CommandSender {
            sender: self.sender.clone(),
        }
    }

    /// Queue a command from the owning side.
    pub fn schedule(&self, command: impl FnOnce(&mut dyn PlatformWindow) + Send + 'static) {
        // Send cannot fail while `self` holds the receiver.
        let _ = self.sender.send(Box::new(command));
    }

    /// Execute every queued command in submission order.
    ///
    /// Must be called on the owning thread, once per tick. Returns the
    /// number of commands run.
    ///
    /// # Panics
    ///
    /// Panics when called from any other thread.
    pub fn drain(&self, platform: &mut dyn PlatformWindow) -> usize {
        self.owner.assert_current("CommandScheduler::drain");

        let mut executed = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(command) => {
                    command(platform);
                    executed += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        if executed > 0 {
            tracing::trace!(executed, "drained window command queue");
        }
        executed
    }
}

impl Default for CommandScheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable, thread-safe handle for queueing window commands.
#[derive(Clone)]
pub struct CommandSender {
    sender: Sender<WindowCommand>,
}

impl CommandSender {
    /// Queue a command; may be called from any thread.
    ///
    /// Commands queued after the window shuts down are silently dropped.
    pub fn schedule(&self, command: impl FnOnce(&mut dyn PlatformWindow) + Send + 'static) {
        if self.sender.send(Box::new(command)).is_err() {
            tracing::trace!("window command dropped, scheduler is gone");
        }
    }
}
