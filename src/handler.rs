//! Delivery of decoded commands to control logic.
//!
//! The receive task calls [`CommandHandler::on_command`] inline for every
//! accepted command, so a handler that blocks stalls every receive after it.
//! Handlers must return promptly; long-running work belongs on a task the
//! handler hands off to.
//!
//! Two ready-made shapes cover most control loops:
//!
//! - any `Fn(Command) + Send + Sync + 'static` closure is a handler;
//! - [`CommandQueue`] hands commands to a bounded channel and exposes the
//!   other end as a `Stream`, for control logic that wants to `await`
//!   commands on its own task.
//!
//! ```rust
//! use eyerobot_link::handler::CommandQueue;
//! use futures::StreamExt;
//!
//! # async fn demo() {
//! let (queue, mut commands) = CommandQueue::bounded(16);
//! // Connection::bind(&config, queue).await ...
//! while let Some(command) = commands.next().await {
//!     println!("motors: {}", command.motors);
//! }
//! # }
//! ```

use futures::Stream;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;

use crate::types::Command;

/// Receiver of accepted commands. Invoked on the receive task.
pub trait CommandHandler: Send + Sync + 'static {
    fn on_command(&self, command: Command);
}

impl<F> CommandHandler for F
where
    F: Fn(Command) + Send + Sync + 'static,
{
    fn on_command(&self, command: Command) {
        self(command)
    }
}

/// Handler that forwards commands into a bounded channel.
///
/// A full channel drops the command instead of waiting, so a slow consumer
/// never holds up the receive task. Drops are counted and logged.
#[derive(Debug)]
pub struct CommandQueue {
    tx: mpsc::Sender<Command>,
    dropped: AtomicU64,
}

impl CommandQueue {
    /// Create a queue holding up to `capacity` undelivered commands.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero, as [`tokio::sync::mpsc::channel`] does.
    pub fn bounded(
        capacity: usize,
    ) -> (Self, impl Stream<Item = Command> + Send + Unpin + 'static) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx, dropped: AtomicU64::new(0) }, ReceiverStream::new(rx))
    }

    /// Commands dropped because the consumer fell behind or went away.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl CommandHandler for CommandQueue {
    fn on_command(&self, command: Command) {
        if let Err(err) = self.tx.try_send(command) {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            match err {
                mpsc::error::TrySendError::Full(_) => {
                    warn!(dropped, motors = %command.motors, "Command queue full, dropping command");
                }
                mpsc::error::TrySendError::Closed(_) => {
                    warn!(dropped, "Command consumer gone, dropping command");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::sync::{Arc, Mutex};

    #[test]
    fn closures_are_handlers() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler = move |command: Command| sink.lock().unwrap().push(command);

        handler.on_command(Command::new(1, 2, 3, 4));
        assert_eq!(*seen.lock().unwrap(), vec![Command::new(1, 2, 3, 4)]);
    }

    #[tokio::test]
    async fn queue_delivers_in_order() {
        let (queue, commands) = CommandQueue::bounded(4);
        queue.on_command(Command::new(1, 0, 0, 0));
        queue.on_command(Command::new(2, 0, 0, 0));
        drop(queue);

        let received: Vec<Command> = commands.collect().await;
        assert_eq!(received, vec![Command::new(1, 0, 0, 0), Command::new(2, 0, 0, 0)]);
    }

    #[tokio::test]
    async fn full_queue_drops_without_blocking() {
        let (queue, commands) = CommandQueue::bounded(1);
        queue.on_command(Command::new(1, 0, 0, 0));
        queue.on_command(Command::new(2, 0, 0, 0));
        queue.on_command(Command::new(3, 0, 0, 0));
        assert_eq!(queue.dropped(), 2);

        drop(queue);
        let received: Vec<Command> = commands.collect().await;
        assert_eq!(received, vec![Command::new(1, 0, 0, 0)]);
    }

    #[test]
    fn closed_consumer_counts_as_drop() {
        let (queue, commands) = CommandQueue::bounded(2);
        drop(commands);
        queue.on_command(Command::new(5, 5, 5, 5));
        assert_eq!(queue.dropped(), 1);
    }
}
