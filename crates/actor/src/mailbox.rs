use std::fmt::{self, Debug};

use tokio::sync::{mpsc, oneshot, watch};

use crate::{Actor, ActorDeadError};

/// Helper trait for handling boxed messages.
pub trait BoxMessage<S>: Send + Debug + 'static {
    fn handle_box(self: Box<Self>, state: &mut S, handle: &Actor<S>);
}

/// The message that an actor can handle.
pub trait Message<S>: BoxMessage<S> {
    /// Handles the message with mutable access to the actor's state.
    fn handle(self, state: &mut S, handle: &Actor<S>);
}

impl<S, M: Message<S>> BoxMessage<S> for M {
    #[inline]
    fn handle_box(self: Box<Self>, state: &mut S, handle: &Actor<S>) {
        (*self).handle(state, handle)
    }
}

impl<S, M: Message<S> + ?Sized> Message<S> for Box<M> {
    #[inline]
    fn handle(self, state: &mut S, handle: &Actor<S>) {
        self.handle_box(state, handle)
    }
}

/// The sending half of a request sent with [`Actor::ask`].
///
/// Dropping it without replying makes the asking side observe an
/// [`ActorDeadError`].
pub struct Reply<R> {
    tx: oneshot::Sender<R>,
}

impl<R> Reply<R> {
    #[inline]
    pub(crate) fn channel() -> (Self, oneshot::Receiver<R>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Sends the reply. The value is dropped silently if the asking side
    /// has gone away.
    #[inline]
    pub fn send(self, value: R) {
        self.tx.send(value).ok();
    }

    /// Returns whether the asking side is still waiting for the reply.
    #[inline]
    pub fn is_waiting(&self) -> bool {
        !self.tx.is_closed()
    }
}

impl<R> Debug for Reply<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reply")
            .field("waiting", &self.is_waiting())
            .finish()
    }
}

pub struct MailboxParts<S> {
    pub mailbox: Mailbox<S>,
    pub msg_rx: mpsc::UnboundedReceiver<Box<dyn Message<S>>>,
    pub kill_rx: watch::Receiver<bool>,
}

pub struct Mailbox<S> {
    msg_tx: mpsc::UnboundedSender<Box<dyn Message<S>>>,
    kill_tx: watch::Sender<bool>,
}

impl<S: Send + 'static> Mailbox<S> {
    #[inline]
    pub fn new() -> MailboxParts<S> {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let (kill_tx, kill_rx) = watch::channel(false);
        MailboxParts {
            mailbox: Mailbox { msg_tx, kill_tx },
            msg_rx,
            kill_rx,
        }
    }

    #[inline]
    pub fn send(&self, msg: Box<dyn Message<S>>) -> Result<(), ActorDeadError> {
        self.msg_tx.send(msg).map_err(|_| ActorDeadError)
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.msg_tx.is_closed()
    }

    #[inline]
    pub fn try_kill(&self) {
        self.kill_tx.send(true).ok();
    }
}
