use std::sync::{Arc, Weak};

use tracing::Instrument;

use crate::mailbox::{Mailbox, MailboxParts, Reply};
use crate::scheduler::run_actor;
use crate::{ActorDeadError, Message};

/// Handle to an actor.
///
/// The actor keeps running as long as at least one `Actor` handle is
/// alive. Use [`Actor::downgrade`] for handles that must not extend the
/// actor's lifetime, such as those held by background timers.
pub struct Actor<S> {
    mailbox: Arc<Mailbox<S>>,
}

impl<S: Send + 'static> Actor<S> {
    /// Spawns a new actor with the specified state and an optional label.
    ///
    /// The label shows up in the `actor` tracing span wrapping every
    /// message the actor handles.
    pub fn spawn(state: S, label: Option<&str>) -> Self {
        let MailboxParts {
            mailbox,
            msg_rx,
            kill_rx,
        } = Mailbox::new();
        let mailbox = Arc::new(mailbox);
        tokio::spawn(
            run_actor(Arc::downgrade(&mailbox), state, msg_rx, kill_rx)
                .instrument(trace_span!("actor", label = label)),
        );
        Self { mailbox }
    }

    #[inline]
    pub(crate) fn from_mailbox(mailbox: Arc<Mailbox<S>>) -> Self {
        Self { mailbox }
    }

    /// Sends a message to the actor.
    #[inline]
    pub fn send<M: Message<S> + 'static>(
        &self,
        msg: M,
    ) -> Result<(), ActorDeadError> {
        self.mailbox.send(Box::new(msg))
    }

    /// Sends a message carrying a [`Reply`] and waits for the actor to
    /// answer it.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe in the sense that the message is either
    /// not sent at all or will still be handled; only the reply is lost
    /// when the returned future is dropped.
    pub async fn ask<R, M, F>(&self, make_msg: F) -> Result<R, ActorDeadError>
    where
        M: Message<S> + 'static,
        F: FnOnce(Reply<R>) -> M,
    {
        let (reply, rx) = Reply::channel();
        self.send(make_msg(reply))?;
        rx.await.map_err(|_| ActorDeadError)
    }

    /// Creates a handle that doesn't keep the actor alive.
    #[inline]
    pub fn downgrade(&self) -> WeakActor<S> {
        WeakActor {
            mailbox: Arc::downgrade(&self.mailbox),
        }
    }

    /// Returns whether the actor task has stopped receiving messages.
    #[inline]
    pub fn is_dead(&self) -> bool {
        self.mailbox.is_closed()
    }

    /// Attempts to kill the actor.
    ///
    /// The actor is not guaranteed to be killed immediately, but it
    /// will stop handling further messages and quit soon.
    #[inline]
    pub fn try_kill(&self) {
        self.mailbox.try_kill();
    }
}

impl<S> Clone for Actor<S> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            mailbox: Arc::clone(&self.mailbox),
        }
    }
}

/// A non-owning handle to an actor, created by [`Actor::downgrade`].
pub struct WeakActor<S> {
    mailbox: Weak<Mailbox<S>>,
}

impl<S: Send + 'static> WeakActor<S> {
    /// Attempts to get a strong handle, returning `None` once every strong
    /// handle has been dropped.
    #[inline]
    pub fn upgrade(&self) -> Option<Actor<S>> {
        self.mailbox.upgrade().map(Actor::from_mailbox)
    }

    /// Sends a message if the actor is still alive.
    #[inline]
    pub fn send<M: Message<S> + 'static>(
        &self,
        msg: M,
    ) -> Result<(), ActorDeadError> {
        let Some(mailbox) = self.mailbox.upgrade() else {
            return Err(ActorDeadError);
        };
        mailbox.send(Box::new(msg))
    }
}

impl<S> Clone for WeakActor<S> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            mailbox: Weak::clone(&self.mailbox),
        }
    }
}
