use std::sync::Weak;

use tokio::select;
use tokio::sync::{mpsc, watch};

use crate::mailbox::Mailbox;
use crate::{Actor, Message};

/// Drives one actor: messages are handled strictly one at a time, in the
/// order they were sent, on the task this future runs on.
#[inline]
pub async fn run_actor<S: Send + 'static>(
    mailbox: Weak<Mailbox<S>>,
    mut state: S,
    mut msg_rx: mpsc::UnboundedReceiver<Box<dyn Message<S>>>,
    mut kill_rx: watch::Receiver<bool>,
) {
    debug!("started");
    let mut handled = 0u64;
    loop {
        let msg = select! {
            biased;

            _ = kill_rx.changed() => {
                debug!("killed");
                break;
            }
            msg = msg_rx.recv() => {
                let Some(msg) = msg else {
                    break;
                };
                msg
            }
        };
        trace!("received message: {msg:?}");

        let Some(mailbox) = mailbox.upgrade() else {
            warn!("last handle has been dropped, discard the message");
            break;
        };

        let proc_span = trace_span!("proc msg", seq = handled);
        proc_span.in_scope(|| {
            msg.handle(&mut state, &Actor::from_mailbox(mailbox));
            trace!("finished");
        });
        handled += 1;
    }
    // Dropping the state here releases whatever it owns (timers, channels)
    // before the task ends.
    drop(state);
    debug!(handled, "will terminate");
}
