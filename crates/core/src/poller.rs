use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use voyagr_model::TripSnapshot;

use crate::backend_client::BackendClient;
use crate::error::BackendFailure;
use crate::reconciler::PollTag;

/// A running poll loop for one conversation.
///
/// Dropping the poller stops the loop before its next tick. A poll that is
/// already in flight still completes and is delivered; the receiver is
/// expected to discard it by its tag.
#[derive(Debug)]
pub struct Poller {
    tag: PollTag,
    _stop_tx: watch::Sender<()>,
}

impl Poller {
    /// Starts polling right away and then every `period`, one poll at a
    /// time. `on_result` returns `false` once nobody is interested in the
    /// results anymore, which ends the loop too.
    pub fn spawn<F>(
        client: BackendClient,
        tag: PollTag,
        period: Duration,
        on_result: F,
    ) -> Self
    where
        F: Fn(PollTag, Result<TripSnapshot, BackendFailure>) -> bool + Send + 'static,
    {
        let (stop_tx, mut stop_rx) = watch::channel(());
        let loop_tag = tag.clone();
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {}
                }
                trace!("polling {loop_tag}");
                let result = client.get_conversation(loop_tag.conversation_id()).await;
                if !on_result(loop_tag.clone(), result) {
                    break;
                }
            }
            debug!("poller for {loop_tag} stopped");
        });
        Self {
            tag,
            _stop_tx: stop_tx,
        }
    }

    /// The tag every poll of this loop carries.
    #[inline]
    pub fn tag(&self) -> &PollTag {
        &self.tag
    }
}
