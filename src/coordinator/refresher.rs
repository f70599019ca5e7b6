//! The periodic metadata refresher: posts a full-metadata message at a
//! fixed interval for as long as the coordinator is running.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::agent::Message;

/// Spawns the refresher task. The first tick is consumed immediately so
/// the interval is measured from start-up rather than firing an
/// immediate, redundant refresh on top of the one `start()` already did.
pub(crate) fn spawn(mailbox: mpsc::Sender<Message>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if mailbox
                .send(Message::FullMetadata { reply: None })
                .await
                .is_err()
            {
                break;
            }
        }
    })
}
