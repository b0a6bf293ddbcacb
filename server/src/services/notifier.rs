// homeworks/src/services/notifier.rs

use crate::errors::AppError;
use crate::models::notification::{NewNotification, Notification};
use crate::services::push::{PushMessage, PushRelay};
use crate::store::Store;
use std::sync::Arc;
use tracing::{info_span, instrument, warn, Instrument};

/// Writes notification rows and, when a push relay is configured, fires a
/// detached push for each. Push failures are logged only.
#[derive(Clone)]
pub struct Notifier {
  store: Arc<dyn Store>,
  push: Option<Arc<PushRelay>>,
}

impl Notifier {
  pub fn new(store: Arc<dyn Store>, push: Option<Arc<PushRelay>>) -> Self {
    Self { store, push }
  }

  #[instrument(name = "notifier::notify", skip_all, fields(recipient = %new_notification.recipient_id, kind = %new_notification.kind), err(Display))]
  pub async fn notify(&self, new_notification: NewNotification) -> Result<Notification, AppError> {
    let row = self.store.insert_notification(new_notification).await?;

    if let Some(push) = self.push.clone() {
      let message = PushMessage {
        recipients: vec![row.recipient_id],
        title: row.title.clone(),
        body: row.body.clone(),
        link: row.link.clone(),
      };
      let span = info_span!("push_delivery", notification_id = %row.id);
      tokio::spawn(
        async move {
          if let Err(e) = push.send(&message).await {
            warn!(error = %e, "Push delivery failed; notification row is kept.");
          }
        }
        .instrument(span),
      );
    }
    Ok(row)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::{MemoryStore, NotificationStore};
  use uuid::Uuid;

  #[tokio::test]
  async fn notify_without_push_only_writes_the_row() {
    let store = Arc::new(MemoryStore::new());
    let notifier = Notifier::new(store.clone(), None);
    let recipient = Uuid::new_v4();
    let row = notifier
      .notify(NewNotification {
        recipient_id: recipient,
        title: "Hello".into(),
        body: "World".into(),
        link: None,
        kind: "system".into(),
      })
      .await
      .unwrap();
    assert_eq!(row.recipient_id, recipient);
    assert_eq!(store.unread_count(recipient).await.unwrap(), 1);
  }

  #[tokio::test]
  async fn unreachable_push_relay_does_not_fail_notify() {
    let store = Arc::new(MemoryStore::new());
    let relay = PushRelay::new(reqwest::Client::new(), "http://127.0.0.1:9/push", None);
    let notifier = Notifier::new(store.clone(), Some(Arc::new(relay)));
    let recipient = Uuid::new_v4();
    notifier
      .notify(NewNotification {
        recipient_id: recipient,
        title: "t".into(),
        body: "b".into(),
        link: None,
        kind: "order".into(),
      })
      .await
      .unwrap();
    assert_eq!(store.list_notifications(recipient, 10).await.unwrap().len(), 1);
  }
}
