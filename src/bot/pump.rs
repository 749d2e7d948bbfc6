use crate::bot::dispatch::Dispatcher;
use crate::core::{ChatUser, Inbound, Reply};
use anyhow::Result;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use tracing::{debug, warn};

/// Delivers replies back through whatever transport produced the events.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn deliver(&self, user: &ChatUser, reply: Reply) -> Result<()>;
}

/// Handles events concurrently until the stream ends. Events of one user
/// are applied and answered in arrival order. A failed delivery is logged
/// and does not stop the pump.
pub async fn run<S>(events: S, dispatcher: Arc<Dispatcher>, sink: Arc<dyn ReplySink>, limit: usize)
where
    S: Stream<Item = Inbound>,
{
    events
        .for_each_concurrent(limit.max(1), |event| {
            let dispatcher = Arc::clone(&dispatcher);
            let sink = Arc::clone(&sink);
            async move {
                debug!(user = %event.user.id, "Handling event");
                if let Err(e) = dispatcher.handle_and_deliver(&event, sink.as_ref()).await {
                    warn!(error = %e, user = %event.user.id, "Failed to deliver reply");
                }
            }
        })
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::dispatch::test_support::RecordingSink;
    use crate::bot::engine::test_support::StaticRates;
    use crate::bot::wizard::ConversationStore;
    use crate::core::UserId;
    use crate::core::config::BotConfig;
    use crate::store::memory::MemoryCollection;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Outbox {
        sent: Mutex<HashMap<UserId, Vec<String>>>,
        fail_for: Option<UserId>,
    }

    #[async_trait]
    impl ReplySink for Outbox {
        async fn deliver(&self, user: &ChatUser, reply: Reply) -> Result<()> {
            if self.fail_for == Some(user.id) {
                anyhow::bail!("chat closed");
            }
            self.sent
                .lock()
                .unwrap()
                .entry(user.id)
                .or_default()
                .push(reply.text);
            Ok(())
        }
    }

    fn dispatcher() -> Arc<Dispatcher> {
        let rates = StaticRates::default()
            .with_rates("EUR", &[("USD", 1.1)])
            .with_rates("USD", &[("EUR", 0.9)]);
        Arc::new(Dispatcher::new(
            ConversationStore::new(Arc::new(MemoryCollection::new())),
            Arc::new(rates),
            Arc::new(RecordingSink::default()),
            BotConfig::default(),
        ))
    }

    /// Holds back the target prompt so a later reply could overtake it.
    #[derive(Default)]
    struct SlowOutbox {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ReplySink for SlowOutbox {
        async fn deliver(&self, _user: &ChatUser, reply: Reply) -> Result<()> {
            if reply.text.contains("select the target") {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            self.sent.lock().unwrap().push(reply.text);
            Ok(())
        }
    }

    fn wizard_events(id: i64, base: &str, target: &str) -> Vec<Inbound> {
        let user = ChatUser::new(id);
        vec![
            Inbound::command(user.clone(), "convert", &[]),
            Inbound::callback(user.clone(), base),
            Inbound::callback(user.clone(), target),
            Inbound::text(user, "10"),
        ]
    }

    #[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
    async fn test_interleaved_users_keep_their_order() {
        let a = wizard_events(1, "EUR", "USD");
        let b = wizard_events(2, "USD", "EUR");
        let events: Vec<Inbound> = a.into_iter().zip(b).flat_map(|(x, y)| [x, y]).collect();
        let outbox = Arc::new(Outbox::default());

        let events = futures::stream::iter(events);
        run(events, dispatcher(), outbox.clone(), 8).await;

        let sent = outbox.sent.lock().unwrap();
        assert_eq!(sent[&UserId(1)].len(), 4);
        assert!(sent[&UserId(1)][3].contains("10.00 🇪🇺 EUR = 11.00 🇺🇸 USD"));
        assert!(sent[&UserId(2)][3].contains("10.00 🇺🇸 USD = 9.00 🇪🇺 EUR"));
    }

    #[test_log::test(tokio::test)]
    async fn test_failed_delivery_does_not_stop_pump() {
        let outbox = Arc::new(Outbox {
            fail_for: Some(UserId(1)),
            ..Default::default()
        });
        let events = vec![
            Inbound::text(ChatUser::new(1), "10 usd to eur"),
            Inbound::text(ChatUser::new(2), "10 usd to eur"),
            Inbound::text(ChatUser::new(1), "hello"),
            Inbound::text(ChatUser::new(2), "hello"),
        ];

        let events = futures::stream::iter(events);
        run(events, dispatcher(), outbox.clone(), 2).await;

        let sent = outbox.sent.lock().unwrap();
        assert!(!sent.contains_key(&UserId(1)));
        assert_eq!(sent[&UserId(2)].len(), 2);
    }

    #[test_log::test(tokio::test)]
    async fn test_slow_delivery_keeps_reply_order() {
        let user = ChatUser::new(1);
        let events = vec![
            Inbound::command(user.clone(), "convert", &[]),
            Inbound::callback(user.clone(), "EUR"),
            Inbound::callback(user, "USD"),
        ];
        let outbox = Arc::new(SlowOutbox::default());

        let events = futures::stream::iter(events);
        run(events, dispatcher(), outbox.clone(), 8).await;

        let sent = outbox.sent.lock().unwrap();
        assert_eq!(sent.len(), 3);
        assert!(sent[0].contains("select the base"));
        assert!(sent[1].contains("select the target"));
        assert!(sent[2].contains("enter the amount"));
    }
}
