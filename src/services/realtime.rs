use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use mongodb::bson::oid::ObjectId;
use rocket::tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

/// A live event pushed to currently-subscribed sessions. `sender` lets
/// chat subscribers drop their own echoes.
#[derive(Debug, Clone)]
pub struct RealtimeEvent {
    pub name: String,
    pub sender: Option<ObjectId>,
    pub payload: serde_json::Value,
}

impl RealtimeEvent {
    pub fn new(name: &str, payload: serde_json::Value) -> Self {
        RealtimeEvent {
            name: name.to_string(),
            sender: None,
            payload,
        }
    }

    pub fn from_sender(name: &str, sender: ObjectId, payload: serde_json::Value) -> Self {
        RealtimeEvent {
            name: name.to_string(),
            sender: Some(sender),
            payload,
        }
    }
}

/// In-process publish/subscribe hub. One broadcast channel per topic,
/// created lazily on first subscribe or publish. Delivery is
/// fire-and-forget: a publish with no live subscriber is dropped, the
/// durable record (notification, message) has already been persisted by
/// the caller.
#[derive(Clone)]
pub struct EventHub {
    channels: Arc<Mutex<HashMap<String, broadcast::Sender<RealtimeEvent>>>>,
}

pub const PRESENCE_TOPIC: &str = "presence";

impl EventHub {
    pub fn new() -> Self {
        EventHub {
            channels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn user_topic(user_id: &ObjectId) -> String {
        format!("user:{}", user_id.to_hex())
    }

    pub fn gig_topic(gig_id: &ObjectId) -> String {
        format!("gig:{}", gig_id.to_hex())
    }

    pub fn chat_topic(chat_id: &ObjectId) -> String {
        format!("chat:{}", chat_id.to_hex())
    }

    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<RealtimeEvent> {
        let mut channels = self.channels.lock().unwrap();
        channels
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    pub fn publish(&self, topic: &str, event: RealtimeEvent) {
        let mut channels = self.channels.lock().unwrap();
        if let Some(sender) = channels.get(topic) {
            if sender.receiver_count() == 0 {
                // Last subscriber is gone, reclaim the channel.
                channels.remove(topic);
                return;
            }
            let _ = sender.send(event);
        }
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_reaches_subscriber() {
        let hub = EventHub::new();
        let user = ObjectId::new();
        let topic = EventHub::user_topic(&user);

        let mut rx = hub.subscribe(&topic);
        hub.publish(&topic, RealtimeEvent::new("newNotification", serde_json::json!({"x": 1})));

        let event = rx.try_recv().unwrap();
        assert_eq!(event.name, "newNotification");
        assert_eq!(event.payload["x"], 1);
    }

    #[test]
    fn test_publish_without_subscriber_is_dropped() {
        let hub = EventHub::new();
        // Must not panic or block.
        hub.publish("user:nobody", RealtimeEvent::new("newNotification", serde_json::json!({})));
    }

    #[test]
    fn test_topics_are_isolated() {
        let hub = EventHub::new();
        let mut rx_a = hub.subscribe("chat:a");
        let _rx_b = hub.subscribe("chat:b");

        hub.publish("chat:b", RealtimeEvent::new("message received", serde_json::json!({})));
        assert!(rx_a.try_recv().is_err());
    }

    #[test]
    fn test_sender_tag_round_trip() {
        let hub = EventHub::new();
        let sender = ObjectId::new();
        let mut rx = hub.subscribe("chat:c");

        hub.publish(
            "chat:c",
            RealtimeEvent::from_sender("message received", sender, serde_json::json!({})),
        );
        assert_eq!(rx.try_recv().unwrap().sender, Some(sender));
    }
}
