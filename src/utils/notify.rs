//! In-process pub/sub for client notifications.
//!
//! Subscribers join rooms (an employee number, or `role:<role>`). Delivery is
//! best effort and at most once: nothing is queued for absent subscribers and
//! closed channels are pruned the next time their room is published to.

use actix_web::web::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

pub const PAGE_ACCESS_GRANTED: &str = "pageAccessGranted";
pub const PAGE_ACCESS_REVOKED: &str = "pageAccessRevoked";
pub const PAYROLL_FINALIZED: &str = "payrollFinalized";
pub const PAYROLL_RELEASED: &str = "payrollReleased";
pub const ATTENDANCE_CHANGED: &str = "attendanceChanged";

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub event: String,
    pub payload: Value,
    pub timestamp: String,
}

impl Notification {
    pub fn new(event: &str, payload: Value, at: DateTime<Utc>) -> Self {
        Self {
            event: event.to_string(),
            payload,
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// Server-Sent Events frame.
    pub fn to_sse(&self) -> Bytes {
        let data = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        Bytes::from(format!("event: {}\ndata: {}\n\n", self.event, data))
    }
}

#[derive(Default)]
pub struct NotificationHub {
    rooms: RwLock<HashMap<String, Vec<UnboundedSender<Notification>>>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// One receiver fed by every room in `rooms`.
    pub fn subscribe(&self, rooms: &[String]) -> UnboundedReceiver<Notification> {
        let (tx, rx) = unbounded();
        let mut map = self.rooms.write().unwrap_or_else(PoisonError::into_inner);
        for room in rooms {
            map.entry(room.clone()).or_default().push(tx.clone());
        }
        rx
    }

    /// Returns how many subscribers received the event.
    pub fn emit(&self, room: &str, event: &str, payload: Value) -> usize {
        let note = Notification::new(event, payload, Utc::now());
        let mut map = self.rooms.write().unwrap_or_else(PoisonError::into_inner);

        let Some(senders) = map.get_mut(room) else {
            return 0;
        };

        senders.retain(|tx| tx.unbounded_send(note.clone()).is_ok());
        let delivered = senders.len();
        if senders.is_empty() {
            map.remove(room);
        }

        tracing::debug!(room, event, delivered, "Notification emitted");
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn delivers_to_room_members_only() {
        let hub = NotificationHub::new();
        let mut a = hub.subscribe(&["2024-0001".into(), "role:staff".into()]);
        let mut b = hub.subscribe(&["2024-0002".into()]);

        assert_eq!(hub.emit("2024-0001", PAYROLL_RELEASED, json!({"id": 1})), 1);

        let got = a.try_next().unwrap().unwrap();
        assert_eq!(got.event, PAYROLL_RELEASED);
        assert_eq!(got.payload["id"], 1);
        assert!(b.try_next().is_err(), "b must not receive anything");
    }

    #[test]
    fn role_room_reaches_every_member() {
        let hub = NotificationHub::new();
        let mut a = hub.subscribe(&["role:administrator".into()]);
        let mut b = hub.subscribe(&["role:administrator".into()]);
        assert_eq!(hub.emit("role:administrator", PAYROLL_FINALIZED, json!({})), 2);
        assert!(a.try_next().unwrap().is_some());
        assert!(b.try_next().unwrap().is_some());
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let hub = NotificationHub::new();
        let rx = hub.subscribe(&["room".into()]);
        drop(rx);
        assert_eq!(hub.emit("room", PAGE_ACCESS_GRANTED, json!({})), 0);

        let _live = hub.subscribe(&["room".into()]);
        assert_eq!(hub.emit("room", PAGE_ACCESS_GRANTED, json!({})), 1);
    }

    #[test]
    fn emitting_to_an_empty_room_is_a_no_op() {
        let hub = NotificationHub::new();
        assert_eq!(hub.emit("nobody", PAGE_ACCESS_REVOKED, json!({})), 0);
    }

    #[test]
    fn sse_frame_has_event_and_data_lines() {
        let at = DateTime::parse_from_rfc3339("2024-03-04T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let note = Notification::new(ATTENDANCE_CHANGED, json!({"date": "2024-03-04"}), at);
        let frame = String::from_utf8(note.to_sse().to_vec()).unwrap();
        assert!(frame.starts_with("event: attendanceChanged\ndata: {"));
        assert!(frame.contains("\"timestamp\":\"2024-03-04T08:00:00.000Z\""));
        assert!(frame.ends_with("\n\n"));
    }
}
