// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `/sync` response parsing into [`HomeEvent`]s.

use std::collections::BTreeMap;
use std::str::FromStr;

use marionette_core::events::{
    HomeEvent, Membership, MembershipEvent, ReceiptEvent, RoomMessageContent, RoomMessageEvent,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::trace;

#[derive(Debug, Default, Deserialize)]
pub struct SyncResponse {
    pub next_batch: String,
    #[serde(default)]
    pub rooms: Rooms,
}

#[derive(Debug, Default, Deserialize)]
pub struct Rooms {
    #[serde(default)]
    pub join: BTreeMap<String, RoomUpdate>,
    #[serde(default)]
    pub leave: BTreeMap<String, RoomUpdate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RoomUpdate {
    #[serde(default)]
    pub state: EventList,
    #[serde(default)]
    pub timeline: EventList,
    #[serde(default)]
    pub ephemeral: EventList,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventList {
    #[serde(default)]
    pub events: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    event_id: Option<String>,
    #[serde(default)]
    sender: Option<String>,
    #[serde(default)]
    state_key: Option<String>,
    #[serde(default)]
    content: Value,
}

impl SyncResponse {
    /// Every event in the batch, in room order then stream order.
    pub fn into_events(self) -> Vec<HomeEvent> {
        let mut events = Vec::new();
        for (room_id, update) in self.rooms.join.into_iter().chain(self.rooms.leave) {
            for raw in update.state.events.into_iter().chain(update.timeline.events) {
                if let Some(event) = parse_room_event(&room_id, raw) {
                    events.push(event);
                }
            }
            for raw in update.ephemeral.events {
                events.extend(parse_receipts(&room_id, &raw));
            }
        }
        events
    }

    /// Events of the initial sync: history is not relayed, so messages only
    /// advance the per-room latest event and receipts are dropped.
    pub fn into_initial_events(self) -> Vec<HomeEvent> {
        self.into_events()
            .into_iter()
            .filter_map(|event| match event {
                HomeEvent::RoomMessage(ev) => Some(HomeEvent::Other {
                    event_type: "m.room.message".to_string(),
                    room_id: ev.room_id,
                    event_id: Some(ev.event_id),
                }),
                HomeEvent::Receipt(_) => None,
                other => Some(other),
            })
            .collect()
    }
}

fn parse_room_event(room_id: &str, mut raw: Value) -> Option<HomeEvent> {
    let event: RawEvent = match serde_json::from_value(raw.clone()) {
        Ok(event) => event,
        Err(e) => {
            trace!(room_id = %room_id, error = %e, "skipping malformed event");
            return None;
        }
    };

    match event.event_type.as_str() {
        "m.room.message" => {
            let content: RoomMessageContent = serde_json::from_value(event.content).ok()?;
            if let Some(obj) = raw.as_object_mut() {
                obj.insert("room_id".to_string(), Value::String(room_id.to_string()));
            }
            Some(HomeEvent::RoomMessage(RoomMessageEvent {
                event_id: event.event_id?,
                room_id: room_id.to_string(),
                sender: event.sender?,
                content,
                raw,
            }))
        }
        "m.room.member" => {
            let membership = event
                .content
                .get("membership")
                .and_then(Value::as_str)
                .and_then(|m| Membership::from_str(m).ok())?;
            Some(HomeEvent::Membership(MembershipEvent {
                room_id: room_id.to_string(),
                user_id: event.state_key?,
                membership,
            }))
        }
        _ => Some(HomeEvent::Other {
            event_type: event.event_type,
            room_id: room_id.to_string(),
            event_id: event.event_id,
        }),
    }
}

/// Flattens an `m.receipt` EDU into one event per (event, reader).
fn parse_receipts(room_id: &str, raw: &Value) -> Vec<HomeEvent> {
    if raw.get("type").and_then(Value::as_str) != Some("m.receipt") {
        return Vec::new();
    }
    let Some(content) = raw.get("content").and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut receipts = Vec::new();
    for (event_id, kinds) in content {
        let Some(readers) = kinds.get("m.read").and_then(Value::as_object) else {
            continue;
        };
        for user_id in readers.keys() {
            receipts.push(HomeEvent::Receipt(ReceiptEvent {
                room_id: room_id.to_string(),
                event_id: event_id.clone(),
                user_id: user_id.clone(),
            }));
        }
    }
    receipts
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(body: Value) -> SyncResponse {
        serde_json::from_value(body).unwrap()
    }

    fn sample() -> SyncResponse {
        response(json!({
            "next_batch": "s2",
            "rooms": {
                "join": {
                    "!r:example.org": {
                        "state": { "events": [
                            { "type": "m.room.member", "state_key": "@alice:example.org",
                              "sender": "@alice:example.org", "event_id": "$m1",
                              "content": { "membership": "join" } }
                        ]},
                        "timeline": { "events": [
                            { "type": "m.room.message", "event_id": "$e1",
                              "sender": "@alice:example.org",
                              "content": { "msgtype": "m.text", "body": "hi" } },
                            { "type": "m.room.topic", "event_id": "$t1", "state_key": "",
                              "sender": "@alice:example.org", "content": { "topic": "x" } }
                        ]},
                        "ephemeral": { "events": [
                            { "type": "m.receipt", "content": {
                                "$e1": { "m.read": { "@alice:example.org": { "ts": 1 } } }
                            }},
                            { "type": "m.typing", "content": { "user_ids": [] } }
                        ]}
                    }
                },
                "leave": {
                    "!old:example.org": {
                        "timeline": { "events": [
                            { "type": "m.room.member", "state_key": "@alice:example.org",
                              "sender": "@alice:example.org", "event_id": "$l1",
                              "content": { "membership": "leave" } }
                        ]}
                    }
                }
            }
        }))
    }

    #[test]
    fn parses_all_event_kinds() {
        let events = sample().into_events();
        assert_eq!(events.len(), 5);

        assert!(matches!(
            &events[0],
            HomeEvent::Membership(m) if m.membership == Membership::Join && m.user_id == "@alice:example.org"
        ));
        let HomeEvent::RoomMessage(msg) = &events[1] else {
            panic!("expected a message, got {:?}", events[1]);
        };
        assert_eq!(msg.content.body, "hi");
        assert_eq!(msg.raw["room_id"], "!r:example.org");
        assert!(matches!(
            &events[2],
            HomeEvent::Other { event_type, event_id: Some(id), .. } if event_type == "m.room.topic" && id == "$t1"
        ));
        assert_eq!(
            events[3],
            HomeEvent::Receipt(ReceiptEvent {
                room_id: "!r:example.org".into(),
                event_id: "$e1".into(),
                user_id: "@alice:example.org".into(),
            })
        );
        assert!(matches!(
            &events[4],
            HomeEvent::Membership(m) if m.membership == Membership::Leave && m.room_id == "!old:example.org"
        ));
    }

    #[test]
    fn initial_events_do_not_replay_history() {
        let events = sample().into_initial_events();
        assert!(events.iter().all(|e| !matches!(
            e,
            HomeEvent::RoomMessage(_) | HomeEvent::Receipt(_)
        )));
        assert!(events.contains(&HomeEvent::Other {
            event_type: "m.room.message".into(),
            room_id: "!r:example.org".into(),
            event_id: Some("$e1".into()),
        }));
    }

    #[test]
    fn malformed_events_are_skipped() {
        let events = response(json!({
            "next_batch": "s1",
            "rooms": { "join": { "!r:x": { "timeline": { "events": [
                { "no_type": true },
                { "type": "m.room.member", "state_key": "@a:x", "content": { "membership": "dance" } },
                { "type": "m.room.message", "sender": "@a:x", "content": { "body": "no id" } }
            ]}}}}
        }))
        .into_events();
        assert!(events.is_empty());
    }

    #[test]
    fn empty_response_has_no_events() {
        let events = response(json!({ "next_batch": "s0" })).into_events();
        assert!(events.is_empty());
    }
}
