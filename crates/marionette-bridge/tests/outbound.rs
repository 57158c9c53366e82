// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Home → third-party relay tests.

use marionette_bridge::{BridgeSettings, STATUS_ROOM_NOTICE};
use marionette_core::events::{
    HomeEvent, MSGTYPE_EMOTE, MediaInfo, Membership, MembershipEvent, ReceiptEvent,
    RoomMessageContent,
};
use marionette_core::types::{BangCommand, Origin, ThirdPartyMessage};
use marionette_core::RoomRepository;
use marionette_test_utils::{MockAdapter, MockSession, PUPPET_USER_ID, TestHarness};

const ROOM: &str = "!r:example.org";

/// A harness whose `ROOM` is already bridged to third-party room `t1`.
async fn bridged() -> TestHarness {
    bridged_with(TestHarness::builder().build().await.unwrap()).await
}

async fn bridged_with(h: TestHarness) -> TestHarness {
    h.directory.add_alias(&h.alias_for("t1"), ROOM).await;
    h
}

#[tokio::test]
async fn puppet_text_is_relayed_tagged() {
    let h = bridged().await;

    h.puppet_says("$e1", ROOM, RoomMessageContent::text("hey")).await;

    assert_eq!(
        h.adapter.sent_messages().await,
        vec![("t1".to_string(), "hey \u{feff}".to_string())]
    );
    // Reverse resolution was cached.
    assert_eq!(h.repository.third_party_room(ROOM).await.as_deref(), Some("t1"));
}

#[tokio::test]
async fn notices_and_emotes_are_relayed_as_text() {
    let h = bridged().await;

    h.puppet_says("$e1", ROOM, RoomMessageContent::notice("fyi")).await;
    let emote = RoomMessageContent {
        msgtype: MSGTYPE_EMOTE.to_string(),
        body: "waves".into(),
        ..Default::default()
    };
    h.puppet_says("$e2", ROOM, emote).await;

    let sent = h.adapter.sent_messages().await;
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].1, "waves \u{feff}");
}

#[tokio::test]
async fn messages_from_other_users_are_ignored() {
    let h = bridged().await;
    let ghost = h.ghost_for("bob");
    let ev = MockSession::message_event("$e1", ROOM, &ghost, RoomMessageContent::text("hi"));

    h.bridge.handle_home_event(HomeEvent::RoomMessage(ev)).await;
    let ev = MockSession::message_event(
        "$e2",
        ROOM,
        "@stranger:example.org",
        RoomMessageContent::text("hi"),
    );
    h.bridge.handle_home_event(HomeEvent::RoomMessage(ev)).await;

    assert!(h.adapter.sent_messages().await.is_empty());
    assert!(h.session.sent_messages().await.is_empty());
}

#[tokio::test]
async fn echoes_of_bridge_sends_are_dropped() {
    let h = bridged().await;

    h.bridge
        .handle_third_party_room_message(ThirdPartyMessage::text(
            "t1",
            Origin::SelfOriginated,
            "from the other side",
        ))
        .await
        .unwrap();
    let (room, echoed) = h.session.sent_messages().await.remove(0);
    h.puppet_says("$echo", &room, echoed).await;

    assert!(h.adapter.sent_messages().await.is_empty());
}

#[tokio::test]
async fn status_room_gets_a_fixed_notice_and_nothing_is_relayed() {
    let h = TestHarness::new().await.unwrap();
    let status_room = h.bridge.rooms().status_room().await.unwrap();

    h.puppet_says("$e1", &status_room, RoomMessageContent::text("hello?"))
        .await;

    assert!(h.adapter.sent_messages().await.is_empty());
    let sent = h.session.sent_messages().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, status_room);
    assert_eq!(sent[0].1.body, format!("{STATUS_ROOM_NOTICE} \u{feff}"));

    // The notice's own echo does not trigger another notice.
    let (_, echo) = sent[0].clone();
    h.puppet_says("$e2", &status_room, echo).await;
    assert_eq!(h.session.sent_messages().await.len(), 1);
}

#[tokio::test]
async fn image_is_relayed_with_download_url() {
    let h = bridged().await;
    let info = MediaInfo {
        mimetype: Some("image/png".into()),
        w: Some(640),
        h: Some(480),
        size: Some(1234),
    };

    h.puppet_says(
        "$e1",
        ROOM,
        RoomMessageContent::image("cat.png", "mxc://example.org/abc", info),
    )
    .await;

    let images = h.adapter.sent_images().await;
    assert_eq!(images.len(), 1);
    let (room, image) = &images[0];
    assert_eq!(room, "t1");
    assert_eq!(
        image.url,
        "https://example.org/_matrix/media/v3/download/example.org/abc"
    );
    assert_eq!(image.text, "cat.png \u{feff}");
    assert_eq!(image.mimetype.as_deref(), Some("image/png"));
    assert_eq!(image.width, Some(640));
    assert_eq!(image.height, Some(480));
    assert_eq!(image.size, Some(1234));
    assert!(h.adapter.sent_messages().await.is_empty());
}

#[tokio::test]
async fn unmapped_room_is_reported() {
    let h = TestHarness::new().await.unwrap();

    h.puppet_says("$e1", "!nowhere:example.org", RoomMessageContent::text("hi"))
        .await;

    assert!(h.adapter.sent_messages().await.is_empty());
    let status_room = h.repository.home_room("status_room").await.unwrap();
    let sent = h.session.sent_messages().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, status_room);
    assert!(sent[0].1.body.contains("!nowhere:example.org is not mapped"));
    // The raw event is attached for diagnosis.
    assert!(sent[0].1.body.contains("\"event_id\": \"$e1\""));
}

#[tokio::test]
async fn unknown_msgtype_is_reported() {
    let h = bridged().await;
    let file = RoomMessageContent {
        msgtype: "m.file".into(),
        body: "report.pdf".into(),
        ..Default::default()
    };

    h.puppet_says("$e1", ROOM, file).await;

    assert!(h.adapter.sent_messages().await.is_empty());
    let sent = h.session.sent_messages().await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.body.contains("unknown message kind `m.file`"));
}

#[tokio::test]
async fn adapter_failure_is_reported() {
    let h = bridged().await;
    h.adapter.fail_sends().await;

    h.puppet_says("$e1", ROOM, RoomMessageContent::text("hey")).await;

    let sent = h.session.sent_messages().await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.body.contains("mock send rejected"));
}

#[tokio::test]
async fn disabled_status_notices_stay_quiet() {
    let h = TestHarness::builder()
        .with_settings(BridgeSettings {
            status_notices: false,
            ..Default::default()
        })
        .build()
        .await
        .unwrap();

    h.puppet_says("$e1", "!nowhere:example.org", RoomMessageContent::text("hi"))
        .await;

    assert!(h.session.sent_messages().await.is_empty());
    assert!(h.directory.created_rooms().await.is_empty());
}

#[tokio::test]
async fn bang_commands_go_to_a_capable_adapter() {
    let h = bridged_with(
        TestHarness::builder()
            .with_adapter(MockAdapter::new().with_bang_commands())
            .build()
            .await
            .unwrap(),
    )
    .await;

    h.puppet_says("$e1", ROOM, RoomMessageContent::text("!invite bob carol"))
        .await;

    assert_eq!(
        h.adapter.commands().await,
        vec![BangCommand {
            command: "invite".into(),
            args: vec!["bob".into(), "carol".into()],
        }]
    );
    assert!(h.adapter.sent_messages().await.is_empty());
}

#[tokio::test]
async fn bang_text_is_plain_text_without_command_support() {
    let h = bridged().await;

    h.puppet_says("$e1", ROOM, RoomMessageContent::text("!invite bob"))
        .await;

    assert!(h.adapter.commands().await.is_empty());
    assert_eq!(h.adapter.sent_messages().await.len(), 1);
}

#[tokio::test]
async fn puppet_receipts_are_forwarded_for_mapped_rooms() {
    let h = TestHarness::new().await.unwrap();
    h.repository.insert(ROOM, "t1").await;
    let status_room = h.bridge.rooms().status_room().await.unwrap();

    for (room_id, user_id) in [
        (ROOM, PUPPET_USER_ID),
        (ROOM, "@stranger:example.org"),
        ("!unmapped:example.org", PUPPET_USER_ID),
        (status_room.as_str(), PUPPET_USER_ID),
    ] {
        h.bridge
            .handle_home_event(HomeEvent::Receipt(ReceiptEvent {
                room_id: room_id.to_string(),
                event_id: "$e".into(),
                user_id: user_id.to_string(),
            }))
            .await;
    }

    assert_eq!(h.adapter.read_receipts().await, vec!["t1".to_string()]);
}

#[tokio::test]
async fn session_snapshot_tracks_membership_and_latest_events() {
    let h = bridged().await;
    h.bridge
        .handle_home_event(HomeEvent::Membership(MembershipEvent {
            room_id: ROOM.into(),
            user_id: PUPPET_USER_ID.into(),
            membership: Membership::Join,
        }))
        .await;
    h.puppet_says("$e1", ROOM, RoomMessageContent::text("hey")).await;

    let puppet = h.bridge.puppet();
    assert!(puppet.is_member(ROOM, PUPPET_USER_ID));
    assert_eq!(puppet.joined_rooms(), vec![ROOM.to_string()]);
    assert_eq!(puppet.latest_event(ROOM).as_deref(), Some("$e1"));
}
