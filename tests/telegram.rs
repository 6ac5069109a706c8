mod common;

use common::{RecordingBot, session, text_of, types};
use msgbuf::prelude::*;
use msgbuf::{AdapterFamily, BufState};
use serde_json::Value;
use std::io::Write;

#[tokio::test]
async fn mention_uses_platform_data_when_present() {
    let bot = RecordingBot::new(AdapterFamily::Telegram);

    let mut bare = MsgBuf::new().with_session(session(&bot));
    bare.mention(10001).unwrap();
    bare.respond().await.unwrap();

    let mut with_data = MsgBuf::new().with_session(session(&bot));
    with_data
        .append(Segment::mention(10001).unwrap().with_extra("username", "alice"))
        .unwrap();
    with_data.respond().await.unwrap();

    let outgoing = bot.outgoing();
    assert_eq!(outgoing.len(), 2);
    assert_eq!(types(&outgoing[0]), ["text"]);
    assert_eq!(text_of(&outgoing[0]), "@10001 ");
    assert_eq!(types(&outgoing[1]), ["mention"]);
    assert_eq!(text_of(&outgoing[1]), "@alice");
}

#[tokio::test]
async fn local_photos_are_inlined() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"hello").unwrap();

    let bot = RecordingBot::new(AdapterFamily::Telegram);
    let mut buf = MsgBuf::new().with_session(session(&bot));
    buf.image(file.path().to_path_buf()).unwrap();
    buf.respond().await.unwrap();

    let outgoing = bot.outgoing();
    assert_eq!(outgoing.len(), 1);
    let Outgoing::Message { segments, .. } = &outgoing[0] else {
        panic!("expected message");
    };
    assert_eq!(segments[0].type_, "photo");
    assert_eq!(segments[0].get_str("file"), Some("base64://aGVsbG8="));
}

#[tokio::test]
async fn unreadable_source_fails_before_any_delivery() {
    let bot = RecordingBot::new(AdapterFamily::Telegram);
    let mut buf = MsgBuf::new().with_session(session(&bot));
    buf.text("图：")
        .unwrap()
        .image("/definitely/not/here.png")
        .unwrap();

    let err = buf.respond().await.unwrap_err();
    assert!(matches!(err, MsgBufError::DeliveryFailure { index: 1, .. }));
    assert_eq!(bot.attempts(), 0);
    assert_eq!(buf.state(), BufState::Sent);
}

#[tokio::test]
async fn reply_is_attached_to_first_delivery() {
    let bot = RecordingBot::new(AdapterFamily::Telegram);
    let mut buf = MsgBuf::new().with_session(session(&bot));
    buf.reply(77)
        .unwrap()
        .text("收到")
        .unwrap()
        .location(39.9, 116.4)
        .unwrap();
    buf.respond().await.unwrap();

    let outgoing = bot.outgoing();
    assert_eq!(outgoing.len(), 2);
    let Outgoing::Message { params, .. } = &outgoing[0] else {
        panic!("expected message");
    };
    assert_eq!(params["reply_to_message_id"], Value::from("77"));
    assert_eq!(types(&outgoing[1]), ["location"]);
}

#[tokio::test]
async fn lone_reply_is_still_delivered() {
    let bot = RecordingBot::new(AdapterFamily::Telegram);
    let mut buf = MsgBuf::new().with_session(session(&bot));
    buf.reply(77).unwrap();

    let receipt = buf.respond().await.unwrap();
    assert_eq!(receipt.message_ids().count(), 1);

    let outgoing = bot.outgoing();
    assert_eq!(outgoing.len(), 1);
    assert_eq!(text_of(&outgoing[0]), "[回复]");
    let Outgoing::Message { params, .. } = &outgoing[0] else {
        panic!("expected message");
    };
    assert_eq!(params["reply_to_message_id"], Value::from("77"));
}
