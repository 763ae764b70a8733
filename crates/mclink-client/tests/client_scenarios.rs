//! End-to-end client tests against a scripted device on an in-process
//! duplex pipe.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use mclink_client::protocol::*;
use mclink_client::{AttrValue, ClientConfig, ClientError, CompanionClient, EventFilter, EventKind};

fn test_config() -> ClientConfig {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    ClientConfig {
        command_timeout_ms: 1_000,
        ..ClientConfig::default()
    }
}

/// Frame a device → host payload.
fn device_frame(payload: &[u8]) -> Vec<u8> {
    let mut wire = vec![FRAME_START_RX];
    wire.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    wire.extend_from_slice(payload);
    wire
}

/// Read one host → device command payload. `None` on EOF.
async fn read_command(reader: &mut (impl AsyncRead + Unpin)) -> Option<Vec<u8>> {
    let mut header = [0u8; 3];
    reader.read_exact(&mut header).await.ok()?;
    assert_eq!(header[0], FRAME_START_TX);
    let len = u16::from_le_bytes([header[1], header[2]]) as usize;
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await.ok()?;
    Some(payload)
}

async fn reply(writer: &mut (impl AsyncWrite + Unpin), payload: &[u8]) {
    writer.write_all(&device_frame(payload)).await.unwrap();
    writer.flush().await.unwrap();
}

fn battery_payload(millivolts: u16) -> Vec<u8> {
    let mut payload = vec![RESP_CODE_BATT_AND_STORAGE];
    payload.extend_from_slice(&millivolts.to_le_bytes());
    payload.extend_from_slice(&1_024u32.to_le_bytes());
    payload.extend_from_slice(&8_192u32.to_le_bytes());
    payload
}

fn contact_payload(key_head: &[u8], name: &str) -> Vec<u8> {
    let mut key = [0u8; PUB_KEY_SIZE];
    key[..key_head.len()].copy_from_slice(key_head);
    let mut payload = vec![RESP_CODE_CONTACT];
    payload.extend_from_slice(&key);
    payload.push(ADV_TYPE_CHAT);
    payload.push(0); // flags
    payload.push(0xFF); // out_path_len = -1
    payload.extend_from_slice(&[0u8; MAX_PATH_SIZE]);
    let mut name_buf = [0u8; 32];
    name_buf[..name.len()].copy_from_slice(name.as_bytes());
    payload.extend_from_slice(&name_buf);
    payload.extend_from_slice(&100u32.to_le_bytes()); // last advert
    payload.extend_from_slice(&0i32.to_le_bytes()); // lat
    payload.extend_from_slice(&0i32.to_le_bytes()); // lon
    payload.extend_from_slice(&1u32.to_le_bytes()); // lastmod
    payload
}

fn direct_message_payload(sender: [u8; 6], text: &str) -> Vec<u8> {
    let mut payload = vec![RESP_CODE_CONTACT_MSG_RECV_V3];
    payload.push(8); // snr_x4
    payload.extend_from_slice(&[0, 0]); // reserved
    payload.extend_from_slice(&sender);
    payload.push(0); // path_len
    payload.push(TXT_TYPE_PLAIN);
    payload.extend_from_slice(&1_700_000_000u32.to_le_bytes());
    payload.extend_from_slice(text.as_bytes());
    payload
}

#[tokio::test]
async fn test_command_resolves_with_matching_response() {
    let (host, device) = tokio::io::duplex(4096);
    let client = CompanionClient::open(host, test_config());

    let device_task = tokio::spawn(async move {
        let (mut r, mut w) = tokio::io::split(device);
        let cmd = read_command(&mut r).await.unwrap();
        assert_eq!(cmd[0], CMD_GET_BATT_AND_STORAGE);
        reply(&mut w, &battery_payload(3_870)).await;
        (r, w)
    });

    let battery = client.get_battery().await.unwrap();
    assert_eq!(battery.battery_millivolts, 3_870);
    assert_eq!(battery.storage_total_kb, 8_192);

    device_task.await.unwrap();
}

#[tokio::test]
async fn test_response_is_also_published_as_event() {
    let (host, device) = tokio::io::duplex(4096);
    let client = CompanionClient::open(host, test_config());
    let mut battery_events = client.subscribe(EventFilter::kind(EventKind::Battery));

    let device_task = tokio::spawn(async move {
        let (mut r, mut w) = tokio::io::split(device);
        read_command(&mut r).await.unwrap();
        reply(&mut w, &battery_payload(4_000)).await;
        (r, w)
    });

    client.get_battery().await.unwrap();
    let event = tokio::time::timeout(Duration::from_secs(1), battery_events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        event.attribute("battery_millivolts"),
        Some(AttrValue::UInt(4_000))
    );

    device_task.await.unwrap();
}

#[tokio::test]
async fn test_subscription_attribute_filter() {
    let (host, device) = tokio::io::duplex(4096);
    let client = CompanionClient::open(host, test_config());

    let mut filtered = client.subscribe(
        EventFilter::kind(EventKind::DirectMessage).attr("sender_prefix", "a1b2c3000000"),
    );

    let (_r, mut w) = tokio::io::split(device);
    reply(
        &mut w,
        &direct_message_payload([0xA1, 0xB2, 0xC3, 0, 0, 0], "for you"),
    )
    .await;
    reply(
        &mut w,
        &direct_message_payload([0xFF, 0x00, 0xFF, 0, 0, 0], "not for you"),
    )
    .await;
    // A sentinel the filter ignores but a catch-all would see; used below
    // to prove both frames were dispatched before we assert.
    reply(&mut w, &[RESP_CODE_NO_MORE_MESSAGES]).await;

    let mut all = client.subscribe(EventFilter::kind(EventKind::NoMoreMessages));
    tokio::time::timeout(Duration::from_secs(1), all.recv())
        .await
        .unwrap()
        .unwrap();

    let event = filtered.try_recv().expect("matching message not delivered");
    assert_eq!(
        event.attribute("text"),
        Some(AttrValue::Str("for you".to_string()))
    );
    assert!(filtered.try_recv().is_none(), "non-matching message leaked");
}

#[tokio::test]
async fn test_wait_for_event_timeout_removes_subscription() {
    let (host, _device) = tokio::io::duplex(4096);
    let client = CompanionClient::open(host, test_config());

    let started = Instant::now();
    let got = client
        .wait_for_event(
            EventFilter::kind(EventKind::Battery),
            Duration::from_secs(1),
        )
        .await;

    assert!(got.is_none());
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn test_contact_prefix_lookup_after_listing() {
    let (host, device) = tokio::io::duplex(4096);
    let client = CompanionClient::open(host, test_config());

    let device_task = tokio::spawn(async move {
        let (mut r, mut w) = tokio::io::split(device);
        let cmd = read_command(&mut r).await.unwrap();
        assert_eq!(cmd[0], CMD_GET_CONTACTS);

        let mut start = vec![RESP_CODE_CONTACTS_START];
        start.extend_from_slice(&2u32.to_le_bytes());
        reply(&mut w, &start).await;
        reply(&mut w, &contact_payload(&[0xA1, 0xB2], "bob")).await;
        reply(&mut w, &contact_payload(&[0xA1, 0xC3], "carol")).await;
        let mut end = vec![RESP_CODE_END_OF_CONTACTS];
        end.extend_from_slice(&1u32.to_le_bytes());
        reply(&mut w, &end).await;
        (r, w)
    });

    let contacts = client.get_contacts(None).await.unwrap();
    assert_eq!(contacts.len(), 2);

    assert!(matches!(
        client.get_contact_by_key_prefix("a1"),
        Err(ClientError::AmbiguousPrefix)
    ));
    let unique = client.get_contact_by_key_prefix("a1b2").unwrap().unwrap();
    assert_eq!(unique.name, "bob");
    assert!(client.get_contact_by_key_prefix("dd").unwrap().is_none());
    assert_eq!(client.get_contact_by_name("carol").unwrap().name, "carol");

    device_task.await.unwrap();
}

#[tokio::test]
async fn test_auto_fetch_drains_in_order_without_overlap() {
    let (host, device) = tokio::io::duplex(4096);
    let client = CompanionClient::open(host, test_config());
    let mut messages = client.subscribe(EventFilter::kind(EventKind::DirectMessage));

    let sync_count = Arc::new(AtomicUsize::new(0));
    let device_count = Arc::clone(&sync_count);
    let _device_task = tokio::spawn(async move {
        let (mut r, mut w) = tokio::io::split(device);
        let mut mailbox = vec![
            direct_message_payload([1, 1, 1, 1, 1, 1], "first"),
            direct_message_payload([2, 2, 2, 2, 2, 2], "second"),
        ];
        while let Some(cmd) = read_command(&mut r).await {
            assert_eq!(cmd[0], CMD_SYNC_NEXT_MESSAGE);
            device_count.fetch_add(1, Ordering::SeqCst);
            if mailbox.is_empty() {
                reply(&mut w, &[RESP_CODE_NO_MORE_MESSAGES]).await;
            } else {
                let payload = mailbox.remove(0);
                reply(&mut w, &payload).await;
            }
        }
    });

    client.start_auto_fetch(Duration::from_secs(1));

    let first = tokio::time::timeout(Duration::from_secs(2), messages.recv())
        .await
        .unwrap()
        .unwrap();
    let second = tokio::time::timeout(Duration::from_secs(2), messages.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.attribute("text"), Some(AttrValue::Str("first".into())));
    assert_eq!(
        second.attribute("text"),
        Some(AttrValue::Str("second".into()))
    );

    // The first tick took three syncs (two messages + empty). The next
    // tick is an interval away, so the count must hold still for now.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(sync_count.load(Ordering::SeqCst), 3);

    client.stop_auto_fetch();
    assert!(!client.auto_fetch_running());
}

#[tokio::test]
async fn test_auto_fetch_restart_does_not_duplicate_loops() {
    let (host, device) = tokio::io::duplex(4096);
    let client = CompanionClient::open(host, test_config());

    let sync_count = Arc::new(AtomicUsize::new(0));
    let device_count = Arc::clone(&sync_count);
    let _device_task = tokio::spawn(async move {
        let (mut r, mut w) = tokio::io::split(device);
        let mut first = true;
        while let Some(cmd) = read_command(&mut r).await {
            assert_eq!(cmd[0], CMD_SYNC_NEXT_MESSAGE);
            device_count.fetch_add(1, Ordering::SeqCst);
            // Hold the very first reply so a restart lands while the
            // old loop still has a fetch in flight.
            if first {
                first = false;
                tokio::time::sleep(Duration::from_millis(300)).await;
            }
            reply(&mut w, &[RESP_CODE_NO_MORE_MESSAGES]).await;
        }
    });

    client.start_auto_fetch(Duration::from_secs(1));
    tokio::time::sleep(Duration::from_millis(100)).await;
    client.stop_auto_fetch();
    client.start_auto_fetch(Duration::from_secs(1));
    assert!(client.auto_fetch_running());

    // A single loop can issue at most four syncs in this window; a
    // stopped loop kept alive past the restart would add its own ticks
    // on top of the new loop's.
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert!(
        sync_count.load(Ordering::SeqCst) <= 4,
        "stopped loop kept polling after restart: {} syncs",
        sync_count.load(Ordering::SeqCst)
    );

    client.stop_auto_fetch();
    assert!(!client.auto_fetch_running());
}

#[tokio::test]
async fn test_login_sends_and_surfaces_server_verdict() {
    let (host, device) = tokio::io::duplex(4096);
    let client = CompanionClient::open(host, test_config());

    let server_key = PublicKey::new([0xC7; PUB_KEY_SIZE]);
    let mut verdicts = client.subscribe(
        EventFilter::kind(EventKind::LoginSuccess).attr("server_prefix", "c7c7c7c7c7c7"),
    );

    let device_task = tokio::spawn(async move {
        let (mut r, mut w) = tokio::io::split(device);
        let cmd = read_command(&mut r).await.unwrap();
        assert_eq!(cmd[0], CMD_SEND_LOGIN);
        assert_eq!(&cmd[1..33], &[0xC7; PUB_KEY_SIZE]);
        assert_eq!(&cmd[33..], b"secret");

        // The device acknowledges the routed send first.
        let mut sent = vec![RESP_CODE_SENT, 0];
        sent.extend_from_slice(&9u32.to_le_bytes());
        sent.extend_from_slice(&2_000u32.to_le_bytes());
        reply(&mut w, &sent).await;

        // The server's verdict arrives later as a push.
        let mut verdict = vec![PUSH_CODE_LOGIN_SUCCESS, 1];
        verdict.extend_from_slice(&[0xC7; PUB_KEY_PREFIX_SIZE]);
        reply(&mut w, &verdict).await;
        (r, w)
    });

    let receipt = client.send_login(server_key, "secret").await.unwrap();
    assert_eq!(receipt.expected_ack, 9);

    let event = tokio::time::timeout(Duration::from_secs(1), verdicts.recv())
        .await
        .expect("login verdict never arrived")
        .unwrap();
    assert_eq!(event.attribute("is_admin"), Some(AttrValue::Bool(true)));

    device_task.await.unwrap();
}

#[tokio::test]
async fn test_colliding_commands_get_busy() {
    let (host, device) = tokio::io::duplex(4096);
    let config = ClientConfig {
        command_timeout_ms: 300,
        ..ClientConfig::default()
    };
    let client = CompanionClient::open(host, config);
    // Device stays silent; keep the pipe open.
    let _device = device;

    let (first, second) = tokio::join!(client.get_battery(), client.get_battery());
    let results = [first, second];

    let busy_count = results
        .iter()
        .filter(|r| matches!(r, Err(ClientError::Busy)))
        .count();
    let timeout_count = results
        .iter()
        .filter(|r| matches!(r, Err(ClientError::CommandTimeout)))
        .count();
    assert_eq!(busy_count, 1, "exactly one command should collide");
    assert_eq!(timeout_count, 1, "the other should time out unanswered");
}

#[tokio::test]
async fn test_disconnect_fails_pending_and_publishes_event() {
    let (host, device) = tokio::io::duplex(4096);
    let client = CompanionClient::open(host, test_config());
    let mut disconnects = client.subscribe(EventFilter::kind(EventKind::Disconnect));

    let pending = tokio::spawn({
        let (mut r, _w) = tokio::io::split(device);
        async move {
            // Swallow the command, then drop both halves to close the pipe.
            read_command(&mut r).await;
        }
    });

    let result = client.get_battery().await;
    assert!(matches!(result, Err(ClientError::Disconnected)));

    let event = tokio::time::timeout(Duration::from_secs(1), disconnects.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.kind(), EventKind::Disconnect);

    // The link is gone; later sends fail immediately.
    assert!(matches!(
        client.get_battery().await,
        Err(ClientError::Disconnected)
    ));

    pending.await.unwrap();
}

#[tokio::test]
async fn test_corrupt_frame_surfaces_error_and_stream_recovers() {
    let (host, device) = tokio::io::duplex(4096);
    let client = CompanionClient::open(host, test_config());
    let mut errors = client.subscribe(EventFilter::kind(EventKind::ProtocolError));

    let device_task = tokio::spawn(async move {
        let (mut r, mut w) = tokio::io::split(device);
        // Garbage with a length field far beyond the frame limit, then a
        // valid reply to the battery command.
        w.write_all(&[FRAME_START_RX, 0xFF, 0xFF, 0x00]).await.unwrap();
        read_command(&mut r).await.unwrap();
        reply(&mut w, &battery_payload(3_500)).await;
        (r, w)
    });

    let battery = client.get_battery().await.unwrap();
    assert_eq!(battery.battery_millivolts, 3_500);

    let event = tokio::time::timeout(Duration::from_secs(1), errors.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.kind(), EventKind::ProtocolError);

    device_task.await.unwrap();
}
