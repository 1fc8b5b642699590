// Write-path and DDR-path behavior against a mock transport.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use qmp_aop_client::{AopQmpClient, Mailbox, DDR_CONFIGS, MAX_MSG_SIZE, TX_QUEUE_DEPTH};

/// Records every submission; can be flipped into a failing transport.
#[derive(Default)]
struct MockMailbox {
    sent: Mutex<Vec<Vec<u8>>>,
    fail: AtomicBool,
}

impl MockMailbox {
    fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().clone()
    }
}

impl Mailbox for MockMailbox {
    fn submit(&self, msg: &[u8]) -> io::Result<()> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "mock transport down"));
        }
        self.sent.lock().push(msg.to_vec());
        Ok(())
    }
}

fn client_with_mock() -> (Arc<MockMailbox>, AopQmpClient) {
    let mock = Arc::new(MockMailbox::default());
    let client = AopQmpClient::new(mock.clone());
    (mock, client)
}

#[test]
fn every_length_submits_rounded_packet() {
    let (mock, client) = client_with_mock();

    for len in 1..=MAX_MSG_SIZE {
        let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8 + 1).collect();
        assert_eq!(client.send_msg(&payload), len);

        let sent = mock.sent();
        let pkt = sent.last().expect("one submission per write");
        assert_eq!(sent.len(), len, "exactly one submission per write");
        assert_eq!(pkt.len(), (len + 3) & !3);
        assert_eq!(&pkt[..len], &payload[..]);
        assert!(pkt[len..].iter().all(|&b| b == 0), "padding must be zeroed");
    }
}

#[test]
fn empty_and_oversized_writes_are_dropped() {
    let (mock, client) = client_with_mock();

    assert_eq!(client.send_msg(&[]), 0);
    assert_eq!(client.send_msg(&[0x41; MAX_MSG_SIZE + 1]), MAX_MSG_SIZE + 1);
    assert_eq!(client.send_msg(&[0x41; 200]), 200);

    assert!(mock.sent().is_empty(), "no submission for rejected sizes");
    assert_eq!(client.tx_cursor(), 0, "rejected writes must not touch the ring");
}

#[test]
fn cursor_cycles_regardless_of_transport_outcome() {
    let mock = Arc::new(MockMailbox::default());
    let depth = 4;
    let client = AopQmpClient::with_depth(mock.clone(), depth);
    assert_eq!(client.queue_depth(), depth);

    mock.fail.store(true, Ordering::Relaxed);
    for k in 1..=(3 * depth) {
        client.send_msg(b"ping");
        // The cursor wraps at the start of the next send, so it reads
        // depth (not 0) right after the ring's last slot was used.
        assert_eq!(client.tx_cursor(), (k - 1) % depth + 1);
    }
    assert!(mock.sent().is_empty());

    mock.fail.store(false, Ordering::Relaxed);
    for k in 1..=depth {
        client.send_msg(b"ping");
        assert_eq!(client.tx_cursor(), k % depth + if k == depth { depth } else { 0 });
    }
}

#[test]
fn slots_are_reused_without_leaking_prior_contents() {
    let mock = Arc::new(MockMailbox::default());
    let client = AopQmpClient::with_depth(mock.clone(), 2);

    client.send_msg(&[0xAA; 96]);
    client.send_msg(&[0xBB; 96]);
    // Wraps back to slot 0 with a shorter payload; the tail must be zeros,
    // not leftover 0xAA.
    client.send_msg(b"x");

    let sent = mock.sent();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[2], vec![b'x', 0, 0, 0]);
}

#[test]
fn random_payloads_round_trip_through_the_ring() {
    let (mock, client) = client_with_mock();

    for _ in 0..200 {
        let len = fastrand::usize(1..=MAX_MSG_SIZE);
        let payload: Vec<u8> = (0..len).map(|_| fastrand::u8(1..)).collect();
        assert_eq!(client.send_msg(&payload), len);

        let sent = mock.sent();
        let pkt = sent.last().unwrap();
        assert_eq!(&pkt[..len], &payload[..]);
        assert_eq!(pkt.len() % 4, 0);
    }
}

#[test]
fn ddr_codes_submit_exact_table_strings() {
    let (mock, client) = client_with_mock();

    let codes = [100, 200, 300, 451, 547, 681, 768, 1017, 1353, 1555, 1804, 2092];
    for (i, code) in codes.iter().enumerate() {
        client.lock_ddr_freq(*code);

        let sent = mock.sent();
        let pkt = sent.last().expect("recognized code must submit");
        assert_eq!(sent.len(), i + 1);

        let entry = &DDR_CONFIGS[i];
        let expect_size = (entry.len + 3) & !3;
        assert_eq!(pkt.len(), expect_size);
        assert_eq!(&pkt[..entry.len], entry.msg.as_bytes());
        assert!(pkt[entry.len..].iter().all(|&b| b == 0));
    }

    // Spot-check the spec'd example: 451 is 32 bytes, already aligned.
    client.lock_ddr_freq(451);
    assert_eq!(mock.sent().last().unwrap().len(), 32);
    // And a 33-byte entry pads out to 36.
    client.lock_ddr_freq(1017);
    assert_eq!(mock.sent().last().unwrap().len(), 36);
}

#[test]
fn ddr_zero_aliases_to_100() {
    let (mock, client) = client_with_mock();

    client.lock_ddr_freq(0);
    client.lock_ddr_freq(100);

    let sent = mock.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0], sent[1]);
    assert_eq!(&sent[0][..32], DDR_CONFIGS[0].msg.as_bytes());
}

#[test]
fn unknown_ddr_codes_submit_nothing() {
    let (mock, client) = client_with_mock();

    for code in [-1, 1, 99, 450, 999, 2093] {
        client.lock_ddr_freq(code);
    }
    assert!(mock.sent().is_empty());
}

#[test]
fn ddr_path_does_not_consume_ring_slots() {
    let (mock, client) = client_with_mock();

    client.lock_ddr_freq(451);
    client.lock_ddr_freq(768);
    assert_eq!(client.tx_cursor(), 0, "DDR requests use the dedicated slot");

    client.send_msg(b"msg");
    assert_eq!(client.tx_cursor(), 1);
    assert_eq!(mock.sent().len(), 3);
}

/// Fails the test from inside `submit` if two submissions ever overlap.
#[derive(Default)]
struct ExclusionMailbox {
    busy: AtomicBool,
    count: std::sync::atomic::AtomicUsize,
}

impl Mailbox for ExclusionMailbox {
    fn submit(&self, msg: &[u8]) -> io::Result<()> {
        assert!(
            !self.busy.swap(true, Ordering::SeqCst),
            "two submissions in flight at once"
        );
        assert!(!msg.is_empty() && msg.len() % 4 == 0);
        thread::sleep(Duration::from_micros(50));
        self.busy.store(false, Ordering::SeqCst);
        self.count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[test]
fn send_paths_are_mutually_exclusive() {
    let mock = Arc::new(ExclusionMailbox::default());
    let client = Arc::new(AopQmpClient::new(mock.clone()));

    let mut handles = vec![];
    for t in 0..4 {
        let client = client.clone();
        handles.push(thread::spawn(move || {
            for i in 0..50 {
                if (t + i) % 2 == 0 {
                    client.send_msg(format!("writer {} msg {}", t, i).as_bytes());
                } else {
                    client.lock_ddr_freq(451);
                }
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(mock.count.load(Ordering::Relaxed), 4 * 50);
}

#[test]
fn default_depth_matches_tx_queue_len() {
    let (_mock, client) = client_with_mock();
    assert_eq!(client.queue_depth(), TX_QUEUE_DEPTH);
}
