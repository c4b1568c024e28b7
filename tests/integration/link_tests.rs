//! Link connection manager against a counting driver.

use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use soilgate::app::events::LinkEvent;
use soilgate::config::WifiSettings;
use soilgate::error::LinkError;
use soilgate::link::{ConnectionState, LinkConnectionManager, link_channel};

use super::mock_hw::MockLinkDriver;

fn wifi(max_retries: u8) -> WifiSettings {
    WifiSettings {
        max_retries,
        poll_interval_ms: 10,
        attach_timeout_ms: 300,
        ..WifiSettings::default()
    }
}

#[test]
fn five_disconnects_at_budget_five_fail_without_reconnect() {
    let (tx, rx) = link_channel();
    tx.send(LinkEvent::InterfaceStarted).unwrap();
    for _ in 0..5 {
        tx.send(LinkEvent::Disconnected { reason: 201 }).unwrap();
    }

    let mut mgr = LinkConnectionManager::new(MockLinkDriver::default(), rx, &wifi(5));
    assert_eq!(mgr.start(), Err(LinkError::RetriesExhausted));
    assert_eq!(mgr.state(), ConnectionState::Failed);
    assert_eq!(mgr.retries(), 5);

    // One connect for the interface start, one per disconnect below budget.
    assert_eq!(mgr.driver().connects, 5);

    // Late events are ignored; still no connect attempt.
    tx.send(LinkEvent::Disconnected { reason: 201 }).unwrap();
    tx.send(LinkEvent::AddressAcquired(Ipv4Addr::new(10, 0, 0, 2)))
        .unwrap();
    drop(tx);
    assert_eq!(mgr.supervise(), LinkError::EventSourceClosed);
    assert_eq!(mgr.state(), ConnectionState::Failed);
    assert_eq!(mgr.driver().connects, 5);
}

#[test]
fn address_after_retries_resets_counter() {
    let (tx, rx) = link_channel();
    tx.send(LinkEvent::InterfaceStarted).unwrap();
    for _ in 0..4 {
        tx.send(LinkEvent::Disconnected { reason: 2 }).unwrap();
    }
    tx.send(LinkEvent::AddressAcquired(Ipv4Addr::new(192, 168, 4, 20)))
        .unwrap();

    let mut mgr = LinkConnectionManager::new(MockLinkDriver::default(), rx, &wifi(5));
    let status = mgr.status();
    assert_eq!(mgr.start(), Ok(Ipv4Addr::new(192, 168, 4, 20)));
    assert_eq!(mgr.retries(), 0);
    assert_eq!(status.state(), ConnectionState::Attached);
    assert_eq!(status.retries(), 0);
}

#[test]
fn reattach_after_drop_keeps_link() {
    let (tx, rx) = link_channel();
    tx.send(LinkEvent::InterfaceStarted).unwrap();
    tx.send(LinkEvent::AddressAcquired(Ipv4Addr::new(10, 0, 0, 9)))
        .unwrap();
    let mut mgr = LinkConnectionManager::new(MockLinkDriver::default(), rx, &wifi(3));
    mgr.start().unwrap();

    tx.send(LinkEvent::Disconnected { reason: 8 }).unwrap();
    tx.send(LinkEvent::AddressAcquired(Ipv4Addr::new(10, 0, 0, 10)))
        .unwrap();
    drop(tx);
    assert_eq!(mgr.supervise(), LinkError::EventSourceClosed);
    assert_eq!(mgr.state(), ConnectionState::Attached);
    assert_eq!(mgr.retries(), 0);
    assert_eq!(mgr.driver().connects, 2);
    assert_eq!(mgr.status().last_reason(), 8);
}

#[test]
fn silent_network_times_out() {
    let (tx, rx) = link_channel();
    tx.send(LinkEvent::InterfaceStarted).unwrap();
    let mut mgr = LinkConnectionManager::new(MockLinkDriver::default(), rx, &wifi(5));
    assert_eq!(mgr.start(), Err(LinkError::Timeout));
    assert_eq!(mgr.state(), ConnectionState::Failed);
    assert_eq!(mgr.driver().starts, 1);
    assert_eq!(mgr.driver().connects, 1);
}

#[test]
fn event_stream_cannot_outlast_attach_timeout() {
    let (tx, rx) = link_channel();
    let chatter = std::thread::spawn(move || {
        // Runs until the manager drops the receiver.
        while tx.send(LinkEvent::InterfaceStarted).is_ok() {
            std::thread::sleep(Duration::from_millis(2));
        }
    });

    let mut mgr = LinkConnectionManager::new(MockLinkDriver::default(), rx, &wifi(5));
    let begun = Instant::now();
    assert_eq!(mgr.start(), Err(LinkError::Timeout));
    assert!(begun.elapsed() < Duration::from_secs(2));
    assert_eq!(mgr.state(), ConnectionState::Failed);

    drop(mgr);
    chatter.join().unwrap();
}
