use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::thread;
use std::time::{Duration, Instant};

use mcl_client::{find_systems_with_config, DiscoveryConfig};

/// A query port whose reply port (`+2`) is currently free.
fn free_query_port() -> u16 {
    loop {
        let spare = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).expect("udp should bind");
        let port = spare.local_addr().expect("socket has address").port();
        if port > 2 {
            return port - 2;
        }
    }
}

#[test]
fn no_responders_yields_empty_map_quickly() {
    let config = DiscoveryConfig {
        ports: vec![free_query_port()],
        ..DiscoveryConfig::default()
    };

    let started = Instant::now();
    let systems = find_systems_with_config(&config);
    let elapsed = started.elapsed();

    assert!(systems.is_empty());
    assert!(elapsed >= Duration::from_millis(900), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "{elapsed:?}");
}

#[test]
fn replies_keyed_by_responder_and_junk_dropped() {
    let query_port = free_query_port();
    let reply_port = query_port + 2;
    let config = DiscoveryConfig {
        ports: vec![query_port],
        window: Duration::from_millis(500),
        ..DiscoveryConfig::default()
    };

    let responder = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).expect("udp should bind");
        let target = (Ipv4Addr::LOCALHOST, reply_port);
        socket.send_to(b"garbage", target).expect("send should succeed");
        socket
            .send_to(br#"MCL-REPLY:{"name":"bench-1","modules":"AB"}"#, target)
            .expect("send should succeed");
        socket
            .send_to(b"MCL-REPLY:{broken", target)
            .expect("send should succeed");
    });

    let systems = find_systems_with_config(&config);
    responder.join().expect("responder should finish");

    assert_eq!(systems.len(), 1);
    let descriptor = &systems[&IpAddr::V4(Ipv4Addr::LOCALHOST)];
    assert_eq!(descriptor.get_str("name"), Some("bench-1"));
}

#[test]
fn unbindable_listener_is_not_an_error() {
    let holder = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).expect("udp should bind");
    let taken = holder.local_addr().expect("socket has address").port();

    let config = DiscoveryConfig {
        ports: vec![taken - 2],
        window: Duration::from_millis(100),
        ..DiscoveryConfig::default()
    };
    assert!(find_systems_with_config(&config).is_empty());
}
