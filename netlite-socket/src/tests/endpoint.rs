#![cfg(test)]

use crate::error::ErrorCode;
use crate::ip::{Address, AddressV4, AddressV6, Endpoint, Family};
use std::collections::BTreeSet;
use std::net::SocketAddr;

#[test]
fn test_display() {
    let ep = Endpoint::new(AddressV4::loopback(), 9090);
    assert_eq!(ep.to_string(), "127.0.0.1:9090");
    let ep = Endpoint::new(AddressV6::loopback(), 9090);
    assert_eq!(ep.to_string(), "[::1]:9090");
    assert_eq!(format!("{ep:?}"), "Endpoint([::1]:9090)");
}

#[test]
fn test_family_and_size() {
    let v4 = Endpoint::new(AddressV4::any(), 1);
    let v6 = Endpoint::new(AddressV6::any(), 1);
    assert!(v4.is_v4());
    assert_eq!(v4.family(), Family::V4);
    assert_eq!(v6.family(), Family::V6);
    assert_eq!(v4.size(), size_of::<libc::sockaddr_in>());
    assert_eq!(v6.size(), size_of::<libc::sockaddr_in6>());
    assert!(v6.size() <= v6.capacity());
    assert_eq!(Endpoint::from_family(Family::V6, 53).address(), Address::V6(AddressV6::any()));
    assert_eq!(Endpoint::default(), Endpoint::new(AddressV4::any(), 0));
}

#[test]
fn test_port_is_kept_in_network_order() {
    let mut ep = Endpoint::new(AddressV4::loopback(), 0x1234);
    assert_eq!(ep.port(), 0x1234);
    let raw = unsafe { (*(ep.data() as *const libc::sockaddr_in)).sin_port };
    assert_eq!(raw, 0x1234_u16.to_be());
    ep.set_port(80);
    assert_eq!(ep.port(), 80);
}

#[test]
fn test_set_address_switches_layout() {
    let mut ep = Endpoint::new(AddressV4::loopback(), 443);
    ep.set_address(Address::V6(AddressV6::loopback()));
    assert!(!ep.is_v4());
    assert_eq!(ep.port(), 443);
    assert_eq!(ep.to_string(), "[::1]:443");
    ep.set_address(Address::V4(AddressV4::new(10, 0, 0, 1)));
    assert_eq!(ep.to_string(), "10.0.0.1:443");
}

#[test]
fn test_resize_over_capacity_fails() {
    let mut ep = Endpoint::default();
    assert_eq!(ep.resize(ep.capacity()), Ok(()));
    assert_eq!(ep.resize(ep.capacity() + 1), Err(ErrorCode::InvalidArgument));
}

#[test]
fn test_ordering_address_then_port() {
    let a = Endpoint::new(AddressV4::new(10, 0, 0, 1), 9000);
    let b = Endpoint::new(AddressV4::new(10, 0, 0, 1), 9001);
    let c = Endpoint::new(AddressV4::new(10, 0, 0, 2), 1);
    let d = Endpoint::new(AddressV6::any(), 0);
    assert!(a < b && b < c && c < d);
    let set: BTreeSet<_> = [d, c, b, a, a].into_iter().collect();
    assert_eq!(set.into_iter().collect::<Vec<_>>(), vec![a, b, c, d]);
}

#[test]
fn test_std_conversion_keeps_scope() {
    let sa: SocketAddr = "[fe80::1%3]:8080".parse().unwrap();
    let ep = Endpoint::from(sa);
    match ep.address() {
        Address::V6(v6) => assert_eq!(v6.scope_id(), 3),
        Address::V4(_) => panic!("expected an IPv6 endpoint"),
    }
    assert_eq!(SocketAddr::from(ep), sa);

    let sa: SocketAddr = "192.168.77.101:9001".parse().unwrap();
    assert_eq!(SocketAddr::from(Endpoint::from(sa)), sa);
}
