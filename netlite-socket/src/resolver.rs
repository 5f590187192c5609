//! Name resolution into [`Endpoint`]s.
//!
//! A thin layer over the system resolver: numeric addresses never hit the
//! network, names go through `getaddrinfo`. Results keep the resolver's order.

use crate::error::{Error, ErrorCode, Result};
use crate::ip::{Address, Endpoint};
use std::net::ToSocketAddrs as _;

/// Resolves `host` and pairs every address with `port`.
pub fn resolve(host: &str, port: u16) -> Result<Vec<Endpoint>> {
    if let Ok(addr) = host.parse::<Address>() {
        return Ok(vec![Endpoint::new(addr, port)]);
    }
    let addrs = (host, port).to_socket_addrs().map_err(|err| {
        let code = err
            .raw_os_error()
            .map_or(ErrorCode::HostNotFound, ErrorCode::from_raw_os_error);
        log::debug!("resolve: {host}: {err}");
        Error::new("resolve", code)
    })?;
    let endpoints: Vec<Endpoint> = addrs.map(Endpoint::from).collect();
    if endpoints.is_empty() {
        return Err(Error::new("resolve", ErrorCode::HostNotFound));
    }
    Ok(endpoints)
}

/// Resolves `host` and returns the first endpoint of family `V4` if any, else the first one.
pub fn resolve_one(host: &str, port: u16) -> Result<Endpoint> {
    let endpoints = resolve(host, port)?;
    let first = endpoints[0];
    Ok(endpoints.into_iter().find(Endpoint::is_v4).unwrap_or(first))
}

/// The local host name.
pub fn host_name() -> Result<String> {
    crate::sys::host_name().map_err(|code| Error::new("host_name", code))
}
