use netlite_socket::{Endpoint, ErrorCode, UdpSocket};
use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub fn endpoint(addr: &str) -> io::Result<Endpoint> {
    addr.parse::<SocketAddr>()
        .map(Endpoint::from)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}

pub fn run_pinger(local_addr: &str, remote_addr: &str) -> io::Result<()> {
    let remote = endpoint(remote_addr)?;
    let mut socket = UdpSocket::bound(&endpoint(local_addr)?)?;
    log::debug!("[UDP_Pinger] Bound to {}", local_addr);
    socket.non_blocking(true)?;
    log::debug!("[UDP_Pinger] Sending 'PING' to {}...", remote_addr);
    socket.send_to(b"PING", &remote)?;
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut buffer = [0u8; 1024];
    loop {
        match socket.receive_from(&mut buffer) {
            Ok((number_of_bytes, sender)) => {
                let message = &buffer[..number_of_bytes];
                if message == b"PONG" {
                    log::debug!("[UDP_Pinger] Success! Received 'PONG' from {}", sender);
                    return Ok(());
                }
                let received_str = String::from_utf8_lossy(message);
                log::error!("[UDP_Pinger] Received unexpected message: '{}'", received_str);
                return Err(io::Error::new(io::ErrorKind::InvalidData, "unexpected reply"));
            }
            Err(e) if e.code().is_would_block() => {
                if Instant::now() >= deadline {
                    log::error!("[UDP_Pinger] Error: Did not receive a 'PONG' within 5 seconds.");
                    return Err(io::Error::from(ErrorCode::TimedOut));
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                log::error!("[UDP_Pinger] Error receiving data: {}", e);
                return Err(e.into());
            }
        }
    }
}

pub fn run_ponger(local_addr: &str, token: CancellationToken) -> io::Result<()> {
    let mut socket = UdpSocket::bound(&endpoint(local_addr)?)?;
    socket.non_blocking(true)?;
    log::debug!("[UDP_Ponger] Listening on {}...", local_addr);
    let mut buffer = [0u8; 1024];
    loop {
        match socket.receive_from(&mut buffer) {
            Ok((number_of_bytes, src_addr)) => {
                let message = &buffer[..number_of_bytes];
                if message == b"PING" {
                    log::debug!("[UDP_Ponger] Received 'PING' from {}. Responding...", src_addr);
                    socket.send_to(b"PONG", &src_addr)?;
                } else {
                    let received_str = String::from_utf8_lossy(message);
                    log::debug!("[UDP_Ponger] Received unexpected: '{}'. Ignoring.", received_str);
                }
                break;
            }
            Err(e) if e.code().is_would_block() => {
                if token.is_cancelled() {
                    break;
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                log::error!("[UDP_Ponger] A network error occurred: {}", e);
                return Err(e.into());
            }
        }
    }
    Ok(())
}
