use crate::suite::udp_pingpong::endpoint;
use netlite_socket::{ShutdownType, Tcp, TcpSocket, WaitType};
use std::io;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub fn run_pinger(remote_addr: &str) -> io::Result<()> {
    let mut socket = TcpSocket::new(Tcp::v4());
    socket.connect(&endpoint(remote_addr)?)?;
    log::debug!(
        "[TCP_Pinger] Connected from {} to {}",
        socket.local_endpoint()?,
        remote_addr
    );
    socket.send(b"PING")?;
    socket.shutdown(ShutdownType::Send)?;
    let mut buffer = [0u8; 1024];
    let number_of_bytes = socket.receive(&mut buffer)?;
    let message = &buffer[..number_of_bytes];
    if message != b"PONG" {
        let received_str = String::from_utf8_lossy(message);
        log::error!("[TCP_Pinger] Received unexpected message: '{}'", received_str);
        return Err(io::Error::new(io::ErrorKind::InvalidData, "unexpected reply"));
    }
    log::debug!("[TCP_Pinger] Success! Received 'PONG' from {}", remote_addr);
    Ok(())
}

pub fn run_ponger(local_addr: &str, token: CancellationToken) -> io::Result<()> {
    let listener = TcpSocket::bound(&endpoint(local_addr)?)?;
    listener.listen(16)?;
    log::debug!("[TCP_Ponger] Listening on {}...", local_addr);
    while !listener.has_pending_accept()? {
        if token.is_cancelled() {
            return Ok(());
        }
        std::thread::sleep(POLL_INTERVAL);
    }
    let (conn, peer) = listener.accept()?;
    log::debug!("[TCP_Ponger] Accepted {}", peer);
    conn.wait(WaitType::Read)?;
    let mut buffer = [0u8; 1024];
    let number_of_bytes = conn.receive(&mut buffer)?;
    if &buffer[..number_of_bytes] == b"PING" {
        log::debug!("[TCP_Ponger] Received 'PING' from {}. Responding...", peer);
        conn.send(b"PONG")?;
    }
    Ok(())
}
