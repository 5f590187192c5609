//
// reactor_threads.rs - Reactor driven by several threads
//
// Purpose:
//   Checks that a reactor shared by a pool of threads executes every posted
//   handler exactly once, and that asynchronous accept, connect, send and
//   receive chain together over loopback TCP.
//

use netlite_socket::{
    AddressV4, Endpoint, ErrorCode, MessageFlags, Reactor, ReactorConfig, Tcp, TcpSocket,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;

const THREADS: usize = 4;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn run_on_pool(reactor: &Reactor) -> Vec<thread::JoinHandle<Result<usize, ErrorCode>>> {
    (0..THREADS)
        .map(|_| {
            let reactor = reactor.clone();
            thread::spawn(move || reactor.run())
        })
        .collect()
}

#[test]
fn every_posted_handler_runs_once() {
    init_logger();
    let reactor = Reactor::with_config(ReactorConfig {
        concurrency_hint: Some(THREADS),
        ..ReactorConfig::default()
    })
    .unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    const POSTS: usize = 1000;
    for _ in 0..POSTS {
        let hits = hits.clone();
        reactor.post(move || {
            hits.fetch_add(1, Ordering::SeqCst);
        });
    }
    let executed: usize = run_on_pool(&reactor)
        .into_iter()
        .map(|t| t.join().unwrap().unwrap())
        .sum();
    assert_eq!(executed, POSTS);
    assert_eq!(hits.load(Ordering::SeqCst), POSTS);
    assert_eq!(reactor.outstanding(), 0);
}

#[test]
fn handlers_posted_from_handlers_keep_the_pool_busy() {
    init_logger();
    let reactor = Reactor::new().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    fn chain(reactor: Reactor, hits: Arc<AtomicUsize>, left: usize) {
        hits.fetch_add(1, Ordering::SeqCst);
        if left > 0 {
            let next = reactor.clone();
            reactor.post(move || chain(next, hits, left - 1));
        }
    }
    {
        let next = reactor.clone();
        let hits = hits.clone();
        reactor.post(move || chain(next, hits, 99));
    }
    let executed: usize = run_on_pool(&reactor)
        .into_iter()
        .map(|t| t.join().unwrap().unwrap())
        .sum();
    assert_eq!(executed, 100);
    assert_eq!(hits.load(Ordering::SeqCst), 100);
}

#[test]
fn async_echo_over_loopback() {
    init_logger();
    let reactor = Reactor::new().unwrap();
    let mut listener = TcpSocket::bound(&Endpoint::new(AddressV4::loopback(), 0)).unwrap();
    listener.listen(16).unwrap();
    let server_ep = listener.local_endpoint().unwrap();

    // Server: accept, read one message, echo it back.
    let server_reactor = reactor.clone();
    listener.async_accept(&reactor, move |r| {
        let (mut conn, peer) = r.unwrap();
        log::info!("accepted {peer}");
        let reactor = server_reactor.clone();
        let echo = conn.clone();
        conn.async_receive(&server_reactor, vec![0u8; 64], MessageFlags::empty(), move |r, mut buf| {
            let n = r.unwrap();
            buf.truncate(n);
            let mut echo = echo;
            let keep = echo.clone();
            echo.async_send(&reactor, buf, MessageFlags::empty(), move |r, _| {
                r.unwrap();
                drop(keep);
            });
        });
    });

    // Client: connect, send, read the echo.
    let (tx, rx) = mpsc::channel();
    let client = Arc::new(Mutex::new(TcpSocket::new(Tcp::v4())));
    {
        let client_reactor = reactor.clone();
        let handle = client.clone();
        client.lock().unwrap().async_connect(&reactor, &server_ep, move |r| {
            r.unwrap();
            let mut socket = handle.lock().unwrap();
            let reactor = client_reactor.clone();
            let reader = handle.clone();
            socket.async_send(&client_reactor, b"echo me".to_vec(), MessageFlags::empty(), move |r, _| {
                assert_eq!(r.unwrap(), 7);
                let mut socket = reader.lock().unwrap();
                socket.async_receive(&reactor, vec![0u8; 64], MessageFlags::empty(), move |r, buf| {
                    let n = r.unwrap();
                    let _ = tx.send(buf[..n].to_vec());
                });
            });
        });
    }

    for t in run_on_pool(&reactor) {
        t.join().unwrap().unwrap();
    }
    assert_eq!(rx.recv().unwrap(), b"echo me".to_vec());
    assert_eq!(reactor.outstanding(), 0);
}
