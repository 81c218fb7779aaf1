use std::io::{self, Read, Write};
use std::net::TcpListener;
#[cfg(unix)]
use std::os::unix::fs::FileTypeExt;
#[cfg(unix)]
use std::os::unix::net::UnixListener;
#[cfg(unix)]
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use crossbeam_channel::Receiver;
use log::{debug, info, warn};
use simio_protocol::{Endpoint, FRAME_LEN};

/// How often blocked accepts and reads look at the stop signal
const STOP_POLL: Duration = Duration::from_millis(50);

/// How the peer answers each request byte
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Responder {
    Xor(u8),
    Constant(u8),
}

impl Responder {
    pub fn answer(self, request: u8) -> u8 {
        match self {
            Responder::Xor(mask) => request ^ mask,
            Responder::Constant(byte) => byte,
        }
    }
}

trait Conn: Read + Write {}
impl<T: Read + Write> Conn for T {}

/// Non-blocking listener; an ipc socket file is removed when it is dropped
enum Listener {
    #[cfg(unix)]
    Unix(UnixListener, PathBuf),
    Tcp(TcpListener),
}

/// Clear a socket file left behind by an earlier run; anything else is refused
#[cfg(unix)]
fn remove_stale_socket(path: &Path) -> anyhow::Result<()> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => std::fs::remove_file(path)
            .with_context(|| format!("removing stale {}", path.display())),
        Ok(_) => bail!("{} exists and is not a socket", path.display()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("checking {}", path.display())),
    }
}

impl Listener {
    fn bind(endpoint: &Endpoint) -> anyhow::Result<Self> {
        let listener = match endpoint {
            #[cfg(unix)]
            Endpoint::Ipc(path) => {
                remove_stale_socket(path)?;
                let listener =
                    UnixListener::bind(path).with_context(|| format!("binding {}", endpoint))?;
                Listener::Unix(listener, path.clone())
            }
            Endpoint::Tcp(addr) => Listener::Tcp(
                TcpListener::bind(addr.as_str()).with_context(|| format!("binding {}", endpoint))?,
            ),
            _ => bail!("{} can't be served from another process", endpoint),
        };
        listener.set_nonblocking().context("configuring listener")?;
        Ok(listener)
    }

    fn set_nonblocking(&self) -> io::Result<()> {
        match self {
            #[cfg(unix)]
            Listener::Unix(listener, _) => listener.set_nonblocking(true),
            Listener::Tcp(listener) => listener.set_nonblocking(true),
        }
    }

    /// Next waiting connection, `None` if no device is knocking
    fn accept(&self) -> io::Result<Option<Box<dyn Conn>>> {
        let accepted = match self {
            #[cfg(unix)]
            Listener::Unix(listener, _) => listener.accept().and_then(|(stream, _)| {
                stream.set_nonblocking(false)?;
                stream.set_read_timeout(Some(STOP_POLL))?;
                Ok(Box::new(stream) as Box<dyn Conn>)
            }),
            Listener::Tcp(listener) => listener.accept().and_then(|(stream, _)| {
                stream.set_nonblocking(false)?;
                stream.set_nodelay(true)?;
                stream.set_read_timeout(Some(STOP_POLL))?;
                Ok(Box::new(stream) as Box<dyn Conn>)
            }),
        };
        match accepted {
            Ok(conn) => Ok(Some(conn)),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(err) => Err(err),
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        match self {
            #[cfg(unix)]
            Listener::Unix(_, path) => {
                let _ = std::fs::remove_file(path);
            }
            Listener::Tcp(_) => {}
        }
    }
}

/// Answer requests on one connection until it closes, the stop signal
/// fires or `budget` exchanges are used up
fn serve_conn(
    conn: &mut dyn Conn,
    responder: Responder,
    budget: &mut Option<usize>,
    stop: &Receiver<()>,
) -> io::Result<usize> {
    let mut exchanges = 0;
    let mut frame = [0u8; FRAME_LEN];

    while stop.is_empty() && *budget != Some(0) {
        match conn.read(&mut frame) {
            Ok(0) => break,
            Ok(_) => {}
            // Read timeout: go round and look at the stop signal
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) =>
            {
                continue
            }
            Err(err) => return Err(err),
        }
        let reply = responder.answer(frame[0]);
        conn.write_all(&[reply; FRAME_LEN])?;
        conn.flush()?;
        debug!("peer: 0x{:02x} -> 0x{:02x}", frame[0], reply);

        exchanges += 1;
        if let Some(left) = budget.as_mut() {
            *left -= 1;
        }
    }
    Ok(exchanges)
}

/// Serve `endpoint` as the device's peer, returning the number of exchanges
///
/// Returns shortly after `stop` receives, even while waiting for a device.
pub fn serve(
    endpoint: &Endpoint,
    responder: Responder,
    count: Option<usize>,
    stop: Receiver<()>,
) -> anyhow::Result<usize> {
    let listener = Listener::bind(endpoint)?;
    info!("Serving {} ({:?})", endpoint, responder);

    let mut budget = count;
    let mut total = 0;
    while stop.is_empty() && budget != Some(0) {
        let mut conn = match listener.accept().context("accepting connection")? {
            Some(conn) => conn,
            None => {
                if stop.recv_timeout(STOP_POLL).is_ok() {
                    break;
                }
                continue;
            }
        };
        info!("peer: device connected");
        match serve_conn(conn.as_mut(), responder, &mut budget, &stop) {
            Ok(exchanges) => total += exchanges,
            Err(err) => warn!("peer: connection dropped: {}", err),
        }
        info!("peer: device disconnected");
    }

    info!("Stopped serving {} after {} exchanges", endpoint, total);
    Ok(total)
}

#[cfg(test)]
mod peer_tests {
    use super::*;

    use std::rc::Rc;
    use std::thread;

    use crossbeam_channel::bounded;
    use simio_core::{ArgTokens, Registry, Simio};
    use simio_peripherals::{register_all, SocketConnector};

    #[test]
    fn test_responder() {
        assert_eq!(Responder::Xor(0).answer(0xAB), 0xAB);
        assert_eq!(Responder::Xor(0xFF).answer(0x0F), 0xF0);
        assert_eq!(Responder::Constant(0x5A).answer(0x12), 0x5A);
    }

    #[test]
    fn test_inproc_rejected() {
        let (_tx, rx) = bounded(1);
        let endpoint = Endpoint::Inproc("spi".to_string());
        assert!(serve(&endpoint, Responder::Xor(0), None, rx).is_err());
    }

    #[test]
    fn test_serve_tcp_budget() {
        // Find a free port, then serve it from a thread
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let endpoint: Endpoint = format!("tcp://127.0.0.1:{}", port).parse().unwrap();
        let (_stop_tx, stop_rx) = bounded(1);
        let served = endpoint.clone();
        let server = thread::spawn(move || {
            serve(&served, Responder::Constant(0x5A), Some(2), stop_rx).unwrap()
        });

        let mut registry = Registry::new();
        register_all(&mut registry, Rc::new(SocketConnector));
        let mut bus = Simio::new(registry);

        // Server thread may not be listening yet
        let arg = endpoint.to_string();
        let mut attached = false;
        for _ in 0..100 {
            if bus.add("spi", "spi0", &mut ArgTokens::new(&arg)).is_ok() {
                attached = true;
                break;
            }
            thread::sleep(std::time::Duration::from_millis(10));
        }
        assert!(attached);

        bus.write_b(0x006F, 0x01).unwrap();
        assert_eq!(bus.read_b(0x006E).unwrap(), Some(0x5A));
        bus.write_b(0x006F, 0x02).unwrap();
        assert_eq!(bus.read_b(0x006E).unwrap(), Some(0x5A));

        assert_eq!(server.join().unwrap(), 2);
    }

    #[cfg(unix)]
    fn scratch_path(tag: &str) -> PathBuf {
        PathBuf::from(format!("/tmp/simio_peer_{}_{}", tag, std::process::id()))
    }

    #[cfg(unix)]
    /// Run `serve` on a thread, handing back its stop sender and result
    fn serve_in_background(
        endpoint: Endpoint,
    ) -> (
        crossbeam_channel::Sender<()>,
        Receiver<anyhow::Result<usize>>,
    ) {
        let (stop_tx, stop_rx) = bounded(1);
        let (done_tx, done_rx) = bounded(1);
        thread::spawn(move || {
            let _ = done_tx.send(serve(&endpoint, Responder::Xor(0), None, stop_rx));
        });
        (stop_tx, done_rx)
    }

    #[cfg(unix)]
    #[test]
    fn test_regular_file_not_replaced() {
        let path = scratch_path("regular");
        std::fs::write(&path, b"keep me").unwrap();

        let (_stop_tx, stop_rx) = bounded(1);
        let result = serve(&Endpoint::Ipc(path.clone()), Responder::Xor(0), None, stop_rx);
        assert!(result.is_err());
        assert!(path.is_file());
        assert_eq!(std::fs::read(&path).unwrap(), b"keep me");

        std::fs::remove_file(&path).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_stale_socket_replaced() {
        let path = scratch_path("stale");
        let _ = std::fs::remove_file(&path);
        drop(UnixListener::bind(&path).unwrap());
        assert!(std::fs::symlink_metadata(&path).unwrap().file_type().is_socket());

        let listener = Listener::bind(&Endpoint::Ipc(path.clone())).unwrap();
        assert!(listener.accept().unwrap().is_none());

        drop(listener);
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_stop_while_waiting_for_device() {
        let path = scratch_path("idle");
        let (stop_tx, done_rx) = serve_in_background(Endpoint::Ipc(path.clone()));

        thread::sleep(Duration::from_millis(100));
        stop_tx.send(()).unwrap();
        let served = done_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(served.unwrap(), 0);
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_stop_while_device_connected() {
        use std::os::unix::net::UnixStream;

        let path = scratch_path("connected");
        let (stop_tx, done_rx) = serve_in_background(Endpoint::Ipc(path.clone()));

        let mut stream = None;
        for _ in 0..100 {
            if let Ok(conn) = UnixStream::connect(&path) {
                stream = Some(conn);
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        let mut stream = stream.unwrap();
        let mut frame = [0u8; 1];
        stream.write_all(&[0x3C]).unwrap();
        stream.read_exact(&mut frame).unwrap();
        assert_eq!(frame[0], 0x3C);

        // Device keeps the connection open but goes quiet
        stop_tx.send(()).unwrap();
        let served = done_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(served.unwrap(), 1);
        assert!(!path.exists());
    }
}
