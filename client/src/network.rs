//! Non-blocking server connection for the client's frame loop.
//!
//! The socket is polled exactly once per frame: `poll` reads whatever
//! bytes are available without blocking, feeds the framer, and flushes as
//! much queued outbound data as the socket will take. No frame ever
//! stalls on I/O. Reconnection is user-initiated, never automatic.

use log::info;
use shared::framer::MessageFramer;
use shared::messages::{ClientMessage, ServerMessage};
use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;

pub struct Connection {
    stream: TcpStream,
    framer: MessageFramer,
    outbound: Vec<u8>,
    closed: bool,
}

impl Connection {
    pub fn connect(addr: &str) -> std::io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        info!("Connected to {}", addr);
        Ok(Self {
            stream,
            framer: MessageFramer::new(),
            outbound: Vec::new(),
            closed: false,
        })
    }

    /// Queues a message; bytes go out on the next `poll`.
    pub fn send(&mut self, msg: &ClientMessage) -> serde_json::Result<()> {
        let payload = serde_json::to_string(msg)?;
        self.outbound.extend_from_slice(payload.as_bytes());
        self.outbound.push(b'\n');
        Ok(())
    }

    /// One per-frame pass: flush pending writes, then drain every decoded
    /// message that has arrived since the last frame, in order.
    pub fn poll(&mut self) -> std::io::Result<Vec<ServerMessage>> {
        if self.closed {
            return Ok(Vec::new());
        }
        self.flush_outbound()?;

        let mut buf = [0u8; 2048];
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => {
                    self.closed = true;
                    break;
                }
                Ok(n) => self.framer.push(&buf[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    self.closed = true;
                    return Err(e);
                }
            }
        }

        Ok(self.framer.drain_messages())
    }

    fn flush_outbound(&mut self) -> std::io::Result<()> {
        while !self.outbound.is_empty() {
            match self.stream.write(&self.outbound) {
                Ok(0) => break,
                Ok(n) => {
                    self.outbound.drain(..n);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    self.closed = true;
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// True once the server has closed its side or an error occurred.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Facing;
    use std::io::BufRead;
    use std::net::TcpListener;

    #[test]
    fn test_send_is_newline_terminated_and_nonblocking() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let mut conn = Connection::connect(&addr.to_string()).unwrap();
        let (server_side, _) = listener.accept().unwrap();

        conn.send(&ClientMessage::Join {
            name: "alice".to_string(),
        })
        .unwrap();
        conn.send(&ClientMessage::Update {
            x: 1,
            y: 2,
            sprite: Facing::North,
            room: 1,
        })
        .unwrap();
        conn.poll().unwrap();

        let mut reader = std::io::BufReader::new(server_side);
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        assert!(line.ends_with('\n'));
        let msg: ClientMessage = serde_json::from_str(line.trim()).unwrap();
        assert!(matches!(msg, ClientMessage::Join { .. }));
    }

    #[test]
    fn test_poll_decodes_split_server_messages() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let mut conn = Connection::connect(&addr.to_string()).unwrap();
        let (mut server_side, _) = listener.accept().unwrap();

        let payload = serde_json::to_string(&ServerMessage::PlayerLeft { id: 4 }).unwrap();
        let bytes = payload.as_bytes();
        // Write the message in two halves across the frame boundary.
        server_side.write_all(&bytes[..bytes.len() / 2]).unwrap();
        server_side.flush().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));

        let msgs = conn.poll().unwrap();
        assert!(msgs.is_empty());

        server_side.write_all(&bytes[bytes.len() / 2..]).unwrap();
        server_side.write_all(b"\n").unwrap();
        server_side.flush().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));

        let msgs = conn.poll().unwrap();
        assert_eq!(msgs.len(), 1);
        assert!(matches!(msgs[0], ServerMessage::PlayerLeft { id: 4 }));
    }

    #[test]
    fn test_poll_detects_closed_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let mut conn = Connection::connect(&addr.to_string()).unwrap();
        let (server_side, _) = listener.accept().unwrap();
        drop(server_side);
        std::thread::sleep(std::time::Duration::from_millis(20));

        let _ = conn.poll();
        assert!(conn.is_closed());
    }
}
