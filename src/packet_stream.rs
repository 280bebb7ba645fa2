use std::io::{ErrorKind, Write};
use std::time::{Duration, Instant};

use chrono::Local;
use log::warn;

use crate::{
    command::Command,
    error::{Error, Result},
    header::Header,
    line_buffer::LineBuffer,
    log_writer::LogWriter,
    message::Message,
    packet::Packet,
    packet_writer::PacketWriter,
    read_with_timeout::ReadWithTimeout,
    transmit_queue::TransmitQueue,
};

/// The shortest read the poll loop will issue.
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(5);

/// Bridges the raw serial line to a reliable packet stream.
///
/// Inbound, the stream frames and validates packets, advancing the QoS state
/// machine with each one. Outbound, commands are queued and written under the
/// QoS engine's control; `!` escapes bypass it. All waiting is bounded: the
/// event loop calls [`poll`](PacketStream::poll) with a timeout and the
/// stream reads with the smaller of that and the next QoS deadline.
pub struct PacketStream<R: ReadWithTimeout, W: Write> {
    reader: R,
    buf: LineBuffer,
    writer: PacketWriter<W>,
    queue: TransmitQueue,
    packet_log: Option<LogWriter<Box<dyn Write>>>,
}

impl<R: ReadWithTimeout, W: Write> PacketStream<R, W> {
    /// Constructs a `PacketStream` over a reader/writer pair.
    pub fn new(reader: R, writer: W) -> PacketStream<R, W> {
        PacketStream {
            reader,
            buf: LineBuffer::new(),
            writer: PacketWriter::new(writer),
            queue: TransmitQueue::new(),
            packet_log: None,
        }
    }

    /// Attaches a packet log; every received line is appended to it.
    pub fn set_packet_log(&mut self, log: LogWriter<Box<dyn Write>>) {
        self.packet_log = Some(log);
    }

    /// Enqueues a command for transmission under QoS control.
    pub fn send_command(&mut self, cmd: Command) {
        self.queue.submit(cmd);
    }

    /// Writes an out-of-band gateway escape (e.g. `!V`), bypassing the QoS
    /// engine.
    pub fn send_escape(&mut self, escape: &str) -> Result<()> {
        self.writer.write_escape(escape)
    }

    /// Notifies the callback registry of a parsed message.
    pub fn message_received(&mut self, msg: &Message, now: Instant) {
        self.queue.message_received(msg, now);
    }

    /// Returns `true` when nothing is queued or in flight.
    pub fn is_idle(&self) -> bool {
        self.queue.is_idle()
    }

    /// Access to the QoS engine (e.g. to register a daemon callback).
    pub fn queue_mut(&mut self) -> &mut TransmitQueue {
        &mut self.queue
    }

    /// Services the stream for up to `timeout`.
    ///
    /// Pending transmissions and retries are written first; then the stream
    /// reads until a valid packet arrives (returning it), the timeout lapses
    /// (returning `None`), or the transport is lost (an error).
    pub fn poll(&mut self, timeout: Duration) -> Result<Option<Packet>> {
        let deadline = Instant::now() + timeout;

        loop {
            let now = Instant::now();
            while let Some(line) = self.queue.poll_transmit(now) {
                self.writer.write_line(&line)?;
            }

            while let Some(line) = self.buf.read_line() {
                let dtm = Local::now().naive_local();
                if let Some(log) = &mut self.packet_log {
                    log.write_raw_line(dtm, &line)?;
                }
                match Packet::from_raw_line(dtm, &line) {
                    Ok(pkt) => {
                        self.queue.packet_received(&Header::from_packet(&pkt), Instant::now());
                        return Ok(Some(pkt));
                    }
                    Err(err) => warn!("{line} < {err}"),
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            // bound the read by our deadline and by the next QoS deadline
            let mut until = deadline;
            if let Some(qos_deadline) = self.queue.next_deadline() {
                until = until.min(qos_deadline);
            }
            if until <= now {
                continue;
            }
            let wait = (until - now).max(MIN_READ_TIMEOUT);

            let mut buf = [0u8; 4096];
            match self.reader.read_with_timeout(&mut buf, Some(wait)) {
                Ok(0) => {
                    return Err(Error::Io(std::io::Error::new(
                        ErrorKind::UnexpectedEof,
                        "serial transport lost",
                    )));
                }
                Ok(size) => self.buf.extend_from_slice(&buf[0..size]),
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
                Err(err) => return Err(err.into()),
            }
        }
    }
}

impl<R: ReadWithTimeout, W: Write> std::fmt::Debug for PacketStream<R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("PacketStream")
            .field("buf", &self.buf)
            .field("queue", &self.queue)
            .finish()
    }
}
