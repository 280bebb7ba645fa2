use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fmt;
use std::time::Instant;

use log::{debug, warn};

use crate::{
    command::{Callback, Command, QOS_TIMEOUT_REPLY},
    header::Header,
    message::Message,
};

/// The delivery state of the in-flight command.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QosState {
    /// Written to the line; waiting for the gateway to echo it.
    AwaitingEcho,

    /// Echo seen; waiting for the peer's reply.
    AwaitingReply,
}

#[derive(Debug)]
struct InFlight {
    cmd: Command,
    state: QosState,
    echo_header: Header,
    reply_header: Header,
    tx_count: u8,
    deadline: Instant,
}

struct Queued {
    seq: u64,
    cmd: Command,
}

impl Queued {
    fn sort_key(&self) -> (u8, u64) {
        (self.cmd.qos.priority as u8, self.seq)
    }
}

impl Eq for Queued {}

impl PartialEq for Queued {
    fn eq(&self, other: &Queued) -> bool {
        self.sort_key() == other.sort_key()
    }
}

impl Ord for Queued {
    fn cmp(&self, other: &Queued) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Queued) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct CallbackEntry {
    header: Header,
    expires: Instant,
    daemon: bool,
    func: Box<dyn FnMut(Option<&Message>)>,
}

/// The QoS engine: a priority queue feeding a single-command retry state
/// machine, plus the registry of reply callbacks.
///
/// The engine performs no I/O of its own; the event loop drives it by calling
/// [`poll_transmit`](TransmitQueue::poll_transmit) (writing whatever line it
/// returns), [`packet_received`](TransmitQueue::packet_received) for every
/// inbound packet, and [`message_received`](TransmitQueue::message_received)
/// for every parsed message.
///
/// Exactly one command is in flight at any instant: a higher-priority
/// submission waits for the in-flight command to complete or expire.
pub struct TransmitQueue {
    queue: BinaryHeap<Reverse<Queued>>,
    in_flight: Option<InFlight>,
    callbacks: Vec<CallbackEntry>,
    seq: u64,
}

impl TransmitQueue {
    /// Constructs an empty `TransmitQueue`.
    pub fn new() -> TransmitQueue {
        TransmitQueue {
            queue: BinaryHeap::new(),
            in_flight: None,
            callbacks: Vec::new(),
            seq: 0,
        }
    }

    /// Enqueues a command; ordering is `(priority, submission order)`.
    pub fn submit(&mut self, cmd: Command) {
        self.seq += 1;
        self.queue.push(Reverse(Queued {
            seq: self.seq,
            cmd,
        }));
    }

    /// Registers a standalone callback (not attached to a command).
    pub fn register_callback(&mut self, header: Header, callback: Callback, now: Instant) {
        self.callbacks.push(CallbackEntry {
            header,
            expires: now + callback.timeout,
            daemon: callback.daemon,
            func: callback.func,
        });
    }

    /// Advances the transmit side of the state machine.
    ///
    /// Returns the next line to write, if any: either the next queued command
    /// (its callback is registered before the line is handed out), or a
    /// re-transmission of the in-flight command whose deadline has passed.
    /// Commands whose attempts are exhausted are dropped; their callbacks are
    /// left to expire.
    pub fn poll_transmit(&mut self, now: Instant) -> Option<String> {
        loop {
            match self.in_flight.take() {
                None => {
                    let Reverse(queued) = self.queue.pop()?;
                    let mut cmd = queued.cmd;

                    if let Some(callback) = cmd.callback.take() {
                        let header = cmd.reply_header();
                        self.register_callback(header, callback, now);
                    }

                    let line = cmd.to_line();
                    debug!("{cmd} < sending");
                    self.in_flight = Some(InFlight {
                        state: QosState::AwaitingEcho,
                        echo_header: cmd.echo_header(),
                        reply_header: cmd.reply_header(),
                        tx_count: 1,
                        deadline: now + cmd.qos.timeout,
                        cmd,
                    });
                    return Some(line);
                }

                Some(mut in_flight) => {
                    if now < in_flight.deadline {
                        self.in_flight = Some(in_flight);
                        return None;
                    }

                    if in_flight.tx_count > in_flight.cmd.qos.retries {
                        warn!("{} < command expired", in_flight.cmd);
                        continue;
                    }

                    in_flight.tx_count += 1;
                    in_flight.state = QosState::AwaitingEcho;
                    in_flight.deadline = now + in_flight.cmd.qos.timeout;
                    debug!(
                        "{} < re-sending (attempt {})",
                        in_flight.cmd, in_flight.tx_count
                    );
                    let line = in_flight.cmd.to_line();
                    self.in_flight = Some(in_flight);
                    return Some(line);
                }
            }
        }
    }

    /// Advances the receive side of the state machine with a packet header.
    ///
    /// The echo of the in-flight command moves it to `AwaitingReply`; the
    /// reply wait backs off exponentially with the attempt count (the echo
    /// wait does not). A matching reply completes the command.
    pub fn packet_received(&mut self, header: &Header, now: Instant) {
        let Some(in_flight) = &mut self.in_flight else {
            return;
        };

        if in_flight.state == QosState::AwaitingEcho && *header == in_flight.echo_header {
            in_flight.state = QosState::AwaitingReply;
            in_flight.deadline =
                now + QOS_TIMEOUT_REPLY * 2u32.pow(u32::from(in_flight.tx_count) - 1);
        } else if *header == in_flight.reply_header {
            debug!("{} < completed", in_flight.cmd);
            self.in_flight = None;
        }
    }

    /// Dispatches a parsed message to the callback registry.
    ///
    /// Expired non-daemon callbacks are first notified with `None` and
    /// deregistered; then the callback matching the message's header, if any,
    /// is invoked (and deregistered unless it is a daemon).
    pub fn message_received(&mut self, msg: &Message, now: Instant) {
        for entry in &mut self.callbacks {
            if !entry.daemon && entry.expires < now {
                warn!("{} < expired callback", entry.header);
                (entry.func)(None);
            }
        }
        self.callbacks
            .retain(|entry| entry.daemon || entry.expires >= now);

        let header = msg.header();
        if let Some(at) = self.callbacks.iter().position(|e| e.header == header) {
            let daemon = self.callbacks[at].daemon;
            (self.callbacks[at].func)(Some(msg));
            if !daemon {
                self.callbacks.remove(at);
            }
        }
    }

    /// Returns the instant of the next retry/expiry deadline, if a command is
    /// in flight.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.in_flight.as_ref().map(|in_flight| in_flight.deadline)
    }

    /// Returns the state of the in-flight command, if any.
    pub fn in_flight_state(&self) -> Option<QosState> {
        self.in_flight.as_ref().map(|in_flight| in_flight.state)
    }

    /// Returns `true` when nothing is queued or in flight.
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.in_flight.is_none()
    }

    /// Returns the number of commands waiting behind the in-flight one.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl Default for TransmitQueue {
    fn default() -> TransmitQueue {
        TransmitQueue::new()
    }
}

impl fmt::Debug for TransmitQueue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TransmitQueue")
            .field("pending", &self.queue.len())
            .field("in_flight", &self.in_flight)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    use crate::{
        address::Address,
        command::{Priority, Qos},
        packet::Packet,
        test_utils::test_timestamp,
    };

    fn ctl() -> Address {
        "01:145038".parse().unwrap()
    }

    fn echo_of(cmd: &Command) -> Header {
        cmd.echo_header()
    }

    fn reply_of(cmd: &Command) -> Header {
        cmd.reply_header()
    }

    #[test]
    fn test_priority_ordering() {
        let mut queue = TransmitQueue::new();
        let now = Instant::now();

        queue.submit(
            Command::get_zone_config(ctl(), 0).with_qos(Qos::default().with_priority(Priority::Low)),
        );
        queue.submit(Command::get_zone_config(ctl(), 1));
        queue.submit(
            Command::get_zone_config(ctl(), 2).with_qos(Qos::default().with_priority(Priority::Asap)),
        );
        queue.submit(Command::get_zone_config(ctl(), 3));

        // strict priority first, then submission order within a band
        let line = queue.poll_transmit(now).unwrap();
        assert!(line.ends_with("000A 001 02"), "{line}");

        // the in-flight command is not preempted
        queue.submit(
            Command::get_zone_config(ctl(), 4).with_qos(Qos::default().with_priority(Priority::Asap)),
        );
        assert_eq!(None, queue.poll_transmit(now));

        // complete it: echo, then reply
        let cmd = Command::get_zone_config(ctl(), 2);
        queue.packet_received(&echo_of(&cmd), now);
        queue.packet_received(&reply_of(&cmd), now);

        let line = queue.poll_transmit(now).unwrap();
        assert!(line.ends_with("000A 001 04"), "{line}");
    }

    #[test]
    fn test_retry_and_expiry() {
        let mut queue = TransmitQueue::new();
        let now = Instant::now();

        queue.submit(Command::get_zone_config(ctl(), 0).with_qos(Qos::default().with_retries(2)));

        let mut attempts = 0;
        let mut at = now;
        while queue.poll_transmit(at).is_some() {
            attempts += 1;
            at += Duration::from_secs(1); // past every deadline
        }

        // total on-wire attempts are retries + 1
        assert_eq!(3, attempts);
        assert_eq!(true, queue.is_idle());
    }

    #[test]
    fn test_echo_then_reply_backoff() {
        let mut queue = TransmitQueue::new();
        let now = Instant::now();

        let cmd = Command::get_zone_config(ctl(), 0);
        queue.submit(Command::get_zone_config(ctl(), 0));

        assert!(queue.poll_transmit(now).is_some());
        assert_eq!(Some(QosState::AwaitingEcho), queue.in_flight_state());

        // the echo promotes the state and arms the reply timeout
        queue.packet_received(&echo_of(&cmd), now);
        assert_eq!(Some(QosState::AwaitingReply), queue.in_flight_state());

        let deadline_1 = queue.next_deadline().unwrap();
        assert_eq!(deadline_1, now + QOS_TIMEOUT_REPLY);

        // second attempt: the reply wait doubles, the echo wait does not
        let at = deadline_1 + Duration::from_millis(1);
        assert!(queue.poll_transmit(at).is_some());
        assert_eq!(Some(QosState::AwaitingEcho), queue.in_flight_state());
        assert_eq!(queue.next_deadline().unwrap(), at + cmd.qos.timeout);

        queue.packet_received(&echo_of(&cmd), at);
        assert_eq!(queue.next_deadline().unwrap(), at + QOS_TIMEOUT_REPLY * 2);

        // the reply completes the command
        queue.packet_received(&reply_of(&cmd), at);
        assert_eq!(true, queue.is_idle());
    }

    #[test]
    fn test_unrelated_packets_are_ignored() {
        let mut queue = TransmitQueue::new();
        let now = Instant::now();

        let cmd = Command::get_zone_config(ctl(), 0);
        queue.submit(Command::get_zone_config(ctl(), 0));
        assert!(queue.poll_transmit(now).is_some());

        let other = Command::get_zone_config(ctl(), 7);
        queue.packet_received(&echo_of(&other), now);
        assert_eq!(Some(QosState::AwaitingEcho), queue.in_flight_state());

        queue.packet_received(&echo_of(&cmd), now);
        queue.packet_received(&reply_of(&other), now);
        assert_eq!(Some(QosState::AwaitingReply), queue.in_flight_state());
    }

    #[test]
    fn test_callbacks() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let mut queue = TransmitQueue::new();
        let now = Instant::now();

        let seen: Rc<RefCell<Vec<bool>>> = Rc::new(RefCell::new(Vec::new()));

        let seen_cb = seen.clone();
        let cmd = Command::get_zone_temp(ctl(), 0).with_callback(Callback::new(move |msg| {
            seen_cb.borrow_mut().push(msg.is_some());
        }));
        queue.submit(cmd);
        assert!(queue.poll_transmit(now).is_some());

        let pkt = Packet::from_line(
            test_timestamp(),
            "053 RP --- 01:145038 18:013393 --:------ 30C9 003 000838",
        )
        .unwrap();
        let msg = Message::new(pkt, 12).unwrap();

        queue.message_received(&msg, now);
        assert_eq!(vec![true], *seen.borrow());

        // one-shot: a second matching message does not re-fire
        queue.message_received(&msg, now);
        assert_eq!(vec![true], *seen.borrow());
    }

    #[test]
    fn test_callback_expiry() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let mut queue = TransmitQueue::new();
        let now = Instant::now();

        let seen: Rc<RefCell<Vec<bool>>> = Rc::new(RefCell::new(Vec::new()));

        let seen_cb = seen.clone();
        let cmd = Command::get_zone_temp(ctl(), 5).with_callback(
            Callback::new(move |msg| {
                seen_cb.borrow_mut().push(msg.is_some());
            })
            .with_timeout(Duration::from_millis(100)),
        );
        queue.submit(cmd);
        assert!(queue.poll_transmit(now).is_some());

        // an unrelated message after the expiry notifies the callback with None
        let pkt = Packet::from_line(
            test_timestamp(),
            "053  I --- 13:237335 --:------ 13:237335 3B00 002 00C8",
        )
        .unwrap();
        let msg = Message::new(pkt, 12).unwrap();

        queue.message_received(&msg, now + Duration::from_millis(200));
        assert_eq!(vec![false], *seen.borrow());

        // and deregisters it
        queue.message_received(&msg, now + Duration::from_millis(300));
        assert_eq!(vec![false], *seen.borrow());
    }

    #[test]
    fn test_daemon_callback_survives_expiry() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let mut queue = TransmitQueue::new();
        let now = Instant::now();

        let hits: Rc<RefCell<u32>> = Rc::new(RefCell::new(0));

        let hits_cb = hits.clone();
        let header = Command::get_zone_temp(ctl(), 0).reply_header();
        queue.register_callback(
            header,
            Callback::new(move |msg| {
                if msg.is_some() {
                    *hits_cb.borrow_mut() += 1;
                }
            })
            .with_timeout(Duration::from_millis(1))
            .as_daemon(),
            now,
        );

        let pkt = Packet::from_line(
            test_timestamp(),
            "053 RP --- 01:145038 18:013393 --:------ 30C9 003 000838",
        )
        .unwrap();
        let msg = Message::new(pkt, 12).unwrap();

        queue.message_received(&msg, now + Duration::from_secs(10));
        queue.message_received(&msg, now + Duration::from_secs(20));
        assert_eq!(2, *hits.borrow());
    }
}
