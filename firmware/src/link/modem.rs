//! Line protocol for the UART radio modem.
//!
//! Everything on the wire is a single text line. The node sends
//! `CONNECT <client>`, `SUB <topic>`, and `PUB <topic> <payload>`; the
//! modem reports `+CONNECTED`, `+CLOSED`, and `+MSG <topic> <payload>`.
//! [`LineSplitter`] reassembles lines from the raw UART byte stream and
//! [`parse_event`] turns one line into a [`ModemEvent`].

use core::fmt::Write;

use heapless::String;
use winnow::ModalResult;
use winnow::Parser;
use winnow::combinator::alt;
use winnow::token::{rest, take_till};

use ranging_core::link::LinkPort;
use ranging_core::wire::ClientId;

use super::TxFrameSender;

/// Longest line exchanged with the modem, command or event.
pub const MODEM_LINE_MAX: usize = 96;

/// Outbound command frame, terminator included.
pub type ModemFrame = String<MODEM_LINE_MAX>;

/// Inbound events reported by the modem.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModemEvent<'a> {
    /// Broker acknowledged the open handshake.
    Connected,
    /// Session closed, locally or by the broker.
    Closed,
    /// Message delivered on a subscribed topic.
    Message { topic: &'a str, payload: &'a str },
}

fn message<'a>(input: &mut &'a str) -> ModalResult<ModemEvent<'a>> {
    let _ = "+MSG ".parse_next(input)?;
    let topic = take_till(1.., ' ').parse_next(input)?;
    let _ = ' '.parse_next(input)?;
    let payload = rest.parse_next(input)?;
    Ok(ModemEvent::Message { topic, payload })
}

fn event<'a>(input: &mut &'a str) -> ModalResult<ModemEvent<'a>> {
    alt((
        "+CONNECTED".value(ModemEvent::Connected),
        "+CLOSED".value(ModemEvent::Closed),
        message,
    ))
    .parse_next(input)
}

/// Parses one modem line. `None` covers command echo, unsolicited reports
/// this node does not track, and line noise.
#[must_use]
pub fn parse_event(line: &str) -> Option<ModemEvent<'_>> {
    event.parse(line).ok()
}

/// Formats the open handshake for `client`.
pub fn connect_frame(client: &ClientId) -> ModemFrame {
    let mut frame = ModemFrame::new();
    write!(frame, "CONNECT {client}\r\n").expect("command fits its buffer");
    frame
}

/// Formats a subscription request.
pub fn subscribe_frame(topic: &str) -> ModemFrame {
    let mut frame = ModemFrame::new();
    write!(frame, "SUB {topic}\r\n").expect("command fits its buffer");
    frame
}

/// Formats one outbound message.
pub fn publish_frame(topic: &str, payload: &str) -> ModemFrame {
    let mut frame = ModemFrame::new();
    write!(frame, "PUB {topic} {payload}\r\n").expect("command fits its buffer");
    frame
}

/// Error when the TX frame queue cannot take another command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TxQueueFull;

/// Command-writer half of the modem seam.
///
/// Commands become frames on the TX queue; the pump half of the link task
/// owns the UART. Acknowledgements come back through [`parse_event`] on
/// the RX side.
pub struct ModemPort<'a> {
    frames: TxFrameSender<'a>,
}

impl<'a> ModemPort<'a> {
    pub fn new(frames: TxFrameSender<'a>) -> Self {
        Self { frames }
    }

    fn push(&mut self, frame: ModemFrame) -> Result<(), TxQueueFull> {
        self.frames.try_send(frame).map_err(|_| TxQueueFull)
    }
}

impl LinkPort for ModemPort<'_> {
    type Error = TxQueueFull;

    fn open(&mut self, client: &ClientId) -> Result<(), TxQueueFull> {
        self.push(connect_frame(client))
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), TxQueueFull> {
        self.push(subscribe_frame(topic))
    }

    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), TxQueueFull> {
        self.push(publish_frame(topic, payload))
    }
}

/// Reassembles modem lines from the raw UART byte stream.
///
/// Overlong lines are discarded through to their terminator rather than
/// truncated. Blank lines and control bytes produce nothing.
#[derive(Debug, Default)]
pub struct LineSplitter {
    buffer: String<MODEM_LINE_MAX>,
    overflowed: bool,
}

impl LineSplitter {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: String::new(),
            overflowed: false,
        }
    }

    /// Feeds one byte; returns a completed line without its terminator.
    pub fn push_byte(&mut self, byte: u8) -> Option<String<MODEM_LINE_MAX>> {
        match byte {
            b'\n' => {
                if self.overflowed {
                    self.overflowed = false;
                    self.buffer.clear();
                    return None;
                }
                let line = core::mem::take(&mut self.buffer);
                (!line.is_empty()).then_some(line)
            }
            0x20..=0x7e => {
                if !self.overflowed && self.buffer.push(byte as char).is_err() {
                    self.overflowed = true;
                    self.buffer.clear();
                }
                None
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{TX_FRAME_QUEUE_DEPTH, TxFrameQueue};
    use ranging_core::node::NodeId;
    use ranging_core::wire;

    #[test]
    fn events_parse_from_their_lines() {
        assert_eq!(parse_event("+CONNECTED"), Some(ModemEvent::Connected));
        assert_eq!(parse_event("+CLOSED"), Some(ModemEvent::Closed));
        assert_eq!(
            parse_event("+MSG ultrasound_emit emit"),
            Some(ModemEvent::Message {
                topic: "ultrasound_emit",
                payload: "emit"
            })
        );
    }

    #[test]
    fn message_payloads_run_to_the_end_of_the_line() {
        assert_eq!(
            parse_event("+MSG /base_stations/7 fire now"),
            Some(ModemEvent::Message {
                topic: "/base_stations/7",
                payload: "fire now"
            })
        );
        assert_eq!(
            parse_event("+MSG distances/4 "),
            Some(ModemEvent::Message {
                topic: "distances/4",
                payload: ""
            })
        );
    }

    #[test]
    fn noise_lines_parse_to_nothing() {
        assert_eq!(parse_event(""), None);
        assert_eq!(parse_event("OK"), None);
        assert_eq!(parse_event("+CONNECTEDX"), None);
        assert_eq!(parse_event("+MSG topiconly"), None);
        assert_eq!(parse_event("+RSSI -40"), None);
    }

    #[test]
    fn frames_carry_the_terminator() {
        let client = wire::client_id(NodeId::new(3));
        assert_eq!(connect_frame(&client).as_str(), "CONNECT BaseStation-3\r\n");
        assert_eq!(
            subscribe_frame("ultrasound_emit").as_str(),
            "SUB ultrasound_emit\r\n"
        );
        assert_eq!(
            publish_frame("distances/3", "7500.00").as_str(),
            "PUB distances/3 7500.00\r\n"
        );
    }

    #[test]
    fn port_commands_become_queued_frames() {
        let queue = TxFrameQueue::new();
        let mut port = ModemPort::new(queue.sender());

        let client = wire::client_id(NodeId::new(9));
        port.open(&client).expect("queue has room");
        port.subscribe("/base_stations/9").expect("queue has room");
        port.publish("presence/9", "1").expect("queue has room");

        assert_eq!(
            queue.try_receive().unwrap().as_str(),
            "CONNECT BaseStation-9\r\n"
        );
        assert_eq!(
            queue.try_receive().unwrap().as_str(),
            "SUB /base_stations/9\r\n"
        );
        assert_eq!(
            queue.try_receive().unwrap().as_str(),
            "PUB presence/9 1\r\n"
        );
    }

    #[test]
    fn a_full_queue_refuses_further_commands() {
        let queue = TxFrameQueue::new();
        let mut port = ModemPort::new(queue.sender());

        for _ in 0..TX_FRAME_QUEUE_DEPTH {
            port.publish("distances/1", "1.00").expect("queue has room");
        }
        assert_eq!(port.publish("distances/1", "1.00"), Err(TxQueueFull));
    }

    #[test]
    fn splitter_reassembles_crlf_lines() {
        let mut splitter = LineSplitter::new();
        let mut lines: heapless::Vec<String<MODEM_LINE_MAX>, 4> = heapless::Vec::new();

        for byte in b"+CONNECTED\r\n+MSG a b\r\n" {
            if let Some(line) = splitter.push_byte(*byte) {
                lines.push(line).unwrap();
            }
        }

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].as_str(), "+CONNECTED");
        assert_eq!(lines[1].as_str(), "+MSG a b");
    }

    #[test]
    fn splitter_discards_overlong_lines_whole() {
        let mut splitter = LineSplitter::new();

        for _ in 0..(MODEM_LINE_MAX + 20) {
            assert_eq!(splitter.push_byte(b'x'), None);
        }
        assert_eq!(splitter.push_byte(b'\n'), None);

        // The splitter is usable again afterwards.
        for byte in b"+CLOSED" {
            assert_eq!(splitter.push_byte(*byte), None);
        }
        assert_eq!(splitter.push_byte(b'\n').as_deref(), Some("+CLOSED"));
    }

    #[test]
    fn blank_lines_produce_nothing() {
        let mut splitter = LineSplitter::new();
        assert_eq!(splitter.push_byte(b'\r'), None);
        assert_eq!(splitter.push_byte(b'\n'), None);
    }
}
