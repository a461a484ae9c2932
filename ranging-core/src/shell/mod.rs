//! Operator shell shared by firmware and host targets.
//!
//! The session is a pure line-in/text-out machine: the surrounding task
//! feeds it completed lines and hands it a `fmt::Write` sink for replies,
//! so the same code runs against a UART console and the emulator's stdin.
//! `change_id` is modal, consuming the next line as the new identifier.

use core::fmt;

use heapless::String;

use crate::node::{IdentityStore, NodeId};

pub mod commands;
pub mod status;

use commands::ShellCommand;
use status::{StatusFormatter, StatusProvider};

/// Longest console line the editor will buffer.
pub const MAX_LINE_LEN: usize = 64;

/// Firmware family name printed by the banner.
pub const BANNER_NAME: &str = "SmartRescuer node firmware";

/// Writes the startup banner.
pub fn write_banner<W: fmt::Write>(out: &mut W, version: &str) -> fmt::Result {
    writeln!(out, "{BANNER_NAME} v{version}")?;
    writeln!(out, "Type 'help' for the command list.")
}

/// What a fed byte did to the line buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineEvent {
    /// A full line is ready; take it with [`LineEditor::take_line`].
    Ready,
    /// The line outgrew the buffer and was discarded.
    TooLong,
}

/// Byte-at-a-time line assembly with backspace handling.
#[derive(Debug, Default)]
pub struct LineEditor {
    buffer: String<MAX_LINE_LEN>,
    overflowed: bool,
    last_was_cr: bool,
}

impl LineEditor {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: String::new(),
            overflowed: false,
            last_was_cr: false,
        }
    }

    /// Feeds one console byte. CR, LF and CRLF all end a line; 0x08/0x7f
    /// rub out the previous character; other control bytes are dropped.
    pub fn push_byte(&mut self, byte: u8) -> Option<LineEvent> {
        if byte == b'\n' && self.last_was_cr {
            self.last_was_cr = false;
            return None;
        }
        self.last_was_cr = byte == b'\r';

        match byte {
            b'\r' | b'\n' => {
                if self.overflowed {
                    self.overflowed = false;
                    self.buffer.clear();
                    Some(LineEvent::TooLong)
                } else {
                    Some(LineEvent::Ready)
                }
            }
            0x08 | 0x7f => {
                self.buffer.pop();
                None
            }
            0x20..=0x7e => {
                if !self.overflowed && self.buffer.push(byte as char).is_err() {
                    self.overflowed = true;
                }
                None
            }
            _ => None,
        }
    }

    /// Takes the completed line, leaving the editor empty.
    pub fn take_line(&mut self) -> String<MAX_LINE_LEN> {
        core::mem::take(&mut self.buffer)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty() && !self.overflowed
    }
}

/// Session modes; `change_id` switches to the modal id entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShellMode {
    Command,
    AwaitingId,
}

/// Session-visible outcome of one handled line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineOutcome {
    Quiet,
    /// Operator adopted a new identity; tasks should pick it up.
    IdChanged(NodeId),
}

/// Command-mode shell around the node identity.
#[derive(Debug)]
pub struct ShellSession<S> {
    mode: ShellMode,
    id: NodeId,
    store: S,
}

impl<S: IdentityStore> ShellSession<S> {
    #[must_use]
    pub const fn new(id: NodeId, store: S) -> Self {
        Self {
            mode: ShellMode::Command,
            id,
            store,
        }
    }

    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    #[must_use]
    pub const fn mode(&self) -> ShellMode {
        self.mode
    }

    /// Handles one completed console line and writes the reply.
    ///
    /// The persistent store is consulted only by `change_id`; a store that
    /// refuses the write keeps the new id for the session and says so.
    pub fn handle_line<W, P, Instant>(
        &mut self,
        line: &str,
        out: &mut W,
        provider: &mut P,
        now: Instant,
    ) -> Result<LineOutcome, fmt::Error>
    where
        W: fmt::Write,
        P: StatusProvider<Instant>,
    {
        match self.mode {
            ShellMode::AwaitingId => {
                self.mode = ShellMode::Command;
                match commands::parse_id_entry(line) {
                    Some(id) => {
                        self.id = id;
                        writeln!(out, "New ID: {id}")?;
                        match self.store.save(id) {
                            Ok(()) => writeln!(out, "Saved.")?,
                            Err(_) => writeln!(out, "Warning: ID not persisted.")?,
                        }
                        Ok(LineOutcome::IdChanged(id))
                    }
                    None => {
                        writeln!(out, "{}", commands::BAD_ID_TEXT)?;
                        Ok(LineOutcome::Quiet)
                    }
                }
            }
            ShellMode::Command => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    return Ok(LineOutcome::Quiet);
                }

                match commands::parse_command(trimmed) {
                    Some(ShellCommand::Help) => writeln!(out, "{}", commands::HELP_TEXT)?,
                    Some(ShellCommand::GetId) => writeln!(out, "Current ID: {}", self.id)?,
                    Some(ShellCommand::ChangeId) => {
                        self.mode = ShellMode::AwaitingId;
                        writeln!(out, "{}", commands::ID_PROMPT_TEXT)?;
                    }
                    Some(ShellCommand::Status) => self.write_status(out, provider, now)?,
                    None => writeln!(out, "{}", commands::UNKNOWN_TEXT)?,
                }
                Ok(LineOutcome::Quiet)
            }
        }
    }

    fn write_status<W, P, Instant>(
        &mut self,
        out: &mut W,
        provider: &mut P,
        now: Instant,
    ) -> fmt::Result
    where
        W: fmt::Write,
        P: StatusProvider<Instant>,
    {
        let Some(snapshot) = provider.snapshot(now) else {
            return writeln!(out, "status unavailable");
        };

        let formatter = StatusFormatter::new(&snapshot);
        formatter.write_node_line(out)?;
        out.write_char('\n')?;
        formatter.write_link_line(out)?;
        out.write_char('\n')?;
        formatter.write_cycle_line(out)?;
        out.write_char('\n')?;
        if snapshot.present.is_some() {
            formatter.write_presence_line(out)?;
            out.write_char('\n')?;
        }
        Ok(())
    }
}
