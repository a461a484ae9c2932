#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Publication plumbing between producer tasks and the link task.
//!
//! Producers enqueue ready-to-send topic/payload pairs; the link task owns
//! the supervisor and the modem transport and drains the queue. The queue
//! stays shallow: with the link down, samples are dropped at the supervisor
//! rather than piling up here.

#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use ranging_core::wire::{Payload, Topic};

pub mod modem;

/// Depth of the outbound publication queue.
pub const PUBLISH_QUEUE_DEPTH: usize = 4;

/// Depth of the modem TX frame queue.
pub const TX_FRAME_QUEUE_DEPTH: usize = 4;

#[cfg(target_os = "none")]
type LinkMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
type LinkMutex = NoopRawMutex;

/// One ready-to-send message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Publication {
    pub topic: Topic,
    pub payload: Payload,
}

/// Queue carrying publications from producer tasks to the link task.
pub type PublishQueue = Channel<LinkMutex, Publication, PUBLISH_QUEUE_DEPTH>;

/// Producer handle for the publication queue.
pub type PublishSender<'a> = Sender<'a, LinkMutex, Publication, PUBLISH_QUEUE_DEPTH>;

/// Consumer handle for the publication queue.
pub type PublishReceiver<'a> = Receiver<'a, LinkMutex, Publication, PUBLISH_QUEUE_DEPTH>;

/// Queue carrying formatted command frames to the UART pump.
pub type TxFrameQueue = Channel<LinkMutex, modem::ModemFrame, TX_FRAME_QUEUE_DEPTH>;

/// Producer handle for the TX frame queue.
pub type TxFrameSender<'a> = Sender<'a, LinkMutex, modem::ModemFrame, TX_FRAME_QUEUE_DEPTH>;

/// Consumer handle for the TX frame queue.
pub type TxFrameReceiver<'a> = Receiver<'a, LinkMutex, modem::ModemFrame, TX_FRAME_QUEUE_DEPTH>;
