use core::fmt::Write as _;

use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_stm32::usart::{BufferedUart, Config as UartConfig, DataBits, Parity, StopBits};
use embassy_time::{Duration, Instant, Timer};
use embedded_io_async::{Read, Write};
use heapless::String;

use ranging_core::node::NodeId;
use ranging_core::shell::commands::{LINE_TOO_LONG_TEXT, PROMPT};
use ranging_core::shell::{self, LineEditor, LineEvent, LineOutcome, ShellSession};

use crate::hw::idstore::FlashIdStore;
use crate::status::{self, FirmwareStatusProvider};
use crate::telemetry::{NodeEventLog, NodeInstant};

const CONSOLE_UART_BUFFER_SIZE: usize = 256;
const CONSOLE_UART_BAUD: u32 = 115_200;

/// Reply staging area; sized for the longest `status` rendering plus the
/// trailing prompt.
const REPLY_CAPACITY: usize = 512;

static mut UART_TX_BUFFER: [u8; CONSOLE_UART_BUFFER_SIZE] = [0; CONSOLE_UART_BUFFER_SIZE];
static mut UART_RX_BUFFER: [u8; CONSOLE_UART_BUFFER_SIZE] = [0; CONSOLE_UART_BUFFER_SIZE];

embassy_stm32::bind_interrupts!(struct UartIrqs {
    USART2_LPUART2 => embassy_stm32::usart::BufferedInterruptHandler<hal::peripherals::USART2>;
});

#[embassy_executor::task]
pub async fn run(
    usart: Peri<'static, hal::peripherals::USART2>,
    tx_pin: Peri<'static, hal::peripherals::PA2>,
    rx_pin: Peri<'static, hal::peripherals::PA3>,
    id: NodeId,
    store: FlashIdStore<'static>,
) -> ! {
    let mut config = UartConfig::default();
    config.baudrate = CONSOLE_UART_BAUD;
    config.data_bits = DataBits::DataBits8;
    config.stop_bits = StopBits::STOP1;
    config.parity = Parity::ParityNone;

    let uart = unsafe {
        BufferedUart::new(
            usart,
            rx_pin,
            tx_pin,
            &mut UART_TX_BUFFER,
            &mut UART_RX_BUFFER,
            UartIrqs,
            config,
        )
        .expect("failed to initialize console UART")
    };

    let (mut uart_tx, mut uart_rx) = uart.split();

    let mut session = ShellSession::new(id, store);
    let mut editor = LineEditor::default();
    let mut provider = FirmwareStatusProvider;
    let mut events = NodeEventLog::new();
    let mut reply: String<REPLY_CAPACITY> = String::new();
    let mut ingress = [0u8; 32];

    let _ = shell::write_banner(&mut reply, env!("CARGO_PKG_VERSION"));
    let _ = reply.push_str(PROMPT);
    write_all(&mut uart_tx, reply.as_bytes()).await;

    loop {
        match uart_rx.read(&mut ingress).await {
            Ok(count) if count > 0 => {
                for &byte in &ingress[..count] {
                    let Some(event) = editor.push_byte(byte) else {
                        continue;
                    };

                    reply.clear();
                    match event {
                        LineEvent::Ready => {
                            let line = editor.take_line();
                            match session.handle_line(
                                line.as_str(),
                                &mut reply,
                                &mut provider,
                                Instant::now(),
                            ) {
                                Ok(LineOutcome::IdChanged(new_id)) => {
                                    status::record_identity(new_id);
                                    events
                                        .record_id_changed(new_id, NodeInstant::from(Instant::now()));
                                    defmt::info!("shell: node id set to {}", new_id.value());
                                }
                                Ok(LineOutcome::Quiet) => {}
                                Err(_) => {
                                    reply.clear();
                                    defmt::warn!("shell: reply overflowed, dropped");
                                }
                            }
                        }
                        LineEvent::TooLong => {
                            let _ = writeln!(reply, "{LINE_TOO_LONG_TEXT}");
                        }
                    }

                    let _ = reply.push_str(PROMPT);
                    write_all(&mut uart_tx, reply.as_bytes()).await;
                }
            }
            Ok(_) => {}
            Err(_) => {
                defmt::warn!("shell: console UART read error");
                Timer::after(Duration::from_millis(5)).await;
            }
        }
    }
}

async fn write_all<W: Write>(uart_tx: &mut W, data: &[u8]) {
    let mut written = 0usize;
    while written < data.len() {
        match uart_tx.write(&data[written..]).await {
            Ok(count) if count > 0 => {
                written += count;
            }
            Ok(_) => {}
            Err(_) => {
                defmt::warn!("shell: console UART write error");
                Timer::after(Duration::from_millis(5)).await;
                return;
            }
        }
    }

    if let Err(_) = uart_tx.flush().await {
        defmt::warn!("shell: console UART flush error");
        Timer::after(Duration::from_millis(5)).await;
    }
}
