use embassy_futures::join::join;
use embassy_futures::select::{Either3, select3};
use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_stm32::gpio::{Level, Output, Speed};
use embassy_stm32::usart::{BufferedUart, Config as UartConfig, DataBits, Parity, StopBits};
use embassy_time::{Duration, Instant, Ticker, Timer};
use embedded_io_async::{Read, Write};

use ranging_core::control::{EmitControl, EmitDecision, IgnoreReason};
use ranging_core::link::{LinkState, LinkSupervisor, PublishError};
use ranging_core::node::{NodeConfig, NodeRole};
use ranging_core::wire;

use crate::hw::sonar::TriggerPin;
use crate::link::modem::{self, LineSplitter, ModemEvent, ModemPort};
use crate::link::{Publication, PublishQueue, TxFrameQueue};
use crate::status;
use crate::telemetry::{NodeEventLog, NodeInstant};

const MODEM_UART_BUFFER_SIZE: usize = modem::MODEM_LINE_MAX * 4;
const MODEM_UART_BAUD: u32 = 115_200;

/// Lifecycle poll period. Coarse on purpose; backoff deadlines are
/// microsecond values but nothing in the handshake needs sub-tick latency.
const SERVICE_TICK_MILLIS: u64 = 100;

static mut UART_TX_BUFFER: [u8; MODEM_UART_BUFFER_SIZE] = [0; MODEM_UART_BUFFER_SIZE];
static mut UART_RX_BUFFER: [u8; MODEM_UART_BUFFER_SIZE] = [0; MODEM_UART_BUFFER_SIZE];

embassy_stm32::bind_interrupts!(struct UartIrqs {
    USART3_4_5_6_LPUART1 => embassy_stm32::usart::BufferedInterruptHandler<hal::peripherals::USART5>;
});

#[embassy_executor::task]
pub async fn run(
    usart: Peri<'static, hal::peripherals::USART5>,
    tx_pin: Peri<'static, hal::peripherals::PB0>,
    rx_pin: Peri<'static, hal::peripherals::PB1>,
    node: NodeConfig,
    emit_pin: Option<Peri<'static, hal::peripherals::PA4>>,
    publications: &'static PublishQueue,
    frames: &'static TxFrameQueue,
) -> ! {
    let mut config = UartConfig::default();
    config.baudrate = MODEM_UART_BAUD;
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
        .expect("failed to initialize modem UART")
    };

    let (mut uart_tx, mut uart_rx) = uart.split();

    let frame_pump = async move {
        let frame_source = frames.receiver();
        loop {
            let frame = frame_source.receive().await;
            let data = frame.as_bytes();
            let mut written = 0usize;

            while written < data.len() {
                match uart_tx.write(&data[written..]).await {
                    Ok(count) if count > 0 => {
                        written += count;
                    }
                    Ok(_) => {}
                    Err(_) => {
                        defmt::warn!("link: modem UART write error");
                        Timer::after(Duration::from_millis(5)).await;
                        break;
                    }
                }
            }

            if written == data.len() {
                if let Err(_) = uart_tx.flush().await {
                    defmt::warn!("link: modem UART flush error");
                    Timer::after(Duration::from_millis(5)).await;
                }
            }
        }
    };

    let supervise = async move {
        let mut emitter = match (node.role, emit_pin) {
            (NodeRole::Emitter, Some(pin)) => Some((
                EmitControl::new(node.id, node.emit),
                TriggerPin::new(Output::new(pin, Level::Low, Speed::Low)),
            )),
            _ => None,
        };

        let mut supervisor = LinkSupervisor::new(wire::client_id(node.id), node.link);
        if let Some((control, _)) = &emitter {
            supervisor
                .add_subscription(control.control_topic())
                .expect("role subscriptions fit the link's list");
        }

        let mut port = ModemPort::new(frames.sender());
        let mut splitter = LineSplitter::new();
        let mut events = NodeEventLog::new();
        let publication_source = publications.receiver();
        let mut ticker = Ticker::every(Duration::from_millis(SERVICE_TICK_MILLIS));
        let mut ingress = [0u8; 32];

        loop {
            match select3(
                uart_rx.read(&mut ingress),
                publication_source.receive(),
                ticker.next(),
            )
            .await
            {
                Either3::First(Ok(count)) if count > 0 => {
                    for &byte in &ingress[..count] {
                        if let Some(line) = splitter.push_byte(byte) {
                            handle_line(
                                line.as_str(),
                                &mut supervisor,
                                &mut port,
                                &mut emitter,
                                &mut events,
                            );
                        }
                    }
                }
                Either3::First(Ok(_)) => {}
                Either3::First(Err(_)) => {
                    defmt::warn!("link: modem UART read error");
                    Timer::after(Duration::from_millis(5)).await;
                }
                Either3::Second(publication) => {
                    forward(&publication, &mut supervisor, &mut port, &mut events);
                }
                Either3::Third(()) => {
                    let before = supervisor.state();
                    supervisor.service(Instant::now().as_micros(), &mut port);
                    note_link_move(&supervisor, before, &mut events);
                }
            }
        }
    };

    join(frame_pump, supervise).await;
    loop {
        core::future::pending::<()>().await;
    }
}

/// Routes one modem line: lifecycle edges feed the supervisor, control
/// messages feed the emit handler, anything else is noise.
fn handle_line(
    line: &str,
    supervisor: &mut LinkSupervisor,
    port: &mut ModemPort<'static>,
    emitter: &mut Option<(EmitControl, TriggerPin<'static>)>,
    events: &mut NodeEventLog,
) {
    let now = Instant::now();
    let Some(event) = modem::parse_event(line) else {
        defmt::debug!("link: unrecognized modem line");
        return;
    };

    match event {
        ModemEvent::Connected => {
            let before = supervisor.state();
            supervisor.on_opened(now.as_micros(), port);
            note_link_move(supervisor, before, events);
        }
        ModemEvent::Closed => {
            let before = supervisor.state();
            supervisor.on_closed(now.as_micros());
            note_link_move(supervisor, before, events);
        }
        ModemEvent::Message { topic, payload } => {
            let Some((control, pulse)) = emitter else {
                return;
            };
            if topic != control.control_topic().as_str() {
                return;
            }
            let decision = control.on_message(payload.as_bytes(), pulse);
            events.record_emit(decision, NodeInstant::from(now));
            match decision {
                EmitDecision::Fired => defmt::info!("emit: pulse fired"),
                EmitDecision::Ignored(IgnoreReason::Malformed) => {
                    defmt::debug!("emit: malformed command ignored");
                }
                EmitDecision::Ignored(IgnoreReason::OtherTarget) => {
                    defmt::debug!("emit: command addressed elsewhere");
                }
            }
        }
    }
}

fn forward(
    publication: &Publication,
    supervisor: &mut LinkSupervisor,
    port: &mut ModemPort<'static>,
    events: &mut NodeEventLog,
) {
    let before = supervisor.state();
    match supervisor.publish(
        Instant::now().as_micros(),
        port,
        publication.topic.as_str(),
        publication.payload.as_str(),
    ) {
        Ok(()) => {}
        Err(PublishError::NotConnected) => {
            defmt::debug!("link: down, publication dropped");
        }
        Err(PublishError::LinkLost) => {
            defmt::warn!("link: transport write failed, restarting link");
        }
    }
    note_link_move(supervisor, before, events);
}

/// Mirrors supervisor state into the shared status atomics and logs the
/// transition when one happened.
fn note_link_move(supervisor: &LinkSupervisor, before: LinkState, events: &mut NodeEventLog) {
    let after = supervisor.state();
    status::record_link(after, supervisor.stats());
    if after == before {
        return;
    }

    events.record_link_state(after, NodeInstant::from(Instant::now()));
    match after {
        LinkState::Disconnected => defmt::warn!("link: lost, retry scheduled"),
        LinkState::Connecting => defmt::info!("link: connect attempt"),
        LinkState::Connected => defmt::info!("link: up"),
    }
}
