use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::flash::Flash;
use embassy_sync::channel::Channel;

use ranging_core::node::startup_identity;

use crate::hw::idstore::FlashIdStore;
use crate::link::{PublishQueue, TxFrameQueue};
use crate::role;
use crate::status;

mod link_task;
mod shell_task;

#[cfg(feature = "role-ranging")]
mod measure_task;
#[cfg(all(
    feature = "role-receiver",
    not(any(feature = "role-ranging", feature = "role-emitter"))
))]
mod presence_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

pub(super) static PUBLISH_QUEUE: PublishQueue = Channel::new();
pub(super) static TX_FRAMES: TxFrameQueue = Channel::new();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let p = hal::init(config);

    let mut store = FlashIdStore::new(Flash::new_blocking(p.FLASH));
    let id = startup_identity(&mut store);
    let node = role::node_config(id);
    status::record_identity(id);

    defmt::info!(
        "sonar-node {} up, id {}, role {}",
        env!("CARGO_PKG_VERSION"),
        id.value(),
        node.role.as_str()
    );

    #[cfg(feature = "role-ranging")]
    spawner
        .spawn(measure_task::run(
            p.PA4,
            p.PA5,
            p.PA6,
            p.EXTI6,
            node,
            &PUBLISH_QUEUE,
        ))
        .expect("failed to spawn measurement task");

    #[cfg(all(
        feature = "role-receiver",
        not(any(feature = "role-ranging", feature = "role-emitter"))
    ))]
    spawner
        .spawn(presence_task::run(p.PA5, node, &PUBLISH_QUEUE))
        .expect("failed to spawn presence task");

    #[cfg(all(feature = "role-emitter", not(feature = "role-ranging")))]
    let emit_pin = Some(p.PA4);
    #[cfg(not(all(feature = "role-emitter", not(feature = "role-ranging"))))]
    let emit_pin = None;

    spawner
        .spawn(link_task::run(
            p.USART5,
            p.PB0,
            p.PB1,
            node,
            emit_pin,
            &PUBLISH_QUEUE,
            &TX_FRAMES,
        ))
        .expect("failed to spawn link task");

    spawner
        .spawn(shell_task::run(p.USART2, p.PA2, p.PA3, id, store))
        .expect("failed to spawn shell task");

    core::future::pending::<()>().await;
}
