//! # Tick Source
//!
//! The periodic timer device: something that can be programmed to
//! interrupt at a fixed frequency, plus the dispatcher that routes that
//! interrupt to a handler. On a PC this is the 8254 PIT on IRQ0; on a
//! Cortex-M it is SysTick (see `arch::cortex_m4`).

/// An interrupt handler. Invoked by the dispatcher with interrupts
/// disabled.
pub type InterruptHandler = fn();

/// A periodic tick device and its interrupt line.
pub trait TickSource {
    /// Interrupt line (vector or exception number) the device raises.
    const LINE: u8;

    /// Program the device to interrupt `frequency_hz` times per second.
    fn configure_periodic(&self, frequency_hz: u32);

    /// Route interrupts on `line` to `handler`. `name` is for diagnostics.
    fn register_handler(&self, line: u8, handler: InterruptHandler, name: &'static str);
}
