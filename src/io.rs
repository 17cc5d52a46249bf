/// The I/O manager contract: port-mapped peripherals plus the hardware
/// interrupt queue. The host owns the port map and the interrupt
/// controller; the core only calls through this trait.
///
/// Calls are made synchronously from inside an instruction (IN/OUT) and
/// must not reenter the processor.
pub trait IoBus {
    /// read byte from I/O port
    fn in_u8(&mut self, port: u16) -> u8;

    /// read word from I/O port
    fn in_u16(&mut self, port: u16) -> u16;

    /// write byte to I/O port
    fn out_u8(&mut self, port: u16, data: u8);

    /// write word to I/O port
    fn out_u16(&mut self, port: u16, data: u16);

    /// true if a hardware interrupt is waiting to be serviced
    fn has_pending_interrupt(&self) -> bool;

    /// dequeue the next pending interrupt vector
    fn take_pending_interrupt(&mut self) -> u8;
}

/// An I/O manager with no devices attached. Port reads float high as on
/// an unterminated bus, writes are dropped, and no interrupts arrive.
#[derive(Clone, Default)]
pub struct NullIo;

impl IoBus for NullIo {
    fn in_u8(&mut self, port: u16) -> u8 {
        debug!("in_u8: unhandled port {:04X}", port);
        0xFF
    }

    fn in_u16(&mut self, port: u16) -> u16 {
        debug!("in_u16: unhandled port {:04X}", port);
        0xFFFF
    }

    fn out_u8(&mut self, port: u16, data: u8) {
        debug!("out_u8: unhandled port {:04X} = {:02X}", port, data);
    }

    fn out_u16(&mut self, port: u16, data: u16) {
        debug!("out_u16: unhandled port {:04X} = {:04X}", port, data);
    }

    fn has_pending_interrupt(&self) -> bool {
        false
    }

    fn take_pending_interrupt(&mut self) -> u8 {
        unreachable!("take_pending_interrupt with no pending interrupt");
    }
}
