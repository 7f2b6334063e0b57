mod console;
pub use console::*;

pub mod display;
pub use display::Display;

pub mod font;

mod palette;
pub use palette::*;

use std::any::Any;

use crate::{common::{Cell, Memory, TRIGGER}, core::MainMemory, error::Fault};

pub const PORT_COUNT: usize = 256;

/// Device class served by the display, i.e. ports `0x10..=0x1F` excluding the console ports.
pub const DISPLAY_CLASS: u8 = 0x1;

/// A handler for one class of device ports, selected by the high nibble of the port address.
pub trait Device: Any {
    /// Called when a bus scan finds `port` holding the trigger value. The bus never clears the
    /// port itself; a device wanting one-shot behaviour must write something else to it.
    fn trigger(&mut self, port: u8, ports: &mut PortTable, memory: &mut MainMemory) -> Result<(), Fault>;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// The 256 device port cells written by `DVW`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortTable {
    cells: [Cell; PORT_COUNT],
}

impl PortTable {
    pub fn new() -> Self {
        Self { cells: [0; PORT_COUNT] }
    }

    pub fn cells(&self) -> &[Cell; PORT_COUNT] {
        &self.cells
    }

    pub fn is_triggered(&self, port: u8) -> bool {
        self.cells[port as usize] == TRIGGER
    }
}

impl Default for PortTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory for PortTable {
    type AddressSpace = u8;

    fn read_cell(&self, addr: Self::AddressSpace) -> Result<Cell, Fault> {
        Ok(self.cells[addr as usize])
    }

    fn write_cell(&mut self, addr: Self::AddressSpace, value: Cell) -> Result<(), Fault> {
        self.cells[addr as usize] = value;
        Ok(())
    }

    fn out_of_range(&self, addr: i64) -> Fault {
        Fault::InvalidPort { port: addr }
    }
}

/// Routes port writes and triggers to the machine's devices.
pub struct DeviceBus {
    pub ports: PortTable,
    pub console: Console,
    classes: [Option<Box<dyn Device>>; 16],
}

impl DeviceBus {
    /// A bus with the standard display and console attached.
    pub fn new() -> Self {
        let mut bus = Self::empty();
        bus.register(DISPLAY_CLASS, Box::new(Display::default()));
        bus
    }

    /// A bus with only the console; every triggered port is ignored.
    pub fn empty() -> Self {
        Self {
            ports: PortTable::new(),
            console: Console::new(),
            classes: std::array::from_fn(|_| None),
        }
    }

    /// Attaches a device to the ports whose high nibble is `class`, returning whatever was there.
    pub fn register(&mut self, class: u8, device: Box<dyn Device>) -> Option<Box<dyn Device>> {
        self.classes[(class & 0x0F) as usize].replace(device)
    }

    pub fn device<T: Device>(&self) -> Option<&T> {
        self.classes.iter()
            .flatten()
            .find_map(|device| device.as_any().downcast_ref::<T>())
    }

    pub fn device_mut<T: Device>(&mut self) -> Option<&mut T> {
        self.classes.iter_mut()
            .flatten()
            .find_map(|device| device.as_any_mut().downcast_mut::<T>())
    }

    /// `DVW`: stores a value in a port, to be acted on by the next scan.
    pub fn write_port(&mut self, port: Cell, value: Cell) -> Result<(), Fault> {
        self.ports.write_at(port, value)
    }

    /// `DVO`: prints the value held in a console port.
    pub fn console_out(&mut self, port: Cell) -> Result<(), Fault> {
        let port = self.ports.resolve(port)?;
        let value = self.ports.read_cell(port)?;
        self.console.write(port, value);
        Ok(())
    }

    /// Dispatches every triggered port to its device. Returns how many ports were dispatched.
    pub fn scan(&mut self, memory: &mut MainMemory) -> Result<usize, Fault> {
        let mut dispatched = 0;

        for port in 0..=u8::MAX {
            if !self.ports.is_triggered(port) || is_console_port(port) {
                continue;
            }

            if let Some(device) = self.classes[(port >> 4) as usize].as_mut() {
                log::trace!("dispatching trigger on port {port:#04x}");
                device.trigger(port, &mut self.ports, memory)?;
                dispatched += 1;
            }
        }

        Ok(dispatched)
    }
}

impl Default for DeviceBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use std::{any::Any, cell::RefCell, io::{self, Write}, rc::Rc};

    use crate::{common::Memory, core::MainMemory, error::Fault};

    use super::{Console, Device, DeviceBus, Display, PortTable};

    /// Records each port it is triggered on, and disarms it.
    struct OneShot {
        seen: Vec<u8>,
    }

    impl Device for OneShot {
        fn trigger(&mut self, port: u8, ports: &mut PortTable, _memory: &mut MainMemory) -> Result<(), Fault> {
            self.seen.push(port);
            ports.write_cell(port, 0)
        }

        fn as_any(&self) -> &dyn Any { self }
        fn as_any_mut(&mut self) -> &mut dyn Any { self }
    }

    #[derive(Clone, Default)]
    struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_scan_dispatches_by_high_nibble() {
        let mut bus = DeviceBus::empty();
        let mut memory = MainMemory::new(16, 8);
        bus.register(0x2, Box::new(OneShot { seen: vec![] }));

        bus.write_port(0x23, 1).unwrap();
        bus.write_port(0x2F, 1).unwrap();
        bus.write_port(0x24, 2).unwrap(); // Not the trigger value
        bus.write_port(0x33, 1).unwrap(); // No device

        assert_eq!(bus.scan(&mut memory), Ok(2));
        assert_eq!(bus.device::<OneShot>().unwrap().seen, [0x23, 0x2F]);

        // Disarmed by the device, so the next scan does nothing
        assert_eq!(bus.scan(&mut memory), Ok(0));
        assert_eq!(bus.ports.read_cell(0x33), Ok(1));
    }

    #[test]
    fn test_display_stays_armed() {
        let mut bus = DeviceBus::new();
        let mut memory = MainMemory::new(20, 10);
        memory.write_cell(10, 1).unwrap();
        memory.write_cell(13, 1).unwrap();

        bus.write_port(0x10, 1).unwrap();
        assert_eq!(bus.scan(&mut memory), Ok(1));
        assert_eq!(bus.scan(&mut memory), Ok(1));
        assert_eq!(&memory.display_cells()[..4], [1, 2, 2, 1]);
        assert!(bus.device::<Display>().is_some());
    }

    #[test]
    fn test_console_ports_are_not_dispatched() {
        let mut bus = DeviceBus::empty();
        let mut memory = MainMemory::new(16, 8);
        bus.register(0x1, Box::new(OneShot { seen: vec![] }));

        bus.write_port(24, 1).unwrap();
        bus.write_port(25, 1).unwrap();
        assert_eq!(bus.scan(&mut memory), Ok(0));
    }

    #[test]
    fn test_console_out() {
        let out = SharedBuffer::default();
        let err = SharedBuffer::default();

        let mut bus = DeviceBus::empty();
        bus.console = Console::with_writers(Box::new(out.clone()), Box::new(err.clone()));

        bus.write_port(25, 42).unwrap();
        bus.write_port(24, -7).unwrap();
        bus.console_out(25).unwrap();
        bus.console_out(24).unwrap();
        bus.console_out(3).unwrap();

        assert_eq!(String::from_utf8(out.0.borrow().clone()).unwrap(), "42\n");
        assert_eq!(String::from_utf8(err.0.borrow().clone()).unwrap(), "-7\n");
    }

    #[test]
    fn test_invalid_port() {
        let mut bus = DeviceBus::empty();
        assert_eq!(bus.write_port(256, 1), Err(Fault::InvalidPort { port: 256 }));
        assert_eq!(bus.console_out(-1), Err(Fault::InvalidPort { port: -1 }));
    }
}
