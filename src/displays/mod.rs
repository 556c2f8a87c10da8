#[cfg(target_os = "linux")]
pub mod bus;

#[cfg(target_os = "linux")]
pub mod epd4in2b;

#[cfg(target_os = "linux")]
pub mod uc8159;

pub mod error;
pub mod preview;

#[cfg(test)]
pub(crate) mod mock;

use crate::convert::Frame;
use crate::panel::PanelSpec;

pub use error::{DriverError, Result};
pub use preview::PreviewDriver;

#[cfg(target_os = "linux")]
pub use bus::Pins;
#[cfg(target_os = "linux")]
pub use epd4in2b::{Epd4in2bV2, Epd4in2bV2Config};
#[cfg(target_os = "linux")]
pub use uc8159::{InkyUc8159, InkyUc8159Config};

/// The vendor protocol boundary. Only the queue worker ever holds one of these.
pub trait EpdDriver: Send {
    fn panel(&self) -> PanelSpec;
    /// Wake the controller from deep sleep and load its register setup.
    fn init(&mut self) -> Result<()>;
    fn display(&mut self, frame: &Frame) -> Result<()>;
    fn clear(&mut self) -> Result<()>;
    /// Enter the low-power state; the next operation must `init` again.
    fn sleep(&mut self) -> Result<()>;
}

impl<D: EpdDriver + ?Sized> EpdDriver for Box<D> {
    fn panel(&self) -> PanelSpec {
        (**self).panel()
    }

    fn init(&mut self) -> Result<()> {
        (**self).init()
    }

    fn display(&mut self, frame: &Frame) -> Result<()> {
        (**self).display(frame)
    }

    fn clear(&mut self) -> Result<()> {
        (**self).clear()
    }

    fn sleep(&mut self) -> Result<()> {
        (**self).sleep()
    }
}

pub fn pack_buffer_nibbles(buffer: &[u8]) -> Vec<u8> {
    let mut packed = Vec::with_capacity(buffer.len().div_ceil(2));
    let mut iter = buffer.iter();
    while let Some(&high) = iter.next() {
        let low = iter.next().copied().unwrap_or(0);
        let byte = ((high & 0x0F) << 4) | (low & 0x0F);
        packed.push(byte);
    }
    packed
}
