use std::io::Write;
use std::thread;
use std::time::Duration;

use gpio_cdev::{Chip, LineHandle, LineRequestFlags};
use spidev::{SpiModeFlags, Spidev, SpidevOptions};

use super::error::{DriverError, Result};

const SPI_CHUNK_SIZE: usize = 4096;
const BUSY_POLL: Duration = Duration::from_millis(10);

/// How a controller's BUSY line is read at the start of a wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusyPolicy {
    /// BUSY low means working; return as soon as it reads high.
    PollUntilHigh,
    /// The Inky does not always drive BUSY. A line already high when the wait
    /// starts is not trusted and the whole timeout is slept instead.
    SettleIfHighAtEntry,
}

#[derive(Clone, Copy, Debug)]
pub struct Pins {
    pub cs: u32,
    pub dc: u32,
    pub reset: u32,
    pub busy: u32,
}

impl Pins {
    /// Pimoroni Inky HAT wiring.
    pub const INKY: Pins = Pins {
        cs: 8,
        dc: 22,
        reset: 27,
        busy: 17,
    };

    /// Waveshare e-Paper HAT wiring.
    pub const WAVESHARE: Pins = Pins {
        cs: 8,
        dc: 25,
        reset: 17,
        busy: 24,
    };
}

/// Command/data SPI link plus the reset and busy lines shared by both controller families.
pub struct PanelBus {
    spi: Spidev,
    cs: LineHandle,
    dc: LineHandle,
    reset: LineHandle,
    busy: LineHandle,
    busy_policy: BusyPolicy,
}

impl PanelBus {
    pub fn open(
        spi_path: &str,
        gpio_chip: &str,
        pins: Pins,
        speed_hz: u32,
        busy_policy: BusyPolicy,
    ) -> Result<Self> {
        let mut chip = Chip::new(gpio_chip)?;

        let cs = chip
            .get_line(pins.cs)?
            .request(LineRequestFlags::OUTPUT, 1, "paperpost-cs")?;
        let dc = chip
            .get_line(pins.dc)?
            .request(LineRequestFlags::OUTPUT, 0, "paperpost-dc")?;
        let reset = chip
            .get_line(pins.reset)?
            .request(LineRequestFlags::OUTPUT, 1, "paperpost-reset")?;
        let busy = chip
            .get_line(pins.busy)?
            .request(LineRequestFlags::INPUT, 0, "paperpost-busy")?;

        drop(chip);

        let mut spi = Spidev::open(spi_path)?;
        let options = SpidevOptions::new()
            .bits_per_word(8)
            .max_speed_hz(speed_hz)
            .mode(SpiModeFlags::SPI_MODE_0 | SpiModeFlags::SPI_NO_CS)
            .build();
        spi.configure(&options)?;

        Ok(Self {
            spi,
            cs,
            dc,
            reset,
            busy,
            busy_policy,
        })
    }

    pub fn hardware_reset(&mut self, pulse: Duration) -> Result<()> {
        self.reset.set_value(1)?;
        thread::sleep(pulse);
        self.reset.set_value(0)?;
        thread::sleep(pulse);
        self.reset.set_value(1)?;
        thread::sleep(pulse);
        Ok(())
    }

    /// Both controllers pull BUSY low while working.
    pub fn wait_until_idle(&mut self, timeout: Duration) -> Result<()> {
        let busy = &self.busy;
        wait_for_busy(
            self.busy_policy,
            timeout,
            || Ok(busy.get_value()? != 0),
            thread::sleep,
        )
    }

    pub fn send_command(&mut self, command: u8) -> Result<()> {
        self.write_spi(false, &[command])
    }

    pub fn send_data(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        self.write_spi(true, data)
    }

    pub fn send_command_data(&mut self, command: u8, data: &[u8]) -> Result<()> {
        self.send_command(command)?;
        self.send_data(data)
    }

    fn write_spi(&mut self, is_data: bool, payload: &[u8]) -> Result<()> {
        self.dc.set_value(if is_data { 1 } else { 0 })?;
        self.cs.set_value(0)?;

        let written = payload
            .chunks(SPI_CHUNK_SIZE)
            .try_for_each(|chunk| self.spi.write_all(chunk));

        // Release chip select even when the transfer failed.
        self.cs.set_value(1)?;
        written?;
        Ok(())
    }
}

fn wait_for_busy(
    policy: BusyPolicy,
    timeout: Duration,
    mut idle: impl FnMut() -> Result<bool>,
    mut sleep: impl FnMut(Duration),
) -> Result<()> {
    if policy == BusyPolicy::SettleIfHighAtEntry && idle()? {
        sleep(timeout);
        return Ok(());
    }

    let mut waited = Duration::ZERO;
    while waited < timeout {
        if idle()? {
            return Ok(());
        }
        sleep(BUSY_POLL);
        waited += BUSY_POLL;
    }
    Err(DriverError::Timeout("busy", timeout))
}
