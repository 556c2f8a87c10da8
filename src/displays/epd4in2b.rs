use std::thread;
use std::time::Duration;

use tracing::debug;

use super::EpdDriver;
use super::bus::{BusyPolicy, PanelBus, Pins};
use super::error::{DriverError, Result};
use crate::convert::{Frame, Plane};
use crate::panel::{ColorMode, PanelSpec};

const PANEL_SETTING: u8 = 0x00;
const POWER_OFF: u8 = 0x02;
const POWER_ON: u8 = 0x04;
const DEEP_SLEEP: u8 = 0x07;
const DATA_START_BLACK: u8 = 0x10;
const DISPLAY_REFRESH: u8 = 0x12;
const DATA_START_RED: u8 = 0x13;
const VCOM_DATA_INTERVAL: u8 = 0x50;
const GET_STATUS: u8 = 0x71;

const DEEP_SLEEP_CHECK: u8 = 0xA5;

pub const WIDTH: u16 = 400;
pub const HEIGHT: u16 = 300;

pub struct Epd4in2bV2Config {
    pub spi_path: String,
    pub gpio_chip: String,
    pub pins: Pins,
}

impl Default for Epd4in2bV2Config {
    fn default() -> Self {
        Self {
            spi_path: "/dev/spidev0.0".to_string(),
            gpio_chip: "/dev/gpiochip0".to_string(),
            pins: Pins::WAVESHARE,
        }
    }
}

/// Waveshare 4.2" black/red/white panel.
pub struct Epd4in2bV2 {
    bus: PanelBus,
}

impl Epd4in2bV2 {
    pub fn new(config: Epd4in2bV2Config) -> Result<Self> {
        let bus = PanelBus::open(
            &config.spi_path,
            &config.gpio_chip,
            config.pins,
            4_000_000,
            BusyPolicy::PollUntilHigh,
        )?;
        Ok(Self { bus })
    }

    fn wait_ready(&mut self, timeout: Duration) -> Result<()> {
        self.bus.send_command(GET_STATUS)?;
        self.bus.wait_until_idle(timeout)
    }

    fn send_planes(&mut self, black: &[u8], red: &[u8]) -> Result<()> {
        let expected = (WIDTH as usize).div_ceil(8) * HEIGHT as usize;
        for plane in [black, red] {
            if plane.len() != expected {
                return Err(DriverError::InvalidBufferSize {
                    expected,
                    received: plane.len(),
                });
            }
        }

        self.bus.send_command_data(DATA_START_BLACK, black)?;
        self.bus.send_command_data(DATA_START_RED, red)?;
        self.bus.send_command(DISPLAY_REFRESH)?;
        thread::sleep(Duration::from_millis(20));
        self.wait_ready(Duration::from_secs(30))
    }
}

impl EpdDriver for Epd4in2bV2 {
    fn panel(&self) -> PanelSpec {
        PanelSpec::two_color(WIDTH, HEIGHT)
    }

    fn init(&mut self) -> Result<()> {
        debug!("epd4in2b init");
        self.bus.hardware_reset(Duration::from_millis(200))?;
        self.bus.send_command(POWER_ON)?;
        self.wait_ready(Duration::from_secs(5))?;
        self.bus.send_command_data(PANEL_SETTING, &[0x0F])
    }

    fn display(&mut self, frame: &Frame) -> Result<()> {
        match frame {
            Frame::TwoColor { primary, secondary } => {
                self.send_planes(primary.as_bytes(), secondary.as_bytes())
            }
            other => Err(DriverError::UnsupportedFrame {
                expected: ColorMode::TwoColor,
                received: other.color_mode(),
            }),
        }
    }

    fn clear(&mut self) -> Result<()> {
        let blank = Plane::white(WIDTH, HEIGHT);
        self.send_planes(blank.as_bytes(), blank.as_bytes())
    }

    fn sleep(&mut self) -> Result<()> {
        debug!("epd4in2b sleep");
        self.bus.send_command_data(VCOM_DATA_INTERVAL, &[0xF7])?;
        self.bus.send_command(POWER_OFF)?;
        self.wait_ready(Duration::from_secs(5))?;
        self.bus.send_command_data(DEEP_SLEEP, &[DEEP_SLEEP_CHECK])
    }
}
