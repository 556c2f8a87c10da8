use std::time::Duration;

use tracing::debug;

use super::bus::{BusyPolicy, PanelBus, Pins};
use super::error::{DriverError, Result};
use super::{EpdDriver, pack_buffer_nibbles};
use crate::convert::{Frame, IndexedPlane};
use crate::panel::{ColorMode, PanelSpec};

const UC8159_PSR: u8 = 0x00;
const UC8159_PWR: u8 = 0x01;
const UC8159_POF: u8 = 0x02;
const UC8159_PFS: u8 = 0x03;
const UC8159_PON: u8 = 0x04;
const UC8159_DSLP: u8 = 0x07;
const UC8159_DTM1: u8 = 0x10;
const UC8159_DRF: u8 = 0x12;
const UC8159_PLL: u8 = 0x30;
const UC8159_TSE: u8 = 0x41;
const UC8159_CDI: u8 = 0x50;
const UC8159_TCON: u8 = 0x60;
const UC8159_TRES: u8 = 0x61;
const UC8159_DAM: u8 = 0x65;
const UC8159_PWS: u8 = 0xE3;

const DEEP_SLEEP_CHECK: u8 = 0xA5;
const WHITE_INDEX: u8 = 1;

pub struct InkyUc8159Config {
    pub width: u16,
    pub height: u16,
    pub spi_path: String,
    pub gpio_chip: String,
    pub pins: Pins,
    pub border_colour: u8,
}

impl Default for InkyUc8159Config {
    fn default() -> Self {
        Self {
            width: 600,
            height: 448,
            spi_path: "/dev/spidev0.0".to_string(),
            gpio_chip: "/dev/gpiochip0".to_string(),
            pins: Pins::INKY,
            border_colour: WHITE_INDEX,
        }
    }
}

/// Seven-colour ACeP controller (600x448 and 640x400 glass).
pub struct InkyUc8159 {
    bus: PanelBus,
    width: u16,
    height: u16,
    resolution_setting: u8,
    border_colour: u8,
}

impl InkyUc8159 {
    pub fn new(config: InkyUc8159Config) -> Result<Self> {
        let resolution_setting = match (config.width, config.height) {
            (600, 448) => 0b11,
            (640, 400) => 0b10,
            _ => {
                return Err(DriverError::UnsupportedResolution(
                    config.width,
                    config.height,
                ));
            }
        };

        let bus = PanelBus::open(
            &config.spi_path,
            &config.gpio_chip,
            config.pins,
            3_000_000,
            BusyPolicy::SettleIfHighAtEntry,
        )?;

        Ok(Self {
            bus,
            width: config.width,
            height: config.height,
            resolution_setting,
            border_colour: config.border_colour & 0x07,
        })
    }

    fn send_frame(&mut self, plane: &IndexedPlane) -> Result<()> {
        let expected = self.width as usize * self.height as usize;
        if plane.indices().len() != expected {
            return Err(DriverError::InvalidBufferSize {
                expected,
                received: plane.indices().len(),
            });
        }

        let packed = pack_buffer_nibbles(plane.indices());
        self.bus.send_command_data(UC8159_DTM1, &packed)?;

        self.bus.send_command(UC8159_PON)?;
        let _ = self.bus.wait_until_idle(Duration::from_millis(200));

        self.bus.send_command(UC8159_DRF)?;
        self.bus.wait_until_idle(Duration::from_secs(32))?;

        self.bus.send_command(UC8159_POF)?;
        let _ = self.bus.wait_until_idle(Duration::from_millis(200));

        Ok(())
    }
}

impl EpdDriver for InkyUc8159 {
    fn panel(&self) -> PanelSpec {
        PanelSpec::seven_color(self.width, self.height)
    }

    fn init(&mut self) -> Result<()> {
        debug!("uc8159 init");
        self.bus.hardware_reset(Duration::from_millis(100))?;
        let _ = self.bus.wait_until_idle(Duration::from_secs(1));

        let mut tres = [0u8; 4];
        tres[..2].copy_from_slice(&self.width.to_be_bytes());
        tres[2..].copy_from_slice(&self.height.to_be_bytes());
        self.bus.send_command_data(UC8159_TRES, &tres)?;

        let psr = [(self.resolution_setting << 6) | 0b0010_1111, 0x08];
        self.bus.send_command_data(UC8159_PSR, &psr)?;

        let pwr = [
            (0x06 << 3) | (0x01 << 2) | (0x01 << 1) | 0x01,
            0x00,
            0x23,
            0x23,
        ];
        self.bus.send_command_data(UC8159_PWR, &pwr)?;

        self.bus.send_command_data(UC8159_PLL, &[0x3C])?;
        self.bus.send_command_data(UC8159_TSE, &[0x00])?;

        let cdi = (self.border_colour << 5) | 0x17;
        self.bus.send_command_data(UC8159_CDI, &[cdi])?;

        self.bus.send_command_data(UC8159_TCON, &[0x22])?;
        self.bus.send_command_data(UC8159_DAM, &[0x00])?;
        self.bus.send_command_data(UC8159_PWS, &[0xAA])?;
        self.bus.send_command_data(UC8159_PFS, &[0x00])?;

        Ok(())
    }

    fn display(&mut self, frame: &Frame) -> Result<()> {
        match frame {
            Frame::Palette(plane) => self.send_frame(plane),
            other => Err(DriverError::UnsupportedFrame {
                expected: ColorMode::SevenColorPalette,
                received: other.color_mode(),
            }),
        }
    }

    fn clear(&mut self) -> Result<()> {
        let blank = IndexedPlane::filled(self.width, self.height, WHITE_INDEX);
        self.send_frame(&blank)
    }

    fn sleep(&mut self) -> Result<()> {
        debug!("uc8159 sleep");
        self.bus.send_command(UC8159_POF)?;
        let _ = self.bus.wait_until_idle(Duration::from_millis(200));
        self.bus.send_command_data(UC8159_DSLP, &[DEEP_SLEEP_CHECK])
    }
}
