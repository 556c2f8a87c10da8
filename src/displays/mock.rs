use std::sync::{Arc, Mutex};

use super::EpdDriver;
use super::error::{DriverError, Result};
use crate::convert::Frame;
use crate::panel::PanelSpec;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Init,
    Display((u16, u16)),
    Clear,
    Sleep,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailOn {
    #[default]
    Nothing,
    Init,
    Display,
    Sleep,
}

/// Records every call; handles share the log so tests can inspect it after the driver moves.
#[derive(Clone)]
pub struct RecordingDriver {
    panel: PanelSpec,
    calls: Arc<Mutex<Vec<Call>>>,
    fail_on: FailOn,
}

impl RecordingDriver {
    pub fn new(panel: PanelSpec) -> Self {
        Self {
            panel,
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_on: FailOn::Nothing,
        }
    }

    pub fn failing(panel: PanelSpec, fail_on: FailOn) -> Self {
        Self {
            fail_on,
            ..Self::new(panel)
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call, stage: FailOn) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.fail_on == stage {
            return Err(DriverError::Timeout("busy", std::time::Duration::from_millis(1)));
        }
        Ok(())
    }
}

impl EpdDriver for RecordingDriver {
    fn panel(&self) -> PanelSpec {
        self.panel
    }

    fn init(&mut self) -> Result<()> {
        self.record(Call::Init, FailOn::Init)
    }

    fn display(&mut self, frame: &Frame) -> Result<()> {
        self.record(Call::Display(frame.dimensions()), FailOn::Display)
    }

    fn clear(&mut self) -> Result<()> {
        self.record(Call::Clear, FailOn::Display)
    }

    fn sleep(&mut self) -> Result<()> {
        self.record(Call::Sleep, FailOn::Sleep)
    }
}
