use std::ops::{Deref, DerefMut};

use tracing::{debug, error};

use crate::convert::Frame;
use crate::displays::{self, EpdDriver};
use crate::error::{ConversionError, Result};
use crate::panel::PanelSpec;

/// Uniform push/clear over any panel family. Every operation runs inside an
/// awake session that puts the controller back to sleep on the way out.
pub struct PanelAdapter<D: EpdDriver> {
    driver: D,
    panel: PanelSpec,
    // Whether the last session's sleep went through.
    asleep: bool,
}

impl<D: EpdDriver> PanelAdapter<D> {
    pub fn new(driver: D) -> Self {
        let panel = driver.panel();
        Self {
            driver,
            panel,
            asleep: true,
        }
    }

    /// Letterbox colour used when converting for this panel.
    pub fn with_background(mut self, background: [u8; 3]) -> Self {
        self.panel = self.panel.with_background(background);
        self
    }

    pub fn panel(&self) -> &PanelSpec {
        &self.panel
    }

    pub fn width(&self) -> u16 {
        self.panel.width
    }

    pub fn height(&self) -> u16 {
        self.panel.height
    }

    pub fn push(&mut self, frame: &Frame) -> Result<()> {
        if !frame.fits(&self.panel) {
            return Err(ConversionError::FrameMismatch {
                expected: self.panel,
                received: frame.dimensions(),
                mode: frame.color_mode(),
            }
            .into());
        }
        self.with_session(|driver| driver.display(frame))
    }

    pub fn clear(&mut self) -> Result<()> {
        self.with_session(|driver| driver.clear())
    }

    /// Best-effort sleep for the fatal path; the error is logged, not returned.
    /// Skipped when the last session already put the panel to sleep.
    pub fn force_sleep(&mut self) {
        if self.asleep {
            return;
        }
        match self.driver.sleep() {
            Ok(()) => self.asleep = true,
            Err(e) => error!(error = %e, "Failed to put panel to sleep"),
        }
    }

    fn with_session<T>(
        &mut self,
        op: impl FnOnce(&mut D) -> displays::Result<T>,
    ) -> Result<T> {
        self.asleep = false;
        let mut session = AwakePanel::wake(&mut self.driver);
        let outcome = session.init().and_then(|()| op(&mut *session));
        let slept = session.finish();
        self.asleep = slept.is_ok();
        match (outcome, slept) {
            (Ok(value), Ok(())) => Ok(value),
            (Err(e), _) | (Ok(_), Err(e)) => Err(e.into()),
        }
    }
}

/// Scoped acquisition of the panel. `finish` reports the sleep result; if the
/// session is dropped without it (a panic mid-refresh), `Drop` still sleeps.
struct AwakePanel<'a, D: EpdDriver> {
    driver: &'a mut D,
    asleep: bool,
}

impl<'a, D: EpdDriver> AwakePanel<'a, D> {
    fn wake(driver: &'a mut D) -> Self {
        Self {
            driver,
            asleep: false,
        }
    }

    fn finish(mut self) -> displays::Result<()> {
        self.asleep = true;
        debug!("Returning panel to sleep");
        self.driver.sleep()
    }
}

impl<D: EpdDriver> Deref for AwakePanel<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        &*self.driver
    }
}

impl<D: EpdDriver> DerefMut for AwakePanel<'_, D> {
    fn deref_mut(&mut self) -> &mut D {
        &mut *self.driver
    }
}

impl<D: EpdDriver> Drop for AwakePanel<'_, D> {
    fn drop(&mut self) {
        if !self.asleep {
            if let Err(e) = self.driver.sleep() {
                error!(error = %e, "Failed to sleep panel during unwind");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::displays::mock::{Call, FailOn, RecordingDriver};
    use crate::error::Error;

    #[test]
    fn push_wraps_display_in_init_and_sleep() {
        let panel = PanelSpec::two_color(8, 4);
        let driver = RecordingDriver::new(panel);
        let mut adapter = PanelAdapter::new(driver.clone());

        adapter.push(&Frame::blank(&panel)).unwrap();
        adapter.clear().unwrap();

        assert_eq!(
            driver.calls(),
            vec![
                Call::Init,
                Call::Display((8, 4)),
                Call::Sleep,
                Call::Init,
                Call::Clear,
                Call::Sleep
            ]
        );
    }

    #[test]
    fn sleeps_even_when_display_fails() {
        let panel = PanelSpec::two_color(8, 4);
        let driver = RecordingDriver::failing(panel, FailOn::Display);
        let mut adapter = PanelAdapter::new(driver.clone());

        let err = adapter.push(&Frame::blank(&panel)).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(driver.calls().last(), Some(&Call::Sleep));
    }

    #[test]
    fn force_sleep_skips_panel_already_asleep() {
        let panel = PanelSpec::two_color(8, 4);
        let driver = RecordingDriver::failing(panel, FailOn::Display);
        let mut adapter = PanelAdapter::new(driver.clone());

        adapter.force_sleep();
        assert!(driver.calls().is_empty());

        assert!(adapter.push(&Frame::blank(&panel)).is_err());
        adapter.force_sleep();
        assert_eq!(
            driver.calls(),
            vec![Call::Init, Call::Display((8, 4)), Call::Sleep]
        );
    }

    #[test]
    fn force_sleep_retries_after_failed_session_sleep() {
        let panel = PanelSpec::two_color(8, 4);
        let driver = RecordingDriver::failing(panel, FailOn::Sleep);
        let mut adapter = PanelAdapter::new(driver.clone());

        assert!(adapter.clear().is_err());
        adapter.force_sleep();
        assert_eq!(
            driver.calls(),
            vec![Call::Init, Call::Clear, Call::Sleep, Call::Sleep]
        );
    }

    #[test]
    fn sleeps_when_init_fails() {
        let panel = PanelSpec::seven_color(4, 4);
        let driver = RecordingDriver::failing(panel, FailOn::Init);
        let mut adapter = PanelAdapter::new(driver.clone());

        assert!(adapter.clear().is_err());
        assert_eq!(driver.calls(), vec![Call::Init, Call::Sleep]);
    }

    #[test]
    fn mismatched_frame_never_wakes_panel() {
        let panel = PanelSpec::two_color(8, 4);
        let driver = RecordingDriver::new(panel);
        let mut adapter = PanelAdapter::new(driver.clone());

        let wrong = Frame::blank(&PanelSpec::seven_color(8, 4));
        let err = adapter.push(&wrong).unwrap_err();
        assert!(matches!(err, Error::Conversion(ConversionError::FrameMismatch { .. })));
        assert!(!err.is_fatal());
        assert!(driver.calls().is_empty());
    }

    #[test]
    fn sleeps_on_panic_inside_session() {
        let panel = PanelSpec::two_color(8, 4);
        let driver = RecordingDriver::new(panel);
        let mut adapter = PanelAdapter::new(driver.clone());

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = adapter.with_session(|_| -> displays::Result<()> { panic!("refresh blew up") });
        }));

        assert!(result.is_err());
        assert_eq!(driver.calls(), vec![Call::Init, Call::Sleep]);
    }
}
