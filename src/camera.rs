use std::path::Path;
use std::process::Command;

use tracing::{debug, warn};

use crate::error::{Error, Result};

pub trait Camera: Send + Sync {
    /// Capture one still into `path`. Any failure is a `Capture` error.
    fn capture_file(&self, path: &Path) -> Result<()>;

    /// Extension of the files this camera writes.
    fn extension(&self) -> &str {
        "jpg"
    }
}

/// Shells out to a still-capture tool such as `libcamera-still`, with the
/// output path appended as the last argument.
pub struct CommandCamera {
    program: String,
    args: Vec<String>,
}

impl CommandCamera {
    /// `command[0]` is the program, the rest are leading arguments.
    pub fn from_command(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl Camera for CommandCamera {
    fn capture_file(&self, path: &Path) -> Result<()> {
        debug!(program = %self.program, path = %path.display(), "Capturing still");
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .output()
            .map_err(|e| Error::Capture(format!("failed to run {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = %output.status, stderr = %stderr.trim(), "Camera command failed");
            return Err(Error::Capture(format!(
                "{} exited with {}",
                self.program, output.status
            )));
        }
        if !path.is_file() {
            return Err(Error::Capture(format!(
                "{} did not write {}",
                self.program,
                path.display()
            )));
        }
        Ok(())
    }
}

/// Stand-in when no camera is configured.
pub struct NoCamera;

impl Camera for NoCamera {
    fn capture_file(&self, _path: &Path) -> Result<()> {
        Err(Error::Capture("no camera configured".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(parts: &[&str]) -> CommandCamera {
        let parts: Vec<String> = parts.iter().map(|s| s.to_string()).collect();
        CommandCamera::from_command(&parts).unwrap()
    }

    #[test]
    fn empty_command_is_no_camera() {
        assert!(CommandCamera::from_command(&[]).is_none());
    }

    #[test]
    fn missing_program_is_capture_error() {
        let dir = tempfile::tempdir().unwrap();
        let camera = command(&["definitely-not-a-camera-binary"]);
        let err = camera.capture_file(&dir.path().join("shot.jpg")).unwrap_err();
        assert!(matches!(err, Error::Capture(_)));
    }

    #[cfg(unix)]
    #[test]
    fn successful_command_must_produce_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("shot.jpg");

        assert!(matches!(
            command(&["true"]).capture_file(&target),
            Err(Error::Capture(_))
        ));
        command(&["touch"]).capture_file(&target).unwrap();
        assert!(target.is_file());
        assert!(matches!(
            command(&["false"]).capture_file(&target),
            Err(Error::Capture(_))
        ));
    }

    #[test]
    fn no_camera_always_fails() {
        assert!(matches!(
            NoCamera.capture_file(Path::new("x.jpg")),
            Err(Error::Capture(_))
        ));
    }
}
