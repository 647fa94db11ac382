// ── esptool bootloader flasher ──
//
// Each bootloader step is one `esptool.py` invocation. Detection runs
// `chip_id`; stub and baud settings are carried into the later commands;
// the image is written through a temporary file.

use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output};

use sumo_core::{BootloaderFlasher, ChipSession, DeviceError, DeviceHandle, FlashParams};
use tracing::{debug, info};

/// Runs the `esptool` command-line flasher.
#[derive(Debug, Clone)]
pub struct EsptoolFlasher {
    pub program: PathBuf,
    /// Value for `--chip`.
    pub chip: String,
}

impl Default for EsptoolFlasher {
    fn default() -> Self {
        Self {
            program: PathBuf::from("esptool.py"),
            chip: "esp32".into(),
        }
    }
}

impl BootloaderFlasher for EsptoolFlasher {
    fn detect(&self, port: &str) -> Result<Box<dyn ChipSession>, DeviceError> {
        let mut session = EsptoolSession {
            program: self.program.clone(),
            chip_arg: self.chip.clone(),
            port: port.to_owned(),
            description: String::new(),
            use_stub: false,
            baud: None,
        };
        let output = session
            .run(&["--before", "default_reset", "--after", "no_reset", "chip_id"])
            .map_err(|e| match e {
                DeviceError::Flash(reason) => DeviceError::ChipNotFound {
                    port: port.to_owned(),
                    reason,
                },
                other => other,
            })?;
        session.description = parse_chip(&String::from_utf8_lossy(&output.stdout))
            .unwrap_or_else(|| self.chip.to_uppercase());
        info!(port, chip = %session.description, "chip detected");
        Ok(Box::new(session))
    }
}

/// One bootloader conversation, replayed as separate esptool commands.
#[derive(Debug)]
pub struct EsptoolSession {
    program: PathBuf,
    chip_arg: String,
    port: String,
    description: String,
    use_stub: bool,
    baud: Option<u32>,
}

impl EsptoolSession {
    fn base_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--chip".into(),
            self.chip_arg.clone().into(),
            "--port".into(),
            self.port.clone().into(),
        ];
        if let Some(baud) = self.baud {
            args.push("--baud".into());
            args.push(baud.to_string().into());
        }
        if !self.use_stub {
            args.push("--no-stub".into());
        }
        args
    }

    fn run<S: AsRef<std::ffi::OsStr>>(&self, extra: &[S]) -> Result<Output, DeviceError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.base_args()).args(extra);
        debug!(command = ?cmd, "running esptool");

        let output = cmd.output().map_err(|e| {
            DeviceError::Flash(format!("cannot run {}: {e}", self.program.display()))
        })?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(DeviceError::Flash(failure_text(&output)))
        }
    }
}

impl DeviceHandle for EsptoolSession {
    /// Every command releases the port when it exits.
    fn close(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }
}

impl ChipSession for EsptoolSession {
    fn chip(&self) -> &str {
        &self.description
    }

    fn run_stub(&mut self) -> Result<(), DeviceError> {
        self.use_stub = true;
        Ok(())
    }

    fn change_baud(&mut self, baud: u32) -> Result<(), DeviceError> {
        self.baud = Some(baud);
        Ok(())
    }

    fn write_flash(&mut self, image: &[u8], params: &FlashParams) -> Result<(), DeviceError> {
        let mut file = tempfile::Builder::new()
            .prefix("sumo-firmware-")
            .suffix(".bin")
            .tempfile()?;
        file.write_all(image)?;
        file.flush()?;

        let mut args = write_flash_args(params);
        args.push(file.path().as_os_str().to_owned());
        self.run(args.as_slice())?;
        info!(port = %self.port, bytes = image.len(), "flash written");
        Ok(())
    }

    fn hard_reset(&mut self) -> Result<(), DeviceError> {
        self.run(&["--before", "no_reset", "--after", "hard_reset", "read_mac"])?;
        Ok(())
    }
}

/// Arguments after the connection options, up to (excluding) the image path.
pub fn write_flash_args(params: &FlashParams) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "--before",
        "default_reset",
        "--after",
        "no_reset",
        "write_flash",
        "--flash_mode",
    ]
    .into_iter()
    .map(OsString::from)
    .collect();
    args.push(params.flash_mode.to_string().into());
    args.push("--flash_size".into());
    args.push(params.flash_size_label().into());
    args.push("--flash_freq".into());
    args.push("keep".into());
    if params.verify {
        args.push("--verify".into());
    }
    args.push(format!("{:#x}", params.offset).into());
    args
}

/// `Chip is ESP32D0WDQ6 (revision 1)` → `ESP32D0WDQ6 (revision 1)`.
pub fn parse_chip(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .find_map(|l| l.trim().strip_prefix("Chip is "))
        .map(|s| s.trim().to_owned())
}

fn failure_text(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let text = if stderr.trim().is_empty() { stdout } else { stderr };
    let last = text
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("no output");
    format!("esptool exited with {}: {}", output.status, last.trim())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use sumo_core::FlashMode;

    use super::*;

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn default_write_flash_arguments() {
        let args = write_flash_args(&FlashParams::default());
        assert_eq!(
            strings(&args),
            vec![
                "--before",
                "default_reset",
                "--after",
                "no_reset",
                "write_flash",
                "--flash_mode",
                "dio",
                "--flash_size",
                "4MB",
                "--flash_freq",
                "keep",
                "0x1000",
            ]
        );
    }

    #[test]
    fn verify_and_mode_are_passed() {
        let params = FlashParams {
            flash_mode: FlashMode::Qio,
            verify: true,
            ..FlashParams::default()
        };
        let args = strings(&write_flash_args(&params));
        assert!(args.contains(&"qio".to_owned()));
        assert!(args.contains(&"--verify".to_owned()));
    }

    #[test]
    fn session_options_follow_stub_and_baud() {
        let mut session = EsptoolSession {
            program: "esptool.py".into(),
            chip_arg: "esp32".into(),
            port: "/dev/ttyUSB0".into(),
            description: "ESP32".into(),
            use_stub: false,
            baud: None,
        };
        assert!(strings(&session.base_args()).contains(&"--no-stub".to_owned()));

        session.run_stub().expect("stub");
        session.change_baud(460_800).expect("baud");
        assert_eq!(
            strings(&session.base_args()),
            vec!["--chip", "esp32", "--port", "/dev/ttyUSB0", "--baud", "460800"]
        );
    }

    #[test]
    fn chip_line_is_parsed() {
        let out = "esptool.py v2.6\nConnecting....\nChip is ESP32D0WDQ6 (revision 1)\nFeatures: WiFi\n";
        assert_eq!(parse_chip(out).as_deref(), Some("ESP32D0WDQ6 (revision 1)"));
        assert_eq!(parse_chip("Connecting...\n"), None);
    }

    #[test]
    fn missing_program_is_a_flash_error() {
        let flasher = EsptoolFlasher {
            program: "/nonexistent/esptool-for-tests".into(),
            chip: "esp32".into(),
        };
        let err = flasher.detect("/dev/ttyUSB0").err().expect("should fail");
        assert!(matches!(err, DeviceError::ChipNotFound { .. }));
    }
}
