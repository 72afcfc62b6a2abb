//! [`Machine`] backed by a shell transport and the QEMU human monitor.
//!
//! Guest commands run through a configurable argv prefix, typically an ssh
//! invocation, with the whole command line passed as the final argument.
//! Keystrokes and screenshots go through the monitor's unix socket.

use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use vmcheck_error::CommonError;

use crate::config::MachineConfig;
use crate::error::{HarnessError, Result};
use crate::machine::{ExecOutput, Machine};
use crate::shell::quote;

const MONITOR_PROMPT: &[u8] = b"(qemu) ";
const MONITOR_TIMEOUT: Duration = Duration::from_secs(30);

/// Machine reached through an external command and an HMP socket.
#[derive(Debug, Clone)]
pub struct ShellMachine {
    transport: Vec<String>,
    monitor_socket: Option<PathBuf>,
    output_dir: PathBuf,
}

impl ShellMachine {
    /// Creates a machine.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `transport` is empty.
    pub fn new(
        transport: Vec<String>,
        monitor_socket: Option<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        if transport.is_empty() {
            return Err(HarnessError::config("machine transport must not be empty"));
        }
        Ok(Self {
            transport,
            monitor_socket,
            output_dir: output_dir.into(),
        })
    }

    /// Creates a machine from the `machine` section.
    pub fn from_config(config: &MachineConfig) -> Result<Self> {
        Self::new(
            config.transport.clone(),
            config.monitor_socket.clone(),
            config.output_dir.clone(),
        )
    }

    /// Directory screenshots and copied files are written to.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn monitor(&self) -> Result<Monitor> {
        let path = self
            .monitor_socket
            .as_deref()
            .ok_or_else(|| HarnessError::config("machine.monitor_socket is not set"))?;
        Monitor::connect(path)
    }
}

impl Machine for ShellMachine {
    fn execute(&self, command: &str) -> Result<ExecOutput> {
        let Some((program, args)) = self.transport.split_first() else {
            return Err(HarnessError::config("machine transport must not be empty"));
        };
        let output = Command::new(program)
            .args(args)
            .arg(command)
            .output()
            .map_err(|e| HarnessError::transport(format!("failed to spawn {program}: {e}")))?;

        Ok(ExecOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    fn send_chars(&self, chars: &str) -> Result<()> {
        let keys = chars
            .chars()
            .map(|c| {
                key_for_char(c)
                    .ok_or_else(|| HarnessError::transport(format!("no key for character {c:?}")))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut monitor = self.monitor()?;
        for key in keys {
            monitor.command(&format!("sendkey {key}"))?;
        }
        Ok(())
    }

    fn send_key(&self, key: &str) -> Result<()> {
        self.monitor()?.command(&format!("sendkey {key}"))?;
        Ok(())
    }

    fn screenshot(&self, name: &str) -> Result<()> {
        std::fs::create_dir_all(&self.output_dir)?;
        let path = std::path::absolute(self.output_dir.join(format!("{name}.ppm")))?;
        self.monitor()?
            .command(&format!("screendump {}", path.display()))?;
        tracing::info!("screenshot saved to {}", path.display());
        Ok(())
    }

    fn copy_from_vm(&self, path: &str, target_dir: &str) -> Result<()> {
        let command = format!("cat {}", quote(path));
        let output = self.execute(&command)?;
        if !output.success() {
            return Err(HarnessError::CommandFailed {
                command,
                status: output.status,
                output: output.stderr,
            });
        }

        let file_name = Path::new(path)
            .file_name()
            .ok_or_else(|| HarnessError::transport(format!("{path} has no file name")))?;
        let dir = self.output_dir.join(target_dir);
        std::fs::create_dir_all(&dir)?;
        let target = dir.join(file_name);
        std::fs::write(&target, output.stdout)?;
        tracing::debug!("copied {} to {}", path, target.display());
        Ok(())
    }
}

/// One connection to the HMP socket.
struct Monitor {
    reader: BufReader<UnixStream>,
    writer: UnixStream,
}

impl Monitor {
    fn connect(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CommonError::not_found(format!("monitor socket {}", path.display())).into());
        }
        let stream = UnixStream::connect(path).map_err(|e| {
            HarnessError::transport(format!("cannot connect to monitor {}: {e}", path.display()))
        })?;
        stream.set_read_timeout(Some(MONITOR_TIMEOUT))?;
        let writer = stream.try_clone()?;
        let mut monitor = Self {
            reader: BufReader::new(stream),
            writer,
        };
        monitor.read_until_prompt()?;
        Ok(monitor)
    }

    /// Sends one line and returns everything printed before the next prompt.
    fn command(&mut self, line: &str) -> Result<String> {
        tracing::debug!("monitor: {}", line);
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.read_until_prompt()
    }

    fn read_until_prompt(&mut self) -> Result<String> {
        let mut buf = Vec::new();
        while !buf.ends_with(MONITOR_PROMPT) {
            let chunk = match self.reader.fill_buf() {
                Ok(chunk) => chunk,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Err(CommonError::timeout(format!(
                        "no monitor prompt within {MONITOR_TIMEOUT:?}"
                    ))
                    .into());
                }
                Err(e) => return Err(e.into()),
            };
            if chunk.is_empty() {
                return Err(HarnessError::transport("monitor closed the connection"));
            }
            buf.push(chunk[0]);
            self.reader.consume(1);
        }
        buf.truncate(buf.len() - MONITOR_PROMPT.len());
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// Returns the `sendkey` name typing `c` on a US layout.
#[must_use]
pub fn key_for_char(c: char) -> Option<String> {
    let key = match c {
        'a'..='z' | '0'..='9' => c.to_string(),
        'A'..='Z' => format!("shift-{}", c.to_ascii_lowercase()),
        ' ' => "spc".to_string(),
        '\n' => "ret".to_string(),
        '\t' => "tab".to_string(),
        _ => {
            let (shift, name) = match c {
                '-' => (false, "minus"),
                '=' => (false, "equal"),
                '.' => (false, "dot"),
                ',' => (false, "comma"),
                '/' => (false, "slash"),
                '\\' => (false, "backslash"),
                ';' => (false, "semicolon"),
                '\'' => (false, "apostrophe"),
                '`' => (false, "grave_accent"),
                '[' => (false, "bracket_left"),
                ']' => (false, "bracket_right"),
                '!' => (true, "1"),
                '@' => (true, "2"),
                '#' => (true, "3"),
                '$' => (true, "4"),
                '%' => (true, "5"),
                '^' => (true, "6"),
                '&' => (true, "7"),
                '*' => (true, "8"),
                '(' => (true, "9"),
                ')' => (true, "0"),
                '_' => (true, "minus"),
                '+' => (true, "equal"),
                ':' => (true, "semicolon"),
                '"' => (true, "apostrophe"),
                '<' => (true, "comma"),
                '>' => (true, "dot"),
                '?' => (true, "slash"),
                '|' => (true, "backslash"),
                '~' => (true, "grave_accent"),
                '{' => (true, "bracket_left"),
                '}' => (true, "bracket_right"),
                _ => return None,
            };
            if shift {
                format!("shift-{name}")
            } else {
                name.to_string()
            }
        }
    };
    Some(key)
}
