//! Real collaborators: Stream Deck buttons as raw input, console output as
//! the keyboard.

use std::io::{self, Write};
use std::time::Duration;

use elgato_streamdeck::info::Kind;
use elgato_streamdeck::{StreamDeck, StreamDeckInput};
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use super::{KeySampler, KeyboardOutput};
use crate::actions::keys::key_name;
use crate::chord::KEY_COUNT;
use crate::error::{KeypadError, Result};

/// A connected Stream Deck as seen by `list_devices`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceSummary {
    pub serial: String,
    pub product_name: String,
    pub key_count: u8,
}

/// List all connected Stream Deck devices.
pub fn list_devices() -> Result<Vec<DeviceSummary>> {
    let hid = elgato_streamdeck::new_hidapi()
        .map_err(|e| KeypadError::DeviceCommunication(e.to_string()))?;

    Ok(elgato_streamdeck::list_devices(&hid)
        .into_iter()
        .map(|(kind, serial)| DeviceSummary {
            serial,
            product_name: kind_to_name(kind).to_string(),
            key_count: kind.key_count(),
        })
        .collect())
}

/// Uses the first four buttons of a Stream Deck as the keypad switches.
pub struct StreamDeckSampler {
    inner: StreamDeck,
    serial: String,
    states: [bool; KEY_COUNT],
    read_timeout: Duration,
}

impl StreamDeckSampler {
    /// Open a device, optionally by serial number.
    ///
    /// Without a serial exactly one device must be connected.
    pub fn open(serial: Option<&str>) -> Result<Self> {
        let hid = elgato_streamdeck::new_hidapi()
            .map_err(|e| KeypadError::DeviceCommunication(e.to_string()))?;
        let devices = elgato_streamdeck::list_devices(&hid);

        if devices.is_empty() {
            return Err(KeypadError::NoDevicesFound);
        }

        let (kind, target_serial) = if let Some(serial) = serial {
            devices
                .iter()
                .find(|(_, s)| s == serial)
                .cloned()
                .ok_or_else(|| KeypadError::DeviceNotFound {
                    serial: serial.to_string(),
                })?
        } else if devices.len() == 1 {
            devices[0].clone()
        } else {
            let serials = devices.iter().map(|(_, s)| s.clone()).collect();
            return Err(KeypadError::MultipleDevices { serials });
        };

        if usize::from(kind.key_count()) < KEY_COUNT {
            warn!(
                serial = %target_serial,
                keys = kind.key_count(),
                "Device has fewer buttons than the keypad expects"
            );
        }

        let inner = StreamDeck::connect(&hid, kind, &target_serial).map_err(|e| {
            KeypadError::DeviceCommunication(format!("{target_serial}: {e}"))
        })?;
        info!(serial = %target_serial, model = kind_to_name(kind), "Connected to Stream Deck");

        Ok(Self {
            inner,
            serial: target_serial,
            states: [false; KEY_COUNT],
            read_timeout: Duration::from_millis(10),
        })
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// How long one `sample` may block waiting for input.
    #[must_use]
    pub const fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}

impl KeySampler for StreamDeckSampler {
    /// Returns the latest known button levels, updated from any pending report.
    fn sample(&mut self) -> Result<[bool; KEY_COUNT]> {
        match self.inner.read_input(Some(self.read_timeout)) {
            Ok(StreamDeckInput::ButtonStateChange(states)) => {
                for (slot, pressed) in self.states.iter_mut().zip(states) {
                    *slot = pressed;
                }
                trace!(states = ?self.states, "Button report");
            }
            Ok(_) => {}
            Err(e) => {
                debug!(serial = %self.serial, error = %e, "Read failed");
                return Err(KeypadError::DeviceCommunication(e.to_string()));
            }
        }
        Ok(self.states)
    }
}

/// Writes keyboard operations as text lines instead of sending HID reports.
#[derive(Debug)]
pub struct ConsoleKeyboard<W: Write = io::Stdout> {
    out: W,
}

impl ConsoleKeyboard {
    #[must_use]
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> ConsoleKeyboard<W> {
    pub const fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, line: std::fmt::Arguments<'_>) {
        if let Err(e) = writeln!(self.out, "{line}") {
            warn!(error = %e, "Console keyboard write failed");
        }
    }
}

fn describe(code: u8) -> String {
    key_name(code).map_or_else(
        || {
            if code.is_ascii_graphic() {
                format!("'{}'", char::from(code))
            } else {
                format!("{code:#04x}")
            }
        },
        str::to_string,
    )
}

impl<W: Write> KeyboardOutput for ConsoleKeyboard<W> {
    fn press(&mut self, code: u8) {
        let name = describe(code);
        self.emit(format_args!("press   {name}"));
    }

    fn release(&mut self, code: u8) {
        let name = describe(code);
        self.emit(format_args!("release {name}"));
    }

    fn print(&mut self, text: &str) {
        self.emit(format_args!("type    {text:?}"));
    }
}

const fn kind_to_name(kind: Kind) -> &'static str {
    match kind {
        Kind::Original => "Stream Deck (Original)",
        Kind::OriginalV2 => "Stream Deck (Original V2)",
        Kind::Mini => "Stream Deck Mini",
        Kind::MiniMk2 => "Stream Deck Mini MK.2",
        Kind::Xl => "Stream Deck XL",
        Kind::XlV2 => "Stream Deck XL V2",
        Kind::Mk2 => "Stream Deck MK.2",
        Kind::Pedal => "Stream Deck Pedal",
        Kind::Plus => "Stream Deck +",
        Kind::Neo => "Stream Deck Neo",
        _ => "Unknown Stream Deck",
    }
}
