//! External control surface.
//!
//! Controllers speak three-byte channel messages: `0xB0 id value` moves a
//! knob or slider, `0x90 id _` presses a button and `0x80 id _` releases it.
//! [`ControllerState`] keeps the latest value of every id; a
//! [`ControllerMapper`] turns that state into config overrides and commands
//! once per frame.
//!
//! The platform device is abstracted behind [`ControllerSource`]. A raw MIDI
//! byte stream (a Linux `/dev/snd/midiC*D*` node, a FIFO) can be read on a
//! background thread with [`spawn_reader`]; the binary exposes this as
//! `--controller <path>`. Any other device thread can feed raw messages
//! through a [`ChannelController`]:
//!
//! ```
//! use physarum::midi::{ChannelController, ControllerSource, ControllerState};
//!
//! let (mut source, sender) = ChannelController::new();
//! sender.send([0xB0, 0x10, 127]).unwrap();
//!
//! let mut state = ControllerState::new();
//! source.poll(&mut state);
//! assert_eq!(state.controller(0x10), 1.0);
//! ```

use std::io::{ErrorKind, Read};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

use crate::config::{SimConfig, SimParam};
use crate::orchestrator::Command;

/// Control change.
pub const STATUS_CONTROL: u8 = 0xB0;
/// Note on, used for button presses.
pub const STATUS_PRESS: u8 = 0x90;
/// Note off, used for button releases.
pub const STATUS_RELEASE: u8 = 0x80;

/// Control ids of the AKAI MIDIMIX.
pub mod midimix {
    /// Knob ids indexed `[row][column]`.
    pub const KNOBS: [[u8; 8]; 3] = [
        [0x10, 0x14, 0x18, 0x1C, 0x2E, 0x32, 0x36, 0x3A],
        [0x11, 0x15, 0x19, 0x1D, 0x2F, 0x33, 0x37, 0x3B],
        [0x12, 0x16, 0x1A, 0x1E, 0x30, 0x34, 0x38, 0x3C],
    ];

    pub const SLIDERS: [u8; 8] = [0x13, 0x17, 0x1B, 0x1F, 0x31, 0x35, 0x39, 0x3D];
    pub const SLIDER_MASTER: u8 = 0x3E;

    pub const BUTTONS_MUTE: [u8; 8] = [0x01, 0x04, 0x07, 0x0A, 0x0D, 0x10, 0x13, 0x16];
    pub const BUTTONS_REC: [u8; 8] = [0x03, 0x06, 0x09, 0x0C, 0x0F, 0x12, 0x15, 0x18];

    pub const BUTTON_SOLO: u8 = 0x1B;
    pub const BUTTON_BANK_LEFT: u8 = 0x19;
    pub const BUTTON_BANK_RIGHT: u8 = 0x1A;
}

/// Latest value of every control id.
#[derive(Debug, Clone)]
pub struct ControllerState {
    controllers: [u8; 256],
    touched: [bool; 256],
    buttons: [bool; 256],
}

impl Default for ControllerState {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerState {
    pub fn new() -> Self {
        Self {
            controllers: [0; 256],
            touched: [false; 256],
            buttons: [false; 256],
        }
    }

    /// Decode one raw message. Unknown status bytes are ignored.
    pub fn apply_message(&mut self, message: [u8; 3]) {
        let [status, id, value] = message;
        let id = id as usize;
        match status {
            STATUS_CONTROL => {
                self.controllers[id] = value;
                self.touched[id] = true;
            }
            STATUS_PRESS => self.buttons[id] = true,
            STATUS_RELEASE => self.buttons[id] = false,
            _ => {}
        }
    }

    /// Controller value scaled to 0.0-1.0.
    pub fn controller(&self, id: u8) -> f32 {
        self.controllers[id as usize] as f32 / 127.0
    }

    /// Whether a control change has been received for `id`.
    pub fn is_touched(&self, id: u8) -> bool {
        self.touched[id as usize]
    }

    pub fn button(&self, id: u8) -> bool {
        self.buttons[id as usize]
    }
}

/// A device delivering raw controller messages.
pub trait ControllerSource: Send {
    /// Drain pending messages into `state`. Never blocks.
    fn poll(&mut self, state: &mut ControllerState);
}

/// Source fed by another thread over a channel.
pub struct ChannelController {
    receiver: Receiver<[u8; 3]>,
    disconnected: bool,
}

impl ChannelController {
    pub fn new() -> (Self, Sender<[u8; 3]>) {
        let (sender, receiver) = mpsc::channel();
        (
            Self {
                receiver,
                disconnected: false,
            },
            sender,
        )
    }

    /// Whether the sending side has gone away.
    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }
}

impl ControllerSource for ChannelController {
    fn poll(&mut self, state: &mut ControllerState) {
        loop {
            match self.receiver.try_recv() {
                Ok(message) => state.apply_message(message),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.disconnected {
                        log::warn!("external controller disconnected");
                    }
                    self.disconnected = true;
                    break;
                }
            }
        }
    }
}

/// Frames a raw MIDI byte stream into three-byte channel messages.
///
/// Running status is honoured, the channel nibble is dropped, real-time
/// bytes are skipped and system messages discard the message in progress.
#[derive(Debug, Clone, Default)]
pub struct MessageParser {
    status: Option<u8>,
    data: Vec<u8>,
}

impl MessageParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte, returning a message once it is complete.
    pub fn push(&mut self, byte: u8) -> Option<[u8; 3]> {
        match byte {
            0xF8..=0xFF => None,
            0xF0..=0xF7 => {
                self.status = None;
                self.data.clear();
                None
            }
            0x80..=0xEF => {
                self.status = Some(byte & 0xF0);
                self.data.clear();
                None
            }
            _ => {
                let status = self.status?;
                self.data.push(byte);
                if self.data.len() < data_len(status) {
                    return None;
                }
                let message = [status, self.data[0], self.data.get(1).copied().unwrap_or(0)];
                self.data.clear();
                Some(message)
            }
        }
    }
}

fn data_len(status: u8) -> usize {
    match status {
        0xC0 | 0xD0 => 1,
        _ => 2,
    }
}

/// Read raw MIDI bytes from `reader` on a background thread.
///
/// The returned source reports itself disconnected once the stream ends or
/// fails.
pub fn spawn_reader<R: Read + Send + 'static>(mut reader: R) -> ChannelController {
    let (source, sender) = ChannelController::new();
    thread::spawn(move || {
        let mut parser = MessageParser::new();
        let mut buf = [0u8; 64];
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::warn!("controller read failed: {}", e);
                    break;
                }
            };
            for &byte in &buf[..n] {
                if let Some(message) = parser.push(byte) {
                    if sender.send(message).is_err() {
                        return;
                    }
                }
            }
        }
    });
    source
}

/// What a control id drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlTarget {
    /// A knob or slider mapped linearly onto the parameter's range.
    Param(SimParam),
    /// A button issuing a command when pressed.
    Command(Command),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerBinding {
    pub id: u8,
    pub target: ControlTarget,
}

/// Default layout: the top two knob rows drive behaviour parameters and the
/// first four mute buttons issue commands.
pub fn midimix_bindings() -> Vec<ControllerBinding> {
    let params = [
        (midimix::KNOBS[0][0], SimParam::SenseSpread),
        (midimix::KNOBS[0][1], SimParam::SenseDistance),
        (midimix::KNOBS[0][2], SimParam::TurnAngle),
        (midimix::KNOBS[0][3], SimParam::MoveDistance),
        (midimix::KNOBS[0][4], SimParam::DepositValue),
        (midimix::KNOBS[0][5], SimParam::DecayFactor),
        (midimix::KNOBS[0][6], SimParam::CenterAttraction),
        (midimix::KNOBS[0][7], SimParam::Diffusion),
        (midimix::KNOBS[1][0], SimParam::Jitter),
        (midimix::KNOBS[1][1], SimParam::SenseCoupling),
        (midimix::KNOBS[1][2], SimParam::MoveCoupling),
    ];
    let commands = [
        (midimix::BUTTONS_MUTE[0], Command::Reseed),
        (midimix::BUTTONS_MUTE[1], Command::TogglePause),
        (midimix::BUTTONS_MUTE[2], Command::ToggleDepthOfField),
        (midimix::BUTTONS_MUTE[3], Command::ToggleAutoRotate),
    ];

    params
        .into_iter()
        .map(|(id, p)| ControllerBinding { id, target: ControlTarget::Param(p) })
        .chain(commands.into_iter().map(|(id, c)| ControllerBinding { id, target: ControlTarget::Command(c) }))
        .collect()
}

/// Applies a binding table to controller state.
#[derive(Debug, Clone)]
pub struct ControllerMapper {
    bindings: Vec<ControllerBinding>,
    was_down: [bool; 256],
}

impl ControllerMapper {
    pub fn new(bindings: Vec<ControllerBinding>) -> Self {
        Self {
            bindings,
            was_down: [false; 256],
        }
    }

    /// Override touched parameters and emit commands for buttons pressed
    /// since the previous call.
    pub fn apply(&mut self, state: &ControllerState, config: &mut SimConfig, commands: &mut Vec<Command>) {
        for binding in &self.bindings {
            match binding.target {
                ControlTarget::Param(param) => {
                    if state.is_touched(binding.id) {
                        param.set_normalized(config, state.controller(binding.id));
                    }
                }
                ControlTarget::Command(command) => {
                    let down = state.button(binding.id);
                    if down && !self.was_down[binding.id as usize] {
                        commands.push(command);
                    }
                    self.was_down[binding.id as usize] = down;
                }
            }
        }
    }
}

/// A connected controller: source, latest state and binding table.
pub struct ExternalController {
    source: Box<dyn ControllerSource>,
    state: ControllerState,
    mapper: ControllerMapper,
}

impl ExternalController {
    pub fn new(source: Box<dyn ControllerSource>, bindings: Vec<ControllerBinding>) -> Self {
        Self {
            source,
            state: ControllerState::new(),
            mapper: ControllerMapper::new(bindings),
        }
    }

    /// A controller using the MIDIMIX layout.
    pub fn midimix(source: Box<dyn ControllerSource>) -> Self {
        Self::new(source, midimix_bindings())
    }

    /// Poll the device and apply its state.
    pub fn poll(&mut self, config: &mut SimConfig, commands: &mut Vec<Command>) {
        self.source.poll(&mut self.state);
        self.mapper.apply(&self.state, config, commands);
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_change_scales() {
        let mut state = ControllerState::new();
        state.apply_message([STATUS_CONTROL, 0x3E, 127]);
        state.apply_message([STATUS_CONTROL, 0x13, 0]);
        assert_eq!(state.controller(midimix::SLIDER_MASTER), 1.0);
        assert_eq!(state.controller(midimix::SLIDERS[0]), 0.0);
        assert!(state.is_touched(0x13));
        assert!(!state.is_touched(0x17));
    }

    #[test]
    fn test_button_press_release() {
        let mut state = ControllerState::new();
        state.apply_message([STATUS_PRESS, midimix::BUTTON_SOLO, 127]);
        assert!(state.button(midimix::BUTTON_SOLO));
        state.apply_message([STATUS_RELEASE, midimix::BUTTON_SOLO, 0]);
        assert!(!state.button(midimix::BUTTON_SOLO));
        state.apply_message([0xE0, midimix::BUTTON_SOLO, 5]);
        assert!(!state.button(midimix::BUTTON_SOLO));
    }

    #[test]
    fn test_mapper_overrides_only_touched() {
        let mut mapper = ControllerMapper::new(midimix_bindings());
        let mut state = ControllerState::new();
        let mut config = SimConfig::default();
        let mut commands = Vec::new();

        mapper.apply(&state, &mut config, &mut commands);
        assert_eq!(config, SimConfig::default());

        state.apply_message([STATUS_CONTROL, midimix::KNOBS[0][5], 127]);
        mapper.apply(&state, &mut config, &mut commands);
        assert_eq!(config.decay_factor, 1.0);
        assert_eq!(config.sense_distance, SimConfig::default().sense_distance);
    }

    #[test]
    fn test_mapper_commands_fire_on_press_edge() {
        let mut mapper = ControllerMapper::new(midimix_bindings());
        let mut state = ControllerState::new();
        let mut config = SimConfig::default();
        let mut commands = Vec::new();

        state.apply_message([STATUS_PRESS, midimix::BUTTONS_MUTE[0], 127]);
        mapper.apply(&state, &mut config, &mut commands);
        mapper.apply(&state, &mut config, &mut commands);
        assert_eq!(commands, vec![Command::Reseed]);

        state.apply_message([STATUS_RELEASE, midimix::BUTTONS_MUTE[0], 0]);
        mapper.apply(&state, &mut config, &mut commands);
        state.apply_message([STATUS_PRESS, midimix::BUTTONS_MUTE[0], 127]);
        mapper.apply(&state, &mut config, &mut commands);
        assert_eq!(commands.len(), 2);
    }

    #[test]
    fn test_channel_disconnect() {
        let (mut source, sender) = ChannelController::new();
        sender.send([STATUS_CONTROL, 0x10, 64]).unwrap();
        drop(sender);
        let mut state = ControllerState::new();
        source.poll(&mut state);
        assert!(source.is_disconnected());
        assert!((state.controller(0x10) - 64.0 / 127.0).abs() < 1e-6);
    }

    // ========== Stream Tests ==========

    #[test]
    fn test_parser_frames_running_status() {
        let mut parser = MessageParser::new();
        let bytes = [0xB3, 0x10, 0x40, 0x11, 0x7F, 0xF8, 0x92, 0x01, 0x7F];
        let messages: Vec<_> = bytes.iter().filter_map(|&b| parser.push(b)).collect();
        assert_eq!(
            messages,
            vec![
                [STATUS_CONTROL, 0x10, 0x40],
                [STATUS_CONTROL, 0x11, 0x7F],
                [STATUS_PRESS, 0x01, 0x7F],
            ]
        );
    }

    #[test]
    fn test_parser_skips_system_exclusive() {
        let mut parser = MessageParser::new();
        assert_eq!(parser.push(0x10), None);
        for b in [0xB0, 0x10, 0xF0, 0x7E, 0x7F, 0xF7, 0x20] {
            assert_eq!(parser.push(b), None);
        }
        assert_eq!(parser.push(0xC0), None);
        assert_eq!(parser.push(0x05), Some([0xC0, 0x05, 0]));
    }

    #[test]
    fn test_reader_drives_controller() {
        let bytes: &'static [u8] = &[0xB0, midimix::KNOBS[0][5], 127, 0x90, midimix::BUTTONS_MUTE[0], 127];
        let mut controller = ExternalController::midimix(Box::new(spawn_reader(bytes)));
        let mut config = SimConfig::default();
        let mut commands = Vec::new();

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while commands.is_empty() && std::time::Instant::now() < deadline {
            controller.poll(&mut config, &mut commands);
            thread::sleep(std::time::Duration::from_millis(1));
        }

        assert_eq!(config.decay_factor, 1.0);
        assert_eq!(commands, vec![Command::Reseed]);
    }

    #[test]
    fn test_bindings_are_unique() {
        let bindings = midimix_bindings();
        for (i, a) in bindings.iter().enumerate() {
            assert!(bindings[i + 1..].iter().all(|b| b.id != a.id));
        }
    }
}
