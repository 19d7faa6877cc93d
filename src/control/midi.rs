// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! MIDI footswitch trigger.
//!
//! A sustain-style pedal sends a Control Change whose value crosses 64 when
//! pressed. [`Footswitch`] turns the raw message stream into presses; the
//! `hardware` feature adds [`MidiTrigger`], which listens on a port through
//! `midir`.

#[cfg(feature = "hardware")]
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
#[cfg(feature = "hardware")]
use std::time::Duration;

#[cfg(feature = "hardware")]
use tracing::{debug, info};

#[cfg(feature = "hardware")]
use super::TriggerSource;
#[cfg(feature = "hardware")]
use crate::error::TriggerError;

const NOTE_OFF: u8 = 0x80;
const NOTE_ON: u8 = 0x90;
const CONTROL_CHANGE: u8 = 0xB0;

/// Pedal threshold: values at or above count as down
const PEDAL_DOWN: u8 = 64;

/// The parts of a MIDI message a footswitch cares about
#[derive(Debug, Clone, PartialEq)]
pub enum MidiMessage {
    /// Note On: channel (0-15), note (0-127), velocity (1-127)
    NoteOn { channel: u8, note: u8, velocity: u8 },
    /// Note Off, including Note On with velocity 0
    NoteOff { channel: u8, note: u8 },
    /// Control Change: channel (0-15), controller (0-127), value (0-127)
    ControlChange { channel: u8, controller: u8, value: u8 },
    /// Anything else
    Other(Vec<u8>),
}

impl MidiMessage {
    /// Parse raw MIDI bytes
    pub fn parse(data: &[u8]) -> Option<Self> {
        let (&status, rest) = data.split_first()?;
        let channel = status & 0x0F;

        match (status & 0xF0, rest) {
            (NOTE_OFF, [note, _, ..]) => Some(MidiMessage::NoteOff {
                channel,
                note: note & 0x7F,
            }),
            (NOTE_ON, [note, velocity, ..]) => {
                let velocity = velocity & 0x7F;
                if velocity == 0 {
                    Some(MidiMessage::NoteOff {
                        channel,
                        note: note & 0x7F,
                    })
                } else {
                    Some(MidiMessage::NoteOn {
                        channel,
                        note: note & 0x7F,
                        velocity,
                    })
                }
            }
            (CONTROL_CHANGE, [controller, value, ..]) => Some(MidiMessage::ControlChange {
                channel,
                controller: controller & 0x7F,
                value: value & 0x7F,
            }),
            _ => Some(MidiMessage::Other(data.to_vec())),
        }
    }
}

/// Edge detector turning controller messages into presses
#[derive(Debug, Clone)]
pub struct Footswitch {
    controller: u8,
    down: bool,
}

impl Footswitch {
    /// Watch `controller` on any channel
    pub fn new(controller: u8) -> Self {
        Self {
            controller: controller & 0x7F,
            down: false,
        }
    }

    /// Controller number being watched
    pub fn controller(&self) -> u8 {
        self.controller
    }

    /// Feed a message; true when it is a new press
    pub fn feed(&mut self, message: &MidiMessage) -> bool {
        match message {
            MidiMessage::ControlChange {
                controller, value, ..
            } if *controller == self.controller => {
                let down = *value >= PEDAL_DOWN;
                let pressed = down && !self.down;
                self.down = down;
                pressed
            }
            _ => false,
        }
    }
}

/// Trigger source listening for a footswitch on a MIDI input port
#[cfg(feature = "hardware")]
pub struct MidiTrigger {
    port_name: String,
    presses: Receiver<()>,
    _connection: midir::MidiInputConnection<()>,
}

#[cfg(feature = "hardware")]
impl MidiTrigger {
    /// Connect to input port `port_index`, watching `controller`
    pub fn connect(port_index: usize, controller: u8) -> Result<Self, TriggerError> {
        let input = midir::MidiInput::new("looper footswitch")
            .map_err(|e| TriggerError::Device(e.to_string()))?;
        let ports = input.ports();
        let port = ports.get(port_index).ok_or_else(|| {
            TriggerError::Device(format!(
                "MIDI input {} not found ({} available)",
                port_index,
                ports.len()
            ))
        })?;
        let port_name = input
            .port_name(port)
            .unwrap_or_else(|_| format!("port {}", port_index));

        let (tx, presses) = mpsc::channel();
        let mut footswitch = Footswitch::new(controller);
        let connection = input
            .connect(
                port,
                "looper-footswitch",
                move |_stamp, data, _| {
                    let Some(message) = MidiMessage::parse(data) else {
                        return;
                    };
                    if footswitch.feed(&message) {
                        debug!(?message, "footswitch press");
                        let _ = tx.send(());
                    }
                },
                (),
            )
            .map_err(|e| TriggerError::Device(e.to_string()))?;

        info!(port = %port_name, controller, "listening for footswitch");
        Ok(Self {
            port_name,
            presses,
            _connection: connection,
        })
    }
}

#[cfg(feature = "hardware")]
impl TriggerSource for MidiTrigger {
    fn await_trigger(&mut self) -> Result<(), TriggerError> {
        self.presses.recv().map_err(|_| TriggerError::Closed)
    }

    fn poll_trigger(&mut self, timeout: Duration) -> Result<bool, TriggerError> {
        match self.presses.recv_timeout(timeout) {
            Ok(()) => Ok(true),
            Err(RecvTimeoutError::Timeout) => Ok(false),
            Err(RecvTimeoutError::Disconnected) => Err(TriggerError::Closed),
        }
    }

    fn describe(&self) -> String {
        format!("MIDI footswitch on {}", self.port_name)
    }
}

/// Names of the available MIDI input ports
#[cfg(feature = "hardware")]
pub fn list_ports() -> Result<Vec<String>, TriggerError> {
    let input =
        midir::MidiInput::new("looper probe").map_err(|e| TriggerError::Device(e.to_string()))?;
    Ok(input
        .ports()
        .iter()
        .enumerate()
        .map(|(i, port)| {
            input
                .port_name(port)
                .unwrap_or_else(|_| format!("port {}", i))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_control_change() {
        assert_eq!(
            MidiMessage::parse(&[0xB3, 64, 127]),
            Some(MidiMessage::ControlChange {
                channel: 3,
                controller: 64,
                value: 127
            })
        );
    }

    #[test]
    fn test_parse_note_on_zero_velocity() {
        assert_eq!(
            MidiMessage::parse(&[0x90, 60, 0]),
            Some(MidiMessage::NoteOff {
                channel: 0,
                note: 60
            })
        );
        assert_eq!(MidiMessage::parse(&[]), None);
        assert_eq!(
            MidiMessage::parse(&[0xF8]),
            Some(MidiMessage::Other(vec![0xF8]))
        );
    }

    #[test]
    fn test_footswitch_edges() {
        let mut pedal = Footswitch::new(64);
        let cc = |value| MidiMessage::ControlChange {
            channel: 0,
            controller: 64,
            value,
        };

        assert!(pedal.feed(&cc(127)));
        // held: no repeat
        assert!(!pedal.feed(&cc(100)));
        assert!(!pedal.feed(&cc(0)));
        assert!(pedal.feed(&cc(64)));
    }

    #[test]
    fn test_footswitch_ignores_other_controllers() {
        let mut pedal = Footswitch::new(64);
        assert!(!pedal.feed(&MidiMessage::ControlChange {
            channel: 0,
            controller: 1,
            value: 127
        }));
        assert!(!pedal.feed(&MidiMessage::NoteOn {
            channel: 0,
            note: 64,
            velocity: 100
        }));
    }
}
