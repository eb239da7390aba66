use midir::{MidiOutput, MidiOutputConnection, MidiOutputPort};
use tracing::{debug, info};

use super::MidiSink;
use crate::error::{Error, Result, SinkError};
use crate::events::MidiMessage;

/// Names of the MIDI output ports currently available, in port order.
pub fn list_output_ports(client_name: &str) -> Result<Vec<String>> {
    let midi_out = MidiOutput::new(client_name)?;
    Ok(midi_out
        .ports()
        .iter()
        .map(|port| midi_out.port_name(port).unwrap_or_default())
        .collect())
}

/// Sink backed by a hardware or virtual MIDI output port.
pub struct MidirSink {
    connection: MidiOutputConnection,
    port_name: String,
}

impl MidirSink {
    /// Connects to an output port.
    ///
    /// `selector` is either a port index or a case-insensitive substring of
    /// the port name. Without a selector the first port is used.
    pub fn connect(client_name: &str, selector: Option<&str>) -> Result<Self> {
        let midi_out = MidiOutput::new(client_name)?;
        let ports = midi_out.ports();
        if ports.is_empty() {
            return Err(Error::NoPorts);
        }

        let names: Vec<String> = ports
            .iter()
            .map(|port| midi_out.port_name(port).unwrap_or_default())
            .collect();
        let index = select_port(&names, selector)?;
        let port: &MidiOutputPort = &ports[index];
        let port_name = names[index].clone();

        info!("Connecting to MIDI output {}: {}", index, port_name);
        let connection = midi_out
            .connect(port, &format!("{client_name}-out"))
            .map_err(|e| Error::Connect {
                port: port_name.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            connection,
            port_name,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn close(self) {
        debug!("Closing MIDI output {}", self.port_name);
        self.connection.close();
    }

    fn send(&mut self, message: MidiMessage) -> std::result::Result<(), SinkError> {
        let (bytes, len) = message.encode();
        self.connection
            .send(&bytes[..len])
            .map_err(|e| SinkError::Send(e.to_string()))
    }
}

impl MidiSink for MidirSink {
    fn note_on(&mut self, channel: u8, pitch: u8, velocity: u8) -> std::result::Result<(), SinkError> {
        self.send(MidiMessage::NoteOn {
            channel,
            pitch,
            velocity,
        })
    }

    fn note_off(&mut self, channel: u8, pitch: u8) -> std::result::Result<(), SinkError> {
        self.send(MidiMessage::NoteOff { channel, pitch })
    }

    fn program_change(&mut self, channel: u8, program: u8) -> std::result::Result<(), SinkError> {
        self.send(MidiMessage::ProgramChange { channel, program })
    }

    fn all_notes_off(&mut self, channel: u8) -> std::result::Result<(), SinkError> {
        self.send(MidiMessage::AllNotesOff { channel })
    }
}

fn select_port(names: &[String], selector: Option<&str>) -> Result<usize> {
    let Some(selector) = selector else {
        return Ok(0);
    };

    if let Ok(index) = selector.parse::<usize>() {
        return if index < names.len() {
            Ok(index)
        } else {
            Err(Error::PortNotFound(selector.to_string()))
        };
    }

    let needle = selector.to_lowercase();
    names
        .iter()
        .position(|name| name.to_lowercase().contains(&needle))
        .ok_or_else(|| Error::PortNotFound(selector.to_string()))
}
