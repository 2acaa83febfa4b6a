// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::{Device, Direction, InputHandler, MidiError, StateHandler};

/// A mock MIDI host. Doesn't talk to any hardware; devices are added by hand and
/// everything sent is recorded.
pub struct Host {
    access: Option<Arc<Access>>,
}

impl Host {
    /// A host that grants access to an empty device set.
    pub fn new() -> Host {
        Host {
            access: Some(Arc::new(Access::default())),
        }
    }

    /// A host that refuses access.
    pub fn denied() -> Host {
        Host { access: None }
    }

    /// The access this host grants. For a denied host this is a detached access
    /// that the hub never sees.
    pub fn access(&self) -> Arc<Access> {
        self.access
            .clone()
            .unwrap_or_else(|| Arc::new(Access::default()))
    }
}

impl Default for Host {
    fn default() -> Self {
        Host::new()
    }
}

impl super::Host for Host {
    fn request_access(&self, sysex: bool) -> Result<Arc<dyn super::Access>, MidiError> {
        match &self.access {
            Some(access) => {
                debug!(sysex, "Mock MIDI access granted.");
                Ok(access.clone())
            }
            None => Err(MidiError::AccessDenied(
                "mock host refuses access".to_string(),
            )),
        }
    }
}

#[derive(Default)]
struct State {
    devices: Vec<Device>,
    listening: Vec<String>,
    handler: Option<InputHandler>,
    state_handler: Option<StateHandler>,
    sent: Vec<(String, Vec<u8>)>,
    failing: Vec<String>,
}

/// Mock access to the mock host's devices.
#[derive(Default)]
pub struct Access {
    state: Mutex<State>,
}

impl Access {
    /// Connects a device and notifies the state handler.
    pub fn add_device(&self, device: Device) {
        let handler = {
            let mut state = self.state.lock();
            state.devices.retain(|existing| existing.id() != device.id());
            state.devices.push(device);
            state.state_handler.clone()
        };
        if let Some(handler) = handler {
            handler();
        }
    }

    /// Disconnects a device and notifies the state handler.
    pub fn remove_device(&self, id: &str) {
        let handler = {
            let mut state = self.state.lock();
            state.devices.retain(|existing| existing.id() != id);
            state.state_handler.clone()
        };
        if let Some(handler) = handler {
            handler();
        }
    }

    /// Delivers a raw message as if it arrived on the given input. Messages on
    /// inputs that aren't being listened to are dropped.
    pub fn inject(&self, device_id: &str, message: &[u8]) {
        let handler = {
            let state = self.state.lock();
            if !state.listening.iter().any(|id| id == device_id) {
                return;
            }
            state.handler.clone()
        };
        if let Some(handler) = handler {
            handler(device_id, message);
        }
    }

    /// Every message sent so far, with the id of the output it went to.
    pub fn sent(&self) -> Vec<(String, Vec<u8>)> {
        self.state.lock().sent.clone()
    }

    /// Makes every send to the given output fail.
    pub fn fail_sends_to(&self, id: &str) {
        self.state.lock().failing.push(id.to_string());
    }

    fn devices(&self, direction: Direction) -> Vec<Device> {
        self.state
            .lock()
            .devices
            .iter()
            .filter(|device| device.direction() == direction)
            .cloned()
            .collect()
    }
}

impl super::Access for Access {
    fn inputs(&self) -> Result<Vec<Device>, MidiError> {
        Ok(self.devices(Direction::Input))
    }

    fn outputs(&self) -> Result<Vec<Device>, MidiError> {
        Ok(self.devices(Direction::Output))
    }

    fn listen(&self, inputs: &[Device], handler: InputHandler) -> Result<(), MidiError> {
        let mut state = self.state.lock();
        state.listening = inputs.iter().map(|input| input.id().to_string()).collect();
        state.handler = Some(handler);
        Ok(())
    }

    fn send(&self, output: &Device, message: &[u8]) -> Result<(), MidiError> {
        let mut state = self.state.lock();
        if state.failing.iter().any(|id| id == output.id()) {
            return Err(MidiError::Send(format!("{} is failing", output.name())));
        }
        state.sent.push((output.id().to_string(), message.to_vec()));
        Ok(())
    }

    fn on_state_change(&self, handler: StateHandler) {
        self.state.lock().state_handler = Some(handler);
    }
}
