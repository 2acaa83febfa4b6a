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
use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, AtomicU8, Ordering},
        Arc, Weak,
    },
    time::Duration,
};

use midly::live::LiveEvent;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, span, warn, Level};

use super::{
    event::{self, MidiEvent, Transport},
    scheduler::Scheduler,
    Access, Device, Host,
};

/// The velocity used for outbound notes when none is given.
pub const DEFAULT_NOTE_VELOCITY: u8 = 100;

/// How long an outbound note is held before its note-off is sent.
pub const DEFAULT_NOTE_DURATION: Duration = Duration::from_millis(200);

/// Invoked once per incoming message.
pub type MessageCallback = Arc<dyn Fn(&MidiEvent) + Send + Sync>;

/// An outbound note request.
#[derive(Debug, Clone)]
pub struct Note {
    note: u8,
    velocity: u8,
    duration: Duration,
    channel: Option<u8>,
    target: Option<String>,
}

impl Note {
    /// A note with the default velocity and duration, on the hub's default channel,
    /// broadcast to every output.
    pub fn new(note: u8) -> Note {
        Note {
            note,
            velocity: DEFAULT_NOTE_VELOCITY,
            duration: DEFAULT_NOTE_DURATION,
            channel: None,
            target: None,
        }
    }

    pub fn velocity(mut self, velocity: u8) -> Note {
        self.velocity = velocity;
        self
    }

    pub fn duration(mut self, duration: Duration) -> Note {
        self.duration = duration;
        self
    }

    pub fn channel(mut self, channel: u8) -> Note {
        self.channel = Some(channel);
        self
    }

    /// Restricts the note to the output with the given id.
    pub fn target(mut self, target: &str) -> Note {
        self.target = Some(target.to_string());
        self
    }
}

/// State shared between the hub and the callbacks it installs on the host.
struct Shared {
    access: RwLock<Option<Arc<dyn Access>>>,
    inputs: RwLock<Vec<Device>>,
    outputs: RwLock<Vec<Device>>,
    subscribers: Mutex<Vec<(u64, MessageCallback)>>,
    next_subscriber_id: AtomicU64,
    /// Serializes dispatch so each message is handled to completion before the next.
    dispatch_lock: Mutex<()>,
    default_channel: AtomicU8,
}

impl Shared {
    fn access(&self) -> Option<Arc<dyn Access>> {
        self.access.read().clone()
    }

    /// Rebuilds both device lists from scratch and reinstalls the input listeners.
    fn refresh(self: &Arc<Self>) {
        let access = match self.access() {
            Some(access) => access,
            None => return,
        };

        let inputs = access.inputs().unwrap_or_else(|e| {
            warn!(err = e.to_string(), "Unable to list MIDI inputs.");
            Vec::new()
        });
        let outputs = access.outputs().unwrap_or_else(|e| {
            warn!(err = e.to_string(), "Unable to list MIDI outputs.");
            Vec::new()
        });

        info!(
            inputs = inputs.len(),
            outputs = outputs.len(),
            "MIDI devices enumerated."
        );

        let weak = Arc::downgrade(self);
        if let Err(e) = access.listen(
            &inputs,
            Arc::new(move |device_id: &str, raw: &[u8]| {
                if let Some(shared) = weak.upgrade() {
                    shared.dispatch(device_id, raw);
                }
            }),
        ) {
            warn!(err = e.to_string(), "Unable to listen to MIDI inputs.");
        }

        *self.inputs.write() = inputs;
        *self.outputs.write() = outputs;
    }

    fn dispatch(&self, device_id: &str, raw: &[u8]) {
        let event = match MidiEvent::from_raw(raw, device_id) {
            Some(event) => event,
            None => return,
        };

        if let Ok(live) = LiveEvent::parse(raw) {
            debug!(device = device_id, event = ?live, "Received MIDI event.");
        }

        let _dispatching = self.dispatch_lock.lock();
        let callbacks: Vec<MessageCallback> = self
            .subscribers
            .lock()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in callbacks {
            callback(&event);
        }
    }

    fn targets(&self, target: Option<&str>) -> Vec<Device> {
        self.outputs
            .read()
            .iter()
            .filter(|output| target.is_none_or(|target| output.id() == target))
            .cloned()
            .collect()
    }
}

/// A registered message callback. Dropping the subscription unregisters it.
#[must_use = "dropping a subscription unregisters its callback"]
pub struct Subscription {
    id: u64,
    shared: Weak<Shared>,
}

impl Subscription {
    /// Unregisters the callback.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.subscribers.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

/// Bridges the host's MIDI system to typed events and a typed send API.
pub struct DeviceHub {
    host: Arc<dyn Host>,
    shared: Arc<Shared>,
    scheduler: Scheduler,
}

impl DeviceHub {
    /// Creates a hub on top of the given host. Nothing is enumerated until
    /// [DeviceHub::initialize] is called.
    pub fn new(host: Arc<dyn Host>) -> DeviceHub {
        DeviceHub {
            host,
            shared: Arc::new(Shared {
                access: RwLock::new(None),
                inputs: RwLock::new(Vec::new()),
                outputs: RwLock::new(Vec::new()),
                subscribers: Mutex::new(Vec::new()),
                next_subscriber_id: AtomicU64::new(1),
                dispatch_lock: Mutex::new(()),
                default_channel: AtomicU8::new(0),
            }),
            scheduler: Scheduler::new(),
        }
    }

    /// Requests MIDI access, including system exclusive messages. Returns whether
    /// access was granted. Without access every other operation is a no-op.
    pub fn initialize(&self) -> bool {
        let span = span!(Level::INFO, "initialize MIDI");
        let _enter = span.enter();

        let access = match self.host.request_access(true) {
            Ok(access) => access,
            Err(e) => {
                warn!(err = e.to_string(), "MIDI is unavailable, hub disabled.");
                return false;
            }
        };

        *self.shared.access.write() = Some(access.clone());
        self.shared.refresh();

        let weak = Arc::downgrade(&self.shared);
        access.on_state_change(Arc::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.refresh();
            }
        }));

        true
    }

    /// Returns true once access has been granted.
    pub fn is_enabled(&self) -> bool {
        self.shared.access.read().is_some()
    }

    /// Registers a callback that receives every message from every input.
    pub fn on_message<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&MidiEvent) + Send + Sync + 'static,
    {
        let id = self
            .shared
            .next_subscriber_id
            .fetch_add(1, Ordering::Relaxed);
        self.shared
            .subscribers
            .lock()
            .push((id, Arc::new(callback)));
        Subscription {
            id,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// The current input ports.
    pub fn inputs(&self) -> Vec<Device> {
        self.shared.inputs.read().clone()
    }

    /// The current output ports.
    pub fn outputs(&self) -> Vec<Device> {
        self.shared.outputs.read().clone()
    }

    /// The channel used for sends that don't name one.
    pub fn default_channel(&self) -> u8 {
        self.shared.default_channel.load(Ordering::Relaxed)
    }

    pub fn set_default_channel(&self, channel: u8) {
        self.shared
            .default_channel
            .store(channel & 0x0F, Ordering::Relaxed);
    }

    /// Sends a note-on now and its note-off once the note's duration has elapsed.
    /// The note-off always goes to the channel and outputs chosen here.
    pub fn send_note(&self, note: Note) {
        let access = match self.shared.access() {
            Some(access) => access,
            None => {
                debug!(note = note.note, "MIDI disabled, dropping note.");
                return;
            }
        };

        let channel = note.channel.unwrap_or_else(|| self.default_channel());
        let (on, off) = match (
            event::note_on(channel, note.note, note.velocity),
            event::note_off(channel, note.note),
        ) {
            (Ok(on), Ok(off)) => (on, off),
            (Err(e), _) | (_, Err(e)) => {
                warn!(err = e.to_string(), "Unable to encode note.");
                return;
            }
        };

        for output in self.shared.targets(note.target.as_deref()) {
            send_logged(access.as_ref(), &output, &on);

            let access = access.clone();
            let off = off.clone();
            self.scheduler.schedule(note.duration, move || {
                send_logged(access.as_ref(), &output, &off);
            });
        }
    }

    /// Sends a control change. The value is floored and clamped to 0-127.
    pub fn send_control_change(
        &self,
        controller: u8,
        value: f64,
        channel: Option<u8>,
        target: Option<&str>,
    ) {
        let access = match self.shared.access() {
            Some(access) => access,
            None => {
                debug!(controller, "MIDI disabled, dropping control change.");
                return;
            }
        };

        let channel = channel.unwrap_or_else(|| self.default_channel());
        let message =
            match event::control_change(channel, controller, event::clamp_cc_value(value)) {
                Ok(message) => message,
                Err(e) => {
                    warn!(err = e.to_string(), "Unable to encode control change.");
                    return;
                }
            };

        for output in self.shared.targets(target) {
            send_logged(access.as_ref(), &output, &message);
        }
    }

    /// Sends a realtime transport command.
    pub fn send_transport(&self, command: Transport, target: Option<&str>) {
        let access = match self.shared.access() {
            Some(access) => access,
            None => {
                debug!(?command, "MIDI disabled, dropping transport.");
                return;
            }
        };

        let message = match event::transport(command) {
            Ok(message) => message,
            Err(e) => {
                warn!(err = e.to_string(), "Unable to encode transport.");
                return;
            }
        };

        for output in self.shared.targets(target) {
            send_logged(access.as_ref(), &output, &message);
        }
    }
}

fn send_logged(access: &dyn Access, output: &Device, message: &[u8]) {
    if let Err(e) = access.send(output, message) {
        warn!(
            device = output.name(),
            err = e.to_string(),
            "Unable to send MIDI message."
        );
    }
}

impl fmt::Debug for DeviceHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceHub")
            .field("enabled", &self.is_enabled())
            .field("inputs", &self.shared.inputs.read().len())
            .field("outputs", &self.shared.outputs.read().len())
            .field("subscribers", &self.shared.subscribers.lock().len())
            .finish()
    }
}
