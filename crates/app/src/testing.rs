//! In-memory port implementations shared by the unit tests.

use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};

use gpiohub_domain::action::{Action, ExecutionLogEntry};
use gpiohub_domain::device::{Device, DeviceState};
use gpiohub_domain::error::{DeviceFault, GpioHubError, NotFoundError, ValidationError};
use gpiohub_domain::id::{ActionId, DeviceId};
use gpiohub_domain::pin::{self, GpioPin, LineLevel, LogicalLine};
use gpiohub_domain::time::{self, Timestamp};
use tokio::time::Instant;

use crate::ports::{ActionRepository, DeviceRepository, OutputLines, PinRepository};

#[derive(Default)]
struct Tables {
    devices: BTreeMap<DeviceId, Device>,
    pins: BTreeMap<u8, GpioPin>,
    actions: BTreeMap<ActionId, Action>,
    logs: Vec<ExecutionLogEntry>,
    next_runs: Vec<(ActionId, Option<Timestamp>)>,
    next_id: i64,
}

impl Tables {
    fn allocate(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Devices, pins and actions behind one lock; clones share the same data.
#[derive(Clone)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        let tables = Tables {
            pins: pin::header_catalog()
                .into_iter()
                .map(|p| (p.pin_number, p))
                .collect(),
            ..Tables::default()
        };
        Self {
            tables: Arc::new(Mutex::new(tables)),
        }
    }
}

impl InMemoryStore {
    /// Register a device directly, bypassing services.
    pub fn seed_device(&self, name: &str, pin_number: u8) -> Device {
        let device = Device::builder().name(name).pin(pin_number).build().unwrap();
        let mut tables = self.tables.lock().unwrap();
        let id = DeviceId::new(tables.allocate());
        let device = Device { id, ..device };
        tables.devices.insert(id, device.clone());
        if let Some(p) = tables.pins.get_mut(&pin_number) {
            p.is_used = true;
        }
        device
    }

    pub fn device(&self, id: DeviceId) -> Option<Device> {
        self.tables.lock().unwrap().devices.get(&id).cloned()
    }

    pub fn remove_device(&self, id: DeviceId) {
        self.tables.lock().unwrap().devices.remove(&id);
    }

    pub fn logs(&self) -> Vec<ExecutionLogEntry> {
        self.tables.lock().unwrap().logs.clone()
    }

    pub fn action(&self, id: ActionId) -> Option<Action> {
        self.tables.lock().unwrap().actions.get(&id).cloned()
    }

    /// Every `set_next_run` call, in order.
    pub fn next_runs(&self, id: ActionId) -> Vec<Option<Timestamp>> {
        self.tables
            .lock()
            .unwrap()
            .next_runs
            .iter()
            .filter(|(action_id, _)| *action_id == id)
            .map(|(_, next)| *next)
            .collect()
    }
}

fn not_found(entity: &'static str, id: impl ToString) -> GpioHubError {
    NotFoundError {
        entity,
        id: id.to_string(),
    }
    .into()
}

impl DeviceRepository for InMemoryStore {
    fn create(&self, device: Device) -> impl Future<Output = Result<Device, GpioHubError>> + Send {
        let mut tables = self.tables.lock().unwrap();
        let result = if tables.devices.values().any(|d| d.pin == device.pin) {
            Err(ValidationError::PinInUse(device.pin).into())
        } else {
            let now = time::now();
            let id = DeviceId::new(tables.allocate());
            let device = Device {
                id,
                created_at: Some(now),
                updated_at: Some(now),
                ..device
            };
            tables.devices.insert(id, device.clone());
            if let Some(p) = tables.pins.get_mut(&device.pin) {
                p.is_used = true;
            }
            Ok(device)
        };
        async { result }
    }

    fn get_by_id(
        &self,
        id: DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, GpioHubError>> + Send {
        let result = self.tables.lock().unwrap().devices.get(&id).cloned();
        async { Ok(result) }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Device>, GpioHubError>> + Send {
        let result: Vec<_> = self.tables.lock().unwrap().devices.values().cloned().collect();
        async { Ok(result) }
    }

    fn update_state(
        &self,
        id: DeviceId,
        state: DeviceState,
        at: Timestamp,
    ) -> impl Future<Output = Result<Device, GpioHubError>> + Send {
        let mut tables = self.tables.lock().unwrap();
        let result = match tables.devices.get_mut(&id) {
            Some(device) => {
                device.state = state;
                device.updated_at = Some(at);
                Ok(device.clone())
            }
            None => Err(not_found("Device", id)),
        };
        async { result }
    }

    fn delete(&self, id: DeviceId) -> impl Future<Output = Result<(), GpioHubError>> + Send {
        let mut tables = self.tables.lock().unwrap();
        let result = match tables.devices.remove(&id) {
            Some(device) => {
                if let Some(p) = tables.pins.get_mut(&device.pin) {
                    p.is_used = false;
                }
                Ok(())
            }
            None => Err(not_found("Device", id)),
        };
        async { result }
    }
}

impl PinRepository for InMemoryStore {
    fn get(
        &self,
        pin_number: u8,
    ) -> impl Future<Output = Result<Option<GpioPin>, GpioHubError>> + Send {
        let result = self.tables.lock().unwrap().pins.get(&pin_number).cloned();
        async { Ok(result) }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<GpioPin>, GpioHubError>> + Send {
        let result: Vec<_> = self.tables.lock().unwrap().pins.values().cloned().collect();
        async { Ok(result) }
    }

    fn get_usable(&self) -> impl Future<Output = Result<Vec<GpioPin>, GpioHubError>> + Send {
        let result: Vec<_> = self
            .tables
            .lock()
            .unwrap()
            .pins
            .values()
            .filter(|p| p.is_usable())
            .cloned()
            .collect();
        async { Ok(result) }
    }
}

impl ActionRepository for InMemoryStore {
    fn create(&self, action: Action) -> impl Future<Output = Result<Action, GpioHubError>> + Send {
        let mut tables = self.tables.lock().unwrap();
        let now = time::now();
        let id = ActionId::new(tables.allocate());
        let action = Action {
            id,
            steps: action.ordered_steps(),
            created_at: Some(now),
            updated_at: Some(now),
            ..action
        };
        tables.actions.insert(id, action.clone());
        async { Ok(action) }
    }

    fn get_by_id(
        &self,
        id: ActionId,
    ) -> impl Future<Output = Result<Option<Action>, GpioHubError>> + Send {
        let result = self.tables.lock().unwrap().actions.get(&id).cloned();
        async { Ok(result) }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Action>, GpioHubError>> + Send {
        let result: Vec<_> = self.tables.lock().unwrap().actions.values().cloned().collect();
        async { Ok(result) }
    }

    fn get_enabled(&self) -> impl Future<Output = Result<Vec<Action>, GpioHubError>> + Send {
        let result: Vec<_> = self
            .tables
            .lock()
            .unwrap()
            .actions
            .values()
            .filter(|a| a.enabled)
            .cloned()
            .collect();
        async { Ok(result) }
    }

    fn update(&self, action: Action) -> impl Future<Output = Result<Action, GpioHubError>> + Send {
        let mut tables = self.tables.lock().unwrap();
        let result = match tables.actions.get_mut(&action.id) {
            Some(existing) => {
                *existing = Action {
                    steps: action.ordered_steps(),
                    created_at: existing.created_at,
                    updated_at: Some(time::now()),
                    last_run: existing.last_run,
                    next_run: existing.next_run,
                    ..action
                };
                Ok(existing.clone())
            }
            None => Err(not_found("Action", action.id)),
        };
        async { result }
    }

    fn set_enabled(
        &self,
        id: ActionId,
        enabled: bool,
    ) -> impl Future<Output = Result<(), GpioHubError>> + Send {
        let mut tables = self.tables.lock().unwrap();
        let result = match tables.actions.get_mut(&id) {
            Some(action) => {
                action.enabled = enabled;
                Ok(())
            }
            None => Err(not_found("Action", id)),
        };
        async { result }
    }

    fn delete(&self, id: ActionId) -> impl Future<Output = Result<(), GpioHubError>> + Send {
        let mut tables = self.tables.lock().unwrap();
        let result = match tables.actions.remove(&id) {
            Some(_) => {
                tables.logs.retain(|entry| entry.action_id != id);
                Ok(())
            }
            None => Err(not_found("Action", id)),
        };
        async { result }
    }

    fn record_run(
        &self,
        id: ActionId,
        at: Timestamp,
    ) -> impl Future<Output = Result<(), GpioHubError>> + Send {
        if let Some(action) = self.tables.lock().unwrap().actions.get_mut(&id) {
            action.last_run = Some(at);
        }
        async { Ok(()) }
    }

    fn set_next_run(
        &self,
        id: ActionId,
        next_run: Option<Timestamp>,
    ) -> impl Future<Output = Result<(), GpioHubError>> + Send {
        let mut tables = self.tables.lock().unwrap();
        tables.next_runs.push((id, next_run));
        if let Some(action) = tables.actions.get_mut(&id) {
            action.next_run = next_run;
        }
        async { Ok(()) }
    }

    fn append_log(
        &self,
        entry: ExecutionLogEntry,
    ) -> impl Future<Output = Result<ExecutionLogEntry, GpioHubError>> + Send {
        let mut tables = self.tables.lock().unwrap();
        let entry = ExecutionLogEntry {
            id: tables.allocate(),
            ..entry
        };
        tables.logs.push(entry.clone());
        async { Ok(entry) }
    }

    fn get_logs(
        &self,
        id: ActionId,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<ExecutionLogEntry>, GpioHubError>> + Send {
        let result: Vec<_> = self
            .tables
            .lock()
            .unwrap()
            .logs
            .iter()
            .rev()
            .filter(|entry| entry.action_id == id)
            .take(limit as usize)
            .cloned()
            .collect();
        async { Ok(result) }
    }
}

/// One recorded line write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineWrite {
    pub line: LogicalLine,
    pub level: LineLevel,
    pub at: Instant,
}

/// Output lines that remember every write and can be told to fail.
#[derive(Clone, Default)]
pub struct RecordingLines {
    writes: Arc<Mutex<Vec<LineWrite>>>,
    failing: Arc<Mutex<HashSet<LogicalLine>>>,
}

impl RecordingLines {
    pub fn writes(&self) -> Vec<LineWrite> {
        self.writes.lock().unwrap().clone()
    }

    pub fn levels(&self) -> Vec<(LogicalLine, LineLevel)> {
        self.writes()
            .into_iter()
            .map(|w| (w.line, w.level))
            .collect()
    }

    pub fn fail_line(&self, line: LogicalLine) {
        self.failing.lock().unwrap().insert(line);
    }
}

impl OutputLines for RecordingLines {
    fn write(
        &self,
        line: LogicalLine,
        level: LineLevel,
    ) -> impl Future<Output = Result<(), GpioHubError>> + Send {
        let result = if self.failing.lock().unwrap().contains(&line) {
            Err(DeviceFault::Write {
                line,
                source: "line busy".into(),
            }
            .into())
        } else {
            self.writes.lock().unwrap().push(LineWrite {
                line,
                level,
                at: Instant::now(),
            });
            Ok(())
        };
        async { result }
    }
}
