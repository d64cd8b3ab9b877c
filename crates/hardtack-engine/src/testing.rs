//! Scripted in-memory platform adapter for engine tests

use async_trait::async_trait;
use hardtack_core::{Device, Error, OsType, PlatformAdapter, Result, Rule, SettingValue};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Keeps device settings in a map keyed by (device id, setting)
pub struct ScriptedAdapter {
    os_type: OsType,
    values: Mutex<HashMap<(String, String), SettingValue>>,
    hang_reads: HashSet<String>,
    failing_writes: HashSet<String>,
    ignored_writes: HashSet<String>,
    flaky_reads: Mutex<HashMap<String, u32>>,
    read_delay: Option<Duration>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    device_in_flight: Mutex<HashMap<String, usize>>,
    device_peaks: Mutex<HashMap<String, usize>>,
}

/// Counts one read as in flight until dropped, including on timeout
struct InFlight<'a> {
    adapter: &'a ScriptedAdapter,
    device_id: String,
}

impl<'a> InFlight<'a> {
    fn enter(adapter: &'a ScriptedAdapter, device_id: &str) -> Self {
        let total = adapter.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        adapter.peak_in_flight.fetch_max(total, Ordering::SeqCst);

        let mut per_device = adapter.device_in_flight.lock().unwrap();
        let count = per_device.entry(device_id.to_string()).or_insert(0);
        *count += 1;
        let mut peaks = adapter.device_peaks.lock().unwrap();
        let peak = peaks.entry(device_id.to_string()).or_insert(0);
        *peak = (*peak).max(*count);

        Self {
            adapter,
            device_id: device_id.to_string(),
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.adapter.in_flight.fetch_sub(1, Ordering::SeqCst);
        if let Some(count) = self.adapter.device_in_flight.lock().unwrap().get_mut(&self.device_id) {
            *count -= 1;
        }
    }
}

impl ScriptedAdapter {
    pub fn new(os_type: OsType) -> Self {
        Self {
            os_type,
            values: Mutex::new(HashMap::new()),
            hang_reads: HashSet::new(),
            failing_writes: HashSet::new(),
            ignored_writes: HashSet::new(),
            flaky_reads: Mutex::new(HashMap::new()),
            read_delay: None,
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            device_in_flight: Mutex::new(HashMap::new()),
            device_peaks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_value(self, device: &str, setting: &str, value: impl Into<SettingValue>) -> Self {
        self.values
            .lock()
            .unwrap()
            .insert((device.to_string(), setting.to_string()), value.into());
        self
    }

    /// Reads of `setting` never complete
    pub fn hang_on_read(mut self, setting: &str) -> Self {
        self.hang_reads.insert(setting.to_string());
        self
    }

    /// Writes of `setting` fail with an execution error
    pub fn fail_writes(mut self, setting: &str) -> Self {
        self.failing_writes.insert(setting.to_string());
        self
    }

    /// Writes of `setting` report success but change nothing
    pub fn ignore_writes(mut self, setting: &str) -> Self {
        self.ignored_writes.insert(setting.to_string());
        self
    }

    /// The first `failures` reads of `setting` report the device unreachable
    pub fn flaky_reads(self, setting: &str, failures: u32) -> Self {
        self.flaky_reads
            .lock()
            .unwrap()
            .insert(setting.to_string(), failures);
        self
    }

    /// Every read takes at least `delay`
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    /// Most reads that were in flight at once, across all devices
    pub fn peak_reads(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Most reads that were in flight at once on `device`
    pub fn peak_reads_on(&self, device: &str) -> usize {
        self.device_peaks
            .lock()
            .unwrap()
            .get(device)
            .copied()
            .unwrap_or(0)
    }

    pub fn value(&self, device: &str, setting: &str) -> Option<SettingValue> {
        self.values
            .lock()
            .unwrap()
            .get(&(device.to_string(), setting.to_string()))
            .cloned()
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlatformAdapter for ScriptedAdapter {
    fn os_type(&self) -> OsType {
        self.os_type
    }

    async fn read(&self, device: &Device, rule: &Rule) -> Result<SettingValue> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let _in_flight = InFlight::enter(self, &device.id);

        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        if self.hang_reads.contains(&rule.setting) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }

        {
            let mut flaky = self.flaky_reads.lock().unwrap();
            if let Some(remaining) = flaky.get_mut(&rule.setting) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(Error::Unreachable {
                        device_id: device.id.clone(),
                    });
                }
            }
        }

        self.value(&device.id, &rule.setting)
            .ok_or_else(|| Error::Execution {
                device_id: device.id.clone(),
                rule_id: rule.id.clone(),
                message: format!("setting {} not present", rule.setting),
            })
    }

    async fn write(&self, device: &Device, rule: &Rule, value: &SettingValue) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);

        if self.failing_writes.contains(&rule.setting) {
            return Err(Error::Execution {
                device_id: device.id.clone(),
                rule_id: rule.id.clone(),
                message: "permission denied".into(),
            });
        }
        if !self.ignored_writes.contains(&rule.setting) {
            self.values
                .lock()
                .unwrap()
                .insert((device.id.clone(), rule.setting.clone()), value.clone());
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
