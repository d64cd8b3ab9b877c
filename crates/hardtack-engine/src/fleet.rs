//! Fleet runner - bounded-concurrency runs across every assigned device

use crate::engine::{ComplianceEngine, EnforceOutcome};
use hardtack_core::{Error, Result, RuleEvaluation};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// Outcome of one device in a fleet run
#[derive(Debug)]
pub struct DeviceRun<T> {
    pub device_id: String,
    pub result: Result<T>,
}

impl<T> DeviceRun<T> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Runs the engine over every device that has an assignment
///
/// At most `concurrency` devices are in flight; rules within one device run
/// sequentially. A failing device does not stop the others.
pub struct FleetRunner {
    engine: Arc<ComplianceEngine>,
    concurrency: usize,
}

impl FleetRunner {
    pub fn new(engine: Arc<ComplianceEngine>) -> Self {
        let concurrency = engine.config().max_concurrent_devices.max(1);
        Self {
            engine,
            concurrency,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn engine(&self) -> &Arc<ComplianceEngine> {
        &self.engine
    }

    /// Stop starting new devices and rules; work in flight finishes
    pub fn cancel(&self) {
        self.engine.cancel_flag().cancel();
    }

    /// Check every assigned device against its rulebook
    pub async fn check_fleet(&self) -> Result<Vec<DeviceRun<Vec<RuleEvaluation>>>> {
        self.run("check", |engine, device_id| async move {
            engine.check_device(&device_id).await
        })
        .await
    }

    /// Check and remediate every assigned device
    pub async fn enforce_fleet(&self, dry_run: bool) -> Result<Vec<DeviceRun<EnforceOutcome>>> {
        self.run("enforce", move |engine, device_id| async move {
            engine.enforce(&device_id, dry_run).await
        })
        .await
    }

    async fn run<T, F, Fut>(&self, operation: &'static str, task: F) -> Result<Vec<DeviceRun<T>>>
    where
        T: Send + 'static,
        F: Fn(Arc<ComplianceEngine>, String) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let mut device_ids: Vec<String> = self
            .engine
            .stores()
            .assignments
            .assignments()?
            .into_iter()
            .map(|a| a.device_id)
            .collect();
        device_ids.sort();
        device_ids.dedup();

        info!(
            operation,
            devices = device_ids.len(),
            concurrency = self.concurrency,
            "Starting fleet run"
        );

        let cancel = self.engine.cancel_flag();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(device_ids.len());

        for device_id in device_ids {
            if cancel.is_cancelled() {
                handles.push((device_id, None));
                continue;
            }

            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| Error::Internal(format!("fleet semaphore closed: {}", e)))?;

            if cancel.is_cancelled() {
                drop(permit);
                handles.push((device_id, None));
                continue;
            }

            let work = task(self.engine.clone(), device_id.clone());
            let handle = tokio::spawn(async move {
                let result = work.await;
                drop(permit);
                result
            });
            handles.push((device_id, Some(handle)));
        }

        let mut runs = Vec::with_capacity(handles.len());
        for (device_id, handle) in handles {
            let result = match handle {
                Some(handle) => match handle.await {
                    Ok(result) => result,
                    Err(e) => Err(Error::Internal(format!(
                        "{} task for {} did not complete: {}",
                        operation, device_id, e
                    ))),
                },
                None => Err(Error::Cancelled {
                    reason: format!("{} cancelled before {} started", operation, device_id),
                }),
            };
            if let Err(e) = &result {
                warn!(operation, device = %device_id, error = %e, "Device run failed");
            }
            runs.push(DeviceRun { device_id, result });
        }

        info!(
            operation,
            devices = runs.len(),
            failed = runs.iter().filter(|r| !r.is_ok()).count(),
            "Fleet run finished"
        );
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineConfig, EngineStores};
    use crate::registry::AdapterRegistry;
    use crate::retry::RetryPolicy;
    use crate::testing::ScriptedAdapter;
    use hardtack_catalog::builtin_catalog;
    use hardtack_core::{
        BaselineLevel, Device, DeviceStore, EvaluationStatus, ExpectedValue, OsType,
        RulebookContent, SettingValue,
    };
    use hardtack_policy::{PolicyAssigner, RulebookChain};
    use hardtack_store::MemoryStore;
    use std::time::Duration;

    struct Fleet {
        runner: FleetRunner,
        adapter: Arc<ScriptedAdapter>,
    }

    fn fleet(device_count: usize) -> Fleet {
        fleet_with(device_count, ScriptedAdapter::new(OsType::Linux))
    }

    fn fleet_with(device_count: usize, mut adapter: ScriptedAdapter) -> Fleet {
        let store = MemoryStore::new();
        let catalog = Arc::new(builtin_catalog().unwrap());

        for n in 1..=device_count {
            let id = format!("d{}", n);
            store
                .add_device(Device::new(&id, format!("host-{}.corp", n), OsType::Linux, "alice"))
                .unwrap();
            adapter = adapter
                .with_value(&id, "sshd.permit_root_login", true)
                .with_value(&id, "sysctl.net.ipv4.ip_forward", false);
        }

        let chain = Arc::new(RulebookChain::new(catalog.clone(), Arc::new(store.clone())));
        chain
            .publish(
                RulebookContent::new(BaselineLevel::Moderate)
                    .with_rule("RULE-101", false)
                    .with_rule("RULE-301", ExpectedValue::from(false)),
                "moderate",
                "alice",
            )
            .unwrap();
        PolicyAssigner::new("alice", chain, Arc::new(store.clone()), Arc::new(store.clone()))
            .assign_all("moderate")
            .unwrap();

        let adapter = Arc::new(adapter);
        let engine = ComplianceEngine::new(
            catalog,
            AdapterRegistry::new().with(adapter.clone()),
            EngineStores::shared(store),
            EngineConfig {
                operation_timeout: Duration::from_millis(100),
                max_concurrent_devices: 2,
                retry: RetryPolicy::none(),
            },
        );

        Fleet {
            runner: FleetRunner::new(Arc::new(engine)),
            adapter,
        }
    }

    #[tokio::test]
    async fn test_check_fleet_covers_every_device() {
        let fleet = fleet(3);
        let runs = fleet.runner.check_fleet().await.unwrap();

        assert_eq!(
            runs.iter().map(|r| r.device_id.as_str()).collect::<Vec<_>>(),
            vec!["d1", "d2", "d3"]
        );
        for run in &runs {
            let evaluations = run.result.as_ref().unwrap();
            assert_eq!(evaluations.len(), 2);
            assert_eq!(evaluations[0].status, EvaluationStatus::NonCompliant);
            assert_eq!(evaluations[1].status, EvaluationStatus::Compliant);
        }
        assert_eq!(fleet.adapter.write_count(), 0);

        let status = fleet.runner.engine().reporter().status(None, true).unwrap();
        assert_eq!(status.summary.devices, 3);
        assert_eq!(status.summary.failing, 3);
        assert_eq!(status.entries.len(), 3);
    }

    #[tokio::test]
    async fn test_enforce_fleet_remediates_drift() {
        let fleet = fleet(4).runner.with_concurrency(3);
        let runs = fleet.enforce_fleet(false).await.unwrap();

        assert_eq!(runs.len(), 4);
        assert!(runs.iter().all(|r| r.is_ok()));
        for run in &runs {
            let outcome = run.result.as_ref().unwrap();
            assert_eq!(outcome.actions.succeeded, vec!["RULE-101"]);
        }

        let status = fleet.engine().reporter().status(None, false).unwrap();
        assert!(status.summary.is_compliant());
    }

    #[tokio::test]
    async fn test_enforce_fleet_dry_run() {
        let fleet = fleet(2);
        let runs = fleet.runner.enforce_fleet(true).await.unwrap();

        assert_eq!(runs.len(), 2);
        for run in &runs {
            assert_eq!(run.result.as_ref().unwrap().actions.planned.len(), 1);
        }
        assert_eq!(fleet.adapter.write_count(), 0);
        assert_eq!(
            fleet.adapter.value("d1", "sshd.permit_root_login"),
            Some(SettingValue::Bool(true))
        );
    }

    #[tokio::test]
    async fn test_cancelled_fleet_starts_nothing() {
        let fleet = fleet(2);
        fleet.runner.cancel();

        let runs = fleet.runner.check_fleet().await.unwrap();
        assert_eq!(runs.len(), 2);
        assert!(runs
            .iter()
            .all(|r| matches!(r.result, Err(Error::Cancelled { .. }))));
        assert_eq!(fleet.adapter.read_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_fleet() {
        let fleet = fleet(0);
        let runs = fleet.runner.check_fleet().await.unwrap();
        assert!(runs.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_devices_in_flight_are_bounded() {
        let adapter = ScriptedAdapter::new(OsType::Linux).with_read_delay(Duration::from_millis(10));
        let fleet = fleet_with(6, adapter);
        let runner = fleet.runner.with_concurrency(2);

        let runs = runner.check_fleet().await.unwrap();
        assert_eq!(runs.len(), 6);
        assert!(runs.iter().all(|r| r.is_ok()));

        assert_eq!(fleet.adapter.read_count(), 12);
        assert!(fleet.adapter.peak_reads() >= 1);
        assert!(fleet.adapter.peak_reads() <= 2);
        for n in 1..=6 {
            assert_eq!(fleet.adapter.peak_reads_on(&format!("d{}", n)), 1);
        }
    }
}
