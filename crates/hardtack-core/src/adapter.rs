//! Platform adapter capability - the interface every OS backend implements

use crate::device::Device;
use crate::error::Result;
use crate::rule::Rule;
use crate::severity::OsType;
use crate::value::SettingValue;

/// Reads and writes configuration values for rules on one operating system
///
/// Both operations must be safe to retry. Callers bound each call with a
/// timeout, so implementations may block for as long as the transport does.
#[async_trait::async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Operating system this adapter serves
    fn os_type(&self) -> OsType;

    /// Read the current value of `rule.setting` on the device
    async fn read(&self, device: &Device, rule: &Rule) -> Result<SettingValue>;

    /// Write `value` to `rule.setting` on the device
    async fn write(&self, device: &Device, rule: &Rule, value: &SettingValue) -> Result<()>;

    /// Adapter name for logging
    fn name(&self) -> &str {
        self.os_type().as_str()
    }
}
