//! Managed device inventory records

use crate::severity::OsType;
use serde::{Deserialize, Serialize};

/// A device under management
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Stable device identifier
    pub id: String,
    pub hostname: String,
    pub os_type: OsType,
    /// Admin whose fleet this device belongs to
    pub admin_id: String,
    /// Employee the device is issued to, if any
    #[serde(default)]
    pub employee_id: Option<String>,
}

impl Device {
    pub fn new(
        id: impl Into<String>,
        hostname: impl Into<String>,
        os_type: OsType,
        admin_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            hostname: hostname.into(),
            os_type,
            admin_id: admin_id.into(),
            employee_id: None,
        }
    }

    pub fn with_employee(mut self, employee_id: impl Into<String>) -> Self {
        self.employee_id = Some(employee_id.into());
        self
    }
}
