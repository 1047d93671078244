use serde::Serialize;
use uuid::Uuid;

/// Why a sub-computation fell back to its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DegradeReason {
    /// The active goal points at a role that no longer exists.
    RoleNotFound { role_id: Uuid },
    /// A progress entry references a resource missing from the catalog.
    ResourceNotFound { resource_id: Uuid },
    /// A refresh failed; the value is the last one computed successfully.
    StaleData { detail: String },
}

impl DegradeReason {
    pub fn describe(&self) -> String {
        match self {
            Self::RoleNotFound { role_id } => format!("target role {role_id} no longer exists"),
            Self::ResourceNotFound { resource_id } => {
                format!("learning resource {resource_id} no longer exists")
            }
            Self::StaleData { detail } => format!("data may be stale: {detail}"),
        }
    }
}

/// Result of one dashboard sub-computation. A degraded result still carries a
/// usable value, so the aggregator composes fields without aborting.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Ok(T),
    Degraded { value: T, reasons: Vec<DegradeReason> },
}

impl<T> Outcome<T> {
    pub fn degraded(value: T, reason: DegradeReason) -> Self {
        Self::Degraded {
            value,
            reasons: vec![reason],
        }
    }

    pub fn value(&self) -> &T {
        match self {
            Self::Ok(value) | Self::Degraded { value, .. } => value,
        }
    }

    /// Splits into the value and the reasons (empty when `Ok`).
    pub fn into_parts(self) -> (T, Vec<DegradeReason>) {
        match self {
            Self::Ok(value) => (value, Vec::new()),
            Self::Degraded { value, reasons } => (value, reasons),
        }
    }

    /// Folds the reasons into `sink` and returns the value.
    pub fn collect_into(self, sink: &mut Vec<DegradeReason>) -> T {
        let (value, reasons) = self.into_parts();
        sink.extend(reasons);
        value
    }
}
