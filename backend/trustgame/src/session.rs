//! Selected-contract context.
//!
//! Operations that act on "the current experiment" take a [`Session`] and
//! resolve the contract id in one fixed order: explicit argument, then the
//! session's selection, then the statically configured `APP_ID`.

use tracing::{debug, warn};

use crate::errors::{ClientError, Result};

#[derive(Debug, Clone, Default)]
pub struct Session {
    selected_app_id: Option<u64>,
    configured_app_id: Option<u64>,
}

impl Session {
    pub fn new(configured_app_id: Option<u64>) -> Self {
        Self {
            selected_app_id: None,
            configured_app_id: configured_app_id.filter(|id| *id > 0),
        }
    }

    /// Select a contract for subsequent operations. Zero is ignored.
    pub fn select(&mut self, app_id: u64) {
        if app_id == 0 {
            warn!("Ignoring selection of contract id 0");
            return;
        }
        self.selected_app_id = Some(app_id);
    }

    pub fn clear(&mut self) {
        self.selected_app_id = None;
    }

    pub fn selected(&self) -> Option<u64> {
        self.selected_app_id
    }

    pub fn resolve_app_id(&self, explicit: Option<u64>) -> Result<u64> {
        let resolved = explicit
            .filter(|id| *id > 0)
            .or(self.selected_app_id)
            .or(self.configured_app_id)
            .ok_or_else(|| {
                ClientError::Config(
                    "No contract selected and APP_ID is missing or invalid".to_string(),
                )
            })?;
        debug!("Resolved contract id {resolved}");
        Ok(resolved)
    }
}
