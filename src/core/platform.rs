//! Host notification platform (desktop/browser notifications plus the window
//! that owns them).

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::error::PlatformError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Granted,
    Denied,
    #[default]
    Default,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShowOptions {
    pub body: String,
    pub icon: Option<String>,
    /// Notifications with the same tag replace each other
    pub tag: Option<String>,
}

pub type ClickHandler = Box<dyn Fn() + Send + Sync>;

pub trait NotificationPlatform: Send + Sync {
    fn is_supported(&self) -> bool;
    fn permission(&self) -> Permission;
    fn request_permission(&self) -> Result<Permission, PlatformError>;
    fn show(
        &self,
        title: &str,
        options: ShowOptions,
        on_click: Option<ClickHandler>,
    ) -> Result<(), PlatformError>;
    fn focus_window(&self);
    fn navigate(&self, url: &str);

    /// Supported and already granted.
    fn can_show(&self) -> bool {
        self.is_supported() && self.permission() == Permission::Granted
    }
}

/// Platform for headless hosts: logs what would have been shown.
pub struct LogPlatform {
    permission: Mutex<Permission>,
}

impl LogPlatform {
    pub fn new(permission: Permission) -> Self {
        Self {
            permission: Mutex::new(permission),
        }
    }
}

impl NotificationPlatform for LogPlatform {
    fn is_supported(&self) -> bool {
        true
    }

    fn permission(&self) -> Permission {
        self.permission
            .lock()
            .map(|p| *p)
            .unwrap_or(Permission::Denied)
    }

    fn request_permission(&self) -> Result<Permission, PlatformError> {
        let mut permission = self
            .permission
            .lock()
            .map_err(|_| PlatformError::Host("permission state poisoned".to_string()))?;
        if *permission == Permission::Default {
            *permission = Permission::Granted;
        }
        Ok(*permission)
    }

    fn show(
        &self,
        title: &str,
        options: ShowOptions,
        _on_click: Option<ClickHandler>,
    ) -> Result<(), PlatformError> {
        log::info!(
            "[push] {} - {} (tag: {})",
            title,
            options.body,
            options.tag.as_deref().unwrap_or("-")
        );
        Ok(())
    }

    fn focus_window(&self) {
        log::debug!("[push] focus window");
    }

    fn navigate(&self, url: &str) {
        log::info!("[push] navigate to {}", url);
    }
}
