use crate::errors::CameraError;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Permission status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PermissionStatus {
    /// Permission granted
    Granted,
    /// Permission denied
    Denied,
    /// Permission not determined (user hasn't been asked yet)
    NotDetermined,
    /// Permission restricted (parental controls, etc)
    Restricted,
}

impl std::fmt::Display for PermissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionStatus::Granted => write!(f, "granted"),
            PermissionStatus::Denied => write!(f, "denied"),
            PermissionStatus::NotDetermined => write!(f, "not_determined"),
            PermissionStatus::Restricted => write!(f, "restricted"),
        }
    }
}

/// Detailed permission information
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PermissionInfo {
    pub status: PermissionStatus,
    pub message: String,
    pub can_request: bool,
}

impl PermissionInfo {
    pub fn granted() -> Self {
        Self {
            status: PermissionStatus::Granted,
            message: "Camera access authorized".to_string(),
            can_request: false,
        }
    }

    pub fn not_determined() -> Self {
        Self {
            status: PermissionStatus::NotDetermined,
            message: "Camera permission not yet requested".to_string(),
            can_request: true,
        }
    }

    pub fn denied(message: impl Into<String>) -> Self {
        Self {
            status: PermissionStatus::Denied,
            message: message.into(),
            can_request: false,
        }
    }

    pub fn is_granted(&self) -> bool {
        self.status == PermissionStatus::Granted
    }
}

/// Source of camera permission answers for a platform.
pub trait PermissionProvider: Send + Sync {
    /// Current status, without prompting
    fn check(&self) -> PermissionInfo;

    /// Prompt for access and block until the user answers
    fn request(&self) -> PermissionInfo;
}

/// Gate every capture path runs through before touching the camera
#[derive(Clone)]
pub struct PermissionGate {
    provider: Arc<dyn PermissionProvider>,
}

impl PermissionGate {
    pub fn new(provider: Arc<dyn PermissionProvider>) -> Self {
        Self { provider }
    }

    pub fn check(&self) -> PermissionInfo {
        self.provider.check()
    }

    /// Ask for access if it has not been decided yet and report the outcome
    pub fn request(&self) -> PermissionInfo {
        let current = self.provider.check();
        if current.is_granted() {
            log::debug!("Camera permission already granted");
            return current;
        }
        if !current.can_request {
            log::warn!("Cannot request camera permission: {}", current.message);
            return current;
        }

        log::info!("Requesting camera permission");
        let answer = self.provider.request();
        match answer.status {
            PermissionStatus::Granted => log::info!("Camera permission granted"),
            _ => log::warn!("Camera permission {}: {}", answer.status, answer.message),
        }
        answer
    }

    /// Succeeds only once access is granted
    pub fn ensure_granted(&self) -> Result<PermissionInfo, CameraError> {
        let info = self.request();
        if info.is_granted() {
            Ok(info)
        } else {
            Err(CameraError::PermissionDenied(format!(
                "{} ({})",
                info.message, info.status
            )))
        }
    }
}

/// Provider with a fixed answer, counting how often the user was prompted
#[derive(Debug)]
pub struct StaticPermissions {
    initial: PermissionInfo,
    answer: PermissionInfo,
    answered: std::sync::Mutex<bool>,
    requests: AtomicU32,
}

impl StaticPermissions {
    /// Access already granted
    pub fn granted() -> Self {
        Self::new(PermissionInfo::granted(), PermissionInfo::granted())
    }

    /// Not asked yet; the prompt grants access
    pub fn grant_on_request() -> Self {
        Self::new(PermissionInfo::not_determined(), PermissionInfo::granted())
    }

    /// Not asked yet; the prompt denies access
    pub fn deny_on_request() -> Self {
        Self::new(
            PermissionInfo::not_determined(),
            PermissionInfo::denied("Camera access denied by user"),
        )
    }

    pub fn new(initial: PermissionInfo, answer: PermissionInfo) -> Self {
        Self {
            initial,
            answer,
            answered: std::sync::Mutex::new(false),
            requests: AtomicU32::new(0),
        }
    }

    pub fn request_count(&self) -> u32 {
        self.requests.load(Ordering::SeqCst)
    }
}

impl PermissionProvider for StaticPermissions {
    fn check(&self) -> PermissionInfo {
        let answered = self.answered.lock().map(|g| *g).unwrap_or(false);
        if answered {
            self.answer.clone()
        } else {
            self.initial.clone()
        }
    }

    fn request(&self) -> PermissionInfo {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut answered) = self.answered.lock() {
            *answered = true;
        }
        self.answer.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_granted_does_not_prompt() {
        let provider = Arc::new(StaticPermissions::granted());
        let gate = PermissionGate::new(provider.clone());
        assert!(gate.ensure_granted().is_ok());
        assert_eq!(provider.request_count(), 0);
    }

    #[test]
    fn test_prompt_then_grant() {
        let provider = Arc::new(StaticPermissions::grant_on_request());
        let gate = PermissionGate::new(provider.clone());
        assert_eq!(gate.check().status, PermissionStatus::NotDetermined);
        assert!(gate.ensure_granted().is_ok());
        assert_eq!(provider.request_count(), 1);

        // Answer is remembered
        assert!(gate.ensure_granted().is_ok());
        assert_eq!(provider.request_count(), 1);
    }

    #[test]
    fn test_denial_is_an_error() {
        let gate = PermissionGate::new(Arc::new(StaticPermissions::deny_on_request()));
        match gate.ensure_granted() {
            Err(CameraError::PermissionDenied(msg)) => assert!(msg.contains("denied")),
            other => panic!("expected PermissionDenied, got {:?}", other),
        }
    }

    #[test]
    fn test_restricted_is_not_requested() {
        let provider = Arc::new(StaticPermissions::new(
            PermissionInfo {
                status: PermissionStatus::Restricted,
                message: "Camera access restricted by system policy".to_string(),
                can_request: false,
            },
            PermissionInfo::granted(),
        ));
        let gate = PermissionGate::new(provider.clone());
        assert!(gate.ensure_granted().is_err());
        assert_eq!(provider.request_count(), 0);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(PermissionStatus::NotDetermined.to_string(), "not_determined");
    }
}
