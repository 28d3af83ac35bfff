//! Screen Recording Permission
//!
//! Preflight (CGPreflightScreenCaptureAccess) answers without prompting;
//! requesting (CGRequestScreenCaptureAccess) may show the system prompt.

use super::AuthorizationBackend;

pub async fn status(backend: &dyn AuthorizationBackend) -> bool {
    backend.screen_capture_preflight().await
}

pub async fn ensure(backend: &dyn AuthorizationBackend, interactive: bool) -> bool {
    if backend.screen_capture_preflight().await {
        return true;
    }
    if !interactive {
        return false;
    }
    tracing::info!("Requesting screen capture access");
    backend.request_screen_capture().await;
    backend.screen_capture_preflight().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SpyAuthorization;

    #[tokio::test]
    async fn test_request_then_preflight() {
        let spy = SpyAuthorization::accepting();
        assert!(ensure(&spy, true).await);
        assert_eq!(spy.prompt_count(), 1);
    }

    #[tokio::test]
    async fn test_declined_request_stays_false() {
        let spy = SpyAuthorization::default();
        assert!(!ensure(&spy, true).await);
        assert!(!status(&spy).await);
    }
}
