//! End-to-end tests for the redirect landing flow: exchange, persistence,
//! navigation and teardown.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use md2docx_core::auth::{
    AuthorizationExchange, CallbackController, CallbackOutcome, CallbackState, CookieOptions,
    CredentialBundle, CredentialStore, MemoryCookieJar, Navigator, SessionState, SESSION_TTL_MS,
};

// ============================================================================
// Test Setup
// ============================================================================

#[derive(Default)]
struct RecordingNavigator {
    events: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn push(&self, route: &str) {
        self.events.lock().unwrap().push(format!("push {}", route));
    }

    fn refresh(&self) {
        self.events.lock().unwrap().push("refresh".to_string());
    }

    fn open_external(&self, url: &str) {
        self.events.lock().unwrap().push(format!("open {}", url));
    }
}

struct Harness {
    server: MockServer,
    exchange: Arc<AuthorizationExchange>,
    store: Arc<CredentialStore>,
    navigator: Arc<RecordingNavigator>,
}

impl Harness {
    async fn new() -> Self {
        let server = MockServer::start().await;
        let exchange = Arc::new(AuthorizationExchange::new(&server.uri()).unwrap());
        let store = Arc::new(CredentialStore::new(
            MemoryCookieJar::new(),
            CookieOptions::default(),
        ));
        Self {
            server,
            exchange,
            store,
            navigator: Arc::new(RecordingNavigator::default()),
        }
    }

    fn mount(
        &self,
        redirect: &str,
    ) -> (
        CallbackController,
        md2docx_core::auth::MountHandle,
        tokio::sync::watch::Receiver<CallbackState>,
    ) {
        CallbackController::mount(
            redirect,
            self.exchange.clone(),
            self.store.clone(),
            self.navigator.clone(),
        )
    }

    async fn respond(&self, template: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path("/auth/google/callback"))
            .respond_with(template)
            .mount(&self.server)
            .await;
    }

    async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|r| r.len())
            .unwrap_or(0)
    }

    /// Wait until the exchange request has reached the server
    async fn wait_for_request(&self) {
        for _ in 0..200 {
            if self.request_count().await > 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("exchange request never arrived");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn missing_code_fails_without_network_call() {
    let h = Harness::new().await;

    let (controller, _handle, state) = h.mount("/oauth/callback?state=xyz");
    let outcome = controller.run().await;

    assert_eq!(
        outcome,
        CallbackOutcome::Failed("No authorization code found".to_string())
    );
    assert_eq!(
        *state.borrow(),
        CallbackState::Failed("No authorization code found".to_string())
    );
    assert_eq!(h.request_count().await, 0);
    assert!(h.navigator.events().is_empty());
    assert_eq!(h.store.read(), None);
}

#[tokio::test]
async fn successful_exchange_persists_and_redirects_once() {
    let h = Harness::new().await;
    Mock::given(method("POST"))
        .and(path("/auth/google/callback"))
        .and(body_json(json!({"code": "good-code"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "A",
            "refresh_token": "R",
            "user": {"name": "u"}
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let before = Utc::now().timestamp_millis();
    let (controller, _handle, state) = h.mount("http://localhost:3000/oauth/callback?code=good-code");
    let outcome = controller.run().await;
    let after = Utc::now().timestamp_millis();

    assert_eq!(outcome, CallbackOutcome::Redirected);
    assert_eq!(*state.borrow(), CallbackState::Redirecting);

    let bundle = h.store.read().expect("credentials persisted");
    assert_eq!(bundle.access_token, "A");
    assert_eq!(bundle.refresh_token.as_deref(), Some("R"));
    assert_eq!(bundle.user_info, Some(json!({"name": "u"})));
    assert!(bundle.expires_at >= before + SESSION_TTL_MS);
    assert!(bundle.expires_at <= after + SESSION_TTL_MS);

    assert_eq!(h.navigator.events(), vec!["push /", "refresh"]);
    assert!(SessionState::new(&h.store).is_authenticated());
}

#[tokio::test]
async fn rejected_exchange_fails_with_server_message_and_no_write() {
    let h = Harness::new().await;
    h.respond(ResponseTemplate::new(401).set_body_json(json!({"message": "invalid_grant"})))
        .await;

    let (controller, _handle, state) = h.mount("/oauth/callback?code=stale");
    let outcome = controller.run().await;

    assert_eq!(outcome, CallbackOutcome::Failed("invalid_grant".to_string()));
    assert_eq!(
        state.borrow().error_message(),
        Some("invalid_grant")
    );
    assert_eq!(h.store.read(), None);
    assert!(h.navigator.events().is_empty());
}

#[tokio::test]
async fn rejected_exchange_leaves_prior_session_untouched() {
    let h = Harness::new().await;
    let prior = CredentialBundle::issued_at("OLD".to_string(), None, None, Utc::now());
    h.store.write(&prior, &h.store.default_options()).unwrap();
    h.respond(ResponseTemplate::new(401).set_body_json(json!({"message": "invalid_grant"})))
        .await;

    let (controller, _handle, _state) = h.mount("/oauth/callback?code=stale");
    controller.run().await;

    assert_eq!(h.store.read(), Some(prior));
}

#[tokio::test]
async fn malformed_success_response_is_a_failure() {
    let h = Harness::new().await;
    h.respond(ResponseTemplate::new(200).set_body_json(json!({"refresh_token": "R"})))
        .await;

    let (controller, _handle, _state) = h.mount("/oauth/callback?code=abc");
    let outcome = controller.run().await;

    assert_eq!(
        outcome,
        CallbackOutcome::Failed("Authentication failed. Please try again.".to_string())
    );
    assert_eq!(h.store.read(), None);
}

#[tokio::test]
async fn teardown_during_successful_exchange_suppresses_effects() {
    let h = Harness::new().await;
    h.respond(
        ResponseTemplate::new(200)
            .set_body_json(json!({"access_token": "A"}))
            .set_delay(Duration::from_millis(300)),
    )
    .await;

    let (controller, handle, state) = h.mount("/oauth/callback?code=abc");
    let task = tokio::spawn(controller.run());

    h.wait_for_request().await;
    assert_eq!(*state.borrow(), CallbackState::Exchanging);
    drop(handle);

    let outcome = task.await.unwrap();
    assert_eq!(outcome, CallbackOutcome::Abandoned);
    assert_eq!(*state.borrow(), CallbackState::Exchanging);
    assert_eq!(h.store.read(), None);
    assert!(h.navigator.events().is_empty());
}

#[tokio::test]
async fn teardown_during_failed_exchange_suppresses_error_state() {
    let h = Harness::new().await;
    h.respond(
        ResponseTemplate::new(401)
            .set_body_json(json!({"message": "invalid_grant"}))
            .set_delay(Duration::from_millis(300)),
    )
    .await;

    let (controller, handle, state) = h.mount("/oauth/callback?code=abc");
    let task = tokio::spawn(controller.run());

    h.wait_for_request().await;
    handle.unmount();

    assert_eq!(task.await.unwrap(), CallbackOutcome::Abandoned);
    assert_eq!(*state.borrow(), CallbackState::Exchanging);
}

#[tokio::test]
async fn remount_with_same_code_does_not_exchange_again() {
    let h = Harness::new().await;
    Mock::given(method("POST"))
        .and(path("/auth/google/callback"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "A"}))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let (first, first_handle, _) = h.mount("/oauth/callback?code=abc");
    let first_task = tokio::spawn(first.run());
    h.wait_for_request().await;
    drop(first_handle);

    // Fast remount while the URL still carries the consumed code
    let (second, _second_handle, _) = h.mount("/oauth/callback?code=abc");
    let second_outcome = second.run().await;

    assert!(matches!(second_outcome, CallbackOutcome::Failed(_)));
    assert_eq!(first_task.await.unwrap(), CallbackOutcome::Abandoned);
    assert_eq!(h.request_count().await, 1);
    assert_eq!(h.store.read(), None);
    assert!(h.navigator.events().is_empty());
}

#[tokio::test]
async fn controller_unmounted_before_run_does_nothing() {
    let h = Harness::new().await;
    let (controller, handle, _) = h.mount("/oauth/callback?code=abc");
    drop(handle);

    assert_eq!(controller.run().await, CallbackOutcome::Abandoned);
    assert_eq!(h.request_count().await, 0);
}

#[tokio::test]
async fn unavailable_storage_still_redirects() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/google/callback"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "A"})))
        .mount(&server)
        .await;

    let navigator = Arc::new(RecordingNavigator::default());
    let store = Arc::new(CredentialStore::unavailable());
    let (controller, _handle, _) = CallbackController::mount(
        "/oauth/callback?code=abc",
        Arc::new(AuthorizationExchange::new(&server.uri()).unwrap()),
        store.clone(),
        navigator.clone(),
    );

    assert_eq!(controller.run().await, CallbackOutcome::Redirected);
    assert_eq!(store.read(), None);
    assert_eq!(navigator.events(), vec!["push /", "refresh"]);
}
