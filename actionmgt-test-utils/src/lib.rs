//! actionmgt Test Utilities
//!
//! Shared test infrastructure for the workspace:
//! - Store wrappers that count calls and inject write failures
//! - A recording audit logger
//! - Proptest generators for the model types
//! - Fixtures for common scenarios
//! - Assertions on the error taxonomy

pub use actionmgt_core::{
    Action, ActionMgtConfig, ActionMgtError, ActionMgtResult, ActionModel, ActionPatch,
    ActionStatus, ActionType, AuditEvent, AuditLogger, AuditOperation, AuthProperty, AuthType,
    Authentication, CacheConfig, Certificate, CertificateModel, ClientError, EndpointConfig,
    StorageError, TenantId,
};
pub use actionmgt_storage::{
    ActionCounts, ActionStore, CertificateStore, InMemoryActionStore, InMemoryCertificateStore,
};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Barrier;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn injected_failure() -> ActionMgtError {
    StorageError::Unavailable {
        reason: "injected failure".to_string(),
    }
    .into()
}

// ============================================================================
// COUNTING ACTION STORE
// ============================================================================

/// One method of [`ActionStore`] or [`CertificateStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreCall {
    AddAction,
    GetActionsByType,
    GetActionById,
    UpdateAction,
    DeleteAction,
    SetActionStatus,
    CountActionsByType,
    UpdateActionEndpoint,
    UpdateActionAuthProperties,
    AddCertificate,
    GetCertificate,
    UpdateCertificateContent,
    DeleteCertificate,
}

#[derive(Debug, Default)]
struct CallLog {
    counts: Mutex<HashMap<StoreCall, usize>>,
    fail_writes: AtomicBool,
}

impl CallLog {
    fn record(&self, call: StoreCall) {
        *lock(&self.counts).entry(call).or_insert(0) += 1;
    }

    fn calls(&self, call: StoreCall) -> usize {
        lock(&self.counts).get(&call).copied().unwrap_or(0)
    }

    fn reset(&self) {
        lock(&self.counts).clear();
    }

    /// Record a write and fail it if failures are switched on.
    fn write(&self, call: StoreCall) -> ActionMgtResult<()> {
        self.record(call);
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(injected_failure())
        } else {
            Ok(())
        }
    }
}

/// Handle on a store read held between fetching and returning.
///
/// Created by [`CountingActionStore::pause_next_read`]. The reader fetches
/// its row, then waits for [`fetched`](Self::fetched) and
/// [`resume`](Self::resume) to be called in that order.
#[derive(Debug, Clone)]
pub struct ReadPause {
    fetched: Arc<Barrier>,
    resume: Arc<Barrier>,
}

impl ReadPause {
    fn new() -> Self {
        Self {
            fetched: Arc::new(Barrier::new(2)),
            resume: Arc::new(Barrier::new(2)),
        }
    }

    /// Wait until the paused reader has its row.
    pub async fn fetched(&self) {
        self.fetched.wait().await;
    }

    /// Let the paused reader return its row.
    pub async fn resume(&self) {
        self.resume.wait().await;
    }

    async fn hold(&self) {
        self.fetched.wait().await;
        self.resume.wait().await;
    }
}

/// [`ActionStore`] wrapper counting every call that reaches it.
///
/// Placed underneath a cache-backed store it shows which reads the cache
/// served. With [`fail_writes`](Self::fail_writes) on, every write fails
/// without reaching the wrapped store.
#[derive(Debug)]
pub struct CountingActionStore<S = InMemoryActionStore> {
    inner: S,
    log: CallLog,
    count_barrier: Mutex<Option<Arc<Barrier>>>,
    read_pause: Mutex<Option<ReadPause>>,
}

impl CountingActionStore<InMemoryActionStore> {
    pub fn new() -> Self {
        Self::wrap(InMemoryActionStore::new())
    }
}

impl Default for CountingActionStore<InMemoryActionStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ActionStore> CountingActionStore<S> {
    pub fn wrap(inner: S) -> Self {
        Self {
            inner,
            log: CallLog::default(),
            count_barrier: Mutex::new(None),
            read_pause: Mutex::new(None),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn calls(&self, call: StoreCall) -> usize {
        self.log.calls(call)
    }

    pub fn reset_calls(&self) {
        self.log.reset();
    }

    pub fn fail_writes(&self, fail: bool) {
        self.log.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make the next `count_actions_by_type` callers wait on `barrier` after
    /// reading their counts, so they all observe the same snapshot.
    pub fn hold_counts_at(&self, barrier: Arc<Barrier>) {
        *lock(&self.count_barrier) = Some(barrier);
    }

    /// Hold the next `get_action_by_id` or `get_actions_by_type` after it
    /// has read the wrapped store, until the returned pause is resumed.
    pub fn pause_next_read(&self) -> ReadPause {
        let pause = ReadPause::new();
        *lock(&self.read_pause) = Some(pause.clone());
        pause
    }

    async fn maybe_pause(&self) {
        let pause = lock(&self.read_pause).take();
        if let Some(pause) = pause {
            pause.hold().await;
        }
    }
}

#[async_trait]
impl<S: ActionStore> ActionStore for CountingActionStore<S> {
    async fn add_action(&self, tenant_id: TenantId, action: &Action) -> ActionMgtResult<Action> {
        self.log.write(StoreCall::AddAction)?;
        self.inner.add_action(tenant_id, action).await
    }

    async fn get_actions_by_type(
        &self,
        tenant_id: TenantId,
        action_type: ActionType,
    ) -> ActionMgtResult<Vec<Action>> {
        self.log.record(StoreCall::GetActionsByType);
        let actions = self.inner.get_actions_by_type(tenant_id, action_type).await?;
        self.maybe_pause().await;
        Ok(actions)
    }

    async fn get_action_by_id(
        &self,
        tenant_id: TenantId,
        action_id: &str,
    ) -> ActionMgtResult<Option<Action>> {
        self.log.record(StoreCall::GetActionById);
        let found = self.inner.get_action_by_id(tenant_id, action_id).await?;
        self.maybe_pause().await;
        Ok(found)
    }

    async fn update_action(
        &self,
        tenant_id: TenantId,
        action_type: ActionType,
        action_id: &str,
        patch: &ActionPatch,
        existing: &Action,
    ) -> ActionMgtResult<Action> {
        self.log.write(StoreCall::UpdateAction)?;
        self.inner
            .update_action(tenant_id, action_type, action_id, patch, existing)
            .await
    }

    async fn delete_action(
        &self,
        tenant_id: TenantId,
        action_type: ActionType,
        action_id: &str,
        existing: &Action,
    ) -> ActionMgtResult<()> {
        self.log.write(StoreCall::DeleteAction)?;
        self.inner
            .delete_action(tenant_id, action_type, action_id, existing)
            .await
    }

    async fn set_action_status(
        &self,
        tenant_id: TenantId,
        action_type: ActionType,
        action_id: &str,
        status: ActionStatus,
    ) -> ActionMgtResult<Action> {
        self.log.write(StoreCall::SetActionStatus)?;
        self.inner
            .set_action_status(tenant_id, action_type, action_id, status)
            .await
    }

    async fn count_actions_by_type(&self, tenant_id: TenantId) -> ActionMgtResult<ActionCounts> {
        self.log.record(StoreCall::CountActionsByType);
        let counts = self.inner.count_actions_by_type(tenant_id).await?;
        let barrier = lock(&self.count_barrier).clone();
        if let Some(barrier) = barrier {
            if barrier.wait().await.is_leader() {
                *lock(&self.count_barrier) = None;
            }
        }
        Ok(counts)
    }

    async fn update_action_endpoint(
        &self,
        tenant_id: TenantId,
        action_type: ActionType,
        action_id: &str,
        endpoint: &EndpointConfig,
    ) -> ActionMgtResult<Action> {
        self.log.write(StoreCall::UpdateActionEndpoint)?;
        self.inner
            .update_action_endpoint(tenant_id, action_type, action_id, endpoint)
            .await
    }

    async fn update_action_auth_properties(
        &self,
        tenant_id: TenantId,
        action_type: ActionType,
        action_id: &str,
        authentication: &Authentication,
    ) -> ActionMgtResult<Action> {
        self.log.write(StoreCall::UpdateActionAuthProperties)?;
        self.inner
            .update_action_auth_properties(tenant_id, action_type, action_id, authentication)
            .await
    }
}

// ============================================================================
// COUNTING CERTIFICATE STORE
// ============================================================================

/// [`CertificateStore`] counterpart of [`CountingActionStore`].
#[derive(Debug)]
pub struct CountingCertificateStore<S = InMemoryCertificateStore> {
    inner: S,
    log: CallLog,
}

impl CountingCertificateStore<InMemoryCertificateStore> {
    pub fn new() -> Self {
        Self::wrap(InMemoryCertificateStore::new())
    }
}

impl Default for CountingCertificateStore<InMemoryCertificateStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: CertificateStore> CountingCertificateStore<S> {
    pub fn wrap(inner: S) -> Self {
        Self {
            inner,
            log: CallLog::default(),
        }
    }

    pub fn calls(&self, call: StoreCall) -> usize {
        self.log.calls(call)
    }

    pub fn reset_calls(&self) {
        self.log.reset();
    }

    pub fn fail_writes(&self, fail: bool) {
        self.log.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl<S: CertificateStore> CertificateStore for CountingCertificateStore<S> {
    async fn add_certificate(
        &self,
        tenant_id: TenantId,
        certificate: &Certificate,
    ) -> ActionMgtResult<Certificate> {
        self.log.write(StoreCall::AddCertificate)?;
        self.inner.add_certificate(tenant_id, certificate).await
    }

    async fn get_certificate(
        &self,
        tenant_id: TenantId,
        certificate_id: &str,
    ) -> ActionMgtResult<Option<Certificate>> {
        self.log.record(StoreCall::GetCertificate);
        self.inner.get_certificate(tenant_id, certificate_id).await
    }

    async fn update_certificate_content(
        &self,
        tenant_id: TenantId,
        certificate_id: &str,
        content: &[u8],
    ) -> ActionMgtResult<Certificate> {
        self.log.write(StoreCall::UpdateCertificateContent)?;
        self.inner
            .update_certificate_content(tenant_id, certificate_id, content)
            .await
    }

    async fn delete_certificate(
        &self,
        tenant_id: TenantId,
        certificate_id: &str,
    ) -> ActionMgtResult<()> {
        self.log.write(StoreCall::DeleteCertificate)?;
        self.inner.delete_certificate(tenant_id, certificate_id).await
    }
}

// ============================================================================
// RECORDING AUDIT LOGGER
// ============================================================================

/// Audit logger that keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingAuditLogger {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        lock(&self.events).clone()
    }

    pub fn operations(&self) -> Vec<AuditOperation> {
        lock(&self.events).iter().map(|e| e.operation).collect()
    }

    pub fn clear(&self) {
        lock(&self.events).clear();
    }
}

impl AuditLogger for RecordingAuditLogger {
    fn record(&self, event: AuditEvent) {
        lock(&self.events).push(event);
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for the model types.

    use super::*;
    use proptest::prelude::*;

    pub fn arb_tenant_id() -> impl Strategy<Value = TenantId> {
        any::<i32>().prop_map(TenantId::new)
    }

    pub fn arb_action_type() -> impl Strategy<Value = ActionType> {
        prop::sample::select(ActionType::all().to_vec())
    }

    pub fn arb_auth_type() -> impl Strategy<Value = AuthType> {
        prop::sample::select(AuthType::all().to_vec())
    }

    /// Names accepted by the action name validator.
    pub fn arb_action_name() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9_-]([a-zA-Z0-9_ -]{0,30}[a-zA-Z0-9_-])?"
    }

    pub fn arb_header_name() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z0-9-]{0,20}"
    }

    pub fn arb_secret() -> impl Strategy<Value = String> {
        "[A-Za-z0-9+/=]{8,32}"
    }

    /// A complete, valid authentication of any type.
    pub fn arb_authentication() -> impl Strategy<Value = Authentication> {
        prop_oneof![
            Just(Authentication::none()),
            ("[a-z]{3,12}", arb_secret()).prop_map(|(u, p)| Authentication::basic(u, p)),
            arb_secret().prop_map(Authentication::bearer),
            (arb_header_name(), arb_secret()).prop_map(|(h, v)| Authentication::api_key(h, v)),
        ]
    }

    pub fn arb_action_model() -> impl Strategy<Value = ActionModel> {
        (arb_action_name(), "[a-z]{3,10}", arb_authentication()).prop_map(
            |(name, host, authentication)| {
                ActionModel::new(
                    name,
                    EndpointConfig::new(format!("https://{}.example.com/hook", host), authentication),
                )
            },
        )
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built values for common scenarios.

    use super::*;

    pub const TENANT: TenantId = TenantId::new(-1234);
    pub const OTHER_TENANT: TenantId = TenantId::new(42);

    pub const ENDPOINT_URI: &str = "https://hooks.example.com/actions";

    /// A syntactically valid single-block PEM certificate.
    pub const SAMPLE_PEM: &str = "-----BEGIN CERTIFICATE-----\n\
        TUlJQ2R6Q0NBZUNnQXdJQkFnSUJBREFOQmdrcWhraUc5dzBCQVFVRkFEQUE=\n\
        -----END CERTIFICATE-----\n";

    pub const OTHER_PEM: &str = "-----BEGIN CERTIFICATE-----\n\
        TUlJQ2V6Q0NBZVNnQXdJQkFnSUJBVEFOQmdrcWhraUc5dzBCQVFzRkFEQUE=\n\
        -----END CERTIFICATE-----\n";

    pub fn basic_model(name: &str) -> ActionModel {
        ActionModel::new(
            name,
            EndpointConfig::new(ENDPOINT_URI, Authentication::basic("admin", "basic-secret")),
        )
    }

    pub fn bearer_model(name: &str) -> ActionModel {
        ActionModel::new(
            name,
            EndpointConfig::new(ENDPOINT_URI, Authentication::bearer("bearer-secret")),
        )
    }

    pub fn api_key_model(name: &str) -> ActionModel {
        ActionModel::new(
            name,
            EndpointConfig::new(ENDPOINT_URI, Authentication::api_key("X-Api-Key", "api-secret")),
        )
    }

    pub fn certificate_model(name: &str) -> CertificateModel {
        CertificateModel::new(name, SAMPLE_PEM.as_bytes().to_vec())
    }

    /// Config with the given quota and the cache on.
    pub fn config_with_quota(max_actions_per_type: usize) -> ActionMgtConfig {
        ActionMgtConfig::default().with_max_actions_per_type(max_actions_per_type)
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions on the error taxonomy.

    use super::*;

    #[track_caller]
    pub fn assert_client_error<T: std::fmt::Debug>(result: &ActionMgtResult<T>) -> ClientError {
        match result {
            Err(ActionMgtError::Client(err)) => err.clone(),
            other => panic!("Expected client error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_invalid_field<T: std::fmt::Debug>(result: &ActionMgtResult<T>, field: &str) {
        match result {
            Err(ActionMgtError::Client(ClientError::InvalidField { field: actual, .. })) => {
                assert_eq!(actual, field, "Wrong field in InvalidField error");
            }
            other => panic!("Expected InvalidField for {}, got: {:?}", field, other),
        }
    }

    #[track_caller]
    pub fn assert_action_not_found<T: std::fmt::Debug>(result: &ActionMgtResult<T>) {
        match result {
            Err(ActionMgtError::Client(ClientError::ActionNotFound { .. })) => {}
            other => panic!("Expected ActionNotFound, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_server_error<T: std::fmt::Debug>(result: &ActionMgtResult<T>) {
        match result {
            Err(err) if !err.is_client_error() => {}
            other => panic!("Expected server error, got: {:?}", other),
        }
    }
}
