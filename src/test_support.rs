//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::env;
use std::ffi::OsString;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::{Mutex as AsyncMutex, MutexGuard};

use crate::backend::{
    ApiError, BackendFuture, DeleteInstanceRequest, DescribeQuery, ProvisioningApi,
    RemoteInstanceState,
};
use crate::controller::{Clock, SleepFuture};
use crate::instance::DesiredInstance;
use crate::secrets::{SecretStore, SecretStoreError};

/// Builds a remote state with an ARN in a fixed test account.
#[must_use]
pub fn remote_state(identifier: &str, status: &str) -> RemoteInstanceState {
    let mut state = RemoteInstanceState::new(identifier, status);
    state.arn = Some(format!("arn:aws:rds:eu-west-1:123456789012:db:{identifier}"));
    state
}

fn locked<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type DescribeResponse = Result<Vec<RemoteInstanceState>, ApiError>;

/// Queued describe answer. BDD step contexts must not hold `Result`
/// values.
#[derive(Clone, Debug)]
enum ScriptedDescribe {
    States(Vec<RemoteInstanceState>),
    Failure(ApiError),
}

impl ScriptedDescribe {
    fn from_response(response: DescribeResponse) -> Self {
        match response {
            Ok(states) => Self::States(states),
            Err(error) => Self::Failure(error),
        }
    }

    fn into_response(self) -> DescribeResponse {
        match self {
            Self::States(states) => Ok(states),
            Self::Failure(error) => Err(error),
        }
    }
}

#[derive(Debug, Default)]
struct ScriptState {
    create_error: Option<ApiError>,
    create_response: Option<RemoteInstanceState>,
    delete_error: Option<ApiError>,
    describe_responses: VecDeque<ScriptedDescribe>,
    created: Vec<String>,
    deletes: Vec<DeleteInstanceRequest>,
    describes: Vec<DescribeQuery>,
}

/// Provisioning API double that replays scripted describe responses.
///
/// Create and delete are accepted unless a rejection is queued. Describe
/// responses are served in FIFO order; the last one repeats once the queue
/// is down to a single entry. An empty script describes nothing.
#[derive(Clone, Debug, Default)]
pub struct ScriptedProvisioningApi {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedProvisioningApi {
    /// Creates a double with no scripted responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next create request fail with `error`.
    pub fn reject_create(&self, error: ApiError) {
        locked(&self.state).create_error = Some(error);
    }

    /// Makes the next create request answer with `state` instead of a
    /// `creating` state carrying an ARN.
    pub fn accept_create_with(&self, state: RemoteInstanceState) {
        locked(&self.state).create_response = Some(state);
    }

    /// Makes the next delete request fail with `error`.
    pub fn reject_delete(&self, error: ApiError) {
        locked(&self.state).delete_error = Some(error);
    }

    /// Queues a raw describe response.
    pub fn push_describe(&self, response: DescribeResponse) {
        locked(&self.state)
            .describe_responses
            .push_back(ScriptedDescribe::from_response(response));
    }

    /// Queues a describe response reporting `identifier` in `status`.
    pub fn push_status(&self, identifier: &str, status: &str) {
        self.push_describe(Ok(vec![remote_state(identifier, status)]));
    }

    /// Queues `count` describe responses reporting `identifier` in `status`.
    pub fn push_statuses(&self, identifier: &str, status: &str, count: usize) {
        for _ in 0..count {
            self.push_status(identifier, status);
        }
    }

    /// Queues a not-found describe error.
    pub fn push_not_found(&self, identifier: &str) {
        self.push_describe(Err(ApiError::NotFound {
            identifier: identifier.to_owned(),
        }));
    }

    /// Number of create requests received.
    #[must_use]
    pub fn create_calls(&self) -> usize {
        locked(&self.state).created.len()
    }

    /// Number of describe requests received.
    #[must_use]
    pub fn describe_calls(&self) -> usize {
        locked(&self.state).describes.len()
    }

    /// Describe queries received, in order.
    #[must_use]
    pub fn describe_queries(&self) -> Vec<DescribeQuery> {
        locked(&self.state).describes.clone()
    }

    /// Delete requests received, in order.
    #[must_use]
    pub fn delete_requests(&self) -> Vec<DeleteInstanceRequest> {
        locked(&self.state).deletes.clone()
    }
}

impl ProvisioningApi for ScriptedProvisioningApi {
    fn create_instance<'a>(
        &'a self,
        desired: &'a DesiredInstance,
    ) -> BackendFuture<'a, RemoteInstanceState, ApiError> {
        Box::pin(async move {
            let mut state = locked(&self.state);
            state.created.push(desired.identifier().to_owned());
            if let Some(error) = state.create_error.take() {
                return Err(error);
            }
            Ok(state
                .create_response
                .take()
                .unwrap_or_else(|| remote_state(desired.identifier(), "creating")))
        })
    }

    fn describe_instances<'a>(
        &'a self,
        query: &'a DescribeQuery,
    ) -> BackendFuture<'a, Vec<RemoteInstanceState>, ApiError> {
        Box::pin(async move {
            let mut state = locked(&self.state);
            state.describes.push(query.clone());
            if state.describe_responses.len() > 1 {
                state.describe_responses.pop_front()
            } else {
                state.describe_responses.front().cloned()
            }
            .map_or_else(|| Ok(Vec::new()), ScriptedDescribe::into_response)
        })
    }

    fn delete_instance<'a>(
        &'a self,
        request: &'a DeleteInstanceRequest,
    ) -> BackendFuture<'a, RemoteInstanceState, ApiError> {
        Box::pin(async move {
            let mut state = locked(&self.state);
            state.deletes.push(request.clone());
            state
                .delete_error
                .take()
                .map_or_else(|| Ok(remote_state(&request.identifier, "deleting")), Err)
        })
    }
}

#[derive(Clone, Debug)]
enum StoredSecret {
    Payload(String),
    Failure(SecretStoreError),
}

/// Secret store double backed by an in-memory map.
#[derive(Clone, Debug, Default)]
pub struct StaticSecretStore {
    payloads: HashMap<String, StoredSecret>,
    requests: Arc<Mutex<Vec<(String, String)>>>,
}

impl StaticSecretStore {
    /// Creates an empty store; every lookup misses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `payload` under `name`.
    #[must_use]
    pub fn with_secret(mut self, name: &str, payload: &str) -> Self {
        self.payloads
            .insert(name.to_owned(), StoredSecret::Payload(payload.to_owned()));
        self
    }

    /// Makes lookups of `name` fail with `error`.
    #[must_use]
    pub fn with_failure(mut self, name: &str, error: SecretStoreError) -> Self {
        self.payloads
            .insert(name.to_owned(), StoredSecret::Failure(error));
        self
    }

    /// Returns `(secret_id, version_stage)` pairs requested so far.
    #[must_use]
    pub fn requests(&self) -> Vec<(String, String)> {
        locked(&self.requests).clone()
    }
}

impl SecretStore for StaticSecretStore {
    fn secret_string<'a>(
        &'a self,
        secret_id: &'a str,
        version_stage: &'a str,
    ) -> BackendFuture<'a, String, SecretStoreError> {
        locked(&self.requests).push((secret_id.to_owned(), version_stage.to_owned()));
        let result = match self.payloads.get(secret_id) {
            Some(StoredSecret::Payload(payload)) => Ok(payload.clone()),
            Some(StoredSecret::Failure(error)) => Err(error.clone()),
            None => Err(SecretStoreError::NotFound),
        };
        Box::pin(async move { result })
    }
}

/// Clock whose sleeps advance time instantly.
#[derive(Clone, Debug)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
            sleeps: Arc::default(),
        }
    }
}

impl ManualClock {
    /// Creates a clock frozen at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Durations passed to [`Clock::sleep`], in order.
    #[must_use]
    pub fn sleeps(&self) -> Vec<Duration> {
        locked(&self.sleeps).clone()
    }

    /// Total simulated time slept.
    #[must_use]
    pub fn slept(&self) -> Duration {
        locked(&self.sleeps).iter().sum()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *locked(&self.now)
    }

    fn sleep(&self, duration: Duration) -> SleepFuture<'_> {
        locked(&self.sleeps).push(duration);
        let mut now = locked(&self.now);
        *now += duration;
        Box::pin(std::future::ready(()))
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds the env mutex and cleans up variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
