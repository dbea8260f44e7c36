use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use embedgate_core::{AppError, AppResult};
use embedgate_domain::{DatasetId, EmbedTokenRequest, RoleMapping, RoleSet, UserEmail};
use tokio::sync::Mutex;

use super::{EmbedTokenError, NegotiationAttempt, TokenNegotiator, requires_effective_identity};
use crate::{
    EmbedTokenGateway, GatewayFailure, GenerateTokenResponse, IssuedEmbedToken, RoleMappingStore,
    RoleResolver,
};

const NEEDS_IDENTITY_BODY: &str =
    "{\"error\":{\"code\":\"InvalidRequest\",\"message\":\"Creating embed token for accessing dataset D2 requires effective identity to be provided\"}}";

#[derive(Default)]
struct ScriptedGateway {
    responses: Mutex<VecDeque<Result<GenerateTokenResponse, GatewayFailure>>>,
    requests: Mutex<Vec<EmbedTokenRequest>>,
}

impl ScriptedGateway {
    fn with(responses: Vec<Result<GenerateTokenResponse, GatewayFailure>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    async fn recorded(&self) -> Vec<EmbedTokenRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl EmbedTokenGateway for ScriptedGateway {
    async fn generate_token(
        &self,
        request: &EmbedTokenRequest,
    ) -> Result<GenerateTokenResponse, GatewayFailure> {
        self.requests.lock().await.push(request.clone());
        self.responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(GatewayFailure::Transport("no scripted response".to_owned())))
    }
}

#[derive(Default)]
struct CountingRoleStore {
    mappings: Vec<RoleMapping>,
    reads: AtomicUsize,
    unavailable: bool,
}

#[async_trait]
impl RoleMappingStore for CountingRoleStore {
    async fn read_all_role_mappings(&self) -> AppResult<Vec<RoleMapping>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(AppError::StorageUnavailable("file locked".to_owned()));
        }
        Ok(self.mappings.clone())
    }

    async fn write_all_role_mappings(&self, _mappings: Vec<RoleMapping>) -> AppResult<()> {
        Ok(())
    }
}

fn issued(token: &str) -> Result<GenerateTokenResponse, GatewayFailure> {
    Ok(GenerateTokenResponse::Issued(IssuedEmbedToken {
        token: token.to_owned(),
        expires_at: None,
    }))
}

fn rejected(status: u16, body: &str) -> Result<GenerateTokenResponse, GatewayFailure> {
    Ok(GenerateTokenResponse::Rejected {
        status,
        body: body.to_owned(),
    })
}

fn role_mapping(email: &str, dataset: &str, roles: &[&str]) -> RoleMapping {
    let (Ok(email), Ok(dataset), Ok(roles)) = (
        UserEmail::new(email),
        DatasetId::new(dataset),
        RoleSet::new(roles.iter().copied()),
    ) else {
        panic!("invalid test mapping");
    };
    RoleMapping::new(email, dataset, roles, "admin@co.com", Utc::now())
}

fn negotiator(
    gateway: Arc<ScriptedGateway>,
    store: Arc<CountingRoleStore>,
) -> TokenNegotiator {
    TokenNegotiator::new(gateway, RoleResolver::new(store))
}

fn identity_roles(request: &EmbedTokenRequest) -> Option<Vec<String>> {
    request
        .identity
        .as_ref()
        .map(|identity| identity.roles.as_slice().to_vec())
}

#[test]
fn identity_marker_match_ignores_case() {
    assert!(requires_effective_identity(
        "Bad Request: requires Effective Identity to be provided"
    ));
    assert!(!requires_effective_identity("dataset not found"));
    assert!(!requires_effective_identity("requires identity"));
}

#[tokio::test]
async fn dataset_without_rls_succeeds_on_bare_attempt() {
    let gateway = ScriptedGateway::with(vec![issued("T")]);
    let store = Arc::new(CountingRoleStore::default());

    let result = negotiator(gateway.clone(), store.clone())
        .negotiate("R1", "D1", "u@co.com")
        .await;

    let Ok(result) = result else {
        panic!("negotiation failed: {result:?}");
    };
    assert_eq!(result.token, "T");
    assert!(!result.identity_applied);

    let requests = gateway.recorded().await;
    assert_eq!(requests.len(), 1);
    assert!(requests[0].identity.is_none());
    assert_eq!(requests[0].report_id.as_str(), "R1");
    assert_eq!(requests[0].dataset_id.as_str(), "D1");
    assert_eq!(store.reads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn bare_success_never_consults_roles_for_any_user() {
    for email in ["u@co.com", "ADMIN@CO.COM", "someone.else@partner.org"] {
        let gateway = ScriptedGateway::with(vec![issued("T")]);
        let store = Arc::new(CountingRoleStore {
            unavailable: true,
            ..CountingRoleStore::default()
        });

        let result = negotiator(gateway, store.clone())
            .negotiate("R1", "D1", email)
            .await;

        assert!(matches!(result, Ok(value) if !value.identity_applied));
        assert_eq!(store.reads.load(Ordering::SeqCst), 0);
    }
}

#[tokio::test]
async fn rls_dataset_retries_with_mapped_roles() {
    let gateway = ScriptedGateway::with(vec![rejected(400, NEEDS_IDENTITY_BODY), issued("T2")]);
    let store = Arc::new(CountingRoleStore {
        mappings: vec![role_mapping("jane@co.com", "D2", &["Sales"])],
        ..CountingRoleStore::default()
    });

    let result = negotiator(gateway.clone(), store)
        .negotiate("R2", "D2", "jane@co.com")
        .await;

    let Ok(result) = result else {
        panic!("negotiation failed: {result:?}");
    };
    assert_eq!(result.token, "T2");
    assert!(result.identity_applied);
    assert!(!result.default_role_applied);

    let requests = gateway.recorded().await;
    assert_eq!(requests.len(), 2);
    assert!(requests[0].identity.is_none());
    let Some(identity) = requests[1].identity.as_ref() else {
        panic!("second request carries no identity");
    };
    assert_eq!(identity.username, "jane@co.com");
    assert_eq!(identity.roles.as_slice(), ["Sales".to_owned()]);
    assert_eq!(
        identity
            .datasets
            .iter()
            .map(|dataset| dataset.as_str().to_owned())
            .collect::<Vec<_>>(),
        vec!["D2".to_owned()]
    );
    assert_eq!(requests[1].report_id, requests[0].report_id);
    assert_eq!(requests[1].dataset_id, requests[0].dataset_id);
}

#[tokio::test]
async fn rls_dataset_without_mapping_uses_customer_role() {
    let gateway = ScriptedGateway::with(vec![rejected(400, NEEDS_IDENTITY_BODY), issued("T3")]);
    let store = Arc::new(CountingRoleStore::default());

    let result = negotiator(gateway.clone(), store)
        .negotiate("R2", "D2", "external@customer.com")
        .await;

    assert!(matches!(
        result,
        Ok(value) if value.identity_applied && value.default_role_applied
    ));
    let requests = gateway.recorded().await;
    assert_eq!(
        identity_roles(&requests[1]),
        Some(vec!["Customer".to_owned()])
    );
}

#[tokio::test]
async fn mixed_case_marker_triggers_identity_attempt() {
    let gateway = ScriptedGateway::with(vec![
        rejected(400, "Bad Request: requires Effective Identity to be provided"),
        issued("T"),
    ]);

    let result = negotiator(gateway.clone(), Arc::new(CountingRoleStore::default()))
        .negotiate("R1", "D1", "u@co.com")
        .await;

    assert!(result.is_ok());
    assert_eq!(gateway.recorded().await.len(), 2);
}

#[tokio::test]
async fn unrelated_rejection_is_terminal_after_one_call() {
    let gateway = ScriptedGateway::with(vec![rejected(404, "dataset not found"), issued("T")]);
    let store = Arc::new(CountingRoleStore::default());

    let result = negotiator(gateway.clone(), store.clone())
        .negotiate("R1", "D1", "u@co.com")
        .await;

    assert_eq!(
        result,
        Err(EmbedTokenError::BareRejected {
            status: 404,
            body: "dataset not found".to_owned(),
        })
    );
    assert_eq!(gateway.recorded().await.len(), 1);
    assert_eq!(store.reads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn second_rejection_reports_roles_and_dataset_without_third_attempt() {
    let gateway = ScriptedGateway::with(vec![
        rejected(400, NEEDS_IDENTITY_BODY),
        rejected(400, "DAX expression error in role filter"),
        issued("never"),
    ]);
    let store = Arc::new(CountingRoleStore {
        mappings: vec![role_mapping("jane@co.com", "D2", &["Sales", "EMEA"])],
        ..CountingRoleStore::default()
    });

    let result = negotiator(gateway.clone(), store)
        .negotiate("R2", "D2", "jane@co.com")
        .await;

    let Err(error) = result else {
        panic!("expected failure");
    };
    assert_eq!(
        error,
        EmbedTokenError::IdentityRejected {
            status: 400,
            body: "DAX expression error in role filter".to_owned(),
            dataset_id: "D2".to_owned(),
            roles: vec!["Sales".to_owned(), "EMEA".to_owned()],
        }
    );
    let message = error.to_string();
    assert!(message.contains("D2"));
    assert!(message.contains("Sales, EMEA"));
    assert_eq!(gateway.recorded().await.len(), 2);
}

#[tokio::test]
async fn repeated_identity_demand_does_not_loop() {
    let gateway = ScriptedGateway::with(vec![
        rejected(400, NEEDS_IDENTITY_BODY),
        rejected(400, NEEDS_IDENTITY_BODY),
        issued("never"),
    ]);

    let result = negotiator(gateway.clone(), Arc::new(CountingRoleStore::default()))
        .negotiate("R2", "D2", "jane@co.com")
        .await;

    assert!(matches!(
        result,
        Err(EmbedTokenError::IdentityRejected { status: 400, .. })
    ));
    assert_eq!(gateway.recorded().await.len(), 2);
}

#[tokio::test]
async fn bare_timeout_is_terminal_and_not_reinterpreted() {
    let gateway = ScriptedGateway::with(vec![Err(GatewayFailure::Timeout), issued("never")]);
    let store = Arc::new(CountingRoleStore::default());

    let result = negotiator(gateway.clone(), store.clone())
        .negotiate("R1", "D1", "u@co.com")
        .await;

    assert_eq!(
        result,
        Err(EmbedTokenError::Timeout {
            attempt: NegotiationAttempt::Bare
        })
    );
    assert_eq!(gateway.recorded().await.len(), 1);
    assert_eq!(store.reads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn identity_timeout_is_reported_for_second_attempt() {
    let gateway = ScriptedGateway::with(vec![
        rejected(400, NEEDS_IDENTITY_BODY),
        Err(GatewayFailure::Timeout),
    ]);

    let result = negotiator(gateway, Arc::new(CountingRoleStore::default()))
        .negotiate("R2", "D2", "jane@co.com")
        .await;

    assert_eq!(
        result,
        Err(EmbedTokenError::Timeout {
            attempt: NegotiationAttempt::WithIdentity
        })
    );
}

#[tokio::test]
async fn malformed_bare_response_is_terminal() {
    let gateway = ScriptedGateway::with(vec![Err(GatewayFailure::MalformedResponse(
        "missing token".to_owned(),
    ))]);

    let result = negotiator(gateway.clone(), Arc::new(CountingRoleStore::default()))
        .negotiate("R1", "D1", "u@co.com")
        .await;

    assert!(matches!(
        result,
        Err(EmbedTokenError::Unreachable {
            attempt: NegotiationAttempt::Bare,
            ..
        })
    ));
    assert_eq!(gateway.recorded().await.len(), 1);
}

#[tokio::test]
async fn storage_fault_stops_negotiation_before_second_call() {
    let gateway = ScriptedGateway::with(vec![rejected(400, NEEDS_IDENTITY_BODY), issued("never")]);
    let store = Arc::new(CountingRoleStore {
        unavailable: true,
        ..CountingRoleStore::default()
    });

    let result = negotiator(gateway.clone(), store)
        .negotiate("R2", "D2", "jane@co.com")
        .await;

    assert_eq!(
        result,
        Err(EmbedTokenError::StorageUnavailable("file locked".to_owned()))
    );
    assert_eq!(gateway.recorded().await.len(), 1);
}

#[tokio::test]
async fn blank_inputs_make_no_calls() {
    let gateway = ScriptedGateway::with(vec![issued("T")]);

    let result = negotiator(gateway.clone(), Arc::new(CountingRoleStore::default()))
        .negotiate("R1", " ", "u@co.com")
        .await;

    assert!(matches!(result, Err(EmbedTokenError::InvalidInput(_))));
    assert!(gateway.recorded().await.is_empty());
}

#[test]
fn negotiation_errors_convert_to_app_errors() {
    let storage: AppError = EmbedTokenError::StorageUnavailable("down".to_owned()).into();
    let upstream: AppError = EmbedTokenError::Timeout {
        attempt: NegotiationAttempt::Bare,
    }
    .into();

    assert!(matches!(storage, AppError::StorageUnavailable(message) if message == "down"));
    assert!(matches!(upstream, AppError::Upstream(message) if message.contains("bare")));
}
