use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
    routing::get,
};
use serde_json::Value;
use tower::ServiceExt;

use civgate_api::{RouteTable, build_app};
use civgate_auth::{
    AccessPolicy, Account, Authorizer, CatalogScope, GateConfig, InMemoryDirectory,
    ModuleCatalogConfig, NamespaceRule, PermissionKey, PermissionMatrix, PermissionSet, Profile,
    Role,
};
use civgate_core::{AccountId, DepartmentId, MunicipalityId, OrgNode};

struct TestApp {
    dir: Arc<InMemoryDirectory>,
    router: Router,
    department: DepartmentId,
}

fn keys(list: &[&'static str]) -> PermissionSet {
    list.iter().copied().map(PermissionKey::from_static).collect()
}

fn test_app() -> TestApp {
    let dir = Arc::new(InMemoryDirectory::new());
    let municipality = MunicipalityId::new();
    let department = DepartmentId::new();
    dir.insert_node(OrgNode::municipality(municipality, "Riverside"))
        .unwrap();
    dir.insert_node(OrgNode::child(department.into(), municipality.into(), "Treasury").unwrap())
        .unwrap();

    let key = PermissionKey::from_static;
    let policy = AccessPolicy {
        matrix: PermissionMatrix::new([
            (Role::Admin, keys(&["finance.view", "finance.edit"])),
            (Role::Department, keys(&["finance.view", "finance.edit"])),
            (Role::Unit, keys(&["finance.view"])),
        ]),
        gate: GateConfig::default().with_namespace(
            "finance",
            NamespaceRule::managed(key("finance.view"))
                .with_module("finance")
                .with_edit_rule("invoice_create", key("finance.edit")),
        ),
        catalog: ModuleCatalogConfig::new(["finance"], Vec::<(String, Vec<String>)>::new()),
        ..AccessPolicy::builtin()
    };

    let routes = RouteTable::new()
        .route("/finance/invoices", "finance", "invoice_list")
        .route("/finance/invoices/new", "finance", "invoice_create")
        .route("/accounts/login", "accounts", "login");

    let authorizer = Authorizer::new(dir.clone(), policy, Arc::new(routes));
    let handlers = Router::new()
        .route("/finance/invoices", get(|| async { "invoices" }))
        .route("/finance/invoices/new", get(|| async { "new invoice" }))
        .route("/accounts/login", get(|| async { "login" }))
        .route("/static/app.css", get(|| async { "body {}" }));

    TestApp {
        dir,
        router: build_app(authorizer, handlers),
        department,
    }
}

fn signed_in(app: &TestApp, role: Role) -> Account {
    let profile = Profile::new(AccountId::new(), role).in_department(app.department);
    let account = Account::new(profile.account_id);
    app.dir.upsert_profile(profile);
    account
}

async fn send(app: &TestApp, path: &str, account: Option<&Account>) -> (StatusCode, Value) {
    let mut req = Request::builder().uri(path).body(Body::empty()).unwrap();
    if let Some(account) = account {
        req.extensions_mut().insert(account.clone());
    }

    let res = app.router.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn view_only_caller_is_refused_the_edit_action() {
    let app = test_app();
    let viewer = signed_in(&app, Role::Unit);

    let (status, body) = send(&app, "/finance/invoices/new", Some(&viewer)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
    assert_eq!(
        body["message"],
        "You do not have permission to perform this action."
    );

    let (status, _) = send(&app, "/finance/invoices", Some(&viewer)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn editor_reaches_the_edit_action() {
    let app = test_app();
    let editor = signed_in(&app, Role::Department);

    let (status, _) = send(&app, "/finance/invoices/new", Some(&editor)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn caller_without_area_permission_is_refused() {
    let app = test_app();
    let reader = signed_in(&app, Role::ReadOnly);

    let (status, body) = send(&app, "/finance/invoices", Some(&reader)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["message"],
        "You do not have permission to access this area."
    );

    // Public routes stay reachable.
    let (status, _) = send(&app, "/accounts/login", Some(&reader)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn inactive_module_is_refused() {
    let app = test_app();
    app.dir
        .set_module(CatalogScope::Department(app.department), "finance", false);
    let editor = signed_in(&app, Role::Department);

    let (status, body) = send(&app, "/finance/invoices", Some(&editor)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "This module is not active for your scope.");
}

#[tokio::test]
async fn anonymous_and_static_requests_pass_through() {
    let app = test_app();

    let (status, _) = send(&app, "/finance/invoices/new", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "/static/app.css", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn storage_outage_is_a_server_error() {
    let app = test_app();
    let viewer = signed_in(&app, Role::Unit);
    app.dir.set_unavailable(true);

    let (status, body) = send(&app, "/finance/invoices", Some(&viewer)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "authorization_unavailable");

    // Bypassed paths never touch storage.
    let (status, _) = send(&app, "/static/app.css", Some(&viewer)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn diagnostics_report_the_callers_permissions() {
    let app = test_app();
    let viewer = signed_in(&app, Role::Unit);

    let (status, body) = send(&app, "/authz/me", Some(&viewer)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_admin"], false);
    assert_eq!(body["permissions"], serde_json::json!(["finance.view"]));

    let (status, body) = send(&app, "/authz/me/modules/finance", Some(&viewer)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["enabled"], true);

    let (status, _) = send(&app, "/authz/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_paths_fall_through_to_not_found() {
    let app = test_app();
    let viewer = signed_in(&app, Role::Unit);

    let (status, _) = send(&app, "/nowhere", Some(&viewer)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
