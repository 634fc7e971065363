use axum::body::Body;
use axum::http::{Request, StatusCode};
use commission_desk::api::{self, AppState};
use commission_desk::config::Config;
use commission_desk::db::init_db;
use commission_desk::domain::{
    Affiliate, CommissionEntry, CommissionMetadata, CommissionRates, CommissionStatus,
    CommissionType, Decimal, RateTemplate, TierLevel, TimeMs,
};
use commission_desk::Repository;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

struct TestApp {
    router: axum::Router,
    state: AppState,
    _temp: TempDir,
}

async fn setup_test_app() -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();

    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));

    let mut env = HashMap::new();
    env.insert("DATABASE_PATH".to_string(), db_path);
    let config = Config::from_env_map(env).unwrap();

    let state = AppState::new(repo, &config);
    TestApp {
        router: api::create_router(state.clone()),
        state,
        _temp: temp_dir,
    }
}

fn rates(upfront: i64, residual: i64) -> CommissionRates {
    CommissionRates::new(Decimal::from_i64(upfront), Decimal::from_i64(residual)).unwrap()
}

async fn seed_affiliate(app: &TestApp, external_id: &str) -> Affiliate {
    let affiliate = Affiliate::new(
        external_id,
        format!("Affiliate {}", external_id),
        format!("{}@example.com", external_id),
        rates(10, 5),
        TierLevel::Bronze,
    );
    app.state.repo.insert_affiliate(&affiliate).await.unwrap();
    affiliate
}

async fn send(app: &TestApp, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

async fn send_json(app: &TestApp, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, method, uri, body).await;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health_and_ready() {
    let app = setup_test_app().await;

    let (status, body) = send_json(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send_json(&app, "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_template_upsert_keeps_single_default() {
    let app = setup_test_app().await;

    let (status, first) = send_json(
        &app,
        "PUT",
        "/v1/templates",
        Some(json!({"name": "Bronze", "upfrontRate": 10, "residualRate": 5,
                    "tierLevel": "bronze", "isDefault": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, second) = send_json(
        &app,
        "PUT",
        "/v1/templates",
        Some(json!({"name": "Gold", "upfrontRate": 18, "residualRate": 6,
                    "tierLevel": "gold", "isDefault": true,
                    "metadata": {"description": "Top sellers"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, default) = send_json(&app, "GET", "/v1/templates/default", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(default["id"], second["id"]);
    assert_eq!(default["metadata"]["description"], "Top sellers");

    let (_, listed) = send_json(&app, "GET", "/v1/templates", None).await;
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 2);
    let defaults: Vec<&Value> = listed.iter().filter(|t| t["isDefault"] == true).collect();
    assert_eq!(defaults.len(), 1);
    assert_ne!(defaults[0]["id"], first["id"]);

    let (_, gold_only) = send_json(&app, "GET", "/v1/templates?tier=gold", None).await;
    assert_eq!(gold_only.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_template_with_excess_rates_is_rejected() {
    let app = setup_test_app().await;

    let (status, body) = send_json(
        &app,
        "PUT",
        "/v1/templates",
        Some(json!({"name": "Broken", "upfrontRate": 60, "residualRate": 50,
                    "tierLevel": "silver"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("exceeds 100"));

    let (status, _) = send_json(&app, "GET", "/v1/templates/default", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_set_rates_records_history_and_advisories() {
    let app = setup_test_app().await;
    let affiliate = seed_affiliate(&app, "ext-1").await;
    app.state
        .catalog
        .upsert(RateTemplate::new("Bronze", rates(10, 5), TierLevel::Bronze))
        .await
        .unwrap();

    let uri = format!("/v1/affiliates/{}/rates", affiliate.id);
    let (status, body) = send_json(
        &app,
        "PUT",
        &uri,
        Some(json!({"upfrontRate": 20, "residualRate": 5, "reason": "Q3 incentive",
                    "changedBy": "ops"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["affiliate"]["upfrontRate"], 20.0);
    assert_eq!(body["affiliate"]["version"], 1);
    let advisories = body["advisories"].as_array().unwrap();
    assert_eq!(advisories.len(), 1);
    assert_eq!(advisories[0]["field"], "upfront");

    let (status, history) =
        send_json(&app, "GET", &format!("/v1/affiliates/{}/history", affiliate.id), None).await;
    assert_eq!(status, StatusCode::OK);
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["previousUpfrontRate"], 10.0);
    assert_eq!(history[0]["newUpfrontRate"], 20.0);
    assert_eq!(history[0]["reason"], "Q3 incentive");
    assert_eq!(history[0]["changedBy"], "ops");
}

#[tokio::test]
async fn test_set_rates_out_of_bounds_leaves_state() {
    let app = setup_test_app().await;
    let affiliate = seed_affiliate(&app, "ext-1").await;

    let uri = format!("/v1/affiliates/{}/rates", affiliate.id);
    let (status, _) = send_json(
        &app,
        "PUT",
        &uri,
        Some(json!({"upfrontRate": 110, "residualRate": 0, "reason": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, stored) = send_json(&app, "GET", &format!("/v1/affiliates/{}", affiliate.id), None).await;
    assert_eq!(stored["upfrontRate"], 10.0);
    assert_eq!(stored["version"], 0);

    let (_, history) =
        send_json(&app, "GET", &format!("/v1/affiliates/{}/history", affiliate.id), None).await;
    assert!(history.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_affiliate_is_not_found() {
    let app = setup_test_app().await;

    let (status, _) = send_json(&app, "GET", "/v1/affiliates/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send_json(&app, "GET", "/v1/affiliates/missing/history", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_promote_to_unknown_tier_is_not_found() {
    let app = setup_test_app().await;
    let affiliate = seed_affiliate(&app, "ext-1").await;

    let uri = format!("/v1/affiliates/{}/promote", affiliate.id);
    let (status, _) = send_json(&app, "POST", &uri, Some(json!({"tier": "nonexistent-tier"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send_json(&app, "POST", &uri, Some(json!({"tier": "gold"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, stored) = send_json(&app, "GET", &format!("/v1/affiliates/{}", affiliate.id), None).await;
    assert_eq!(stored["tierLevel"], "bronze");
    assert_eq!(stored["version"], 0);
}

#[tokio::test]
async fn test_promote_applies_template() {
    let app = setup_test_app().await;
    let affiliate = seed_affiliate(&app, "ext-1").await;
    app.state
        .catalog
        .upsert(RateTemplate::new("Gold", rates(18, 6), TierLevel::Gold))
        .await
        .unwrap();

    let uri = format!("/v1/affiliates/{}/promote", affiliate.id);
    let (status, body) = send_json(&app, "POST", &uri, Some(json!({"tier": "gold"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tierLevel"], "gold");
    assert_eq!(body["upfrontRate"], 18.0);

    let (_, history) =
        send_json(&app, "GET", &format!("/v1/affiliates/{}/history", affiliate.id), None).await;
    assert_eq!(history[0]["reason"], "tier promotion");
}

#[tokio::test]
async fn test_bulk_status_codes() {
    let app = setup_test_app().await;
    let a = seed_affiliate(&app, "a").await;
    let b = seed_affiliate(&app, "b").await;

    let (status, body) = send_json(
        &app,
        "POST",
        "/v1/rates/bulk",
        Some(json!({
            "affiliateIds": [a.id, b.id],
            "patch": {"type": "rates", "upfrontRate": 40, "residualRate": 70},
            "reason": "x"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["status"], "failed");
    assert_eq!(body["failed"].as_array().unwrap().len(), 2);
    assert_eq!(body["failed"][0]["kind"], "validation");

    let (status, body) = send_json(
        &app,
        "POST",
        "/v1/rates/bulk",
        Some(json!({
            "affiliateIds": [a.id, "ghost", b.id],
            "patch": {"type": "rates", "upfrontRate": 12, "residualRate": 6},
            "reason": "spring review"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::MULTI_STATUS);
    assert_eq!(body["status"], "partial");
    assert_eq!(body["succeeded"].as_array().unwrap().len(), 2);
    assert_eq!(body["failed"][0]["affiliateId"], "ghost");
    assert_eq!(body["failed"][0]["kind"], "not_found");

    let (status, _) = send_json(
        &app,
        "POST",
        "/v1/rates/bulk",
        Some(json!({
            "affiliateIds": [a.id],
            "patch": {"type": "rates", "upfrontRate": 12, "residualRate": 6},
            "reason": "   "
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

fn commission(id: &str, affiliate: &Affiliate, amount: &str, status: CommissionStatus) -> CommissionEntry {
    CommissionEntry {
        id: id.to_string(),
        affiliate_id: affiliate.id.clone(),
        affiliate_name: None,
        affiliate_external_id: None,
        commission_type: CommissionType::Upfront,
        order_total: "100".parse().unwrap(),
        commission_amount: amount.parse().unwrap(),
        commission_rate: Decimal::from_i64(10),
        status,
        payment_date: None,
        // 2024-01-02T00:00:00Z
        created_at: TimeMs::new(1_704_153_600_000),
        metadata: CommissionMetadata {
            customer_name: Some("Doe, Jane".to_string()),
            customer_email: None,
            product_name: Some("Fiber".to_string()),
        },
    }
}

#[tokio::test]
async fn test_commission_stats_and_cache_invalidation() {
    let app = setup_test_app().await;
    let a = seed_affiliate(&app, "a").await;
    app.state
        .repo
        .insert_commission_entries_batch(&[
            commission("e1", &a, "10", CommissionStatus::Paid),
            commission("e2", &a, "2.5", CommissionStatus::Pending),
        ])
        .await
        .unwrap();

    let (status, stats) = send_json(&app, "GET", "/v1/commissions/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["totalCommissions"], 12.5);
    assert_eq!(stats["paidCommissions"], 10.0);
    assert_eq!(stats["activeAffiliateCount"], 1);
    assert_eq!(stats["avgCommissionRate"], 10.0);

    app.state
        .repo
        .insert_commission_entries_batch(&[commission("e3", &a, "1", CommissionStatus::Approved)])
        .await
        .unwrap();
    let (_, cached) = send_json(&app, "GET", "/v1/commissions/stats", None).await;
    assert_eq!(cached["totalCommissions"], 12.5);

    let (status, body) = send_json(&app, "POST", "/v1/cache/invalidate", Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 1);

    let (_, fresh) = send_json(&app, "GET", "/v1/commissions/stats", None).await;
    assert_eq!(fresh["totalCommissions"], 13.5);
    assert_eq!(fresh["entryCount"], 3);
}

#[tokio::test]
async fn test_leaderboard_limit() {
    let app = setup_test_app().await;
    let a = seed_affiliate(&app, "a").await;
    let b = seed_affiliate(&app, "b").await;
    app.state
        .repo
        .insert_commission_entries_batch(&[
            commission("e1", &a, "3", CommissionStatus::Paid),
            commission("e2", &b, "9", CommissionStatus::Paid),
        ])
        .await
        .unwrap();

    let (status, board) = send_json(&app, "GET", "/v1/commissions/leaderboard?limit=1", None).await;
    assert_eq!(status, StatusCode::OK);
    let board = board.as_array().unwrap();
    assert_eq!(board.len(), 1);
    assert_eq!(board[0]["affiliateId"], b.id.as_str());
}

#[tokio::test]
async fn test_export_csv() {
    let app = setup_test_app().await;
    let a = seed_affiliate(&app, "ext-a").await;
    app.state
        .repo
        .insert_commission_entries_batch(&[commission("e1", &a, "12.345", CommissionStatus::Paid)])
        .await
        .unwrap();

    let (status, bytes) = send(&app, "GET", "/v1/commissions/export", None).await;
    assert_eq!(status, StatusCode::OK);
    let csv = String::from_utf8(bytes).unwrap();
    let lines: Vec<&str> = csv.split("\r\n").collect();
    assert!(lines[0].starts_with("Date,Affiliate Name,Affiliate ID,"));
    assert_eq!(
        lines[1],
        "2024-01-02,Affiliate ext-a,ext-a,\"Doe, Jane\",,Fiber,upfront,100.00,12.35,10.00,paid,"
    );

    let (_, again) = send(&app, "GET", "/v1/commissions/export", None).await;
    assert_eq!(csv.as_bytes(), again.as_slice());

    let (status, _) = send(&app, "GET", "/v1/commissions/export?status=bogus", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, filtered) = send(&app, "GET", "/v1/commissions/export?status=pending", None).await;
    assert_eq!(String::from_utf8(filtered).unwrap().matches("\r\n").count(), 1);
}
