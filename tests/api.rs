use std::sync::Arc;

use axum::{routing::get, routing::post, Json, Router};
use chrono::{DateTime, Duration, TimeZone, Utc};
use prost::Message;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use moveeasy::api::{build_router, AppState};
use moveeasy::auth::{StaticCredentials, TokenIssuer};
use moveeasy::clock::{epoch_seconds, FixedClock};
use moveeasy::feed::TripTemplate;
use moveeasy::simulator::LoopSimulator;
use moveeasy::store::{FirebaseStore, StoreHandle};

const SECRET: &str = "integration-secret";

fn fixed_now() -> DateTime<Utc> {
    Utc.timestamp_millis_opt(1_731_600_123_500).unwrap()
}

fn state(store: StoreHandle, require_auth: bool) -> AppState {
    AppState {
        simulator: Arc::new(LoopSimulator::demo().unwrap()),
        trip: Arc::new(TripTemplate::default()),
        credentials: Arc::new(StaticCredentials::from_pairs([
            ("driver1", "password123"),
            ("admin", "admin2025"),
        ])),
        tokens: Arc::new(TokenIssuer::new(SECRET, Duration::seconds(900)).unwrap()),
        store,
        clock: Arc::new(FixedClock(fixed_now())),
        require_auth,
    }
}

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn serve_api(store: StoreHandle, require_auth: bool) -> String {
    serve(build_router(state(store, require_auth))).await
}

// Stands in for the hosted realtime database and identity service.
async fn fake_store() -> StoreHandle {
    fake_store_with(true).await
}

// Without admin credentials the identity service echoes the email but returns no link.
async fn fake_store_with(returns_link: bool) -> StoreHandle {
    let app = Router::new()
        .route(
            "/stops.json",
            get(|| async { Json(json!([{"stop_id": "77", "stop_name": "Ngong Road"}])) }),
        )
        .route(
            "/routes.json",
            get(|| async { Json(json!([{"route_id": "46", "route_short_name": "46"}])) }),
        )
        .route(
            "/identity",
            post(move |Json(body): Json<Value>| async move {
                if returns_link {
                    Json(json!({
                        "email": body["email"],
                        "oobLink": format!("https://reset.example/{}", body["email"].as_str().unwrap_or("")),
                    }))
                } else {
                    Json(json!({ "email": body["email"] }))
                }
            }),
        );
    let base = serve(app).await;
    let store = FirebaseStore::new(&base, None, Some("api-key".to_string()))
        .unwrap()
        .with_identity_url(format!("{base}/identity"));
    StoreHandle::Connected(Arc::new(store))
}

#[tokio::test]
async fn home_page_points_to_login() {
    let base = serve_api(StoreHandle::disabled("test"), false).await;
    let body = reqwest::get(&base).await.unwrap().text().await.unwrap();
    assert!(body.contains("Login at /login"));
}

#[tokio::test]
async fn login_issues_verifiable_token() {
    let base = serve_api(StoreHandle::disabled("test"), false).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{base}/login"))
        .json(&json!({"username": "driver1", "password": "password123"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    let token = body["access_token"].as_str().unwrap();

    let issuer = TokenIssuer::new(SECRET, Duration::seconds(900)).unwrap();
    let claims = issuer.validate(token, fixed_now()).unwrap();
    assert_eq!(claims.sub, "driver1");
}

#[tokio::test]
async fn login_rejects_bad_requests() {
    let base = serve_api(StoreHandle::disabled("test"), false).await;
    let client = reqwest::Client::new();
    let url = format!("{base}/login");

    let wrong = client
        .post(&url)
        .json(&json!({"username": "driver1", "password": "nope"}))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status(), 401);
    assert_eq!(
        wrong.json::<Value>().await.unwrap(),
        json!({"error": "Invalid credentials"})
    );

    let missing = client
        .post(&url)
        .json(&json!({"username": "driver1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 400);
    assert_eq!(
        missing.json::<Value>().await.unwrap(),
        json!({"error": "Missing username or password"})
    );

    let not_json = client.post(&url).body("username=driver1").send().await.unwrap();
    assert_eq!(not_json.status(), 400);
    assert_eq!(
        not_json.json::<Value>().await.unwrap(),
        json!({"error": "Request must be JSON"})
    );
}

#[tokio::test]
async fn stops_fall_back_without_store() {
    let base = serve_api(StoreHandle::disabled("test"), false).await;

    let stops: Value = reqwest::get(format!("{base}/api/stops"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let names: Vec<&str> = stops
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["stop_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["Kawangware", "Westlands", "CBD"]);

    let routes: Value = reqwest::get(format!("{base}/api/routes"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(routes, json!([]));
}

#[tokio::test]
async fn stops_and_routes_pass_through_from_store() {
    let base = serve_api(fake_store().await, false).await;

    let stops: Value = reqwest::get(format!("{base}/api/stops"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stops, json!([{"stop_id": "77", "stop_name": "Ngong Road"}]));

    let routes: Value = reqwest::get(format!("{base}/api/routes"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(routes, json!([{"route_id": "46", "route_short_name": "46"}]));
}

#[tokio::test]
async fn driver_endpoints_return_canned_data() {
    let base = serve_api(StoreHandle::disabled("test"), false).await;

    let stats: Value = reqwest::get(format!("{base}/api/driver/stats/d42"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats, json!({"earnings": "KES 4,500", "trips": 12, "hours": 6.5}));

    let trips: Value = reqwest::get(format!("{base}/api/driver/trips/d42"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(trips.as_array().unwrap().len(), 4);
    assert_eq!(trips[0]["route"], "Kawangware -> CBD");

    let reviews: Value = reqwest::get(format!("{base}/api/driver/reviews/d42"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reviews["rating"], 4.8);
    assert_eq!(reviews["count"], 124);
    assert_eq!(reviews["reviews"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn feed_endpoint_serves_protobuf_snapshot() {
    let base = serve_api(StoreHandle::disabled("test"), false).await;

    let res = reqwest::get(format!("{base}/api/gtfs-realtime")).await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(
        res.headers()["content-type"].to_str().unwrap(),
        "application/x-protobuf"
    );
    let bytes = res.bytes().await.unwrap();
    let feed = gtfs_realtime::FeedMessage::decode(bytes).unwrap();

    assert_eq!(feed.header.gtfs_realtime_version, "2.0");
    assert_eq!(feed.header.timestamp, Some(1_731_600_123));
    assert_eq!(feed.entity.len(), 3);

    let expected = LoopSimulator::demo().unwrap().snapshot(epoch_seconds(fixed_now()));
    for (entity, snap) in feed.entity.iter().zip(&expected) {
        let pos = entity.vehicle.as_ref().unwrap().position.as_ref().unwrap();
        assert_eq!(pos.latitude, snap.latitude as f32);
        assert_eq!(pos.longitude, snap.longitude as f32);
        assert_eq!(pos.bearing, Some(snap.bearing as f32));
    }

    // Fixed clock, so a second request is byte-for-byte the same.
    let again = reqwest::get(format!("{base}/api/gtfs-realtime"))
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    assert_eq!(again, feed.encode_to_vec());
}

#[tokio::test]
async fn bearer_guard_protects_api_routes() {
    let base = serve_api(StoreHandle::disabled("test"), true).await;
    let client = reqwest::Client::new();

    let denied = client.get(format!("{base}/api/stops")).send().await.unwrap();
    assert_eq!(denied.status(), 401);

    let forged = client
        .get(format!("{base}/api/stops"))
        .bearer_auth("a.b.c")
        .send()
        .await
        .unwrap();
    assert_eq!(forged.status(), 401);

    let login: Value = client
        .post(format!("{base}/login"))
        .json(&json!({"username": "admin", "password": "admin2025"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let token = login["access_token"].as_str().unwrap();

    let allowed = client
        .get(format!("{base}/api/gtfs-realtime"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(allowed.status(), 200);
}

#[tokio::test]
async fn reset_link_needs_a_store() {
    let client = reqwest::Client::new();

    let base = serve_api(StoreHandle::disabled("test"), false).await;
    let res = client
        .post(format!("{base}/api/auth/get-reset-link"))
        .json(&json!({"email": "driver@example.com"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 500);

    let base = serve_api(fake_store().await, false).await;
    let missing = client
        .post(format!("{base}/api/auth/get-reset-link"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 400);
    assert_eq!(
        missing.json::<Value>().await.unwrap(),
        json!({"error": "Email is required"})
    );

    let ok: Value = client
        .post(format!("{base}/api/auth/get-reset-link"))
        .json(&json!({"email": "driver@example.com"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ok, json!({"link": "https://reset.example/driver@example.com"}));
}

#[tokio::test]
async fn reset_link_without_link_in_reply_is_an_error() {
    let base = serve_api(fake_store_with(false).await, false).await;
    let res = reqwest::Client::new()
        .post(format!("{base}/api/auth/get-reset-link"))
        .json(&json!({"email": "driver@example.com"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body,
        json!({"error": "identity service returned no reset link for driver@example.com"})
    );
}
