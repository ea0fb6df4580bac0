//! End-to-end tests: a spawned gateway against a mock identity provider and
//! a mock downstream service.

use std::io::Write;
use std::time::Duration;

use mockito::{Matcher, ServerGuard};
use reqwest::StatusCode;
use reqwest::header::{COOKIE, HOST, LOCATION, SET_COOKIE};
use tollgate_config::Settings;
use tollgate_gateway::build_router;

struct TestGateway {
    base: String,
    provider: ServerGuard,
    downstream: ServerGuard,
}

async fn spawn_gateway() -> TestGateway {
    let provider = mockito::Server::new_async().await;
    let downstream = mockito::Server::new_async().await;

    let settings: Settings = toml::from_str(&format!(
        r#"
[provider]
base_url = "{}"
callback_url = "http://gateway.example.com/callback"

[clients.admin]
client_id = "admin-client"
client_secret = "admin-secret"
frontend_url = "https://admin.example.com"

[clients.user]
client_id = "user-client"
client_secret = "user-secret"
frontend_url = "https://app.example.com"

[cookies]
secure = false

[[route]]
prefix = "/api"
upstream = "{}"
"#,
        provider.url(),
        downstream.url()
    ))
    .unwrap();

    let router = build_router(&settings).unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestGateway {
        base: format!("http://{addr}"),
        provider,
        downstream,
    }
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

fn set_cookies(response: &reqwest::Response) -> Vec<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

fn token_body() -> String {
    serde_json::json!({
        "access_token": "new-at",
        "refresh_token": "new-rt",
        "id_token": "new-it",
        "expires_in": 300,
        "refresh_expires_in": 1800,
        "token_type": "Bearer",
        "scope": "openid profile email"
    })
    .to_string()
}

#[tokio::test]
async fn test_login_redirects_with_state_and_pkce_cookies() {
    let gw = spawn_gateway().await;

    let response = client()
        .post(format!("{}/login?client=admin", gw.base))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response.headers()[LOCATION].to_str().unwrap();
    assert!(location.starts_with(&format!("{}/auth?", gw.provider.url())));
    assert!(location.contains("client_id=admin-client"));
    assert!(location.contains("code_challenge_method=S256"));

    let cookies = set_cookies(&response);
    assert!(cookies.iter().any(|c| c.starts_with("OAUTH_STATE=")));
    assert!(cookies.iter().any(|c| c.starts_with("OAUTH_PKCE=")));
}

#[tokio::test]
async fn test_login_host_based_admin_resolution() {
    let gw = spawn_gateway().await;

    let response = client()
        .post(format!("{}/login", gw.base))
        .header(HOST, "admin.example.com")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response.headers()[LOCATION].to_str().unwrap();
    assert!(location.contains("client_id=admin-client"));
}

#[tokio::test]
async fn test_access_token_forwarded_as_bearer_without_cookies() {
    let mut gw = spawn_gateway().await;
    let backend = gw
        .downstream
        .mock("GET", "/api/things")
        .match_header("authorization", "Bearer tok-123")
        .match_header("cookie", Matcher::Missing)
        .with_body("downstream-ok")
        .create_async()
        .await;

    let response = client()
        .get(format!("{}/api/things", gw.base))
        .header(COOKIE, "AT=tok-123; RT=rt-1")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "downstream-ok");
    backend.assert_async().await;
}

#[tokio::test]
async fn test_no_tokens_rejected_without_any_upstream_call() {
    let mut gw = spawn_gateway().await;
    let backend = gw
        .downstream
        .mock("GET", "/api/things")
        .expect(0)
        .create_async()
        .await;
    let token = gw
        .provider
        .mock("POST", "/token")
        .expect(0)
        .create_async()
        .await;

    let response = client()
        .get(format!("{}/api/things", gw.base))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let cookies = set_cookies(&response);
    assert!(cookies.iter().any(|c| c.starts_with("AT=;")));
    assert!(cookies.iter().any(|c| c.starts_with("RT=;")));
    assert!(cookies.iter().any(|c| c.starts_with("IT=;")));

    backend.assert_async().await;
    token.assert_async().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_requests_share_one_refresh_exchange() {
    let mut gw = spawn_gateway().await;

    // Hold the single token exchange open long enough for every request to
    // pile up on the same coordination entry.
    let body = token_body();
    let token = gw
        .provider
        .mock("POST", "/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
            Matcher::UrlEncoded("refresh_token".into(), "stale-rt".into()),
        ]))
        .with_chunked_body(move |w| {
            std::thread::sleep(Duration::from_millis(400));
            w.write_all(body.as_bytes())
        })
        .expect(1)
        .create_async()
        .await;
    let backend = gw
        .downstream
        .mock("GET", "/api/things")
        .match_header("authorization", "Bearer new-at")
        .with_body("downstream-ok")
        .expect(50)
        .create_async()
        .await;

    let client = client();
    let requests: Vec<_> = (0..50)
        .map(|_| {
            client
                .get(format!("{}/api/things", gw.base))
                .header(COOKIE, "RT=stale-rt")
                .send()
        })
        .collect();

    let responses = futures::future::join_all(requests).await;
    for response in responses {
        let response = response.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        // Every subscriber carries the refreshed session cookies.
        assert!(
            set_cookies(&response)
                .iter()
                .any(|c| c.starts_with("AT=new-at"))
        );
        assert_eq!(response.text().await.unwrap(), "downstream-ok");
    }

    token.assert_async().await;
    backend.assert_async().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_rejected_refresh_fails_every_subscriber_uniformly() {
    let mut gw = spawn_gateway().await;

    let token = gw
        .provider
        .mock("POST", "/token")
        .with_status(400)
        .with_chunked_body(|w| {
            std::thread::sleep(Duration::from_millis(300));
            w.write_all(br#"{"error":"invalid_grant"}"#)
        })
        .expect(1)
        .create_async()
        .await;
    let backend = gw
        .downstream
        .mock("GET", "/api/things")
        .expect(0)
        .create_async()
        .await;

    let client = client();
    let requests: Vec<_> = (0..20)
        .map(|_| {
            client
                .get(format!("{}/api/things", gw.base))
                .header(COOKIE, "RT=revoked-rt")
                .send()
        })
        .collect();

    for response in futures::future::join_all(requests).await {
        let response = response.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(set_cookies(&response).iter().any(|c| c.starts_with("AT=;")));
    }

    token.assert_async().await;
    backend.assert_async().await;
}

#[tokio::test]
async fn test_failed_refresh_is_not_cached_across_requests() {
    let mut gw = spawn_gateway().await;

    // Two sequential requests with the same dead token must each reach the
    // provider: settlement releases the coordination key.
    let token = gw
        .provider
        .mock("POST", "/token")
        .with_status(400)
        .expect(2)
        .create_async()
        .await;

    let client = client();
    for _ in 0..2 {
        let response = client
            .get(format!("{}/api/things", gw.base))
            .header(COOKIE, "RT=dead-rt")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    token.assert_async().await;
}

#[tokio::test]
async fn test_explicit_refresh_endpoint() {
    let mut gw = spawn_gateway().await;
    let token = gw
        .provider
        .mock("POST", "/token")
        .with_body(token_body())
        .expect(1)
        .create_async()
        .await;

    let client = client();
    let response = client
        .post(format!("{}/refresh", gw.base))
        .header(COOKIE, "RT=rt-1")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        set_cookies(&response)
            .iter()
            .any(|c| c.starts_with("AT=new-at"))
    );

    // No refresh cookie: immediate 401, no provider call.
    let response = client
        .post(format!("{}/refresh", gw.base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    token.assert_async().await;
}

#[tokio::test]
async fn test_callback_state_mismatch_clears_session() {
    let mut gw = spawn_gateway().await;
    let token = gw
        .provider
        .mock("POST", "/token")
        .expect(0)
        .create_async()
        .await;

    let response = client()
        .get(format!("{}/callback?code=c&state=expected", gw.base))
        .header(COOKIE, "OAUTH_STATE=tampered; OAUTH_PKCE=v")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let cookies = set_cookies(&response);
    assert!(cookies.iter().any(|c| c.starts_with("AT=;")));
    assert!(cookies.iter().any(|c| c.starts_with("RT=;")));
    assert!(cookies.iter().any(|c| c.starts_with("IT=;")));

    token.assert_async().await;
}

#[tokio::test]
async fn test_callback_success_lands_on_frontend() {
    let mut gw = spawn_gateway().await;
    gw.provider
        .mock("POST", "/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
            Matcher::UrlEncoded("code".into(), "the-code".into()),
            Matcher::UrlEncoded("code_verifier".into(), "the-verifier".into()),
        ]))
        .with_body(token_body())
        .create_async()
        .await;

    let response = client()
        .get(format!("{}/callback?code=the-code&state=st", gw.base))
        .header(COOKIE, "OAUTH_STATE=st; OAUTH_PKCE=the-verifier")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers()[LOCATION].to_str().unwrap(),
        "https://app.example.com"
    );
    let cookies = set_cookies(&response);
    assert!(cookies.iter().any(|c| c.starts_with("AT=new-at")));
    assert!(cookies.iter().any(|c| c.starts_with("RT=new-rt")));
    // Login-session cookies are consumed.
    assert!(cookies.iter().any(|c| c.starts_with("OAUTH_STATE=;")));
    assert!(cookies.iter().any(|c| c.starts_with("OAUTH_PKCE=;")));
}

#[tokio::test]
async fn test_logout_clears_session_even_when_provider_is_down() {
    let mut gw = spawn_gateway().await;
    gw.provider
        .mock("GET", "/logout")
        .match_query(Matcher::Any)
        .with_status(500)
        .create_async()
        .await;

    let response = client()
        .post(format!("{}/logout", gw.base))
        .header(COOKIE, "IT=id-token; AT=at; RT=rt")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers()[LOCATION].to_str().unwrap(),
        "https://app.example.com"
    );
    let cookies = set_cookies(&response);
    for name in ["AT", "RT", "IT", "OAUTH_STATE", "OAUTH_PKCE", "XSRF-TOKEN"] {
        assert!(
            cookies.iter().any(|c| c.starts_with(&format!("{name}=;"))),
            "expected {name} to be cleared, got {cookies:?}"
        );
    }
}

#[tokio::test]
async fn test_unrouted_path_is_404_after_relay() {
    let gw = spawn_gateway().await;

    let response = client()
        .get(format!("{}/nowhere", gw.base))
        .header(COOKIE, "AT=tok")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
