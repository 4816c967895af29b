//! Integration tests for the backend clients against mock HTTP servers
//!
//! Covers the profile batch endpoint behind the TTL cache, IPFS gateway
//! fallback, cursor paging over the dare list, aggregate stats, notifications,
//! the SOL price client and the console's page load wiring.

use dare_admin::app::{App, AppState};
use dare_admin::cache::{BatchedTtlCache, CacheConfig, CacheLookup};
use dare_admin::data::notifications::NotificationRequest;
use dare_admin::data::sol_price::{PriceError, PriceSource};
use dare_admin::data::{
    AdminAuth, DareFilter, DareListClient, DareStatsClient, DareStatus, IpfsClient, IpfsError,
    NotificationClient, NotificationType, PriceCache, ProfileClient, ProfileData, SolPriceClient,
    StatsError,
};
use dare_admin::pager::{CursorPager, PageCursor, PagerStatus};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use mockito::{Matcher, Server};
use serde_json::json;

const CID: &str = "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG";

fn dare(mint: &str, creator: &str) -> serde_json::Value {
    json!({
        "tokenMint": mint,
        "creator": creator,
        "dareStatus": "open",
        "tradeStatus": "open",
        "payout": "2000000000",
        "openTimestamp": 0,
        "openDuration": 86400,
        "isBlocked": false,
        "submitters": [],
        "ipfsCid": CID
    })
}

fn list_body(rows: Vec<serde_json::Value>) -> String {
    json!({ "success": true, "data": rows }).to_string()
}

#[tokio::test]
async fn test_profile_cache_batches_and_fills_gaps() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/admin/profiles/batch")
        .match_header("authorization", "Bearer admin-token")
        .match_body(Matcher::Json(json!({ "wallets": ["W1", "W2"] })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "success": true,
                "data": [{ "wallet": "W1", "username": "alice", "displayName": "Alice" }]
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let client = ProfileClient::new(server.url(), AdminAuth::bearer("admin-token"));
    let cache = BatchedTtlCache::new(client, CacheConfig::profiles());

    let profiles = cache.get_many(["W1", "W2", "W1", ""]).await;
    assert_eq!(profiles.len(), 2);
    assert_eq!(profiles["W1"].display_name.as_deref(), Some("Alice"));
    assert_eq!(profiles["W2"], ProfileData::empty("W2"));

    // Served from memory the second time
    let again = cache.get_many(["W2", "W1"]).await;
    assert_eq!(again["W1"].username.as_deref(), Some("alice"));
    assert!(matches!(cache.lookup("W1"), CacheLookup::Fresh(_)));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_profile_backend_error_yields_cached_placeholders() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/admin/profiles/batch")
        .with_status(500)
        .expect(1)
        .create_async()
        .await;

    let cache = BatchedTtlCache::new(
        ProfileClient::new(server.url(), AdminAuth::none()),
        CacheConfig::profiles(),
    );

    let profiles = cache.get_many(["W1"]).await;
    assert_eq!(profiles["W1"], ProfileData::empty("W1"));

    // The placeholder is stored like any fetched value until it expires
    match cache.lookup("W1") {
        CacheLookup::Fresh(profile) => assert_eq!(profile, ProfileData::empty("W1")),
        _ => panic!("placeholder should be cached"),
    }
    cache.get("W1").await;
    mock.assert_async().await;
}

#[tokio::test]
async fn test_profile_backend_success_false_is_rejected() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/api/admin/profiles/batch")
        .with_status(200)
        .with_body(json!({ "success": false, "error": "Maximum 1000 wallets allowed per request" }).to_string())
        .create_async()
        .await;

    let client = ProfileClient::new(server.url(), AdminAuth::none());
    let err = client.fetch_profiles(&["W1".to_string()]).await.unwrap_err();
    assert!(err.to_string().contains("Maximum 1000 wallets"));
}

#[tokio::test]
async fn test_ipfs_falls_back_to_next_gateway() {
    let mut server = Server::new_async().await;
    let bad = server
        .mock("GET", format!("/bad/ipfs/{}", CID).as_str())
        .with_status(502)
        .create_async()
        .await;
    let good = server
        .mock("GET", format!("/good/ipfs/{}", CID).as_str())
        .match_header("accept", "application/json")
        .with_status(200)
        .with_body(json!({ "title": "Eat a lemon", "properties": { "rules": ["No sugar"] } }).to_string())
        .create_async()
        .await;

    let client = IpfsClient::with_gateways(vec![
        format!("{}/bad/ipfs/", server.url()),
        format!("{}/good/ipfs/", server.url()),
    ]);
    let metadata = client.fetch_metadata(CID).await.unwrap();

    assert_eq!(metadata.display_title(), Some("Eat a lemon"));
    assert_eq!(metadata.properties.rules, vec!["No sugar".to_string()]);
    bad.assert_async().await;
    good.assert_async().await;
}

#[tokio::test]
async fn test_ipfs_exhaustion_reports_every_gateway() {
    let mut server = Server::new_async().await;
    let _missing = server
        .mock("GET", Matcher::Regex("^/g[12]/ipfs/".to_string()))
        .with_status(404)
        .create_async()
        .await;

    let client = IpfsClient::with_gateways(vec![
        format!("{}/g1/ipfs/", server.url()),
        format!("{}/g2/ipfs/", server.url()),
    ]);
    match client.fetch_metadata(CID).await.unwrap_err() {
        IpfsError::GatewayExhausted { attempts, .. } => {
            assert_eq!(attempts.len(), 2);
            assert!(attempts.iter().all(|a| a.contains("HTTP 404")));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_metadata_cache_remembers_failed_cids() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", format!("/ipfs/{}", CID).as_str())
        .with_status(404)
        .expect(1)
        .create_async()
        .await;

    let cache = BatchedTtlCache::new(
        IpfsClient::with_gateways(vec![format!("{}/ipfs/", server.url())]),
        CacheConfig::ipfs_metadata(),
    );

    let first = cache.get(CID).await;
    assert_eq!(first.display_title(), None);
    assert!(matches!(cache.lookup(CID), CacheLookup::KnownMissing));

    cache.get(CID).await;
    mock.assert_async().await;
}

#[tokio::test]
async fn test_dare_pager_walks_forward_and_back() {
    let mut server = Server::new_async().await;
    let first = server
        .mock("GET", "/api/admin/dares/list")
        .match_query(Matcher::Exact(
            "limit=2&includeDisabled=true&includeExpired=true".to_string(),
        ))
        .with_status(200)
        .with_body(list_body(vec![dare("M1", "C1"), dare("M2", "C2")]))
        .expect(2)
        .create_async()
        .await;
    let second = server
        .mock("GET", "/api/admin/dares/list")
        .match_query(Matcher::Exact(
            "limit=2&cursor=M2&includeDisabled=true&includeExpired=true".to_string(),
        ))
        .with_status(200)
        .with_body(list_body(vec![dare("M3", "C3")]))
        .expect(1)
        .create_async()
        .await;

    let client = DareListClient::new(server.url(), AdminAuth::none());
    let mut pager = CursorPager::new(client, 2, DareFilter::default());

    pager.reset_and_fetch(DareFilter::default()).await.unwrap();
    assert_eq!(pager.rows().len(), 2);
    assert!(pager.state().has_next);
    assert!(!pager.state().has_prev);
    assert_eq!(pager.state().next_cursor, Some(PageCursor::from("M2")));

    pager.go_next().await.unwrap();
    assert_eq!(pager.rows()[0].token_mint, "M3");
    assert!(!pager.state().has_next);
    assert!(pager.state().has_prev);
    assert_eq!(pager.state().page_number(), 2);

    pager.go_prev().await.unwrap();
    assert_eq!(pager.rows()[0].token_mint, "M1");
    assert_eq!(pager.state().page_number(), 1);
    assert!(!pager.state().has_prev);

    first.assert_async().await;
    second.assert_async().await;
}

#[tokio::test]
async fn test_dare_list_sends_status_filters() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/admin/dares/list")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("status".to_string(), "accepted".to_string()),
            Matcher::UrlEncoded("submissionStatus".to_string(), "WINNER".to_string()),
        ]))
        .with_status(200)
        .with_body(list_body(Vec::new()))
        .create_async()
        .await;

    let filter = DareFilter {
        status: Some(DareStatus::Accepted),
        submission_status: Some(dare_admin::data::SubmissionStatus::Winner),
    };
    let mut pager = CursorPager::new(
        DareListClient::new(server.url(), AdminAuth::none()),
        50,
        filter,
    );
    pager.reset_and_fetch(filter).await.unwrap();

    assert!(pager.rows().is_empty());
    assert!(!pager.state().has_next);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_dare_list_failure_keeps_previous_page() {
    let mut server = Server::new_async().await;
    let _first = server
        .mock("GET", "/api/admin/dares/list")
        .match_query(Matcher::Exact(
            "limit=1&includeDisabled=true&includeExpired=true".to_string(),
        ))
        .with_status(200)
        .with_body(list_body(vec![dare("M1", "C1")]))
        .create_async()
        .await;
    let _broken = server
        .mock("GET", "/api/admin/dares/list")
        .match_query(Matcher::UrlEncoded("cursor".to_string(), "M1".to_string()))
        .with_status(503)
        .create_async()
        .await;

    let mut pager = CursorPager::new(
        DareListClient::new(server.url(), AdminAuth::none()),
        1,
        DareFilter::default(),
    );
    pager.reset_and_fetch(DareFilter::default()).await.unwrap();
    let before = pager.state().clone();

    let err = pager.go_next().await.unwrap_err();
    assert!(err.to_string().contains("503"));
    assert_eq!(pager.state(), &before);
    assert_eq!(pager.rows()[0].token_mint, "M1");
    assert!(matches!(pager.status(), PagerStatus::Error(_)));
}

#[tokio::test]
async fn test_notification_send_reports_outcome() {
    let mut server = Server::new_async().await;
    let ok = server
        .mock("POST", "/api/notifications")
        .match_header("authorization", "Bearer tok")
        .match_body(Matcher::Json(json!({
            "wallet": "Wallet1",
            "type": "SUBMISSION_APPROVED_SUBMITTER",
            "dareMint": "Mint1"
        })))
        .with_status(200)
        .with_body(json!({ "success": true }).to_string())
        .create_async()
        .await;

    let client = NotificationClient::new(server.url(), AdminAuth::bearer("tok"));
    let request = NotificationRequest::new("Wallet1", NotificationType::SubmissionApprovedSubmitter)
        .with_dare_mint("Mint1");
    assert!(client.send(&request).await);
    ok.assert_async().await;

    let _failing = server
        .mock("POST", "/api/notifications")
        .match_body(Matcher::PartialJson(json!({ "wallet": "Wallet2" })))
        .with_status(500)
        .create_async()
        .await;
    let handle = client.dispatch_detached(NotificationRequest::new(
        "Wallet2",
        NotificationType::GeneralAlert,
    ));
    assert!(!handle.await.unwrap());
}

#[tokio::test]
async fn test_sol_price_client_parses_and_validates() {
    let mut server = Server::new_async().await;
    let _price = server
        .mock("GET", "/api/v3/simple/price")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("ids".to_string(), "solana".to_string()),
            Matcher::UrlEncoded("vs_currencies".to_string(), "usd".to_string()),
        ]))
        .with_status(200)
        .with_body(json!({ "solana": { "usd": 150.25 } }).to_string())
        .expect(1)
        .create_async()
        .await;

    let cache = PriceCache::new(SolPriceClient::with_base_url(server.url()));
    assert_eq!(cache.get_price().await, Some(150.25));
    assert_eq!(cache.get_price().await, Some(150.25));

    let mut bad_server = Server::new_async().await;
    let _bad = bad_server
        .mock("GET", "/api/v3/simple/price")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(json!({ "solana": { "usd": -3 } }).to_string())
        .create_async()
        .await;
    let err = SolPriceClient::with_base_url(bad_server.url())
        .fetch_price()
        .await
        .unwrap_err();
    assert!(matches!(err, PriceError::InvalidPrice));
}

#[tokio::test]
async fn test_app_first_load_enriches_rows() {
    let mut server = Server::new_async().await;
    let _list = server
        .mock("GET", "/api/admin/dares/list")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(list_body(vec![dare("M1", "C1"), dare("M2", "C1")]))
        .create_async()
        .await;
    let profiles = server
        .mock("POST", "/api/admin/profiles/batch")
        .match_body(Matcher::Json(json!({ "wallets": ["C1"] })))
        .with_status(200)
        .with_body(json!({ "success": true, "data": [{ "wallet": "C1", "username": "creator1" }] }).to_string())
        .expect(1)
        .create_async()
        .await;
    let metadata = server
        .mock("GET", format!("/ipfs/{}", CID).as_str())
        .with_status(200)
        .with_body(json!({ "name": "Climb a tree" }).to_string())
        .expect(1)
        .create_async()
        .await;
    let _price = server
        .mock("GET", "/api/v3/simple/price")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(json!({ "solana": { "usd": "100" } }).to_string())
        .create_async()
        .await;

    let stats = server
        .mock("GET", "/api/admin/dares/stats")
        .with_status(200)
        .with_body(
            json!({
                "success": true,
                "data": {
                    "totalDares": 2,
                    "activeDares": 2,
                    "completedDares": 0,
                    "unverifiedDares": 0,
                    "totalPayoutLamports": "4000000000",
                    "averagePayoutLamports": "2000000000"
                }
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let mut app = App::with_clients(
        DareListClient::new(server.url(), AdminAuth::none()),
        DareStatsClient::new(server.url(), AdminAuth::none()),
        BatchedTtlCache::new(
            ProfileClient::new(server.url(), AdminAuth::none()),
            CacheConfig::profiles(),
        ),
        BatchedTtlCache::new(
            IpfsClient::with_gateways(vec![format!("{}/ipfs/", server.url())]),
            CacheConfig::ipfs_metadata(),
        ),
        PriceCache::new(SolPriceClient::with_base_url(server.url())),
        50,
    );

    app.process_pending().await;
    app.wait_for_titles().await;

    assert_eq!(app.state, AppState::DareList);
    assert_eq!(app.rows().len(), 2);
    assert!(app.status_message.is_none());
    assert_eq!(
        app.creator_profile("C1").and_then(|p| p.username.as_deref()),
        Some("creator1")
    );
    assert_eq!(app.dare_title(CID), Some(Some("Climb a tree")));
    assert_eq!(app.sol_price, Some(100.0));
    assert!(!app.pager_state().has_next);
    let summary = app.stats_summary().unwrap();
    assert_eq!(summary.total_dares, 2);
    assert_eq!(summary.total_payout_label(), "$400.00");

    // Changing the page size reloads rows but keeps the loaded stats
    app.handle_key(KeyEvent::new(KeyCode::Char('z'), KeyModifiers::NONE));
    app.process_pending().await;
    assert_eq!(app.page_size(), 100);
    assert_eq!(app.pager_state().page_number(), 1);

    profiles.assert_async().await;
    metadata.assert_async().await;
    stats.assert_async().await;
}

#[tokio::test]
async fn test_dare_stats_client_fetches_with_auth() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/admin/dares/stats")
        .match_header("authorization", "Bearer stats-token")
        .with_status(200)
        .with_body(
            json!({
                "success": true,
                "data": {
                    "totalDares": 12,
                    "activeDares": 4,
                    "completedDares": 6,
                    "unverifiedDares": 2,
                    "totalPayoutLamports": "15000000000",
                    "averagePayoutLamports": "1250000000"
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = DareStatsClient::new(server.url(), AdminAuth::bearer("stats-token"));
    let stats = client.fetch_stats().await.unwrap();
    assert_eq!(stats.total_dares, 12);
    assert_eq!(stats.total_payout_lamports, 15_000_000_000);

    let summary = stats.summarize(Some(100.0));
    assert_eq!(summary.total_payout_usd.as_deref(), Some("$1.5K"));
    assert_eq!(summary.average_payout_sol, "1.25");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_dare_stats_client_reports_backend_failure() {
    let mut server = Server::new_async().await;
    let _rejected = server
        .mock("GET", "/api/admin/dares/stats")
        .with_status(200)
        .with_body(json!({ "success": false, "error": "stats offline" }).to_string())
        .create_async()
        .await;

    let err = DareStatsClient::new(server.url(), AdminAuth::none())
        .fetch_stats()
        .await
        .unwrap_err();
    assert!(matches!(err, StatsError::Backend(ref message) if message == "stats offline"));

    let mut down = Server::new_async().await;
    let _status = down
        .mock("GET", "/api/admin/dares/stats")
        .with_status(503)
        .create_async()
        .await;
    let err = DareStatsClient::new(down.url(), AdminAuth::none())
        .fetch_stats()
        .await
        .unwrap_err();
    assert!(matches!(err, StatsError::Status(503)));
}
