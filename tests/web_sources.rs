use email_enricher_core::discovery::{ArchiveSource, DorkSource, SocialSource, WebsiteSource};
use email_enricher_core::{
    CandidateSource, Config, DecisionMakerFinder, DiscoveryContext, Domain, EmailVerifier,
    VerificationOutcome, VerificationReason,
};

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html")
        .set_body_string(body.to_string())
}

fn acme() -> Domain {
    Domain::parse("acme.co").unwrap()
}

fn base(server: &MockServer) -> Url {
    Url::parse(&format!("{}/", server.uri())).unwrap()
}

#[tokio::test]
async fn website_crawl_reads_home_and_contact_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<footer><a href="mailto:hello@acme.co">Email us</a></footer>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/contact"))
        .respond_with(html("<p>Sales: sales [at] nowhere, sales&#64;acme.co</p>"))
        .mount(&server)
        .await;
    // Everything else (e.g. /about) is a 404 and must not sink the crawl.

    let source = WebsiteSource::new(Arc::new(Config::default()), reqwest::Client::new())
        .with_base_url(base(&server));
    let found = source.discover(&acme(), &DiscoveryContext::default()).await.unwrap();

    assert_eq!(found, vec!["hello@acme.co", "sales@acme.co"]);
}

#[tokio::test]
async fn website_crawl_fails_when_no_page_loads() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let source = WebsiteSource::new(Arc::new(Config::default()), reqwest::Client::new())
        .with_base_url(base(&server));
    assert!(source.discover(&acme(), &DiscoveryContext::default()).await.is_err());
}

#[tokio::test]
async fn dork_queries_for_the_domain_and_keeps_matching_addresses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/html/"))
        .and(query_param("q", "\"@acme.co\""))
        .respond_with(html(
            "<div class=result>Contact jane@acme.co or bob@competitor.com</div>\
             <div class=result>billing@acme.co</div>",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let config = Config {
        search_url: format!("{}/html/", server.uri()),
        ..Config::default()
    };
    let source = DorkSource::new(Arc::new(config), reqwest::Client::new());
    let found = source.discover(&acme(), &DiscoveryContext::default()).await.unwrap();

    assert_eq!(found, vec!["jane@acme.co", "billing@acme.co"]);
}

#[tokio::test]
async fn archive_follows_closest_snapshot() {
    let server = MockServer::start().await;
    let snapshot = format!("{}/web/20200101000000/https://acme.co/", server.uri());
    Mock::given(method("GET"))
        .and(path("/wayback/available"))
        .and(query_param("url", "acme.co"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "url": "acme.co",
            "archived_snapshots": {
                "closest": { "status": "200", "available": true, "url": snapshot, "timestamp": "20200101000000" }
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/web/20200101000000/https://acme.co/"))
        .respond_with(html("<p>Write to owner@acme.co</p>"))
        .mount(&server)
        .await;

    let config = Config {
        archive_url: format!("{}/wayback/available", server.uri()),
        ..Config::default()
    };
    let source = ArchiveSource::new(Arc::new(config), reqwest::Client::new());
    let found = source.discover(&acme(), &DiscoveryContext::default()).await.unwrap();

    assert_eq!(found, vec!["owner@acme.co"]);
}

#[tokio::test]
async fn archive_without_snapshot_finds_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wayback/available"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "url": "acme.co", "archived_snapshots": {} })),
        )
        .mount(&server)
        .await;

    let config = Config {
        archive_url: format!("{}/wayback/available", server.uri()),
        ..Config::default()
    };
    let source = ArchiveSource::new(Arc::new(config), reqwest::Client::new());
    let found = source.discover(&acme(), &DiscoveryContext::default()).await.unwrap();
    assert!(found.is_empty());
}

#[tokio::test]
async fn social_scans_linked_profiles() {
    let server = MockServer::start().await;
    let profile = format!("{}/profile/acme", server.uri());
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(&format!(r#"<a href="{}">Follow us</a><a href="/about">About</a>"#, profile)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/profile/acme"))
        .respond_with(html("<span>Bookings: events@acme.co</span>"))
        .mount(&server)
        .await;

    let config = Config {
        social_hosts: vec!["127.0.0.1".to_string()],
        ..Config::default()
    };
    let source = SocialSource::new(Arc::new(config), reqwest::Client::new()).with_base_url(base(&server));
    let found = source.discover(&acme(), &DiscoveryContext::default()).await.unwrap();

    assert_eq!(found, vec!["events@acme.co"]);
}

/// Confirms only the listed addresses.
struct Confirms(Vec<&'static str>, Mutex<Vec<String>>);

#[async_trait]
impl EmailVerifier for Confirms {
    async fn verify(&self, address: &str) -> VerificationOutcome {
        self.1.lock().unwrap().push(address.to_string());
        if self.0.contains(&address) {
            VerificationOutcome::confirmed(address)
        } else {
            VerificationOutcome::invalid(address, VerificationReason::MailboxNotFound)
        }
    }
}

#[tokio::test]
async fn decision_maker_is_found_and_personal_mailbox_confirmed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(html(
            "<section><h2>Our story</h2><p>Jane Smith, Founder</p><p>Mark Lee - Office Manager</p></section>",
        ))
        .mount(&server)
        .await;

    let config = Arc::new(Config {
        sleep_between_requests: (0.0, 0.0),
        ..Config::default()
    });
    let verifier = Arc::new(Confirms(vec!["jane.smith@acme.co"], Mutex::new(Vec::new())));
    let finder = DecisionMakerFinder::new(config, reqwest::Client::new(), verifier.clone())
        .with_base_url(base(&server));

    let dm = finder.find(&acme(), true).await.expect("decision maker");

    assert_eq!(dm.name, "Jane Smith");
    assert_eq!(dm.title, "Founder");
    assert_eq!(dm.email.as_deref(), Some("jane.smith@acme.co"));
    assert!(dm.email_verified);
    assert!(dm.source_url.ends_with("/about"));
    assert!(verifier.1.lock().unwrap().len() <= 3);
}

#[tokio::test]
async fn decision_maker_without_verification_guesses_first_pattern() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/team"))
        .respond_with(html("<p>Owner: Tom Baker</p>"))
        .mount(&server)
        .await;

    let verifier = Arc::new(Confirms(vec![], Mutex::new(Vec::new())));
    let finder = DecisionMakerFinder::new(Arc::new(Config::default()), reqwest::Client::new(), verifier.clone())
        .with_base_url(base(&server));

    let dm = finder.find(&acme(), false).await.expect("decision maker");

    assert_eq!(dm.name, "Tom Baker");
    assert!(dm.email.as_deref().is_some_and(|e| e.ends_with("@acme.co")));
    assert!(!dm.email_verified);
    assert!(verifier.1.lock().unwrap().is_empty());
}
