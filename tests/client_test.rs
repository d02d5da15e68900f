#![cfg(feature = "web")]

mod common;

use chrono::NaiveDate;
use common::death_payload;
use report_console::client::ApiClient;
use report_console::config::ConsoleConfig;
use report_console::downloader::HeaderTrailer;
use report_console::loader::DropdownSource;
use report_console::report::{DateRange, ReportFilters, ReportProfile, builtin_profile};
use report_console::{FetchFailure, HierarchyIndex, ReportError, SelectionState};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// A request as the stub server saw it.
#[derive(Clone, Debug)]
struct Recorded {
    method: String,
    target: String,
    body: String,
}

impl Recorded {
    fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

/// Canned reply for one method and path.
struct Route {
    method: &'static str,
    path: &'static str,
    status: u16,
    body: String,
}

fn route(method: &'static str, path: &'static str, status: u16, body: impl ToString) -> Route {
    Route {
        method,
        path,
        status,
        body: body.to_string(),
    }
}

/// One-request-per-connection HTTP server on a loopback port. Unknown routes get 404.
struct StubServer {
    url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl StubServer {
    async fn start(routes: Vec<Route>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = requests.clone();
        let routes = Arc::new(routes);

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let routes = routes.clone();
                let log = log.clone();
                tokio::spawn(async move {
                    let Some(request) = read_request(&mut stream).await else {
                        return;
                    };
                    let path = request.target.split('?').next().unwrap_or_default();
                    let (status, body) = routes
                        .iter()
                        .find(|r| r.method == request.method && r.path == path)
                        .map(|r| (r.status, r.body.clone()))
                        .unwrap_or((404, "not found".to_string()));
                    log.lock().unwrap().push(request);

                    let reply = format!(
                        "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    let _ = stream.write_all(reply.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        StubServer { url, requests }
    }

    fn client(&self) -> ApiClient {
        client_for(&self.url)
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

async fn read_request(stream: &mut TcpStream) -> Option<Recorded> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let target = request_line.next()?.to_string();
    let length = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < head_end + length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let end = buf.len().min(head_end + length);
    let body = String::from_utf8_lossy(&buf[head_end..end]).to_string();

    Some(Recorded {
        method,
        target,
        body,
    })
}

fn client_for(url: &str) -> ApiClient {
    ApiClient::new(ConsoleConfig {
        api_url: url.to_string(),
        ..ConsoleConfig::default()
    })
}

fn profile(name: &str) -> ReportProfile {
    builtin_profile(name).unwrap()
}

fn generating_at(path: &str) -> ReportProfile {
    ReportProfile {
        generate_path: path.to_string(),
        ..profile("death")
    }
}

#[tokio::test]
async fn test_dropdown_payload_is_returned() {
    let server = StubServer::start(vec![route(
        "GET",
        "/api/dropdown-data-deathreport",
        200,
        death_payload(),
    )])
    .await;

    let payload = server.client().fetch_dropdowns(&profile("death")).await.unwrap();
    assert_eq!(payload, death_payload());

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].target, "/api/dropdown-data-deathreport");
}

#[tokio::test]
async fn test_dropdown_failures_are_classified() {
    let server = StubServer::start(vec![route(
        "GET",
        "/api/dropdown-data-deathreport",
        500,
        "{}",
    )])
    .await;
    match server.client().fetch_dropdowns(&profile("death")).await {
        Err(FetchFailure::Status { url, status }) => {
            assert_eq!(status, 500);
            assert!(url.ends_with("/api/dropdown-data-deathreport"));
        }
        other => panic!("expected status failure, got {:?}", other),
    }

    let server = StubServer::start(vec![route(
        "GET",
        "/api/dropdown-data-deathreport",
        200,
        "<html>maintenance</html>",
    )])
    .await;
    assert!(matches!(
        server.client().fetch_dropdowns(&profile("death")).await,
        Err(FetchFailure::Decode(_))
    ));
}

#[tokio::test]
async fn test_profile_without_dropdown_endpoint() {
    let server = StubServer::start(vec![]).await;

    match server.client().fetch_dropdowns(&profile("regulatory")).await {
        Err(FetchFailure::NoEndpoint(name)) => assert_eq!(name, "regulatory"),
        other => panic!("expected no endpoint, got {:?}", other),
    }
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn test_unreachable_server_is_transport_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let client = client_for(&url);
    assert!(matches!(
        client.fetch_dropdowns(&profile("death")).await,
        Err(FetchFailure::Transport(_))
    ));
    assert!(matches!(
        client.generate(&profile("death"), &json!({})).await,
        Err(ReportError::Fetch(FetchFailure::Transport(_)))
    ));
}

#[tokio::test]
async fn test_generate_checks_status_before_decoding() {
    let server = StubServer::start(vec![
        route("POST", "/bad-gateway", 502, "<html>Bad Gateway</html>"),
        route("POST", "/rejected", 400, json!({ "message": "Invalid branch" })),
        route("POST", "/garbage", 200, "<html>"),
        route("POST", "/empty", 200, json!({ "message": "No records found" })),
        route("POST", "/rows", 200, json!([{ "SrNo": 1, "Branch": "B101" }])),
    ])
    .await;
    let client = server.client();
    let body = json!({ "Cluster": "", "Region": "", "Branch": "B101" });

    match client.generate(&generating_at("/bad-gateway"), &body).await {
        Err(ReportError::Fetch(FetchFailure::Status { status, .. })) => assert_eq!(status, 502),
        other => panic!("expected status failure, got {:?}", other),
    }
    match client.generate(&generating_at("/rejected"), &body).await {
        Err(ReportError::Upstream(message)) => assert_eq!(message, "Invalid branch"),
        other => panic!("expected upstream message, got {:?}", other),
    }
    assert!(matches!(
        client.generate(&generating_at("/garbage"), &body).await,
        Err(ReportError::Fetch(FetchFailure::Decode(_)))
    ));
    assert!(matches!(
        client.generate(&generating_at("/empty"), &body).await,
        Err(ReportError::Upstream(_))
    ));

    let rows = client.generate(&generating_at("/rows"), &body).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["Branch"], "B101");

    let sent = server.requests().last().unwrap().json();
    assert_eq!(sent, body);
}

#[tokio::test]
async fn test_header_trailer_falls_back_to_blank() {
    let server = StubServer::start(vec![route(
        "POST",
        "/get-report-header-trailer",
        200,
        json!({ "header": "HDR|EQUIFAX", "trail": null }),
    )])
    .await;
    let wrap = server.client().header_trailer("Equifax").await;
    assert_eq!(wrap.header, "HDR|EQUIFAX");
    assert_eq!(wrap.trail, "");
    assert_eq!(server.requests()[0].json(), json!({ "reportType": "Equifax" }));

    let server = StubServer::start(vec![route("POST", "/get-report-header-trailer", 500, "{}")]).await;
    assert_eq!(server.client().header_trailer("CRIF").await, HeaderTrailer::default());
}

#[tokio::test]
async fn test_regulatory_download_wraps_flat_file() {
    let server = StubServer::start(vec![
        route(
            "POST",
            "/get-report-header-trailer",
            200,
            json!({ "header": "HDR|CRIF", "trail": "TRL|2" }),
        ),
        route(
            "POST",
            "/generate-report",
            200,
            json!([
                { "rec": "column names", "amt": "amount" },
                { "rec": " CUST01 ", "amt": 1200 },
                { "rec": "CUST02", "amt": 75.5 }
            ]),
        ),
    ])
    .await;

    let regulatory = profile("regulatory");
    let mut filters = ReportFilters {
        date_range: Some(DateRange::until(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap())),
        ..ReportFilters::default()
    };
    filters.extra.insert("reportType".to_string(), json!("CRIF"));
    filters.extra.insert("cutoff_date".to_string(), json!("2024-01-31"));
    let body = regulatory
        .request_body(&HierarchyIndex::empty(), &SelectionState::new(), &filters)
        .unwrap();

    let bytes = server.client().download(&regulatory, &body).await.unwrap();
    assert_eq!(
        String::from_utf8(bytes).unwrap(),
        "HDR|CRIF\nCUST01~1200\nCUST02~75.5\nTRL|2"
    );

    let requests = server.requests();
    let trailer_request = requests
        .iter()
        .find(|r| r.target == "/get-report-header-trailer")
        .unwrap();
    assert_eq!(trailer_request.json(), json!({ "reportType": "CRIF" }));
    let generate_request = requests.iter().find(|r| r.target == "/generate-report").unwrap();
    assert_eq!(
        generate_request.json(),
        json!({
            "fromDate": "",
            "toDate": "2024-01-31",
            "reportType": "CRIF",
            "cutoff_date": "2024-01-31"
        })
    );
}

#[tokio::test]
async fn test_spreadsheet_download_is_xlsx() {
    let server = StubServer::start(vec![route(
        "POST",
        "/generate-deathreport",
        200,
        json!([{ "SrNo": 1, "Branch": "B101" }]),
    )])
    .await;

    let bytes = server
        .client()
        .download(&profile("death"), &json!({ "Branch": "B101" }))
        .await
        .unwrap();
    assert_eq!(&bytes[..2], b"PK");
    assert!(
        server
            .requests()
            .iter()
            .all(|r| r.target != "/get-report-header-trailer")
    );
}
