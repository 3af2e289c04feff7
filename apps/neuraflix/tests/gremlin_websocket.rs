//! Integration tests for the WebSocket Gremlin transport.
//!
//! An axum WebSocket endpoint plays a Cosmos DB Gremlin account: it asks for
//! SASL PLAIN credentials on the first request of each connection, answers
//! by script shape, and splits count results over partial frames.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::any;
use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use neuraflix::backend::{GraphBackend, GraphWriter, UpsertWriter};
use neuraflix::error::GraphWriteError;
use neuraflix::gremlin_client::GremlinSettings;
use neuraflix_core::{EdgePolicy, MovieRecord, Upserter};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const USERNAME: &str = "/dbs/neuraflix/colls/movies";
const KEY: &str = "primary-key";
const MIME: &str = "application/vnd.gremlin-v2.0+json";

#[derive(Clone, Default)]
struct Cosmos {
    evals: Arc<Mutex<Vec<Value>>>,
    mimes: Arc<Mutex<Vec<String>>>,
    logins: Arc<Mutex<Vec<Vec<u8>>>>,
    connections: Arc<Mutex<usize>>,
}

fn response(request_id: &str, code: u16, data: Value) -> Message {
    let body = json!({
        "requestId": request_id,
        "status": {"code": code, "message": if code == 401 { "Unauthorized" } else { "" }, "attributes": {}},
        "result": {"data": data, "meta": {}}
    });
    Message::Text(body.to_string().into())
}

fn count(n: i64) -> Value {
    json!([{"@type": "g:Int64", "@value": n}])
}

async fn answer(socket: &mut WebSocket, cosmos: &Cosmos, request: Value) {
    let id = request["requestId"].as_str().unwrap().to_string();
    let script = request["args"]["gremlin"].as_str().unwrap().to_string();
    cosmos.evals.lock().unwrap().push(request);

    let frames = if script == "g.V().count()" {
        // A frame for some other request first, then a partial frame.
        vec![
            response("00000000-0000-0000-0000-000000000000", 200, count(99)),
            response(&id, 206, json!([])),
            response(&id, 200, count(7)),
        ]
    } else if script == "g.E().count()" {
        vec![response(&id, 206, count(3)), response(&id, 200, json!([]))]
    } else if script.contains("coalesce(unfold().constant(false)") || script.contains("coalesce(inE(") {
        vec![response(&id, 200, json!([true]))]
    } else if script.contains("addE(") {
        vec![response(&id, 200, count(1))]
    } else {
        vec![response(&id, 200, count(0))]
    };
    for frame in frames {
        socket.send(frame).await.unwrap();
    }
}

async fn serve(mut socket: WebSocket, cosmos: Cosmos) {
    *cosmos.connections.lock().unwrap() += 1;
    let mut authenticated = false;
    let mut waiting: Option<Value> = None;

    while let Some(Ok(message)) = socket.recv().await {
        let Message::Binary(frame) = message else {
            continue;
        };
        let mime_len = frame[0] as usize;
        cosmos
            .mimes
            .lock()
            .unwrap()
            .push(String::from_utf8(frame[1..=mime_len].to_vec()).unwrap());
        let request: Value = serde_json::from_slice(&frame[1 + mime_len..]).unwrap();
        let id = request["requestId"].as_str().unwrap().to_string();

        match request["op"].as_str().unwrap() {
            "eval" if authenticated => answer(&mut socket, &cosmos, request).await,
            "eval" => {
                waiting = Some(request);
                socket.send(response(&id, 407, Value::Null)).await.unwrap();
            }
            "authentication" => {
                assert_eq!(request["args"]["saslMechanism"], "PLAIN");
                let login = BASE64_STANDARD
                    .decode(request["args"]["SASL"].as_str().unwrap())
                    .unwrap();
                cosmos.logins.lock().unwrap().push(login.clone());
                if login == format!("\0{USERNAME}\0{KEY}").into_bytes() {
                    authenticated = true;
                    let pending = waiting.take().unwrap();
                    assert_eq!(pending["requestId"], id.as_str());
                    answer(&mut socket, &cosmos, pending).await;
                } else {
                    socket.send(response(&id, 401, Value::Null)).await.unwrap();
                }
            }
            other => panic!("unexpected op {other}"),
        }
    }
}

async fn upgrade(State(cosmos): State<Cosmos>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| serve(socket, cosmos))
}

async fn spawn_cosmos() -> (Cosmos, String) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("ws://{}/gremlin", listener.local_addr().unwrap());
    let cosmos = Cosmos::default();
    let router = Router::new()
        .route("/gremlin", any(upgrade))
        .with_state(cosmos.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    (cosmos, endpoint)
}

fn backend(endpoint: &str, key: &str) -> GraphBackend {
    GraphBackend::Gremlin(GremlinSettings {
        endpoint: endpoint.to_string(),
        username: USERNAME.to_string(),
        key: key.to_string(),
        timeout: Duration::from_secs(5),
    })
}

fn toy_story() -> MovieRecord {
    MovieRecord::new("Toy Story", "1995", "Animation")
        .with_directors(["John Lasseter"])
        .with_actors(["Tom Hanks", "Tim Allen", "Don Rickles"])
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn upsert_over_websocket_authenticates_once_per_session() {
    let (cosmos, endpoint) = spawn_cosmos().await;
    let writer = UpsertWriter::new(
        backend(&endpoint, KEY),
        Upserter::new(EdgePolicy::Unique),
        Duration::from_secs(10),
    );

    let report = writer
        .write(toy_story(), "https://blob/toy.jpg".to_string())
        .await
        .unwrap();
    assert!(report.movie_created);
    assert_eq!(report.edges_added, 4);

    assert_eq!(*cosmos.connections.lock().unwrap(), 1);
    assert_eq!(cosmos.logins.lock().unwrap().len(), 1);

    let evals = cosmos.evals.lock().unwrap();
    // movie, director + edge, 3 × (actor + edge)
    assert_eq!(evals.len(), 9);
    for request in evals.iter() {
        assert_eq!(request["processor"], "");
        assert_eq!(request["args"]["language"], "gremlin-groovy");
        let script = request["args"]["gremlin"].as_str().unwrap();
        assert!(!script.contains("Toy Story"));
        assert!(!script.contains("Tom Hanks"));
    }
    let movie = &evals[0];
    assert!(movie["args"]["gremlin"].as_str().unwrap().starts_with("g.V().has('movie', 'id', vid)"));
    assert_eq!(movie["args"]["bindings"]["vid"], "Toy_Story");

    // Nine evals plus the login, all GraphSON v2.
    let mimes = cosmos.mimes.lock().unwrap();
    assert_eq!(mimes.len(), 10);
    assert!(mimes.iter().all(|m| m == MIME));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn partial_frames_are_joined_and_foreign_frames_skipped() {
    let (_cosmos, endpoint) = spawn_cosmos().await;
    let stats = backend(&endpoint, KEY)
        .stats(Duration::from_secs(10))
        .await
        .unwrap();
    assert_eq!(stats.vertices, 7);
    assert_eq!(stats.edges, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rejected_credentials_fail_the_write() {
    let (cosmos, endpoint) = spawn_cosmos().await;
    let writer = UpsertWriter::new(
        backend(&endpoint, "wrong-key"),
        Upserter::default(),
        Duration::from_secs(10),
    );
    let err = writer.write(toy_story(), "u".to_string()).await.unwrap_err();

    assert!(matches!(err, GraphWriteError::Upsert(ref f) if f.step == "movie vertex"));
    assert!(err.to_string().contains("401"));
    assert!(cosmos.evals.lock().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unreachable_endpoint_is_a_write_failure() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("ws://{}/gremlin", listener.local_addr().unwrap());
    drop(listener);

    let writer = UpsertWriter::new(backend(&endpoint, KEY), Upserter::default(), Duration::from_secs(10));
    let err = writer.write(toy_story(), "u".to_string()).await.unwrap_err();
    assert!(matches!(err, GraphWriteError::Session(_)));
    assert!(err.to_string().contains("gremlin connect"));
}
