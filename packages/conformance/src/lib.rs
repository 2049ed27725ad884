//! Shared helpers for the hyperwire conformance suite.
//!
//! [`spawn_backend`] starts an in-process mock of a device management
//! server on an ephemeral port: a device collection, a discovery method
//! that runs as a job, and the message-queue endpoints jobs report
//! progress through. [`INVENTORY_SCHEMA`] describes it.
//!
//! The client under test is blocking, so the server runs on its own
//! runtime thread and tests are plain `#[test]` functions.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use axum::extract::{Path, Query, State};
use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use hyperwire::xml::{self, DataNode};

/// Schema of the mock server.
pub const INVENTORY_SCHEMA: &str = r#"
services:
  device_management:
    url: /api/space/device-management
    collections:
      devices:
        resource_type: device_management.device
        xml_name: devices
        media_type: application/vnd.devices+xml;version=2;charset=UTF-8
    methods:
      discover_devices:
        name: discover-devices
        request_type: application/vnd.discover+xml;version=1
        response_type: application/vnd.task+xml;version=1
        request_template: "<discover><target>{{ ip }}</target></discover>"
    resources:
      device:
        xml_name: device
        collection_name: devices
        service_url: /api/space/device-management
        media_type:
          1: application/vnd.device+xml;version=1
          2: application/vnd.device+xml;version=2
"#;

/// The only Accept the device listing answers; anything else is a 406.
pub const DEVICES_ACCEPT: &str = "application/vnd.devices+xml;version=2";

/// Discovering this target queues a job that never reports progress.
pub const SILENT_TARGET: &str = "192.0.2.1";

const SERVICE: &str = "/api/space/device-management";
const QUEUES: &str = "/api/hornet-q/queues";
/// Origin the server uses for URLs it hands out, as a real one would.
const INTERNAL_ORIGIN: &str = "http://localhost:8080";

/// Start the mock server and return its base URL, e.g.
/// `http://127.0.0.1:51234`.
///
/// # Panics
///
/// Panics if the listener cannot be bound.
pub fn spawn_backend() -> String {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .expect("build backend runtime");
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                .await
                .expect("bind ephemeral port");
            let addr = listener.local_addr().expect("get local addr");
            tx.send(format!("http://{addr}")).expect("report backend address");
            axum::serve(listener, router())
                .await
                .expect("conformance backend error");
        });
    });
    rx.recv().expect("backend failed to start")
}

// --- state -------------------------------------------------------------------

#[derive(Clone)]
struct Device {
    name: String,
    platform: String,
    ip_address: String,
}

#[derive(Default)]
struct Backend {
    devices: BTreeMap<u64, Device>,
    next_device: u64,
    next_job: u64,
    /// Pending messages, keyed by queue path segment (`jms.queue.<name>`).
    queues: HashMap<String, VecDeque<String>>,
    /// Final progress-update of each finished job.
    jobs: HashMap<u64, String>,
}

type Shared = Arc<Mutex<Backend>>;

fn lock(shared: &Shared) -> std::sync::MutexGuard<'_, Backend> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

fn router() -> Router {
    let mut backend = Backend::default();
    for (name, platform, ip) in [
        ("edge-01", "MX480", "10.0.0.1"),
        ("edge-02", "MX480", "10.0.0.2"),
        ("core-01", "PTX10008", "10.0.1.1"),
    ] {
        backend.next_device += 1;
        backend.devices.insert(
            backend.next_device,
            Device {
                name: name.into(),
                platform: platform.into(),
                ip_address: ip.into(),
            },
        );
    }
    let shared: Shared = Arc::new(Mutex::new(backend));

    Router::new()
        .route(
            &format!("{SERVICE}/devices"),
            get(list_devices).post(create_device),
        )
        .route(
            &format!("{SERVICE}/devices/{{id}}"),
            get(get_device).put(update_device).delete(delete_device),
        )
        .route(&format!("{SERVICE}/discover-devices"), post(discover))
        .route(
            "/api/space/job-management/jobs/{id}/progress-update",
            get(job_progress),
        )
        .route(QUEUES, post(create_queue))
        .route(
            &format!("{QUEUES}/{{queue}}"),
            get(queue_info).delete(delete_queue),
        )
        .route(
            &format!("{QUEUES}/{{queue}}/pull-consumers"),
            post(create_consumer),
        )
        .route(
            &format!("{QUEUES}/{{queue}}/pull-consumers/{{consumer}}/{{step}}"),
            post(consume_next),
        )
        .with_state(shared)
}

// --- devices -----------------------------------------------------------------

fn device_xml(id: u64, d: &Device) -> String {
    DataNode::new("device")
        .with_attribute("href", format!("{SERVICE}/devices/{id}"))
        .with_child(DataNode::new("id").with_text(id.to_string()))
        .with_child(DataNode::new("name").with_text(d.name.as_str()))
        .with_child(DataNode::new("platform").with_text(d.platform.as_str()))
        .with_child(DataNode::new("ip-address").with_text(d.ip_address.as_str()))
        .to_xml()
}

fn xml_response(status: StatusCode, body: String) -> Response {
    (status, [(CONTENT_TYPE, "application/xml")], body).into_response()
}

async fn list_devices(
    State(shared): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let accept = headers.get(ACCEPT).and_then(|v| v.to_str().ok());
    if accept != Some(DEVICES_ACCEPT) {
        return StatusCode::NOT_ACCEPTABLE.into_response();
    }

    let backend = lock(&shared);
    let platform = params
        .get("filter")
        .and_then(|f| quoted_after(f, "platform eq '"));
    let paging = params.get("paging");
    let start = paging.and_then(|p| number_after(p, "start eq ")).unwrap_or(0);
    let limit = paging
        .and_then(|p| number_after(p, "limit eq "))
        .unwrap_or(u64::MAX);

    let selected: Vec<String> = backend
        .devices
        .iter()
        .filter(|(_, d)| platform.map_or(true, |p| d.platform == p))
        .skip(usize::try_from(start).unwrap_or(usize::MAX))
        .take(usize::try_from(limit).unwrap_or(usize::MAX))
        .map(|(id, d)| device_xml(*id, d))
        .collect();

    if selected.is_empty() {
        return StatusCode::NO_CONTENT.into_response();
    }
    xml_response(
        StatusCode::OK,
        format!("<devices>{}</devices>", selected.concat()),
    )
}

async fn get_device(State(shared): State<Shared>, Path(id): Path<u64>) -> Response {
    match lock(&shared).devices.get(&id) {
        Some(d) => xml_response(StatusCode::OK, device_xml(id, d)),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn create_device(State(shared): State<Shared>, body: String) -> Response {
    let Ok(node) = xml::deserialize(&body) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let device = Device {
        name: node.value("name").unwrap_or_default().to_string(),
        platform: node.value("platform").unwrap_or_default().to_string(),
        ip_address: node.value("ip-address").unwrap_or_default().to_string(),
    };

    let mut backend = lock(&shared);
    backend.next_device += 1;
    let id = backend.next_device;
    let xml = device_xml(id, &device);
    backend.devices.insert(id, device);
    xml_response(StatusCode::OK, xml)
}

async fn update_device(
    State(shared): State<Shared>,
    Path(id): Path<u64>,
    body: String,
) -> Response {
    let Ok(node) = xml::deserialize(&body) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let mut backend = lock(&shared);
    let Some(device) = backend.devices.get_mut(&id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if let Some(name) = node.value("name") {
        device.name = name.to_string();
    }
    if let Some(platform) = node.value("platform") {
        device.platform = platform.to_string();
    }
    let xml = device_xml(id, device);
    xml_response(StatusCode::OK, xml)
}

async fn delete_device(State(shared): State<Shared>, Path(id): Path<u64>) -> StatusCode {
    match lock(&shared).devices.remove(&id) {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}

// --- jobs --------------------------------------------------------------------

fn progress_xml(task_id: u64, state: &str, percentage: f64, extra: &str) -> String {
    format!(
        "<progress-update><taskId>{task_id}</taskId><state>{state}</state>\
         <percentage>{percentage:.1}</percentage>{extra}</progress-update>"
    )
}

/// Synchronous calls echo the target. Queued calls enqueue an unrelated
/// message, a halfway message, and a completion naming the job.
async fn discover(
    State(shared): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
    body: String,
) -> Response {
    let target = xml::deserialize(&body)
        .ok()
        .and_then(|n| n.value("target").map(str::to_string))
        .unwrap_or_default();

    let Some(queue_url) = params.get("queue") else {
        return xml_response(
            StatusCode::OK,
            format!("<discover-result><target>{target}</target><found>1</found></discover-result>"),
        );
    };
    let queue = queue_url.rsplit('/').next().unwrap_or_default().to_string();

    let mut backend = lock(&shared);
    if !backend.queues.contains_key(&queue) {
        return StatusCode::BAD_REQUEST.into_response();
    }
    backend.next_job += 1;
    let job = backend.next_job;

    if target != SILENT_TARGET {
        let job_href = format!("{INTERNAL_ORIGIN}/api/space/job-management/jobs/{job}");
        let messages = [
            progress_xml(job + 1000, "INPROGRESS", 10.0, ""),
            progress_xml(job, "INPROGRESS", 50.0, ""),
            progress_xml(job, "DONE", 100.0, &format!(r#"<job href="{job_href}"/>"#)),
        ];
        if let Some(q) = backend.queues.get_mut(&queue) {
            q.extend(messages);
        }
        let final_update = progress_xml(
            job,
            "DONE",
            100.0,
            &format!("<status>SUCCESS</status><data><target>{target}</target><found>1</found></data>"),
        );
        backend.jobs.insert(job, final_update);
    }

    xml_response(
        StatusCode::ACCEPTED,
        format!(r#"<task href="/api/space/job-management/jobs/{job}"><id>{job}</id></task>"#),
    )
}

async fn job_progress(State(shared): State<Shared>, Path(id): Path<u64>) -> Response {
    match lock(&shared).jobs.get(&id) {
        Some(xml) => xml_response(StatusCode::OK, xml.clone()),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

// --- queues ------------------------------------------------------------------

async fn create_queue(State(shared): State<Shared>, body: String) -> StatusCode {
    let Some(name) = xml::deserialize(&body)
        .ok()
        .and_then(|n| n.attribute("name").map(str::to_string))
    else {
        return StatusCode::BAD_REQUEST;
    };
    let mut backend = lock(&shared);
    let key = format!("jms.queue.{name}");
    if backend.queues.contains_key(&key) {
        return StatusCode::PRECONDITION_FAILED;
    }
    backend.queues.insert(key, VecDeque::new());
    StatusCode::CREATED
}

async fn queue_info(State(shared): State<Shared>, Path(queue): Path<String>) -> StatusCode {
    if lock(&shared).queues.contains_key(&queue) {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn delete_queue(State(shared): State<Shared>, Path(queue): Path<String>) -> StatusCode {
    match lock(&shared).queues.remove(&queue) {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}

fn consume_url(queue: &str, step: u64) -> String {
    format!("{INTERNAL_ORIGIN}{QUEUES}/{queue}/pull-consumers/1/consume-next-{step}")
}

async fn create_consumer(State(shared): State<Shared>, Path(queue): Path<String>) -> Response {
    if !lock(&shared).queues.contains_key(&queue) {
        return StatusCode::NOT_FOUND.into_response();
    }
    (
        StatusCode::CREATED,
        [("msg-consume-next", consume_url(&queue, 1))],
    )
        .into_response()
}

/// One message per pull; an empty queue answers 503 without blocking.
async fn consume_next(
    State(shared): State<Shared>,
    Path((queue, _consumer, step)): Path<(String, String, String)>,
) -> Response {
    let step: u64 = step
        .trim_start_matches("consume-next-")
        .parse()
        .unwrap_or(1);
    let next = [("msg-consume-next", consume_url(&queue, step + 1))];

    let mut backend = lock(&shared);
    let Some(q) = backend.queues.get_mut(&queue) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match q.pop_front() {
        Some(message) => (StatusCode::OK, next, message).into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, next).into_response(),
    }
}

// --- helpers -----------------------------------------------------------------

fn quoted_after<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = &s[s.find(prefix)? + prefix.len()..];
    rest.split('\'').next()
}

fn number_after(s: &str, prefix: &str) -> Option<u64> {
    let rest = &s[s.find(prefix)? + prefix.len()..];
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}
