//! In-process mock of the drive backend, served by tiny_http on a
//! background thread.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::io::{self, Read};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use efsdrive::ClientConfig;
use tiny_http::{Header, Method, Request, Response, ResponseBox, Server, StatusCode};

type MockResponse = ResponseBox;

/// Size of each delayed piece of a slow file body.
const SLOW_CHUNK: usize = 8192;

#[derive(Default)]
pub struct DriveState {
    pub users: HashMap<String, String>,
    /// token -> (username, issued at)
    pub tokens: HashMap<String, (String, Instant)>,
    /// Tokens older than this are rejected, like the backend's cookie expiry
    pub token_ttl: Option<Duration>,
    /// Pause between pieces of a file body, to simulate a slow transfer
    pub body_delay: Option<Duration>,
    /// Drive paths without leading or trailing slash. `None` marks a directory.
    pub entries: BTreeMap<String, Option<Vec<u8>>>,
    /// `(method, url)` of every request received
    pub requests: Vec<(String, String)>,
    /// Status returned by `/refresh` instead of rotating the token
    pub refresh_status: Option<u16>,
    next_token: u64,
}

impl DriveState {
    fn issue_token(&mut self, username: &str) -> String {
        self.next_token += 1;
        let token = format!("tok{}", self.next_token);
        self.tokens
            .insert(token.clone(), (username.to_string(), Instant::now()));
        token
    }

    fn is_live(&self, token: &str) -> bool {
        match (self.tokens.get(token), self.token_ttl) {
            (Some((_, issued)), Some(ttl)) => issued.elapsed() < ttl,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    fn is_dir(&self, path: &str) -> bool {
        path.is_empty() || matches!(self.entries.get(path), Some(None))
    }

    fn children(&self, dir: &str) -> Vec<(String, bool)> {
        self.entries
            .iter()
            .filter(|(path, _)| parent_of(path) == dir)
            .map(|(path, data)| (name_of(path).to_string(), data.is_none()))
            .collect()
    }
}

pub struct MockDrive {
    server: Arc<Server>,
    state: Arc<Mutex<DriveState>>,
    url: String,
}

impl MockDrive {
    pub fn start() -> Self {
        let server = Arc::new(Server::http("127.0.0.1:0").expect("bind mock server"));
        let addr = server
            .server_addr()
            .to_ip()
            .expect("mock server has an IP address");
        let state = Arc::new(Mutex::new(DriveState::default()));

        let worker_server = Arc::clone(&server);
        let worker_state = Arc::clone(&state);
        thread::spawn(move || {
            for request in worker_server.incoming_requests() {
                // One thread per request, so a slow body does not hold up a
                // concurrent refresh.
                let state = Arc::clone(&worker_state);
                thread::spawn(move || handle(request, &state));
            }
        });

        Self {
            server,
            state,
            url: format!("http://{}", addr),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(self.url.clone()).with_request_timeout(Duration::from_secs(5))
    }

    pub fn state(&self) -> MutexGuard<'_, DriveState> {
        self.state.lock().expect("mock state poisoned")
    }

    pub fn add_user(&self, username: &str, password: &str) {
        self.state()
            .users
            .insert(username.to_string(), password.to_string());
    }

    pub fn add_dir(&self, path: &str) {
        self.state().entries.insert(path.to_string(), None);
    }

    pub fn add_file(&self, path: &str, data: &[u8]) {
        self.state()
            .entries
            .insert(path.to_string(), Some(data.to_vec()));
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state().entries.get(path).cloned().flatten()
    }

    pub fn has_entry(&self, path: &str) -> bool {
        self.state().entries.contains_key(path)
    }

    /// Number of requests with this method whose URL starts with `prefix`.
    pub fn count(&self, method: &str, prefix: &str) -> usize {
        self.state()
            .requests
            .iter()
            .filter(|(m, url)| m == method && url.starts_with(prefix))
            .count()
    }

    /// Expire tokens `ttl` after they are issued.
    pub fn set_token_ttl(&self, ttl: Duration) {
        self.state().token_ttl = Some(ttl);
    }

    /// Stream file bodies in pieces with `delay` between them.
    pub fn set_body_delay(&self, delay: Duration) {
        self.state().body_delay = Some(delay);
    }

    pub fn revoke_tokens(&self) {
        self.state().tokens.clear();
    }

    pub fn live_tokens(&self) -> usize {
        self.state().tokens.len()
    }
}

impl Drop for MockDrive {
    fn drop(&mut self) {
        self.server.unblock();
    }
}

fn handle(mut request: Request, state: &Mutex<DriveState>) {
    let mut body = Vec::new();
    let _ = request.as_reader().read_to_end(&mut body);

    let method = request.method().clone();
    let url = request.url().to_string();
    let cookie = header(&request, "Cookie").and_then(|c| session_cookie(&c));
    let content_type = header(&request, "Content-Type").unwrap_or_default();

    let response = {
        let mut state = state.lock().expect("mock state poisoned");
        state
            .requests
            .push((method.to_string(), url.clone()));
        route(&mut state, &method, &url, cookie, &content_type, &body)
    };
    let _ = request.respond(response);
}

fn route(
    state: &mut DriveState,
    method: &Method,
    url: &str,
    cookie: Option<String>,
    content_type: &str,
    body: &[u8],
) -> MockResponse {
    match (method, url) {
        (Method::Post, "/signup") => {
            let Some((username, password)) = credentials(body) else {
                return error(400, "Invalid request body");
            };
            if state.users.contains_key(&username) {
                return error(409, "Username already exists");
            }
            state.users.insert(username, password);
            json(200, "{}")
        }
        (Method::Post, "/signin") => {
            let Some((username, password)) = credentials(body) else {
                return error(400, "Invalid request body");
            };
            if state.users.get(&username) != Some(&password) {
                return error(401, "Wrong login or password");
            }
            let token = state.issue_token(&username);
            with_cookie(json(200, "{}"), &token)
        }
        (Method::Post, "/refresh") => {
            if let Some(status) = state.refresh_status {
                return error(status, "refresh failed");
            }
            let Some(token) = cookie.filter(|t| state.is_live(t)) else {
                return error(401, "Unauthorized");
            };
            let Some((username, _)) = state.tokens.remove(&token) else {
                return error(401, "Unauthorized");
            };
            let token = state.issue_token(&username);
            with_cookie(json(200, "{}"), &token)
        }
        (Method::Post, "/logout") => {
            if let Some(token) = cookie.as_ref() {
                state.tokens.remove(token);
            }
            with_cookie(json(200, "{}"), "")
        }
        _ if url == "/drive" || url.starts_with("/drive/") => {
            if !cookie.as_ref().is_some_and(|t| state.is_live(t)) {
                return error(401, "Unauthorized");
            }
            let path = url
                .trim_start_matches("/drive")
                .trim_matches('/')
                .replace("%20", " ");
            drive(state, method, &path, content_type, body)
        }
        _ => error(404, "404 page not found"),
    }
}

fn drive(
    state: &mut DriveState,
    method: &Method,
    path: &str,
    content_type: &str,
    body: &[u8],
) -> MockResponse {
    match method {
        Method::Get => {
            if state.is_dir(path) {
                let children = state.children(path);
                if children.is_empty() && path.is_empty() {
                    return error(404, "Directory is empty");
                }
                if children.is_empty() {
                    return error(500, "Internal server error");
                }
                let files: Vec<String> = children
                    .iter()
                    .map(|(name, is_dir)| format!(r#"{{"name":"{}","bool":{}}}"#, name, is_dir))
                    .collect();
                return json(200, &format!(r#"{{"files":[{}],"error":""}}"#, files.join(",")));
            }
            match state.entries.get(path) {
                Some(Some(data)) => file(path, data.clone(), state.body_delay),
                _ => error(404, "no such file or directory"),
            }
        }
        Method::Post if content_type.starts_with("multipart/form-data") => {
            if !state.is_dir(path) {
                return error(404, "no such directory");
            }
            let Some((filename, data)) = multipart_file(content_type, body) else {
                return error(400, "missing file part");
            };
            let key = join(path, &filename);
            if state.entries.contains_key(&key) {
                return error(409, "File already exists");
            }
            state.entries.insert(key, Some(data));
            json(201, "{}")
        }
        Method::Post => {
            if state.entries.contains_key(path) {
                return error(409, "file exists");
            }
            if !state.is_dir(parent_of(path)) {
                return error(404, "no such directory");
            }
            state.entries.insert(path.to_string(), None);
            json(200, "{}")
        }
        Method::Delete => {
            if !state.entries.contains_key(path) {
                return error(404, "no such file or directory");
            }
            let prefix = format!("{}/", path);
            state
                .entries
                .retain(|key, _| key != path && !key.starts_with(&prefix));
            json(200, "{}")
        }
        _ => error(405, "method not allowed"),
    }
}

fn header(request: &Request, name: &'static str) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|h| h.field.equiv(name))
        .map(|h| h.value.as_str().to_string())
}

fn session_cookie(header: &str) -> Option<String> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == "session_token")
        .map(|(_, value)| value.to_string())
}

fn credentials(body: &[u8]) -> Option<(String, String)> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    Some((
        value.get("username")?.as_str()?.to_string(),
        value.get("password")?.as_str()?.to_string(),
    ))
}

fn multipart_file(content_type: &str, body: &[u8]) -> Option<(String, Vec<u8>)> {
    let boundary = content_type.split("boundary=").nth(1)?.trim_matches('"');
    let name_start = find(body, b"filename=\"", 0)? + b"filename=\"".len();
    let name_end = find(body, b"\"", name_start)?;
    let filename = String::from_utf8(body[name_start..name_end].to_vec()).ok()?;
    let data_start = find(body, b"\r\n\r\n", name_end)? + 4;
    let closing = format!("\r\n--{}", boundary);
    let data_end = find(body, closing.as_bytes(), data_start)?;
    Some((filename, body[data_start..data_end].to_vec()))
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|pos| pos + from)
}

fn json(status: u16, body: &str) -> MockResponse {
    Response::from_string(body)
        .with_status_code(status)
        .with_header(header_pair("Content-Type", "application/json"))
        .boxed()
}

/// File content is always sent with a disposition and a type guessed from
/// the extension, so a `.json` file is served as `application/json`.
fn file(path: &str, data: Vec<u8>, delay: Option<Duration>) -> MockResponse {
    let content_type = match path.rsplit_once('.').map(|(_, ext)| ext) {
        Some("json") => "application/json",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    };
    let headers = vec![
        header_pair("Content-Type", content_type),
        header_pair(
            "Content-Disposition",
            &format!("inline; filename={}", name_of(path)),
        ),
    ];
    let len = data.len();
    match delay {
        Some(delay) => Response::new(
            StatusCode(200),
            headers,
            SlowBody {
                data,
                pos: 0,
                delay,
            },
            Some(len),
            None,
        )
        .with_chunked_threshold(usize::MAX)
        .boxed(),
        None => Response::new(StatusCode(200), headers, io::Cursor::new(data), Some(len), None)
            .boxed(),
    }
}

/// Body that pauses before every `SLOW_CHUNK` bytes after the first.
struct SlowBody {
    data: Vec<u8>,
    pos: usize,
    delay: Duration,
}

impl Read for SlowBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.data.len() {
            return Ok(0);
        }
        if self.pos > 0 && self.pos % SLOW_CHUNK == 0 {
            thread::sleep(self.delay);
        }
        let boundary = (self.pos / SLOW_CHUNK + 1) * SLOW_CHUNK;
        let end = boundary.min(self.data.len()).min(self.pos + buf.len());
        let n = end - self.pos;
        buf[..n].copy_from_slice(&self.data[self.pos..end]);
        self.pos = end;
        Ok(n)
    }
}

fn header_pair(name: &str, value: &str) -> Header {
    Header::from_bytes(name.as_bytes(), value.as_bytes()).expect("valid header")
}

fn error(status: u16, message: &str) -> MockResponse {
    json(status, &format!(r#"{{"error":"{}"}}"#, message))
}

fn with_cookie(response: MockResponse, token: &str) -> MockResponse {
    let cookie = if token.is_empty() {
        "session_token=; Path=/; Max-Age=0".to_string()
    } else {
        format!("session_token={}; Path=/; HttpOnly", token)
    };
    response.with_header(header_pair("Set-Cookie", &cookie))
}

fn parent_of(path: &str) -> &str {
    path.rfind('/').map(|i| &path[..i]).unwrap_or("")
}

fn name_of(path: &str) -> &str {
    path.rfind('/').map(|i| &path[i + 1..]).unwrap_or(path)
}

fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}
