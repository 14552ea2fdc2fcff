//! Shared test utilities for integration tests.
//!
//! Not all functions are used by every test file, but they're shared across tests.
#![allow(dead_code)]

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use diffscribe::Notifier;
use diffscribe::config::Settings;
use git2::{Oid, Repository, Signature};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Build an NDJSON body from `(fragment, done)` pairs.
pub fn ndjson(records: &[(&str, bool)]) -> String {
    records
        .iter()
        .map(|(fragment, done)| {
            let record = serde_json::json!({
                "model": "llama3",
                "created_at": "2024-05-01T10:00:00.000000Z",
                "response": fragment,
                "done": done,
            });
            format!("{record}\n")
        })
        .collect()
}

/// Settings pointing at `api_url` with a simple prompt template.
pub fn test_settings(api_url: String) -> Settings {
    Settings {
        api_url,
        model: "llama3".to_string(),
        prompt: "Write a commit message for this diff:\n{diff}".to_string(),
        max_diff_length: 4000,
        strict_stream: false,
        request_timeout: None,
    }
}

/// Serve one connection with a hand-written HTTP response.
///
/// Reads the full request, writes `response` verbatim, keeps the socket open
/// for `hold` and then closes it. Returns the `/api/generate` URL.
pub async fn serve_raw_once(response: Vec<u8>, hold: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_request(&mut socket).await;
        socket.write_all(&response).await.unwrap();
        socket.flush().await.unwrap();
        tokio::time::sleep(hold).await;
        let _ = socket.shutdown().await;
    });

    format!("http://{addr}/api/generate")
}

/// Status line and headers declaring `content_length`, followed by `body`.
pub fn raw_response(status: &str, content_length: usize, body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 {status}\r\n\
         content-type: application/x-ndjson\r\n\
         content-length: {content_length}\r\n\
         \r\n\
         {body}"
    )
    .into_bytes()
}

async fn read_request(socket: &mut TcpStream) {
    let mut request = Vec::new();
    let mut buf = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut buf).await.unwrap();
        assert!(n > 0, "client closed before sending headers");
        request.extend_from_slice(&buf[..n]);
        if let Some(pos) = request.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&request[..header_end]).to_ascii_lowercase();
    let body_len: usize = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .map(|value| value.trim().parse().unwrap())
        .unwrap_or(0);

    while request.len() < header_end + body_len {
        let n = socket.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        request.extend_from_slice(&buf[..n]);
    }
}

/// Notifier that records notices for assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<(&'static str, String)>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<(&'static str, String)> {
        self.notices.lock().unwrap().clone()
    }

    pub fn has(&self, level: &str, needle: &str) -> bool {
        self.notices()
            .iter()
            .any(|(l, text)| *l == level && text.contains(needle))
    }
}

impl Notifier for RecordingNotifier {
    fn info(&self, message: &str) {
        self.notices.lock().unwrap().push(("info", message.to_string()));
    }

    fn warn(&self, message: &str) {
        self.notices.lock().unwrap().push(("warn", message.to_string()));
    }

    fn error(&self, message: &str) {
        self.notices.lock().unwrap().push(("error", message.to_string()));
    }
}

/// A test git repository builder for integration tests.
pub struct TestRepo {
    pub dir: tempfile::TempDir,
    pub repo: Repository,
}

impl TestRepo {
    /// Create a new empty git repository in a temp directory.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp directory");
        let repo = Repository::init(dir.path()).expect("Failed to init git repo");
        {
            let mut config = repo.config().expect("Failed to open repo config");
            config.set_str("user.name", "Test User").expect("Failed to set user.name");
            config
                .set_str("user.email", "test@example.com")
                .expect("Failed to set user.email");
        }
        Self { dir, repo }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Get the test signature for commits.
    fn signature(&self) -> Signature<'_> {
        Signature::now("Test User", "test@example.com").expect("Failed to create signature")
    }

    /// Write a file in the working tree without staging it.
    pub fn write(&self, name: &str, content: &str) {
        std::fs::write(self.dir.path().join(name), content).expect("Failed to write test file");
    }

    /// Write a file and add it to the index.
    pub fn stage(&self, name: &str, content: &str) {
        self.write(name, content);
        let mut index = self.repo.index().expect("Failed to get index");
        index.add_path(Path::new(name)).expect("Failed to add file");
        index.write().expect("Failed to write index");
    }

    /// Commit the current index. Returns the commit OID.
    pub fn commit(&self, message: &str) -> Oid {
        let sig = self.signature();
        let mut index = self.repo.index().expect("Failed to get index");
        let tree_id = index.write_tree().expect("Failed to write tree");
        let tree = self.repo.find_tree(tree_id).expect("Failed to find tree");

        // Get parent commit if exists
        let parent = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();

        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .expect("Failed to create commit")
    }

    /// Contents of `.git/COMMIT_EDITMSG`, if written.
    pub fn commit_editmsg(&self) -> Option<String> {
        std::fs::read_to_string(self.repo.path().join("COMMIT_EDITMSG")).ok()
    }
}
