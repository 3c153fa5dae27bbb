//! Contextual suggestion fetching
//!
//! After an observation is stored, the pipeline asks an external service for
//! advice keyed by the detected emotion. The fetch runs on its own thread and
//! every failure (transport, timeout, bad status, bad body) resolves to a fixed
//! fallback message.

use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::error::FluxError;
use crate::types::Emotion;

/// Shown when suggestions could not be fetched
pub const FALLBACK_SUGGESTION: &str = "Could not fetch suggestions. Try again later.";

/// Shown when the service answered without any suggestion text
pub const EMPTY_SUGGESTION: &str = "No suggestions found.";

/// Path of the analyze endpoint, relative to the service base URL
pub const ANALYZE_PATH: &str = "/api/analyze";

/// Default request timeout for the HTTP service
pub const DEFAULT_SUGGESTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Body sent to the suggestion service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionRequest {
    /// Optional base64 image payload (unused on the text path)
    pub image: Option<String>,
    pub emotion: Emotion,
}

impl SuggestionRequest {
    pub fn for_emotion(emotion: Emotion) -> Self {
        Self {
            image: None,
            emotion,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SuggestionResponse {
    suggestions: Option<String>,
}

/// Source of free-form advisory text for an emotion
pub trait SuggestionService: Send + Sync {
    fn suggest(&self, request: &SuggestionRequest) -> Result<String, FluxError>;
}

/// Suggestion service reached over HTTP (`POST {base_url}/api/analyze`)
#[derive(Debug, Clone)]
pub struct HttpSuggestionService {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl HttpSuggestionService {
    /// Build a client for `base_url` with the given request timeout
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FluxError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FluxError::SuggestionRequest(e.to_string()))?;
        let endpoint = format!("{}{}", base_url.trim_end_matches('/'), ANALYZE_PATH);
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl SuggestionService for HttpSuggestionService {
    fn suggest(&self, request: &SuggestionRequest) -> Result<String, FluxError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .map_err(|e| FluxError::SuggestionRequest(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FluxError::SuggestionStatus(status.as_u16()));
        }

        let body = response
            .text()
            .map_err(|e| FluxError::SuggestionRequest(e.to_string()))?;
        let parsed: SuggestionResponse = serde_json::from_str(&body)?;

        Ok(parsed
            .suggestions
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| EMPTY_SUGGESTION.to_string()))
    }
}

enum PendingState {
    Waiting(Receiver<String>),
    Ready(String),
}

/// Handle to a suggestion fetch running in the background
pub struct PendingSuggestion {
    emotion: Emotion,
    state: PendingState,
}

impl PendingSuggestion {
    /// Start fetching a suggestion on a background thread
    pub fn spawn(service: Arc<dyn SuggestionService>, request: SuggestionRequest) -> Self {
        let emotion = request.emotion;
        let (sender, receiver) = mpsc::channel();

        let spawned = thread::Builder::new()
            .name("suggestion-fetch".to_string())
            .spawn(move || {
                let text = match service.suggest(&request) {
                    Ok(text) => text,
                    Err(e) => {
                        log::error!("suggestion fetch for '{}' failed: {}", request.emotion, e);
                        FALLBACK_SUGGESTION.to_string()
                    }
                };
                // The handle may have been dropped; nobody is waiting then
                let _ = sender.send(text);
            });

        match spawned {
            Ok(_) => Self {
                emotion,
                state: PendingState::Waiting(receiver),
            },
            Err(e) => {
                log::error!("could not start suggestion fetch: {}", e);
                Self::resolved(emotion, FALLBACK_SUGGESTION)
            }
        }
    }

    /// Handle that is already resolved to `text`
    pub fn resolved(emotion: Emotion, text: &str) -> Self {
        Self {
            emotion,
            state: PendingState::Ready(text.to_string()),
        }
    }

    pub fn emotion(&self) -> Emotion {
        self.emotion
    }

    /// Suggestion text if the fetch has finished, without blocking
    pub fn try_get(&mut self) -> Option<&str> {
        if let PendingState::Waiting(receiver) = &self.state {
            match receiver.try_recv() {
                Ok(text) => self.state = PendingState::Ready(text),
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => {
                    self.state = PendingState::Ready(FALLBACK_SUGGESTION.to_string())
                }
            }
        }

        match &self.state {
            PendingState::Ready(text) => Some(text.as_str()),
            PendingState::Waiting(_) => None,
        }
    }

    /// Block up to `timeout` for the suggestion, falling back on timeout
    pub fn wait(self, timeout: Duration) -> String {
        match self.state {
            PendingState::Ready(text) => text,
            PendingState::Waiting(receiver) => match receiver.recv_timeout(timeout) {
                Ok(text) => text,
                Err(RecvTimeoutError::Timeout) => {
                    log::warn!(
                        "suggestion fetch for '{}' timed out after {:?}",
                        self.emotion,
                        timeout
                    );
                    FALLBACK_SUGGESTION.to_string()
                }
                Err(RecvTimeoutError::Disconnected) => FALLBACK_SUGGESTION.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};

    struct StaticService(&'static str);

    impl SuggestionService for StaticService {
        fn suggest(&self, _request: &SuggestionRequest) -> Result<String, FluxError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingService;

    impl SuggestionService for FailingService {
        fn suggest(&self, _request: &SuggestionRequest) -> Result<String, FluxError> {
            Err(FluxError::SuggestionStatus(503))
        }
    }

    struct SlowService;

    impl SuggestionService for SlowService {
        fn suggest(&self, _request: &SuggestionRequest) -> Result<String, FluxError> {
            thread::sleep(Duration::from_secs(2));
            Ok("too late".to_string())
        }
    }

    fn read_request(stream: &mut TcpStream) -> String {
        let mut data = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            data.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&data).into_owned();
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|line| {
                        let lower = line.to_ascii_lowercase();
                        lower
                            .strip_prefix("content-length:")
                            .and_then(|v| v.trim().parse::<usize>().ok())
                    })
                    .unwrap_or(0);
                if data.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&data).into_owned()
    }

    /// Serve one canned HTTP response; the join handle yields the raw request
    fn serve_once(status_line: &str, body: &str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_request(&mut stream);
            stream.write_all(response.as_bytes()).unwrap();
            request
        });

        (format!("http://{}", addr), handle)
    }

    #[test]
    fn test_request_body_shape() {
        let json = serde_json::to_value(SuggestionRequest::for_emotion(Emotion::Sad)).unwrap();
        assert_eq!(json, serde_json::json!({ "image": null, "emotion": "sad" }));
    }

    #[test]
    fn test_http_service_success() {
        let (base_url, server) = serve_once("200 OK", r#"{"suggestions":"Call a friend."}"#);
        let service = HttpSuggestionService::new(&base_url, Duration::from_secs(5)).unwrap();

        let text = service
            .suggest(&SuggestionRequest::for_emotion(Emotion::Sad))
            .unwrap();
        assert_eq!(text, "Call a friend.");

        let request = server.join().unwrap();
        assert!(request.starts_with("POST /api/analyze"));
        assert!(request.contains(r#""emotion":"sad""#));
    }

    #[test]
    fn test_http_service_missing_suggestions() {
        let (base_url, _server) = serve_once("200 OK", r#"{"suggestions":""}"#);
        let service = HttpSuggestionService::new(&base_url, Duration::from_secs(5)).unwrap();

        let text = service
            .suggest(&SuggestionRequest::for_emotion(Emotion::Happy))
            .unwrap();
        assert_eq!(text, EMPTY_SUGGESTION);
    }

    #[test]
    fn test_http_service_error_status() {
        let (base_url, _server) = serve_once("500 Internal Server Error", r#"{"error":"boom"}"#);
        let service = HttpSuggestionService::new(&base_url, Duration::from_secs(5)).unwrap();

        let err = service
            .suggest(&SuggestionRequest::for_emotion(Emotion::Angry))
            .unwrap_err();
        assert!(matches!(err, FluxError::SuggestionStatus(500)));
    }

    #[test]
    fn test_http_service_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (_stream, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_secs(3));
        });

        let service =
            HttpSuggestionService::new(&format!("http://{}/", addr), Duration::from_millis(200))
                .unwrap();
        assert_eq!(service.endpoint(), format!("http://{}/api/analyze", addr));

        let result = service.suggest(&SuggestionRequest::for_emotion(Emotion::Fearful));
        assert!(matches!(result, Err(FluxError::SuggestionRequest(_))));
    }

    #[test]
    fn test_pending_resolves_to_service_text() {
        let pending = PendingSuggestion::spawn(
            Arc::new(StaticService("Take a short walk.")),
            SuggestionRequest::for_emotion(Emotion::Stressed),
        );
        assert_eq!(pending.emotion(), Emotion::Stressed);
        assert_eq!(pending.wait(Duration::from_secs(5)), "Take a short walk.");
    }

    #[test]
    fn test_pending_failure_resolves_to_fallback() {
        let pending = PendingSuggestion::spawn(
            Arc::new(FailingService),
            SuggestionRequest::for_emotion(Emotion::Sad),
        );
        assert_eq!(pending.wait(Duration::from_secs(5)), FALLBACK_SUGGESTION);
    }

    #[test]
    fn test_pending_timeout_resolves_to_fallback() {
        let mut pending = PendingSuggestion::spawn(
            Arc::new(SlowService),
            SuggestionRequest::for_emotion(Emotion::Sad),
        );
        assert_eq!(pending.try_get(), None);
        assert_eq!(pending.wait(Duration::from_millis(50)), FALLBACK_SUGGESTION);
    }

    #[test]
    fn test_try_get_caches_result() {
        let mut pending = PendingSuggestion::resolved(Emotion::Happy, "Keep it up!");
        assert_eq!(pending.try_get(), Some("Keep it up!"));
        assert_eq!(pending.try_get(), Some("Keep it up!"));
    }
}
