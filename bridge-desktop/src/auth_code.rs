//! Desktop transports for the interactive authorization code.
//!
//! - [`LocalCallbackReceiver`] listens on the loopback redirect URI and takes
//!   the code from the provider's browser redirect.
//! - [`PastedCodeReceiver`] prints the authorization URL and reads the code the
//!   user pastes back, one line, from any async reader (stdin by default).

use async_trait::async_trait;
use bridge_traits::{
    auth::{AuthCodeReceiver, AuthorizationPrompt},
    error::{BridgeError, Result},
};
use std::net::{Ipv4Addr, SocketAddr};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

const MAX_REQUEST_LINE: usize = 8 * 1024;

const SUCCESS_PAGE: &str = "<html><body><h2>Authorization complete</h2>\
<p>You can close this window and return to the application.</p></body></html>";

fn open_in_browser(url: &str) {
    if let Err(e) = open::that(url) {
        warn!(error = %e, "Could not open a browser; open the authorization URL manually");
    }
}

/// Receives the code through a one-shot HTTP listener bound to the redirect URI.
#[derive(Debug, Clone)]
pub struct LocalCallbackReceiver {
    open_browser: bool,
}

impl LocalCallbackReceiver {
    pub fn new() -> Self {
        Self { open_browser: true }
    }

    /// Do not launch a browser; the caller presents the URL itself.
    pub fn without_browser(mut self) -> Self {
        self.open_browser = false;
        self
    }

    fn listen_addr(redirect: &Url) -> Result<SocketAddr> {
        let port = redirect.port_or_known_default().ok_or_else(|| {
            BridgeError::OperationFailed(format!("Redirect URI has no port: {}", redirect))
        })?;
        Ok(SocketAddr::from((Ipv4Addr::LOCALHOST, port)))
    }

    async fn respond(stream: &mut TcpStream, status: &str, body: &str) {
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        if let Err(e) = stream.write_all(response.as_bytes()).await {
            debug!(error = %e, "Failed to write callback response");
        }
        let _ = stream.shutdown().await;
    }

    /// Read the request line (`GET /path?query HTTP/1.1`) and return the target.
    async fn read_target(stream: &mut TcpStream) -> Result<String> {
        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        let read = reader.read_line(&mut line).await?;
        if read == 0 || line.len() > MAX_REQUEST_LINE {
            return Err(BridgeError::OperationFailed(
                "Malformed callback request".to_string(),
            ));
        }

        // Drain the headers so the connection closes cleanly.
        let mut header = String::new();
        let mut consumed = line.len();
        loop {
            header.clear();
            let n = reader.read_line(&mut header).await?;
            consumed += n;
            if n == 0 || header == "\r\n" || header == "\n" || consumed > MAX_REQUEST_LINE {
                break;
            }
        }

        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("GET"), Some(target)) => Ok(target.to_string()),
            _ => Err(BridgeError::OperationFailed(format!(
                "Unexpected callback request: {}",
                line.trim_end()
            ))),
        }
    }
}

impl Default for LocalCallbackReceiver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthCodeReceiver for LocalCallbackReceiver {
    async fn receive_code(&self, prompt: &AuthorizationPrompt) -> Result<String> {
        let redirect = Url::parse(&prompt.redirect_uri).map_err(|e| {
            BridgeError::OperationFailed(format!("Invalid redirect URI: {}", e))
        })?;
        let addr = Self::listen_addr(&redirect)?;
        let listener = TcpListener::bind(addr).await?;

        info!(service = %prompt.service, listen = %addr, "Waiting for authorization callback");
        info!(url = %prompt.auth_url, "Open this URL to authorize");
        if self.open_browser {
            open_in_browser(&prompt.auth_url);
        }

        loop {
            let (mut stream, peer) = listener.accept().await?;
            debug!(peer = %peer, "Callback connection accepted");

            let target = match Self::read_target(&mut stream).await {
                Ok(target) => target,
                Err(e) => {
                    debug!(error = %e, "Ignoring malformed callback request");
                    Self::respond(&mut stream, "400 Bad Request", "Bad request").await;
                    continue;
                }
            };

            let callback = match redirect.join(&target) {
                Ok(url) if url.path() == redirect.path() => url,
                _ => {
                    Self::respond(&mut stream, "404 Not Found", "Not found").await;
                    continue;
                }
            };

            let mut code = None;
            let mut state = None;
            let mut error = None;
            for (key, value) in callback.query_pairs() {
                match key.as_ref() {
                    "code" => code = Some(value.into_owned()),
                    "state" => state = Some(value.into_owned()),
                    "error" => error = Some(value.into_owned()),
                    _ => {}
                }
            }

            if let Some(expected) = &prompt.expected_state {
                if state.as_deref() != Some(expected.as_str()) {
                    warn!(service = %prompt.service, "Callback state missing or mismatched; ignoring request");
                    Self::respond(&mut stream, "400 Bad Request", "State mismatch").await;
                    continue;
                }
            }

            if let Some(error) = error {
                Self::respond(&mut stream, "200 OK", "Authorization was denied.").await;
                return Err(BridgeError::OperationFailed(format!(
                    "Authorization denied: {}",
                    error
                )));
            }

            match code {
                Some(code) => {
                    Self::respond(&mut stream, "200 OK", SUCCESS_PAGE).await;
                    return Ok(code);
                }
                None => {
                    Self::respond(&mut stream, "400 Bad Request", "Missing code").await;
                }
            }
        }
    }
}

/// Prints the authorization URL and reads one pasted line as the code.
pub struct PastedCodeReceiver {
    input: Mutex<Box<dyn AsyncBufRead + Send + Unpin>>,
    output: Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
    open_browser: bool,
}

impl PastedCodeReceiver {
    /// Read from stdin, prompt on stderr.
    pub fn stdin() -> Self {
        Self::from_io(BufReader::new(tokio::io::stdin()), tokio::io::stderr())
    }

    pub fn from_io<R, W>(input: R, output: W) -> Self
    where
        R: AsyncBufRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            input: Mutex::new(Box::new(input)),
            output: Mutex::new(Box::new(output)),
            open_browser: false,
        }
    }

    pub fn with_browser(mut self) -> Self {
        self.open_browser = true;
        self
    }
}

#[async_trait]
impl AuthCodeReceiver for PastedCodeReceiver {
    async fn receive_code(&self, prompt: &AuthorizationPrompt) -> Result<String> {
        {
            let mut output = self.output.lock().await;
            let text = format!(
                "Authorize {} by opening:\n\n  {}\n\nAfter approving, copy the `code` value from the redirected URL and paste it here:\n> ",
                prompt.service, prompt.auth_url
            );
            output.write_all(text.as_bytes()).await?;
            output.flush().await?;
        }

        if self.open_browser {
            open_in_browser(&prompt.auth_url);
        }

        let mut line = String::new();
        let read = self.input.lock().await.read_line(&mut line).await?;
        if read == 0 {
            return Err(BridgeError::NotAvailable(
                "Input closed before an authorization code was entered".to_string(),
            ));
        }

        Ok(line.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;

    fn prompt(redirect_uri: &str) -> AuthorizationPrompt {
        AuthorizationPrompt {
            service: "Google Drive".to_string(),
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth?x=1".to_string(),
            redirect_uri: redirect_uri.to_string(),
            expected_state: Some("s123".to_string()),
        }
    }

    async fn free_port() -> u16 {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        listener.local_addr().unwrap().port()
    }

    async fn send_request(port: u16, target: &str) -> String {
        let mut attempts = 0;
        let mut stream = loop {
            match TcpStream::connect((Ipv4Addr::LOCALHOST, port)).await {
                Ok(stream) => break stream,
                Err(e) => {
                    attempts += 1;
                    assert!(attempts < 50, "listener never came up: {}", e);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
            }
        };
        let request = format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", target);
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_callback_receiver_returns_code() {
        let port = free_port().await;
        let redirect = format!("http://localhost:{}/callback", port);
        let receiver = LocalCallbackReceiver::new().without_browser();

        let handle = {
            let prompt = prompt(&redirect);
            tokio::spawn(async move { receiver.receive_code(&prompt).await })
        };

        let response = send_request(port, "/callback?code=4%2F0Abc&state=s123").await;
        assert!(response.starts_with("HTTP/1.1 200"));

        let code = handle.await.unwrap().unwrap();
        assert_eq!(code, "4/0Abc");
    }

    #[tokio::test]
    async fn test_callback_receiver_skips_wrong_path_and_state() {
        let port = free_port().await;
        let redirect = format!("http://localhost:{}/callback", port);
        let receiver = LocalCallbackReceiver::new().without_browser();

        let handle = {
            let prompt = prompt(&redirect);
            tokio::spawn(async move { receiver.receive_code(&prompt).await })
        };

        let not_found = send_request(port, "/favicon.ico").await;
        assert!(not_found.starts_with("HTTP/1.1 404"));

        let mismatch = send_request(port, "/callback?code=bad&state=other").await;
        assert!(mismatch.starts_with("HTTP/1.1 400"));

        let missing = send_request(port, "/callback?code=forged").await;
        assert!(missing.starts_with("HTTP/1.1 400"));

        let denied_without_state = send_request(port, "/callback?error=access_denied").await;
        assert!(denied_without_state.starts_with("HTTP/1.1 400"));

        send_request(port, "/callback?code=good&state=s123").await;
        assert_eq!(handle.await.unwrap().unwrap(), "good");
    }

    #[tokio::test]
    async fn test_callback_receiver_reports_denial() {
        let port = free_port().await;
        let redirect = format!("http://localhost:{}/callback", port);
        let receiver = LocalCallbackReceiver::new().without_browser();

        let handle = {
            let prompt = prompt(&redirect);
            tokio::spawn(async move { receiver.receive_code(&prompt).await })
        };

        send_request(port, "/callback?error=access_denied&state=s123").await;
        let err = handle.await.unwrap().unwrap_err();
        assert!(err.to_string().contains("access_denied"));
    }

    #[tokio::test]
    async fn test_pasted_code_receiver_reads_one_line() {
        let input = std::io::Cursor::new(b"  eyJhbGciOi.code&state=x \nignored\n".to_vec());
        let receiver = PastedCodeReceiver::from_io(input, tokio::io::sink());

        let code = receiver
            .receive_code(&prompt("http://localhost:8080/callback"))
            .await
            .unwrap();
        assert_eq!(code, "eyJhbGciOi.code&state=x");
    }

    #[tokio::test]
    async fn test_pasted_code_receiver_closed_input() {
        let input = std::io::Cursor::new(Vec::new());
        let receiver = PastedCodeReceiver::from_io(input, tokio::io::sink());

        let result = receiver
            .receive_code(&prompt("http://localhost:8080/callback"))
            .await;
        assert!(matches!(result, Err(BridgeError::NotAvailable(_))));
    }
}
