use crate::config::Config;
use crate::error::ChatError;
use crate::events::Message;
use crate::streaming::{FragmentStream, TurnHandle, decode_body};
use std::time::Duration;

/// HTTP client for the chat endpoint
#[derive(Clone)]
pub struct ChatClient {
    endpoint: String,
    idle_timeout: Duration,
    client: reqwest::Client,
}

impl ChatClient {
    pub fn new(config: &Config) -> Result<Self, ChatError> {
        // No overall request timeout: replies stream for as long as chunks keep coming
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            idle_timeout: config.idle_timeout(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST the whole conversation and stream the reply body back as text
    pub async fn stream_reply(&self, messages: &[Message]) -> Result<FragmentStream, ChatError> {
        tracing::debug!(endpoint = %self.endpoint, messages = messages.len(), "Sending chat request");

        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(messages)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(decode_body(response.bytes_stream(), self.idle_timeout))
    }

    /// Run one turn in the background; dropping the handle cancels it
    pub fn spawn_turn(&self, payload: Vec<Message>) -> TurnHandle {
        let client = self.clone();
        TurnHandle::spawn(async move { client.stream_reply(&payload).await })
    }
}

#[cfg(test)]
pub(crate) mod fake_endpoint {
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::oneshot;

    /// Raw request as seen by the fake endpoint
    pub(crate) struct Captured {
        pub head: String,
        pub body: String,
    }

    async fn read_request(socket: &mut TcpStream) -> Captured {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).into_owned();
                let length = head
                    .to_lowercase()
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:").map(str::to_string))
                    .and_then(|value| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                let body_start = end + 4;
                if buf.len() >= body_start + length {
                    let body =
                        String::from_utf8_lossy(&buf[body_start..body_start + length]).into_owned();
                    return Captured { head, body };
                }
            }
        }
        Captured {
            head: String::new(),
            body: String::new(),
        }
    }

    /// Serve one request with a chunked body, pausing `gap` between chunks
    pub(crate) async fn serve_once(
        status_line: &'static str,
        chunks: Vec<&'static str>,
        gap: Duration,
    ) -> (String, oneshot::Receiver<Captured>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (captured_tx, captured_rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let captured = read_request(&mut socket).await;
            let _ = captured_tx.send(captured);

            let head = format!(
                "{status_line}\r\nContent-Type: text/plain; charset=utf-8\r\nTransfer-Encoding: chunked\r\n\r\n"
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            for chunk in chunks {
                let frame = format!("{:x}\r\n{}\r\n", chunk.len(), chunk);
                socket.write_all(frame.as_bytes()).await.unwrap();
                socket.flush().await.unwrap();
                tokio::time::sleep(gap).await;
            }
            let _ = socket.write_all(b"0\r\n\r\n").await;
        });

        (format!("http://{addr}/api/chat"), captured_rx)
    }
}

#[cfg(test)]
mod tests {
    use super::fake_endpoint::serve_once;
    use super::*;
    use futures::StreamExt;
    use tokio::net::TcpListener;

    fn client_for(endpoint: String, idle_timeout_secs: u64) -> ChatClient {
        let mut config = Config::default();
        config.endpoint = endpoint;
        config.request.idle_timeout_secs = idle_timeout_secs;
        ChatClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_stream_reply_posts_conversation_and_streams_text() {
        let (endpoint, captured) = serve_once(
            "HTTP/1.1 200 OK",
            vec!["Hi", " there", "!"],
            Duration::from_millis(5),
        )
        .await;
        let client = client_for(endpoint, 5);

        let payload = vec![Message::assistant("Greeting"), Message::user("Hello")];
        let fragments: Vec<String> = client
            .stream_reply(&payload)
            .await
            .unwrap()
            .map(|item| item.unwrap())
            .collect()
            .await;

        assert_eq!(fragments.concat(), "Hi there!");

        let captured = captured.await.unwrap();
        assert!(captured.head.starts_with("POST /api/chat HTTP/1.1"));
        assert!(captured.head.to_lowercase().contains("content-type: application/json"));
        let sent: Vec<Message> = serde_json::from_str(&captured.body).unwrap();
        assert_eq!(sent, payload);
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let (endpoint, _captured) = serve_once(
            "HTTP/1.1 500 Internal Server Error",
            vec!["boom"],
            Duration::from_millis(1),
        )
        .await;
        let client = client_for(endpoint, 5);

        let result = client.stream_reply(&[Message::user("Hello")]).await;
        match result {
            Err(ChatError::Status { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected a status error"),
        }
    }

    #[tokio::test]
    async fn test_stalled_reply_times_out() {
        let (endpoint, _captured) = serve_once(
            "HTTP/1.1 200 OK",
            vec!["Hi", " never"],
            Duration::from_secs(5),
        )
        .await;
        let client = client_for(endpoint, 1);

        let mut fragments = client.stream_reply(&[Message::user("Hello")]).await.unwrap();
        assert_eq!(fragments.next().await.unwrap().unwrap(), "Hi");
        assert!(matches!(
            fragments.next().await,
            Some(Err(ChatError::Stalled(_)))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails_turn() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client_for(format!("http://{addr}/api/chat"), 5);
        let mut turn = client.spawn_turn(vec![Message::user("Hello")]);

        let event = loop {
            match turn.try_next() {
                Ok(event) => break event,
                Err(_) => tokio::time::sleep(Duration::from_millis(10)).await,
            }
        };
        assert!(matches!(event, crate::events::StreamEvent::Failed(_)));
    }
}
