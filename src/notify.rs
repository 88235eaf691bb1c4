//! Outbound notifications
//!
//! Signals and the startup announcement go out through a Telegram bot.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::connect::RetryPolicy;
use crate::error::NotifyError;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), NotifyError>;
}

#[async_trait]
impl<N: Notifier + ?Sized> Notifier for Box<N> {
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        (**self).send(text).await
    }
}

/// Writes messages to the log only. Used when no bot is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        info!("Notification (no chat configured):\n{}", text);
        Ok(())
    }
}

/// Telegram Bot API client for a single chat
#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    endpoint: String,
    chat_id: String,
    retry: RetryPolicy,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

impl TelegramNotifier {
    pub fn new(token: &str, chat_id: &str, retry: RetryPolicy) -> Result<Self, NotifyError> {
        if token.is_empty() || chat_id.is_empty() {
            return Err(NotifyError::NotConfigured(
                "telegram token and chat_id are required".to_string(),
            ));
        }
        Ok(Self {
            client: Client::builder().timeout(retry.timeout).build()?,
            endpoint: format!("https://api.telegram.org/bot{}/sendMessage", token),
            chat_id: chat_id.to_string(),
            retry,
        })
    }

    async fn post_once(&self, text: &str) -> Result<(), NotifyError> {
        let message = SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: "HTML",
        };

        let resp = match self.client.post(&self.endpoint).json(&message).send().await {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() => {
                error!("Telegram request timed out");
                return Err(NotifyError::Timeout {
                    secs: self.retry.timeout.as_secs(),
                });
            }
            Err(e) => {
                error!("Telegram request failed: {}", e);
                return Err(e.into());
            }
        };

        let status = resp.status();
        if status.is_success() {
            debug!("Telegram notification sent");
            Ok(())
        } else {
            let body = resp.text().await.unwrap_or_default();
            error!("Error sending to Telegram: {} - {}", status, body);
            Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    /// Retries only rejections and refused connections, so an accepted
    /// message is never posted twice.
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        self.retry.run("telegram sendMessage", || self.post_once(text)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn policy(delay: Duration) -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            delay,
            timeout: Duration::from_secs(10),
        }
    }

    fn bad_gateway() -> NotifyError {
        NotifyError::Rejected {
            status: 502,
            body: "bad gateway".to_string(),
        }
    }

    /// Drain one request, headers plus `content-length` bytes of body
    async fn read_request(socket: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                let body_len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + body_len {
                    return;
                }
            }
        }
    }

    /// Local bot API answering each connection with the next status in turn
    async fn scripted_bot_api(statuses: Vec<u16>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            for status in statuses {
                let (mut socket, _) = listener.accept().await.unwrap();
                counter.fetch_add(1, Ordering::SeqCst);
                read_request(&mut socket).await;
                let reply = format!(
                    "HTTP/1.1 {} Scripted\r\ncontent-length: 2\r\nconnection: close\r\n\r\n{{}}",
                    status
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{}/bot123:abc/sendMessage", addr), hits)
    }

    #[test]
    fn test_requires_credentials() {
        let result = TelegramNotifier::new("", "146323300", policy(Duration::from_secs(20)));
        assert!(matches!(result, Err(NotifyError::NotConfigured(_))));
    }

    #[test]
    fn test_endpoint_embeds_token() {
        let notifier = TelegramNotifier::new("123:abc", "42", policy(Duration::from_secs(20))).unwrap();
        assert_eq!(notifier.endpoint, "https://api.telegram.org/bot123:abc/sendMessage");
    }

    #[tokio::test]
    async fn test_rejected_send_is_posted_again() {
        let (endpoint, hits) = scripted_bot_api(vec![502, 200]).await;
        let mut notifier = TelegramNotifier::new("123:abc", "42", policy(Duration::ZERO)).unwrap();
        notifier.endpoint = endpoint;

        assert!(notifier.send("<b>Long signal for BTCUSDT</b>").await.is_ok());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_refused_connection_exhausts_attempts() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut notifier = TelegramNotifier::new("123:abc", "42", policy(Duration::ZERO)).unwrap();
        notifier.endpoint = format!("http://{}/bot123:abc/sendMessage", addr);

        match notifier.send("hi").await {
            Err(NotifyError::Exhausted { attempts, .. }) => assert_eq!(attempts, 5),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejection_retried_after_delay() {
        let started = tokio::time::Instant::now();
        let mut calls = 0;

        let result = policy(Duration::from_secs(20))
            .run("telegram sendMessage", || {
                calls += 1;
                let attempt = calls;
                async move {
                    if attempt == 1 {
                        Err(bad_gateway())
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(calls, 2);
        assert!(started.elapsed() >= Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_send_is_not_repeated() {
        let mut calls = 0;
        let result: Result<(), NotifyError> = policy(Duration::from_secs(20))
            .run("telegram sendMessage", || {
                calls += 1;
                async { Err(NotifyError::Timeout { secs: 10 }) }
            })
            .await;

        assert_eq!(calls, 1);
        assert!(matches!(result, Err(NotifyError::Timeout { secs: 10 })));
    }

    #[tokio::test]
    async fn test_boxed_log_notifier_accepts() {
        let notifier: Box<dyn Notifier> = Box::new(LogNotifier);
        assert!(notifier.send("<b>hi</b>").await.is_ok());
    }

    #[test]
    fn test_payload_shape() {
        let message = SendMessage {
            chat_id: "42",
            text: "<b>hi</b>",
            parse_mode: "HTML",
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["chat_id"], "42");
        assert_eq!(json["parse_mode"], "HTML");
    }
}
