//! Shared helpers: a fake MeteoBridge on a loopback socket and a publisher
//! that records every driver update.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use meteobridge::config::Config;
use meteobridge::poller::Poller;
use meteobridge::sink::{DriverPublisher, DriverUpdate};
use meteobridge::units::Category;

pub const THB_FIXTURE: &str = r#"<logger>
  <THB id="thb0" temp="20.0" hum="55.0" dew="11.2" press="1013.0" seapress="1015.0"/>
</logger>"#;

/// Serves `body` to each of `connections` clients, then stops listening.
/// Returns the port and a handle resolving to the requests received.
pub async fn fake_device(body: &'static str, connections: usize) -> (u16, JoinHandle<Vec<Vec<u8>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(async move {
        let mut requests = Vec::new();
        for _ in 0..connections {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 1024];
            let n = socket.read(&mut buf).await.unwrap();
            requests.push(buf[..n].to_vec());
            // The client may hang up early on a truncated read.
            let _ = socket.write_all(body.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
        requests
    });
    (port, handle)
}

/// A device that accepts and then never answers.
pub async fn silent_device() -> (u16, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(async move {
        let (_socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
    });
    (port, handle)
}

/// A device that takes the request and never answers. `requested` fires once
/// the request is in; the handle resolves when the client closes the socket.
pub async fn hanging_device() -> (u16, oneshot::Receiver<()>, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (requested_tx, requested_rx) = oneshot::channel();
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 1024];
        let _ = socket.read(&mut buf).await;
        let _ = requested_tx.send(());
        // Returns on EOF or reset.
        while let Ok(n) = socket.read(&mut buf).await {
            if n == 0 {
                break;
            }
        }
    });
    (port, requested_rx, handle)
}

/// A port nothing listens on.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

pub fn poller(port: u16, extra_yaml: &str) -> Poller {
    let yaml = format!(
        "device:\n  host: 127.0.0.1\n  port: {port}\n  timeout_secs: 1\n{extra_yaml}"
    );
    Poller::new(Config::parse(&yaml).unwrap().poll_config().unwrap())
}

#[derive(Default)]
pub struct Recorder {
    pub updates: Mutex<Vec<DriverUpdate>>,
}

impl Recorder {
    pub fn len(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    pub fn value(&self, category: Category, channel: &str) -> Option<f64> {
        self.find(category, channel).map(|u| u.value)
    }

    pub fn find(&self, category: Category, channel: &str) -> Option<DriverUpdate> {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.category == category && u.channel == channel)
            .cloned()
    }
}

#[async_trait]
impl DriverPublisher for Recorder {
    async fn set_driver(&self, update: &DriverUpdate) -> meteobridge::Result<()> {
        self.updates.lock().unwrap().push(update.clone());
        Ok(())
    }
}
