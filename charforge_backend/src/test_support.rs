use std::sync::{Arc, Mutex};

use axum::Router;
use serde_json::Value;

/// Last JSON body seen by a stub endpoint.
#[derive(Clone, Default)]
pub struct Captured(Arc<Mutex<Option<Value>>>);

impl Captured {
    pub fn store(&self, value: Value) {
        *self.0.lock().unwrap() = Some(value);
    }

    pub fn take(&self) -> Option<Value> {
        self.0.lock().unwrap().take()
    }
}

/// Serve `app` on an ephemeral local port and return its base URL.
pub async fn spawn_stub(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}
