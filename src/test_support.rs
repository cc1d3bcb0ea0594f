use std::collections::HashMap;
use std::time::Duration;

use axum::http::StatusCode;
use axum::Router;

use crate::config::Config;

/// Serves `app` on an ephemeral local port and returns its base URL.
pub(crate) async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// A service that accepts requests and answers only after `delay`.
pub(crate) fn stalled_service(delay: Duration) -> Router {
    Router::new().fallback(move || async move {
        tokio::time::sleep(delay).await;
        StatusCode::OK
    })
}

pub(crate) fn test_config(plantnet_url: &str, gemini_base: &str) -> Config {
    let vars: HashMap<&str, String> = HashMap::from([
        ("PLANTNET_API_KEY", "pn-key".to_string()),
        ("GEMINI_API_KEY", "gm-key".to_string()),
        ("PLANTNET_API_URL", plantnet_url.to_string()),
        ("GEMINI_API_BASE", gemini_base.to_string()),
        ("PLANTNET_TIMEOUT_SECS", "5".to_string()),
        ("GEMINI_TIMEOUT_SECS", "5".to_string()),
    ]);
    Config::from_lookup(&move |name| vars.get(name).cloned()).unwrap()
}
