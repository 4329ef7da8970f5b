use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use base64::Engine;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::time::sleep;

pub const SECRET: &str = "gateway-test-secret";
pub const KID: &str = "gateway-test";
pub const ISSUER: &str = "https://issuer.example";
pub const AUDIENCE: &str = "client-id-123";

pub fn default_config() -> String {
    config_with_extras("")
}

/// Base config: static HS256 key set, empty in-memory index, local echo
/// generation. `extras` is appended verbatim for per-test overrides.
pub fn config_with_extras(extras: &str) -> String {
    let encoded = base64::engine::general_purpose::URL_SAFE.encode(SECRET);
    format!(
        r#"
[server]
address = "127.0.0.1"
port = 0

[auth]
issuer = "{ISSUER}"
audience = "{AUDIENCE}"
algorithms = ["HS256"]

[auth.jwks]
kind = "static"

[[auth.jwks.keys]]
kid = "{KID}"
kty = "oct"
alg = "HS256"
k = "{encoded}"

[rag]
confidence_threshold = 0.3

[rag.retrieval]
kind = "memory"

[rag.generation]
kind = "local"

{extras}
"#
    )
}

pub struct GatewayProcess {
    child: Child,
    pub base_url: String,
    _dir: TempDir,
}

impl GatewayProcess {
    pub async fn spawn() -> Self {
        Self::spawn_with_config(&default_config()).await
    }

    pub async fn spawn_with_config(config: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test port");
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let tmp_dir = TempDir::new().expect("temp dir");
        let config_path = write_config(tmp_dir.path(), config);

        let mut child = Command::new(env!("CARGO_BIN_EXE_ragbase-gateway"))
            .env("GATEWAY_CONFIG_FILE", &config_path)
            .env("GATEWAY__SERVER__ADDRESS", "127.0.0.1")
            .env("GATEWAY__SERVER__PORT", port.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn gateway process");

        let base_url = format!("http://127.0.0.1:{port}");
        wait_for_ready(&base_url, &mut child).await;

        Self {
            child,
            base_url,
            _dir: tmp_dir,
        }
    }
}

impl Drop for GatewayProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub fn mint_token(email: &str, exp_offset_secs: i64) -> String {
    let now = unix_now();
    mint_claims(json!({
        "sub": format!("sub-{email}"),
        "email": email,
        "name": "Contract Tester",
        "iss": ISSUER,
        "aud": AUDIENCE,
        "iat": now,
        "exp": now + exp_offset_secs,
    }))
}

pub fn mint_claims(claims: Value) -> String {
    let header = Header {
        alg: Algorithm::HS256,
        kid: Some(KID.into()),
        ..Header::default()
    };
    encode(&header, &claims, &EncodingKey::from_secret(SECRET.as_bytes()))
        .expect("encode jwt")
}

pub fn client() -> Client {
    Client::new()
}

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock before epoch")
        .as_secs() as i64
}

fn write_config(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("gateway.toml");
    std::fs::write(&path, contents).expect("write config");
    path
}

async fn wait_for_ready(base_url: &str, child: &mut Child) {
    let client = Client::new();
    for _ in 0..100 {
        if let Some(status) = child.try_wait().expect("check gateway child status") {
            panic!("gateway process exited early with status {status}");
        }
        if let Ok(resp) = client.get(format!("{base_url}/health")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        sleep(Duration::from_millis(100)).await;
    }
    panic!("gateway did not become ready at {base_url}");
}
