//! Demo services: a printer and a camera.
//!
//! Run `cargo run -p simple-app --bin server`, then
//! `cargo run -p simple-app --bin client` in another terminal.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::Deserialize;
use wsrpc::prelude::*;

pub const ADDR: &str = "127.0.0.1:8888";
pub const PATH: &str = "/ws/json-rpc";

// ---------------------------------------------------------------------------
// Printer
// ---------------------------------------------------------------------------

pub struct PrinterService {
    owner: String,
}

#[derive(Deserialize)]
struct PrintParams {
    #[serde(default)]
    text: String,
}

impl PrinterService {
    fn print(&self, text: &str) -> String {
        tracing::debug!(owner = %self.owner, text, "printing");
        format!("Text `{text}` has been printed")
    }

    /// Local only; never added to the method table.
    pub fn get_firmware_version(&self) -> &'static str {
        "3.1.459"
    }
}

impl Service for PrinterService {
    const NAME: &'static str = "PrinterService";

    fn create(context: &ConnectionContext) -> Self {
        PrinterService {
            owner: context.header("authorization").unwrap_or("anonymous").to_string(),
        }
    }

    fn register(methods: &mut MethodTable<Self>) {
        methods.sync_method("print", |printer: &PrinterService, p: PrintParams| {
            Ok::<_, RpcError>(printer.print(&p.text))
        });
    }
}

// ---------------------------------------------------------------------------
// Camera
// ---------------------------------------------------------------------------

pub struct CameraService {
    /// Upper bound of the simulated save latency, from the `camera_delay_ms`
    /// context value.
    max_delay_ms: u64,
}

impl CameraService {
    async fn take_photo(&self) -> String {
        format!("Picture `{}` has been taken.", self.save_photo().await)
    }

    async fn save_photo(&self) -> String {
        let (delay, name) = {
            let mut rng = rand::rng();
            let low = self.max_delay_ms / 2;
            (rng.random_range(low..=self.max_delay_ms), rng.random::<u128>())
        };
        tokio::time::sleep(Duration::from_millis(delay)).await;
        format!("{name:032x}.bmp")
    }
}

impl Service for CameraService {
    const NAME: &'static str = "CameraService";

    fn create(context: &ConnectionContext) -> Self {
        let max_delay_ms = context
            .value("camera_delay_ms")
            .and_then(|v| v.as_u64())
            .unwrap_or(1000);
        CameraService { max_delay_ms }
    }

    fn register(methods: &mut MethodTable<Self>) {
        methods.method("take_photo", |camera: Arc<CameraService>, _: NoParams| async move {
            Ok::<_, RpcError>(camera.take_photo().await)
        });
    }
}

/// Builds the demo server on `addr`.
pub async fn server(addr: &str, camera_delay_ms: u64) -> Result<RpcServer, WsRpcError> {
    RpcServer::builder()
        .bind(addr)
        .path(PATH)
        .service::<PrinterService>()
        .service::<CameraService>()
        .context("camera_delay_ms", camera_delay_ms.into())
        .build()
        .await
}
