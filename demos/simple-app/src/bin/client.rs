use serde_json::{Value, json};
use simple_app::{ADDR, PATH};
use tracing_subscriber::EnvFilter;
use wsrpc::prelude::*;

async fn call(client: &RpcClient, method: &str, params: Value) -> String {
    println!("--> {method} {params}");
    match client.call(method, params).await {
        Ok(result) => {
            println!("<-- {result}");
            result.to_string()
        }
        Err(ClientError::Rpc(e)) => {
            println!("<-- Eh... {}", e.message);
            format!("Error {}: \"{}\"", e.code.code(), e.message)
        }
        Err(e) => {
            println!("<-- failed: {e}");
            e.to_string()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let url = format!("ws://{ADDR}{PATH}");
    let auth = "MyAuth <foo>:<bar>";

    let client = RpcClient::builder(&url)
        .encoding(Encoding::Binary)
        .header("Authorization", auth)
        .connect()
        .await?;
    call(&client, "PrinterService.print", json!({"text": "Letter"})).await;
    call(&client, "CameraService.take_photo", json!({})).await;
    call(&client, "CameraService.take_photo", json!({})).await;
    call(&client, "PrinterService.get_firmware_version", json!({})).await;
    client.close().await?;

    let client = RpcClient::builder(&url).header("Authorization", auth).connect().await?;
    call(&client, "PrinterService.print", json!({"text": "Title page"})).await;
    call(&client, "CameraService.take_photo", json!({})).await;
    call(&client, "CameraService.non_existent_method", json!({})).await;
    client.close().await?;

    Ok(())
}
