#[tokio::main]
async fn main() {
    component_id_store::main().await
}
