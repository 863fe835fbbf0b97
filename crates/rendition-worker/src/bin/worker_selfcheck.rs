use std::path::Path;

use rendition_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env()?;

    println!(
        "worker-selfcheck: starting with work_dir={}",
        config.work_dir.display()
    );
    ensure_workdir(&config.work_dir).await?;
    config
        .tools
        .check()
        .map_err(|e| anyhow::anyhow!("tool check failed: {}", e))?;
    println!("worker-selfcheck: upload mode {:?}", config.upload_mode);

    if let Some(r2) = &config.storage {
        if config.needs_storage() {
            let client = rendition_storage::R2Client::new(r2.clone())?;
            client.check_connectivity().await?;
            println!("worker-selfcheck: bucket {} reachable", client.bucket());
        }
    }

    println!("worker-selfcheck: ok");
    Ok(())
}

async fn ensure_workdir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    tokio::fs::create_dir_all(path).await?;
    let probe = path.join(".selfcheck");
    tokio::fs::write(&probe, b"ok").await?;
    tokio::fs::remove_file(&probe).await?;
    Ok(())
}
