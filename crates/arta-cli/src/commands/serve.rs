//! Server command implementation

use std::path::Path;

use anyhow::{Context, Result};

use super::open_db;

pub async fn cmd_serve(db_path: &Path, model_dir: &Path, host: &str, port: u16) -> Result<()> {
    println!("🚀 Starting Arta API server...");
    println!("   Database:  {}", db_path.display());
    println!("   Models:    {}", model_dir.display());
    println!("   Listening: http://{}:{}", host, port);

    let db = open_db(db_path)?;
    let app = arta_server::create_router(db, model_dir);

    let addr: std::net::SocketAddr = format!("{}:{}", host, port)
        .parse()
        .context("Invalid host/port")?;
    arta_server::serve(addr, app).await
}
