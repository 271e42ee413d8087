//! Server command implementation

use std::path::Path;

use anyhow::Result;

use super::open_db;

/// Environment variable holding comma-separated API keys
pub const API_KEYS_ENV: &str = "VIGIL_API_KEYS";

pub async fn cmd_serve(
    db_path: &Path,
    host: &str,
    port: u16,
    no_auth: bool,
    no_encrypt: bool,
    cors_origins: Vec<String>,
) -> Result<()> {
    println!("🚀 Starting Vigil web server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);

    let api_keys = vigil_server::parse_api_keys(&std::env::var(API_KEYS_ENV).unwrap_or_default());

    if no_auth {
        println!();
        println!("   ⚠️  Authentication DISABLED - do not expose to network!");
    } else {
        println!("   🔒 Authentication: Cloudflare Access (header only)");
        if !api_keys.is_empty() {
            println!(
                "   🔑 API keys: {} configured ({})",
                api_keys.len(),
                API_KEYS_ENV
            );
        }
    }
    if !cors_origins.is_empty() {
        println!("   🌐 CORS origins: {}", cors_origins.join(", "));
    }
    if no_encrypt {
        println!("   ⚠️  Encryption DISABLED (--no-encrypt)");
    }

    let schedule = vigil_server::RecomputeScheduleConfig::from_env();
    if schedule.is_enabled() {
        println!(
            "   ⏱  Recompute every {} min, recommendations every {} h",
            schedule.recompute_interval_minutes, schedule.recommendation_interval_hours
        );
    }
    println!();
    println!("   Press Ctrl+C to stop");

    let db = open_db(db_path, no_encrypt)?;

    let config = vigil_server::ServerConfig {
        require_auth: !no_auth,
        allowed_origins: cors_origins,
        api_keys,
    };

    vigil_server::serve_with_config(db, host, port, config).await?;

    Ok(())
}
