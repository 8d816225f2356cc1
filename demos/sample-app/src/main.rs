//! Loads site settings, commits an update and prints the reloaded result.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde::Serialize;
use setthings::Settings;
use setthings::manager::{SettingsEvent, SettingsManager, SettingsWatcher, WatchConfig};
use setthings::store::{FileStore, FileStoreConfig, LocalNotifier, MemoryStore, SettingsStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(about = "setthings sample application")]
struct Args {
    /// Persist settings to this JSON file instead of keeping them in memory.
    #[arg(long)]
    store: Option<PathBuf>,

    /// Seconds to wait for the change notification.
    #[arg(long, default_value_t = 5)]
    timeout: u64,
}

#[derive(Debug, Default, Clone, Serialize, Settings)]
#[serde(rename_all = "PascalCase")]
#[settings(rename_all = "PascalCase")]
struct SiteSettings {
    #[setting(node)]
    analytics: AnalyticsSettings,
    #[setting(node)]
    network: NetworkSettings,
}

#[derive(Debug, Default, Clone, Serialize, Settings)]
#[serde(rename_all = "PascalCase")]
#[settings(rename_all = "PascalCase")]
struct AnalyticsSettings {
    new_enabled: bool,
    legacy_enabled: bool,
}

#[derive(Debug, Default, Clone, Serialize, Settings)]
#[serde(rename_all = "PascalCase")]
#[settings(rename_all = "PascalCase")]
struct NetworkSettings {
    #[setting(default = "careers.stackoverflow.com")]
    careers_host: String,
    calculon_host: String,
    joel_careers_host: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let store: Arc<dyn SettingsStore> = match &args.store {
        Some(path) => {
            info!(path = %path.display(), "using file store");
            Arc::new(FileStore::new(FileStoreConfig::new(path).with_pretty(true))?)
        }
        None => Arc::new(MemoryStore::new()),
    };

    let manager = Arc::new(
        SettingsManager::<SiteSettings>::builder(store)
            .with_notifier(Arc::new(LocalNotifier::new()))
            .build()?,
    );

    let settings = manager.load_async().await?;
    println!("{}\n", serde_json::to_string_pretty(&settings)?);

    let watcher = SettingsWatcher::spawn(Arc::clone(&manager), WatchConfig::default())?;
    let mut events = watcher.subscribe();

    let mut tx = manager.begin_update();
    tx.set(|s| s.analytics().legacy_enabled(), true)?
        .set(|s| s.analytics().new_enabled(), true)?
        .set(|s| s.network().careers_host(), "local.careers.stackoverflow.com")?
        .set(|s| s.network().calculon_host(), "local.clc.stackoverflow.com")?
        .set(|s| s.network().joel_careers_host(), "local.joeltest.com")?;
    info!(keys = tx.pending().len(), "committing update");
    tx.commit_async().await?;

    let event = tokio::time::timeout(Duration::from_secs(args.timeout), events.recv())
        .await
        .context("timed out waiting for the change notification")??;
    match event {
        SettingsEvent::Updated(settings) => {
            println!("{}", serde_json::to_string_pretty(settings.as_ref())?);
        }
        SettingsEvent::ReloadFailed(err) => bail!("reload failed: {err}"),
    }

    watcher.shutdown();
    Ok(())
}
