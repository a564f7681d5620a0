use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use brewery_data::config::BreweryConfig;
use brewery_data::gate::DataGate;
use brewery_data::legacy::{LegacyLoader, LegacyWorld};
use brewery_data::quality::QualityEngine;
use brewery_data::recipe::RecipeCatalog;
use brewery_data::state::BreweryState;
use brewery_data::storage::DataManager;

/// How often the auto-save interval is checked
const SAVE_CHECK: Duration = Duration::from_secs(30);

// ============================================================================
// Legacy Import
// ============================================================================

/// Import old data, checkpoint it, then retire the old files.
async fn import_legacy(
    config: &BreweryConfig,
    storage: &DataManager,
    gate: &Arc<DataGate>,
    state: &mut BreweryState,
) {
    info!("Legacy data found in {:?}, importing", config.data_dir);
    let loader = LegacyLoader::from_config(config).with_install_time(state.misc.install_time);
    let worlds: Vec<LegacyWorld> = config
        .worlds
        .iter()
        .map(|w| {
            let world = LegacyWorld::new(w.id, w.name.clone());
            match &w.dxl_key {
                Some(key) => world.with_dxl_key(key.clone()),
                None => world,
            }
        })
        .collect();

    let import = match loader.clone().run(Arc::clone(gate)).await {
        Ok(import) => import,
        Err(e) => {
            error!("Legacy import failed, old files left in place: {}", e);
            return;
        }
    };

    let mut loads = loader.spawn_world_loads(gate, &import, worlds);
    state.merge_legacy(import);

    let mut merged = 0;
    let mut failed = 0;
    while let Some(result) = loads.next().await {
        match result {
            Ok(world) => {
                if state.merge_world(world) {
                    merged += 1;
                }
            }
            Err(e) => {
                error!("Failed to load legacy world data: {}", e);
                failed += 1;
            }
        }
    }
    info!("Merged legacy data for {} worlds", merged);

    match storage.save_all(state, gate).await {
        Ok(0) if failed == 0 => {
            if let Err(e) = loader.finalize() {
                error!("Failed to rename legacy files: {}", e);
            }
        }
        Ok(0) => warn!(
            "{} worlds failed to load, keeping legacy files for the next start",
            failed
        ),
        Ok(tables) => warn!(
            "{} tables failed to save, keeping legacy files for the next start",
            tables
        ),
        Err(e) => error!("Could not save imported legacy data: {}", e),
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    // Initialize logging
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "brewery_data=info".parse::<tracing_subscriber::filter::Directive>() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));
    let config = match BreweryConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let storage = match DataManager::open(&config).await {
        Ok(storage) => storage,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let mut catalog = RecipeCatalog::new();
    if let Err(e) = catalog.load_from_directory(&config.data_dir) {
        error!("Failed to load recipe catalog: {}", e);
    }
    let engine = QualityEngine::new(config.new_barrel_type_algorithm);
    info!(
        "{} recipes ready, {} wood scoring",
        catalog.len(),
        if engine.new_wood_algorithm { "distance" } else { "linear" }
    );

    let gate = Arc::new(DataGate::new(config.gate_config()));
    let mut state = BreweryState::from_storage(&storage).await;
    for world in &config.worlds {
        state.add_world(world.id);
    }

    if LegacyLoader::detect(&config.data_dir) {
        import_legacy(&config, &storage, &gate, &mut state).await;
    }

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    match config.autosave_interval() {
        Some(interval) => {
            info!("Auto-saving every {} minutes", config.autosave_minutes);
            let mut ticker = tokio::time::interval(SAVE_CHECK.min(interval));
            let mut last_save = Instant::now();
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        storage.try_auto_save(&state, &gate, &mut last_save, interval).await;
                    }
                    result = &mut shutdown => {
                        if let Err(e) = result {
                            error!("Failed to listen for shutdown signal: {}", e);
                        }
                        break;
                    }
                }
            }
        }
        None => {
            info!("Auto-save disabled");
            if let Err(e) = shutdown.await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        }
    }

    info!("Shutting down, saving data");
    if let Err(e) = storage.save_all(&state, &gate).await {
        error!("Final save failed: {}", e);
    }
}
