use plc_identity::config::{init_logging, PlcClientConfig};
use plc_identity::error::{self, Result};
use plc_identity::identity::{DeactivationMode, DidManager, UpdateChanges};
use plc_identity::keystore::FileKeyStore;
use plc_identity::HttpDirectory;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = PlcClientConfig::from_env().map_err(|e| {
        eprintln!("failed to load configuration: {e}");
        e
    })?;

    init_logging(&config)?;
    config.validate()?;

    info!("plc-identity client starting");
    info!("directory: {}", config.directory.base_url);

    if let Err(e) = run_demo(config).await {
        error!("demo flow failed: {e}");
        return Err(e);
    }

    Ok(())
}

async fn run_demo(config: PlcClientConfig) -> Result<()> {
    let directory = HttpDirectory::new(
        url::Url::parse(&config.directory.base_url).map_err(|e| error::PlcError::Config(e.to_string()))?,
        config.request_timeout(),
    )?;
    let keystore = FileKeyStore::new(&config.keystore.path);
    let manager = DidManager::new(directory, keystore);

    info!("creating genesis identity");
    let created = manager.create(Some("plc-identity-demo".to_string()), None).await?;
    println!("created {}", created.did);

    info!("updating handle");
    manager
        .update(
            &created.did,
            UpdateChanges { handle: Some("plc-identity-demo-renamed".to_string()), service_endpoint: None },
        )
        .await?;
    println!("updated alsoKnownAs for {}", created.did);

    info!("rotating keys");
    let rotated = manager.rotate_keys(&created.did, Some("scheduled rotation".to_string())).await?;
    println!("rotated rotation key to {}", rotated.rotation_key.encode_public());

    info!("deactivating identity");
    let deactivated = manager.deactivate(&created.did).await?;
    match deactivated.mode {
        DeactivationMode::Tombstoned => println!("deactivated {} via tombstone", deactivated.did),
        DeactivationMode::SoftDeactivated => println!("deactivated {} via soft deactivation", deactivated.did),
    }

    Ok(())
}
