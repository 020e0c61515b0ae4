use tracing::{error, info, warn};

use log_repository::init::{init_tracing_with_config, LayerConfig};
use log_repository::registry::{self, Registry};
use log_repository::{repository, ConfigNode};
use serde_json::json;

/// Route `tracing` events through a logger built from configuration:
/// only errors reach the JSON lines file, while the console shows everything.
fn main() {
    let path = std::env::temp_dir().join("log-repository-bridge/errors.log");
    let root = ConfigNode::from(json!({
        "errors": {
            "filter": {"type": "eq", "config": ["severity", "ERROR"]},
            "frontends": [{
                "formatter": {"type": "json"},
                "sink": {"type": "files", "config": [path.to_str().expect("utf-8 path"), true]}
            }]
        }
    }));

    let registry = registry::install(Registry::with_builtins()).expect("install registry");
    let mut loggers = repository::load(registry, &root).expect("load config");
    let logger = loggers.remove("errors").expect("errors logger");

    init_tracing_with_config(
        logger,
        LayerConfig {
            min_level: tracing::Level::INFO,
            enable_stdout: true,
        },
    )
    .expect("set global subscriber");

    info!("bridge example started");
    warn!(disk = "/var", "disk almost full");
    error!(db = "orders", attempt = 3, "connection refused");

    println!("errors written to {}", path.display());
}
