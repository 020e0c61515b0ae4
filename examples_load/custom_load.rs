use std::time::Instant;

use log_repository::registry::{self, Registry};
use log_repository::{repository, Attributes, ConfigNode, LogRecord};
use serde_json::json;

fn main() {
    let dir = std::env::temp_dir().join("log-repository-custom-load");
    let path = dir.join("load.log");

    // 1 MiB segments, three backups, no flush per record.
    let root = ConfigNode::from(json!({
        "load": {
            "frontends": [{
                "formatter": {"type": "msgpack"},
                "sink": {"type": "files", "config": [path.to_str().expect("utf-8 path"), false, [1_048_576, 3]]}
            }]
        }
    }));

    let registry = registry::install(Registry::with_builtins()).expect("install registry");
    let mut loggers = repository::load(registry, &root).expect("load config");
    let logger = loggers.get_mut("load").expect("load logger");

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        let record = LogRecord::with_message(
            chrono::Utc::now(),
            "ERROR",
            "custom load test",
            Attributes::new().with("iteration", i),
        );
        logger.log(&record).expect("write record");
    }
    logger.flush().expect("flush");

    let elapsed = start.elapsed();
    println!("custom config: wrote {} records to {} in {:?} (~{:.0} rec/s)",
        n,
        dir.display(),
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );
}
