use std::time::Instant;

use log_repository::registry::{self, Registry};
use log_repository::{repository, Attributes, LogRecord};

fn main() {
    let registry = registry::install(Registry::with_builtins()).expect("install registry");
    let mut loggers = repository::load_or_trivial(registry, None).expect("load trivial logger");
    let logger = loggers.get_mut(repository::TRIVIAL).expect("trivial logger");

    let n: u64 = 10_000;
    let start = Instant::now();

    for i in 0..n {
        let record = LogRecord::with_message(
            chrono::Utc::now(),
            "INFO",
            "default load test",
            Attributes::new().with("iteration", i),
        );
        logger.log(&record).expect("write record");
    }

    let elapsed = start.elapsed();
    eprintln!("default config: wrote {} records in {:?} (~{:.0} rec/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );
}
