use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "OUTAGE_CHECKER_LOG";

/// Install the stderr subscriber.
///
/// `OUTAGE_CHECKER_LOG` (an `EnvFilter` directive) wins; otherwise `-v`
/// turns on debug output for our crates and everything else stays at `warn`.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("warn,outage_core=debug,outage_checker=debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .without_time()
        .try_init()
        .ok();
}
