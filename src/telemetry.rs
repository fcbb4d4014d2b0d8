//! Logging setup

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber
///
/// `RUST_LOG` takes precedence over the configured level. Output is JSON
/// when `json` is set.
pub fn init(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(log_level)));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if let Err(e) = result {
        tracing::warn!("Tracing subscriber already installed: {}", e);
    }
}

fn default_directives(log_level: &str) -> String {
    let level = log_level.trim().to_lowercase();
    format!("{level},tower_http={level},sqlx=warn")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        assert_eq!(
            default_directives(" INFO "),
            "info,tower_http=info,sqlx=warn"
        );
    }

    #[test]
    fn test_init_twice_does_not_panic() {
        init("debug", false);
        init("debug", true);
    }
}
