use crate::config::types::Config;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_section(config)?;
    validate_seeds(&config.seeds)?;
    Ok(())
}

fn validate_crawler_section(config: &Config) -> Result<(), ConfigError> {
    let crawler = &config.crawler;

    if crawler.concurrent_requests_limit < 1 || crawler.concurrent_requests_limit > 100 {
        return Err(ConfigError::Validation(format!(
            "concurrent-requests-limit must be between 1 and 100, got {}",
            crawler.concurrent_requests_limit
        )));
    }

    if crawler.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be blank".to_string(),
        ));
    }

    Ok(())
}

fn validate_seeds(seeds: &[String]) -> Result<(), ConfigError> {
    if seeds.is_empty() {
        return Err(ConfigError::Validation(
            "at least one seed URL is required".to_string(),
        ));
    }

    for seed in seeds {
        let url = Url::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' must use the http or https scheme",
                seed
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{CrawlerSection, QueueSection};

    fn valid_config() -> Config {
        Config {
            crawler: CrawlerSection {
                interval_ms: 1000,
                concurrent_requests_limit: 5,
                user_agent: "TestBot/1.0".to_string(),
                max_content_length: 0,
                robots_enabled: true,
                robots_cache_time_secs: 3600,
                robots_ignore_server_error: false,
            },
            queue: QueueSection::default(),
            seeds: vec!["https://example.com/".to_string()],
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = valid_config();
        config.crawler.concurrent_requests_limit = 0;
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_blank_user_agent_rejected() {
        let mut config = valid_config();
        config.crawler.user_agent = "   ".to_string();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_empty_seeds_rejected() {
        let mut config = valid_config();
        config.seeds.clear();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_relative_seed_rejected() {
        let mut config = valid_config();
        config.seeds = vec!["/just/a/path".to_string()];
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_non_http_seed_rejected() {
        let mut config = valid_config();
        config.seeds = vec!["ftp://example.com/".to_string()];
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }
}
