use crate::config::types::{
    Config, CrawlerConfig, DownloadConfig, FilterConfig, StorageBackend, StorageConfig, UrlConfig,
    UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_download_config(&config.download)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_url_config(&config.url)?;
    validate_filter_config(&config.filters)?;
    validate_storage_config(&config.storage)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.seeds.is_empty() {
        return Err(ConfigError::Validation(
            "at least one seed URL is required".to_string(),
        ));
    }

    for seed in &config.seeds {
        validate_seed(seed)?;
    }

    if config.max_concurrent_downloads < 1 || config.max_concurrent_downloads > 256 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_downloads must be between 1 and 256, got {}",
            config.max_concurrent_downloads
        )));
    }

    check_positive("max_downloads", config.max_downloads)?;
    check_positive("max_download_errors", config.max_download_errors)?;
    check_positive("max_crawl_time", config.max_crawl_time)?;
    check_positive("step_timeout", config.step_timeout)?;

    Ok(())
}

/// Validates a single seed URL
fn validate_seed(seed: &str) -> Result<(), ConfigError> {
    let url = Url::parse(seed)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "Seed URL '{}' must use the http or https scheme",
            seed
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "Seed URL '{}' has no host",
            seed
        )));
    }

    Ok(())
}

fn check_positive(name: &str, value: Option<u64>) -> Result<(), ConfigError> {
    match value {
        Some(0) => Err(ConfigError::Validation(format!(
            "{} must be >= 1 when set",
            name
        ))),
        _ => Ok(()),
    }
}

/// Validates download configuration
fn validate_download_config(config: &DownloadConfig) -> Result<(), ConfigError> {
    if config.connect_timeout < 1 {
        return Err(ConfigError::Validation(
            "connect_timeout must be >= 1ms".to_string(),
        ));
    }

    if config.read_timeout < 1 {
        return Err(ConfigError::Validation(
            "read_timeout must be >= 1ms".to_string(),
        ));
    }

    if config.retry_count > 20 {
        return Err(ConfigError::Validation(format!(
            "retry_count must be <= 20, got {}",
            config.retry_count
        )));
    }

    check_positive("max_content_size", config.max_content_size)?;

    if let Some(max) = config.max_content_size {
        if config.max_in_memory_size > max {
            tracing::debug!(
                "max_in_memory_size ({}) exceeds max_content_size ({}); bodies will never spill",
                config.max_in_memory_size,
                max
            );
        }
    }

    Ok(())
}

/// Validates the identity sent in the User-Agent header
///
/// Name and version form the product token, so both must be non-empty and
/// free of whitespace; the name is further limited to letters, digits and
/// hyphens.
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    let name = &config.crawler_name;
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '-') {
        return Err(ConfigError::Validation(format!(
            "crawler_name must be non-empty and contain only alphanumeric characters and hyphens, got '{}'",
            name
        )));
    }

    let version = &config.crawler_version;
    if version.is_empty() || version.chars().any(char::is_whitespace) {
        return Err(ConfigError::Validation(format!(
            "crawler_version must be non-empty without whitespace, got '{}'",
            version
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)
}

/// Validates dedup key configuration
fn validate_url_config(config: &UrlConfig) -> Result<(), ConfigError> {
    if config.components.is_empty() {
        return Err(ConfigError::Validation(
            "url.components must name at least one URL component".to_string(),
        ));
    }
    Ok(())
}

/// Validates include/exclude domain patterns
fn validate_filter_config(config: &FilterConfig) -> Result<(), ConfigError> {
    for pattern in config.include.iter().chain(config.exclude.iter()) {
        validate_domain_pattern(pattern)?;
    }
    Ok(())
}

/// Validates storage configuration
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.backend == StorageBackend::Sqlite {
        match config.database_path.as_deref() {
            Some(path) if !path.is_empty() => {}
            _ => {
                return Err(ConfigError::Validation(
                    "database_path is required for the sqlite backend".to_string(),
                ))
            }
        }
    }
    Ok(())
}

/// Validates a filter pattern: a host name, optionally prefixed by `*.`
///
/// Every dot-separated label must be non-empty, made of ASCII letters,
/// digits and hyphens, and must not begin or end with a hyphen. At least
/// two labels are required.
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    let host = pattern.strip_prefix("*.").unwrap_or(pattern);
    let invalid = |why: &str| {
        Err(ConfigError::InvalidPattern(format!(
            "'{}' is not a valid domain pattern: {}",
            pattern, why
        )))
    };

    if host.is_empty() {
        return invalid("empty host");
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 {
        return invalid("expected at least two labels, e.g. 'example.com'");
    }

    for label in labels {
        if label.is_empty() {
            return invalid("empty label");
        }
        if label.starts_with('-') || label.ends_with('-') {
            return invalid("label starts or ends with '-'");
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return invalid("unexpected character");
        }
    }

    Ok(())
}

/// Checks the contact address has the shape `local@domain.tld`
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let well_formed = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };

    if well_formed {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "contact_email '{}' is not a valid address",
            email
        )))
    }
}
