use std::env;
use std::path::PathBuf;

pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Process configuration read from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub port: u16,
    pub frontend_url: String,
    pub mongodb_url: Option<String>,
    pub mongodb_db: String,
    pub data_dir: PathBuf,
    pub content_dir: PathBuf,
    pub webhook_secret: Option<String>,
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).ok().filter(|v| !v.trim().is_empty()).unwrap_or_else(|| default.to_string())
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            bind_addr: var_or("BIND_ADDR", "0.0.0.0"),
            port: var_or("PORT", "8080").parse().unwrap_or(8080),
            frontend_url: var_or("FRONTEND_URL", "http://localhost:3000"),
            mongodb_url: optional("MONGODB_URL"),
            mongodb_db: var_or("MONGODB_DB", "devflow"),
            data_dir: PathBuf::from(var_or("DEVFLOW_DATA_DIR", "data")),
            content_dir: PathBuf::from(var_or("CONTENT_DIR", "content")),
            webhook_secret: optional("WEBHOOK_SECRET"),
        }
    }
}

/// Problems that make startup pointless; empty when the environment is usable.
pub fn env_problems() -> Vec<String> {
    let mut problems = Vec::new();
    match env::var("JWT_SECRET") {
        Err(_) => problems.push("Missing required environment variable: JWT_SECRET".to_string()),
        Ok(s) if s.len() < MIN_JWT_SECRET_LEN => {
            problems.push(format!("JWT_SECRET must be at least {MIN_JWT_SECRET_LEN} characters long"))
        }
        Ok(_) => {}
    }
    problems
}

/// Exit the process when required variables are missing or unusable.
pub fn validate_env_vars() {
    let problems = env_problems();
    if problems.is_empty() {
        if optional("WEBHOOK_SECRET").is_none() {
            eprintln!("Warning: WEBHOOK_SECRET not set; identity webhook will answer 503");
        }
        return;
    }
    for p in &problems {
        eprintln!("{p}");
    }
    eprintln!("Please copy .env.example to .env and configure it");
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn defaults_apply_when_unset() {
        for v in ["BIND_ADDR", "PORT", "MONGODB_URL", "MONGODB_DB", "CONTENT_DIR"] {
            env::remove_var(v);
        }
        let cfg = AppConfig::from_env();
        assert_eq!(cfg.bind_addr, "0.0.0.0");
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.mongodb_url, None);
        assert_eq!(cfg.mongodb_db, "devflow");
        assert_eq!(cfg.content_dir, PathBuf::from("content"));
    }

    #[test]
    #[serial]
    fn short_secret_is_reported() {
        env::set_var("JWT_SECRET", "short");
        assert_eq!(env_problems().len(), 1);
        env::set_var("JWT_SECRET", "0123456789abcdef0123456789abcdef");
        assert!(env_problems().is_empty());
    }
}
