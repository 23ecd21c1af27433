use std::env;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8088";
const DEFAULT_SESSION_TTL_HOURS: i64 = 14 * 24;

/// Startup configuration, resolved once in `main` and handed to the
/// request-handling layer. Nothing else reads the environment.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: String,
    pub allowed_origins: Vec<String>,
    pub session_ttl_ms: i64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_owned());
        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .map(|raw| parse_origins(&raw))
            .unwrap_or_else(|_| {
                vec![
                    "http://127.0.0.1:8000".to_owned(),
                    "http://localhost:8000".to_owned(),
                ]
            });
        let session_ttl_hours = env::var("SESSION_TTL_HOURS")
            .ok()
            .and_then(|raw| raw.parse::<i64>().ok())
            .filter(|hours| *hours > 0)
            .unwrap_or(DEFAULT_SESSION_TTL_HOURS);
        Config {
            bind_addr,
            database_url,
            allowed_origins,
            session_ttl_ms: session_ttl_hours * 3_600_000,
        }
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origins_split_on_commas_and_trim() {
        assert_eq!(
            parse_origins("https://a.example, https://b.example ,,"),
            vec!["https://a.example".to_owned(), "https://b.example".to_owned()]
        );
        assert!(parse_origins("").is_empty());
    }
}
