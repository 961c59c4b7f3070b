use std::net::SocketAddr;

use clap::Parser;

use crate::simulator::{DEFAULT_LOOP_SECONDS, DEFAULT_VEHICLE_COUNT};

pub const DEV_TOKEN_SECRET: &str = "moveeasy-super-secret-key-2025";
pub const DEFAULT_USERS: &str = "driver1:password123,admin:admin2025";

#[derive(Parser, Debug, Clone)]
#[command(about = "MoveEasy demo transit API")]
pub struct ServerConfig {
    #[arg(long, env = "MOVEEASY_BIND", default_value = "0.0.0.0:5001")]
    pub bind: SocketAddr,

    /// Secret used to sign access tokens.
    #[arg(long, env = "JWT_SECRET_KEY", default_value = DEV_TOKEN_SECRET, hide_env_values = true)]
    pub token_secret: String,

    #[arg(long, env = "MOVEEASY_TOKEN_TTL_SECS", default_value_t = 900)]
    pub token_ttl_secs: i64,

    /// Demand a bearer token on /api routes.
    #[arg(long, env = "MOVEEASY_REQUIRE_AUTH")]
    pub require_auth: bool,

    /// Realtime database root, e.g. https://<project>.firebaseio.com/
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    #[arg(long, env = "FIREBASE_AUTH", hide_env_values = true)]
    pub database_auth: Option<String>,

    #[arg(long, env = "FIREBASE_API_KEY", hide_env_values = true)]
    pub identity_api_key: Option<String>,

    #[arg(long, env = "MOVEEASY_LOOP_SECS", default_value_t = DEFAULT_LOOP_SECONDS)]
    pub loop_seconds: f64,

    #[arg(long, env = "MOVEEASY_VEHICLES", default_value_t = DEFAULT_VEHICLE_COUNT)]
    pub vehicles: usize,

    /// Comma separated user:password pairs.
    #[arg(long, env = "MOVEEASY_USERS", default_value = DEFAULT_USERS, hide_env_values = true)]
    pub users: String,
}

impl ServerConfig {
    pub fn uses_dev_secret(&self) -> bool {
        self.token_secret == DEV_TOKEN_SECRET
    }

    /// Entries without a colon or with an empty name are skipped.
    pub fn user_pairs(&self) -> Vec<(String, String)> {
        parse_user_pairs(&self.users)
    }
}

pub fn parse_user_pairs(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter_map(|entry| {
            let (user, password) = entry.trim().split_once(':')?;
            let user = user.trim();
            (!user.is_empty()).then(|| (user.to_string(), password.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn default_of(id: &str) -> Option<String> {
        ServerConfig::command()
            .get_arguments()
            .find(|arg| arg.get_id() == id)
            .and_then(|arg| arg.get_default_values().first())
            .map(|value| value.to_string_lossy().into_owned())
    }

    // Declared defaults only; the process environment is never consulted.
    #[test]
    fn defaults_match_demo_deployment() {
        assert_eq!(default_of("bind").as_deref(), Some("0.0.0.0:5001"));
        assert_eq!(default_of("loop_seconds").as_deref(), Some("240"));
        assert_eq!(default_of("vehicles").as_deref(), Some("3"));
        assert_eq!(default_of("token_ttl_secs").as_deref(), Some("900"));
        assert_eq!(default_of("token_secret").as_deref(), Some(DEV_TOKEN_SECRET));
        assert_eq!(default_of("database_url"), None);
        assert_eq!(
            parse_user_pairs(DEFAULT_USERS),
            vec![
                ("driver1".to_string(), "password123".to_string()),
                ("admin".to_string(), "admin2025".to_string()),
            ]
        );
    }

    #[test]
    fn explicit_flags_override_everything() {
        let config = ServerConfig::parse_from([
            "moveeasy",
            "--bind",
            "127.0.0.1:8080",
            "--token-secret",
            "s3cret",
            "--loop-seconds",
            "120",
            "--vehicles",
            "5",
            "--users",
            "ops:pw",
        ]);
        assert_eq!(config.bind.port(), 8080);
        assert!(!config.uses_dev_secret());
        assert_eq!(config.loop_seconds, 120.0);
        assert_eq!(config.vehicles, 5);
        assert_eq!(config.user_pairs(), vec![("ops".to_string(), "pw".to_string())]);
    }

    #[test]
    fn user_pairs_skip_junk() {
        assert_eq!(
            parse_user_pairs(" a:1 , nocolon, :2,b:with:colon"),
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "with:colon".to_string()),
            ]
        );
    }
}
