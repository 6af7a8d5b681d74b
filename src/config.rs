use dotenvy::dotenv;
use std::env;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    /// Base URL this server is reachable at; used to build the gateway
    /// callback and return URLs.
    pub public_base_url: String,

    // Payment gateway (Chapa)
    pub chapa_base_url: String,
    pub chapa_secret_key: String,
    pub gateway_timeout_secs: u64,
    pub currency: String,

    /// When true, salary transfers are simulated instead of hitting the
    /// gateway. Every simulated transfer is logged; the flag is never
    /// inferred from the credential value.
    pub simulate_transfers: bool,

    // Geofencing
    pub geofence_radius_m: f64,
    /// Whether clock-in is permitted at a branch that has no coordinates
    /// on file. When false such branches reject clock-in outright.
    pub allow_unfenced_clock_in: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        Self {
            server_addr: env::var("SERVER_ADDR").expect("SERVER_ADDR must be set"),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            access_token_ttl: env::var("ACCESS_TOKEN_TTL")
                .unwrap_or_else(|_| "900".to_string()) // default 15 min
                .parse()
                .unwrap(),
            refresh_token_ttl: env::var("REFRESH_TOKEN_TTL")
                .unwrap_or_else(|_| "604800".to_string()) // default 7 days
                .parse()
                .unwrap(),

            rate_login_per_min: env::var("RATE_LOGIN_PER_MIN")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap(),
            rate_protected_per_min: env::var("RATE_PROTECTED_PER_MIN")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .unwrap(),

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),

            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),

            chapa_base_url: env::var("CHAPA_BASE_URL")
                .unwrap_or_else(|_| "https://api.chapa.co/v1".to_string()),
            chapa_secret_key: env::var("CHAPA_SECRET_KEY").expect("CHAPA_SECRET_KEY must be set"),
            gateway_timeout_secs: env::var("GATEWAY_TIMEOUT_SECS")
                .unwrap_or_else(|_| "15".to_string())
                .parse()
                .unwrap(),
            currency: env::var("CURRENCY").unwrap_or_else(|_| "ETB".to_string()),

            simulate_transfers: env::var("SIMULATE_TRANSFERS")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),

            geofence_radius_m: env::var("GEOFENCE_RADIUS_M")
                .unwrap_or_else(|_| "200".to_string())
                .parse()
                .unwrap(),
            allow_unfenced_clock_in: env::var("ALLOW_UNFENCED_CLOCK_IN")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(true),
        }
    }
}
