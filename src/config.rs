use ::envconfig::Envconfig;

#[derive(Debug, PartialEq)]
pub(crate) enum Mode {
    ServeAPI,
    Seed,
}

impl ::std::str::FromStr for Mode {
    type Err = ::anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "SERVE_API" => Ok(Mode::ServeAPI),
            "SEED" => Ok(Mode::Seed),
            _ => Err(::anyhow::anyhow!("unknown mode: {}", value)),
        }
    }
}

#[derive(::envconfig::Envconfig)]
pub(crate) struct Config {
    #[envconfig(from = "HTTP_PORT_API", default = "8081")]
    pub http_port_api: u16,

    #[envconfig(from = "DATABASE_URL", default = "sqlite://school_forum.db")]
    pub database_url: String,

    #[envconfig(from = "DATABASE_MAX_CONNECTIONS", default = "10")]
    pub database_max_connections: u32,

    #[envconfig(from = "STATSD_ADDRESS", default = "127.0.0.1")]
    pub statsd_address: String,

    #[envconfig(from = "STATSD_PORT", default = "8125")]
    pub statsd_port: u16,

    #[envconfig(from = "MODE", default = "SERVE_API")]
    pub mode: Mode,
}

impl Config {
    pub(crate) fn from_env() -> Result<Config, ::envconfig::Error> {
        Config::init_from_env()
    }
}
