pub use self::parser::{
    AuthConfig, Config, DatabaseConfig, LiveConfig, LoggingConfig, ServerConfig, ToggleBackend,
    TogglesConfig,
};
pub use self::validator::ConfigError;

mod parser;
mod validator;
