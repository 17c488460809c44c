/// TOML configuration file (`tutor.toml`).
pub mod toml_config;
