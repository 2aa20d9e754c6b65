//! Configuration and path resolution for deskcli

pub mod paths;
pub mod settings;

pub use paths::{auth_state_dir, config_dir, ensure_dir_exists, settings_file};
pub use settings::{read_client_credentials, Settings};
