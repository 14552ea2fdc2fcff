//! Settings for the generation endpoint and prompt.

pub mod settings;

pub use settings::{
    DEFAULT_MAX_DIFF_LENGTH, PartialSettings, REPO_CONFIG_FILE, Settings, load_settings,
    user_config_path,
};
