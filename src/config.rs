use crate::gemini::{DEFAULT_API_URL, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS};
use crate::utils::DEFAULT_MAX_ATTEMPTS;
use anyhow::{anyhow, Context, Result};
use dialoguer::{theme::ColorfulTheme, Input, Password, Select};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

const CONFIG_FILE: &str = ".optiflow.yml";
const GLOBAL_CONFIG_DIR: &str = ".config/optiflow";
const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Attempts per analysis; only transport failures are retried.
    #[serde(default = "default_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub export_dir: Option<String>,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            export_dir: None,
        }
    }
}

impl Config {
    pub fn load(project_dir: &Path) -> Result<Self> {
        let config_path = project_dir.join(CONFIG_FILE);
        if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Invalid config file {}", config_path.display()))
        } else if let Some(global_config) = Self::load_global()? {
            Ok(global_config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, project_dir: &Path) -> Result<()> {
        let config_path = project_dir.join(CONFIG_FILE);
        let content = serde_yaml::to_string(self)?;
        fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn load_global() -> Result<Option<Self>> {
        let Some(home) = dirs::home_dir() else {
            return Ok(None);
        };
        let global_config_path = home.join(GLOBAL_CONFIG_DIR).join(CONFIG_FILE);
        if global_config_path.exists() {
            let content = fs::read_to_string(&global_config_path)?;
            Ok(Some(serde_yaml::from_str(&content)?))
        } else {
            Ok(None)
        }
    }

    pub fn save_global(&self) -> Result<()> {
        let home = dirs::home_dir().ok_or_else(|| anyhow!("Could not locate home directory"))?;
        let global_config_dir = home.join(GLOBAL_CONFIG_DIR);
        fs::create_dir_all(&global_config_dir)?;
        let content = serde_yaml::to_string(self)?;
        fs::write(global_config_dir.join(CONFIG_FILE), content)?;
        Ok(())
    }

    /// Replaces the API key with the first non-empty variable found.
    pub fn apply_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = API_KEY_VARS
            .iter()
            .filter_map(|var| lookup(var))
            .find(|value| !value.trim().is_empty())
        {
            self.api_key = key;
        }
        self
    }
}

pub async fn configure_interactive(project_dir: &Path, global: bool) -> Result<()> {
    let theme = ColorfulTheme::default();
    let current_config = if global {
        Config::load_global()?.unwrap_or_default()
    } else {
        Config::load(project_dir)?
    };

    println!("\n🔧 OptiFlow configuration");
    println!("=========================");
    if global {
        println!("Editing global configuration\n");
    } else {
        println!("Editing project configuration\n");
    }

    let api_url: String = Input::with_theme(&theme)
        .with_prompt("API URL")
        .with_initial_text(&current_config.api_url)
        .interact_text()?;

    let api_key: String = Password::with_theme(&theme)
        .with_prompt("Gemini API key (empty keeps current)")
        .allow_empty_password(true)
        .interact()?;
    let api_key = if api_key.is_empty() {
        current_config.api_key.clone()
    } else {
        api_key
    };

    let models = match crate::gemini::list_models(&api_url, &api_key).await {
        Ok(models) if !models.is_empty() => {
            info!("Fetched {} available models", models.len());
            models
        }
        Ok(_) | Err(_) => {
            warn!("Could not fetch model list, using defaults");
            vec![
                "gemini-2.5-flash".to_string(),
                "gemini-2.5-pro".to_string(),
                "gemini-2.0-flash".to_string(),
            ]
        }
    };
    let default_index = models
        .iter()
        .position(|m| m == &current_config.model)
        .unwrap_or(0);
    let model_index = Select::with_theme(&theme)
        .with_prompt("Model")
        .default(default_index)
        .items(&models)
        .interact()?;

    let max_attempts: u32 = Input::with_theme(&theme)
        .with_prompt("Attempts per analysis (transport failures only)")
        .default(current_config.max_attempts)
        .interact_text()?;

    let new_config = Config {
        api_url,
        api_key,
        model: models[model_index].clone(),
        max_attempts,
        ..current_config
    };

    if global {
        new_config.save_global()?;
        info!("Global configuration updated");
    } else {
        new_config.save(project_dir)?;
        info!("Project configuration updated");
    }
    Ok(())
}

pub fn init_project(project_dir: &Path) -> Result<()> {
    let config_path = project_dir.join(CONFIG_FILE);
    if config_path.exists() {
        return Err(anyhow!("Config file already exists: {}", config_path.display()));
    }

    Config::default().save(project_dir)?;
    info!("Created config file: {}", config_path.display());

    // the file holds an API key; keep it out of git
    let gitignore_path = project_dir.join(".gitignore");
    if gitignore_path.exists() {
        let mut content = fs::read_to_string(&gitignore_path)?;
        if !content.contains(CONFIG_FILE) {
            if !content.ends_with('\n') {
                content.push('\n');
            }
            content.push_str(CONFIG_FILE);
            content.push('\n');
            fs::write(&gitignore_path, content)?;
            info!("Added {} to .gitignore", CONFIG_FILE);
        }
    } else {
        fs::write(&gitignore_path, format!("{}\n", CONFIG_FILE))?;
        info!("Created .gitignore with {}", CONFIG_FILE);
    }
    Ok(())
}

/// File config with environment overrides applied.
pub fn get_effective_config(project_dir: &Path) -> Result<Config> {
    Ok(Config::load(project_dir)?.apply_env_overrides(|var| std::env::var(var).ok()))
}
