use crate::input::{GestureConfig, TrackerConfig, Trigger, TriggerInput};
use crate::menu::{ConfigId, MAX_RING_ITEMS, Modifiers, ProviderId, RingLayout};
use directories::{BaseDirs, ProjectDirs};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use orbitctl::desktop::AppQuery;
use orbitctl::icon::IconName;
use orbitctl::wm::{ShellCommand, WindowClass};
use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Exec string of the first-run item that writes and opens the default config.
pub const SETUP_COMMAND: &str = "ORBIT_SETUP";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub layout: RingLayout,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub gestures: GestureConfig,
    #[serde(default)]
    pub rings: Vec<RingConfig>,
}

/// One ring configuration: what it shows and the shortcut that shows it.
#[derive(Debug, Clone, Deserialize)]
pub struct RingConfig {
    pub id: ConfigId,
    pub name: Option<String>,
    pub trigger: Option<TriggerInput>,
    #[serde(default = "Modifiers::empty")]
    pub modifiers: Modifiers,
    /// Releasing the trigger runs the hovered item.
    #[serde(default)]
    pub hold: bool,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    Apps(AppsConfig),
    Folder(FolderConfig),
    Commands(CommandsConfig),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppEntry {
    pub app: AppQuery,
    pub class: Option<WindowClass>,
    pub exec: Option<ShellCommand>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppsConfig {
    #[serde(default = "AppsConfig::default_id")]
    pub id: ProviderId,
    #[serde(default = "AppsConfig::default_name")]
    pub name: String,
    /// Used until the user edits favorites from the menu.
    #[serde(default)]
    pub favorites: Vec<AppEntry>,
    /// Adds an "All Applications" category.
    #[serde(default = "default_true")]
    pub all_apps: bool,
}

impl AppsConfig {
    fn default_id() -> ProviderId {
        ProviderId::from("apps")
    }

    fn default_name() -> String {
        "Applications".to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FolderConfig {
    pub id: Option<ProviderId>,
    pub name: Option<String>,
    #[serde(deserialize_with = "deserialize_path")]
    pub path: PathBuf,
    #[serde(default = "default_true")]
    pub prefer_panel: bool,
    #[serde(default = "default_max_ring_items")]
    pub max_ring_items: usize,
    #[serde(default)]
    pub show_hidden: bool,
}

impl FolderConfig {
    pub fn provider_id(&self) -> ProviderId {
        self.id
            .clone()
            .unwrap_or_else(|| ProviderId::new(format!("folder:{}", self.path.display())))
    }

    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            self.path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.path.display().to_string())
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandItem {
    pub name: String,
    pub exec: Option<ShellCommand>,
    /// Switches to another ring configuration instead of running anything.
    pub ring: Option<ConfigId>,
    pub icon: Option<IconName>,
    #[serde(default)]
    pub keep_open: bool,
    /// Makes this item a category.
    #[serde(default)]
    pub items: Vec<CommandItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandsConfig {
    #[serde(default = "CommandsConfig::default_id")]
    pub id: ProviderId,
    #[serde(default = "CommandsConfig::default_name")]
    pub name: String,
    #[serde(default)]
    pub items: Vec<CommandItem>,
    /// Adds a "Run…" entry that takes a typed command line.
    #[serde(default)]
    pub prompt: bool,
}

impl CommandsConfig {
    fn default_id() -> ProviderId {
        ProviderId::from("commands")
    }

    fn default_name() -> String {
        "Commands".to_string()
    }
}

fn default_true() -> bool {
    true
}

fn default_max_ring_items() -> usize {
    MAX_RING_ITEMS
}

fn deserialize_path<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PathBuf, D::Error> {
    let raw = PathBuf::deserialize(deserializer)?;
    Ok(expand_tilde(&raw))
}

/// Expands a leading `~` to the home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match BaseDirs::new() {
        Some(dirs) => dirs.home_dir().join(rest),
        None => path.to_path_buf(),
    }
}

impl Config {
    /// The ring shown by a plain `show`.
    pub fn default_ring(&self) -> Option<&RingConfig> {
        self.rings.first()
    }

    pub fn ring(&self, id: &ConfigId) -> Option<&RingConfig> {
        self.rings.iter().find(|r| &r.id == id)
    }

    pub fn triggers(&self) -> Vec<Trigger> {
        self.rings
            .iter()
            .filter_map(|ring| {
                Some(Trigger {
                    config_id: ring.id.clone(),
                    input: ring.trigger.clone()?,
                    modifiers: ring.modifiers,
                })
            })
            .collect()
    }

    /// Drops rings whose id is already taken.
    fn deduplicated(mut self) -> Self {
        let mut seen = HashSet::new();
        self.rings.retain(|ring| {
            let fresh = seen.insert(ring.id.clone());
            if !fresh {
                log::warn!("Skipping duplicate ring '{}'", ring.id);
            }
            fresh
        });
        self
    }

    /// A single ring offering to write the default config.
    pub fn setup() -> Self {
        Self {
            rings: vec![RingConfig {
                id: ConfigId::from("setup"),
                name: Some("Setup".to_string()),
                trigger: None,
                modifiers: Modifiers::empty(),
                hold: false,
                providers: vec![ProviderConfig::Commands(CommandsConfig {
                    id: CommandsConfig::default_id(),
                    name: "Setup".to_string(),
                    items: vec![CommandItem {
                        name: "Setup".to_string(),
                        exec: Some(ShellCommand::from(SETUP_COMMAND)),
                        ring: None,
                        icon: Some(IconName::from("preferences-system")),
                        keep_open: false,
                        items: Vec::new(),
                    }],
                    prompt: false,
                })],
            }],
            ..Self::default()
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to determine config directory")]
    ConfigDirNotFound,
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Notify error: {0}")]
    Notify(#[from] notify::Error),
}

pub fn get_config_path() -> Result<PathBuf, ConfigError> {
    let proj_dirs =
        ProjectDirs::from("org", "orbit", "orbit").ok_or(ConfigError::ConfigDirNotFound)?;
    Ok(proj_dirs.config_dir().join("config.toml"))
}

pub fn load_config() -> Result<Config, ConfigError> {
    let config_path = get_config_path()?;

    let s = config::Config::builder()
        .add_source(config::File::from(config_path).required(false))
        .add_source(
            config::Environment::with_prefix("ORBIT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(s.try_deserialize::<Config>()?.deduplicated())
}

pub fn load_or_setup() -> Config {
    if let Ok(path) = get_config_path()
        && !path.exists()
    {
        return Config::setup();
    }

    match load_config() {
        Ok(c) if !c.rings.is_empty() => c,
        Ok(_) => {
            log::warn!("Config defines no rings, offering setup");
            Config::setup()
        }
        Err(e) => {
            log::error!("Failed to load config: {}", e);
            Config::setup()
        }
    }
}

pub fn write_default_config() -> std::io::Result<PathBuf> {
    let path =
        get_config_path().map_err(|e| std::io::Error::new(std::io::ErrorKind::NotFound, e))?;
    if let Some(parent) = path.parent() {
        fs_err::create_dir_all(parent)?;
    }
    if !path.exists() {
        fs_err::write(&path, DEFAULT_CONFIG)?;
    }
    Ok(path)
}

const DEFAULT_CONFIG: &str = include_str!("default_config.toml");

use crate::events::AppEvent;
use async_channel::Sender;

fn watch_dir(
    dir: &Path,
    bridge_tx: Sender<notify::Result<notify::Event>>,
) -> Result<RecommendedWatcher, ConfigError> {
    let mut watcher = RecommendedWatcher::new(
        move |res| {
            let _ = bridge_tx.send_blocking(res);
        },
        notify::Config::default(),
    )?;
    watcher.watch(dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

pub async fn run_async_watcher(tx: Sender<AppEvent>) {
    let config_path = match get_config_path() {
        Ok(p) => p,
        Err(e) => {
            log::error!("Config watcher error: {}", e);
            return;
        }
    };
    let config_dir = match config_path.parent() {
        Some(p) => p.to_path_buf(),
        None => return,
    };

    if let Err(e) = fs_err::create_dir_all(&config_dir) {
        log::error!("Failed to create config directory for watching: {}", e);
        return;
    }

    let (bridge_tx, bridge_rx) = async_channel::unbounded();
    let _watcher = match watch_dir(&config_dir, bridge_tx) {
        Ok(w) => w,
        Err(e) => {
            log::error!("Failed to watch config directory: {}", e);
            return;
        }
    };

    while let Ok(res) = bridge_rx.recv().await {
        match res {
            Ok(event) => {
                let meaningful_event = matches!(
                    event.kind,
                    EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
                );

                if meaningful_event
                    && event.paths.iter().any(|p| p == &config_path)
                    && tx.send(AppEvent::ConfigReload).await.is_err()
                {
                    break;
                }
            }
            Err(e) => log::error!("Watch error: {}", e),
        }
    }
}
