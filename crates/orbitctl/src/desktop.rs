use crate::icon::{self, IconName};
use crate::wm::{ShellCommand, WindowClass};
use derive_more::{AsRef, Deref, Display, From, Into};
use freedesktop_entry_parser::parse_entry;
use fs_err as fs;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Deref, From, Into, AsRef)]
pub struct AppName(String);

crate::impl_string_newtype!(AppName);

/// Desktop file id, e.g. `org.gnome.Nautilus.desktop`.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, Deref, From, Into, AsRef,
)]
#[serde(transparent)]
pub struct DesktopId(String);

crate::impl_string_newtype!(DesktopId);

#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, Deref, From, Into, AsRef,
)]
#[serde(transparent)]
pub struct AppQuery(String);

crate::impl_string_newtype!(AppQuery);

#[derive(Debug, Clone, PartialEq)]
pub struct AppInfo {
    pub id: DesktopId,
    pub name: AppName,
    pub icon: IconName,
    pub class: WindowClass,
    pub exec: ShellCommand,
}

impl AppInfo {
    /// Builds an app from a user query, letting explicit class/exec override the desktop entry.
    pub fn resolve(
        query: &AppQuery,
        class: Option<WindowClass>,
        exec: Option<ShellCommand>,
    ) -> Self {
        let base = find_desktop_entry(query);

        Self {
            id: base
                .as_ref()
                .map(|b| b.id.clone())
                .unwrap_or_else(|| DesktopId::new(format!("{query}.desktop"))),
            name: base
                .as_ref()
                .map(|b| b.name.clone())
                .unwrap_or_else(|| AppName::new(query.as_str())),
            icon: base
                .as_ref()
                .map(|b| b.icon.clone())
                .unwrap_or_else(|| IconName::new(query.as_str())),
            class: class
                .or_else(|| base.as_ref().map(|b| b.class.clone()))
                .unwrap_or_else(|| WindowClass::new(query.as_str())),
            exec: exec
                .or_else(|| base.as_ref().map(|b| b.exec.clone()))
                .unwrap_or_else(|| ShellCommand::new("")),
        }
    }

    /// Icon file for this app, if the theme has one.
    pub fn icon_path(&self) -> Option<PathBuf> {
        icon::find_icon_path(&self.icon)
    }

    pub fn is_launchable(&self) -> bool {
        !self.exec.trim().is_empty()
    }
}

static ENTRIES: OnceLock<RwLock<Vec<AppInfo>>> = OnceLock::new();

/// Rescans the desktop entry directories.
pub fn refresh_cache() {
    let apps = scan_entries();
    let lock = ENTRIES.get_or_init(|| RwLock::new(Vec::new()));
    *lock.write() = apps;
}

/// Every visible application, sorted by display name.
pub fn all_entries() -> Vec<AppInfo> {
    let lock = ENTRIES.get_or_init(|| RwLock::new(scan_entries()));
    lock.read().clone()
}

fn get_desktop_directories() -> Vec<PathBuf> {
    let xdg = xdg::BaseDirectories::new();
    let mut dirs = Vec::new();

    if let Some(home) = xdg.get_data_home() {
        dirs.push(home.join("applications"));
    }

    dirs.extend(
        xdg.get_data_dirs()
            .into_iter()
            .map(|p| p.join("applications")),
    );
    dirs
}

/// Later directories have lower precedence, so user entries shadow system ones.
fn collect_desktop_files(dirs: &[PathBuf]) -> Vec<PathBuf> {
    let mut entries = HashMap::new();

    for dir in dirs.iter().rev() {
        let Ok(read_dir) = fs::read_dir(dir) else {
            continue;
        };
        for entry in read_dir.flatten() {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("desktop")
                && let Some(id) = path.file_name().and_then(|s| s.to_str())
            {
                entries.insert(id.to_string(), path);
            }
        }
    }
    entries.into_values().collect()
}

pub fn scan_entries() -> Vec<AppInfo> {
    scan_directories(&get_desktop_directories())
}

pub fn scan_directories(dirs: &[PathBuf]) -> Vec<AppInfo> {
    let mut apps: Vec<_> = collect_desktop_files(dirs)
        .into_iter()
        .filter_map(|path| parse_desktop_file(&path))
        .collect();
    apps.sort_by_key(|app| app.name.to_lowercase());
    apps
}

pub fn parse_desktop_file(path: &Path) -> Option<AppInfo> {
    let entry = parse_entry(path).ok()?;
    let section = entry.section("Desktop Entry")?;

    if section.attr("Type").first()? != "Application" {
        return None;
    }
    let hidden = |key: &str| section.attr(key).first().is_some_and(|v| v == "true");
    if hidden("NoDisplay") || hidden("Hidden") {
        return None;
    }

    let name = section.attr("Name").first()?.to_string();
    let exec = strip_field_codes(section.attr("Exec").first()?);
    let icon = section
        .attr("Icon")
        .first()
        .map(|icon| IconName::new(icon.as_str()))
        .unwrap_or_else(|| IconName::new(""));

    let id = path.file_name()?.to_str()?;
    let class = section
        .attr("StartupWMClass")
        .first()
        .cloned()
        .unwrap_or_else(|| id.trim_end_matches(".desktop").to_string());

    Some(AppInfo {
        id: DesktopId::new(id),
        name: AppName::new(name),
        icon,
        class: WindowClass::new(class),
        exec: ShellCommand::new(exec),
    })
}

/// Drops `%f`, `%U` and friends from an Exec line.
pub fn strip_field_codes(exec: &str) -> String {
    shell_words::split(exec)
        .map(|args| {
            let clean_args: Vec<_> = args
                .into_iter()
                .filter(|arg| !arg.starts_with('%'))
                .collect();
            shell_words::join(clean_args)
        })
        .unwrap_or_else(|_| exec.to_string())
}

pub fn find_desktop_entry(query: &AppQuery) -> Option<AppInfo> {
    find_desktop_entry_in_list(query, &all_entries())
}

/// Matches a query against the display name, window class or desktop id.
pub fn find_desktop_entry_in_list(query: &AppQuery, entries: &[AppInfo]) -> Option<AppInfo> {
    let lower_query = query.to_lowercase();
    entries
        .iter()
        .find(|app| {
            app.name.to_lowercase() == lower_query
                || app.class.to_lowercase() == lower_query
                || app.id.trim_end_matches(".desktop").to_lowercase() == lower_query
        })
        .cloned()
}
