use derive_more::{AsRef, Deref, Display, From, Into};
use freedesktop_icons::lookup;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const ICON_LOOKUP_SIZE: u16 = 512;

#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, Deref, From, Into, AsRef,
)]
#[serde(transparent)]
pub struct IconName(String);

crate::impl_string_newtype!(IconName);

static RESOLVED: OnceLock<Mutex<HashMap<IconName, Option<PathBuf>>>> = OnceLock::new();

/// Resolves a themed icon name (or an absolute path) to a file, memoizing the lookup.
pub fn find_icon_path(icon_name: &IconName) -> Option<PathBuf> {
    if icon_name.is_empty() {
        return None;
    }

    let cache = RESOLVED.get_or_init(|| Mutex::new(HashMap::new()));
    if let Some(hit) = cache.lock().get(icon_name) {
        return hit.clone();
    }

    let resolved = resolve_uncached(icon_name);
    cache.lock().insert(icon_name.clone(), resolved.clone());
    resolved
}

fn resolve_uncached(icon_name: &IconName) -> Option<PathBuf> {
    let path = Path::new(icon_name.as_str());
    if path.is_absolute() {
        return path.exists().then(|| path.to_path_buf());
    }

    lookup(icon_name.as_str())
        .with_size(ICON_LOOKUP_SIZE)
        .with_scale(1)
        .find()
}

/// Icon name used for a file, guessed from its extension.
pub fn icon_for_file(path: &Path) -> IconName {
    if path.is_dir() {
        return IconName::from("folder");
    }
    let name = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png" | "jpg" | "jpeg" | "gif" | "webp" | "svg") => "image-x-generic",
        Some("mp3" | "flac" | "ogg" | "wav") => "audio-x-generic",
        Some("mp4" | "mkv" | "webm" | "mov") => "video-x-generic",
        Some("pdf") => "application-pdf",
        Some("zip" | "tar" | "gz" | "xz" | "zst" | "7z") => "package-x-generic",
        Some("sh" | "py" | "rs" | "js" | "ts" | "c" | "h") => "text-x-script",
        _ => "text-x-generic",
    };
    IconName::from(name)
}
