use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

const EMBEDDED_FILES: &[&str] = &[
    "README.md",
    "components.json",
    "next.config.ts",
    "package-lock.json",
    "package.json",
    "postcss.config.mjs",
    "tailwind.config.ts",
    "tsconfig.json",
    ".idx/dev.nix",
    ".vscode/settings.json",
    "docs/blueprint.md",
    "src/ai/ai-instance.ts",
    "src/ai/dev.ts",
    "src/app/favicon.ico",
    "src/app/globals.css",
    "src/app/layout.tsx",
    "src/app/page.tsx",
    "src/components/icons.ts",
    "src/hooks/use-mobile.tsx",
    "src/hooks/use-toast.ts",
    "src/lib/utils.ts",
    "src/services/location.ts",
    "src/services/transport.ts",
    "src/services/weather.ts",
    "src/ai/flows/recommend-transport.ts",
    "src/components/ui/accordion.tsx",
    "src/components/ui/alert-dialog.tsx",
    "src/components/ui/alert.tsx",
    "src/components/ui/avatar.tsx",
    "src/components/ui/badge.tsx",
    "src/components/ui/button.tsx",
    "src/components/ui/calendar.tsx",
    "src/components/ui/card.tsx",
    "src/components/ui/chart.tsx",
    "src/components/ui/checkbox.tsx",
    "src/components/ui/dialog.tsx",
    "src/components/ui/dropdown-menu.tsx",
    "src/components/ui/form.tsx",
    "src/components/ui/input.tsx",
    "src/components/ui/label.tsx",
    "src/components/ui/menubar.tsx",
    "src/components/ui/popover.tsx",
    "src/components/ui/progress.tsx",
    "src/components/ui/radio-group.tsx",
    "src/components/ui/scroll-area.tsx",
    "src/components/ui/select.tsx",
    "src/components/ui/separator.tsx",
    "src/components/ui/sheet.tsx",
    "src/components/ui/sidebar.tsx",
    "src/components/ui/skeleton.tsx",
    "src/components/ui/slider.tsx",
    "src/components/ui/switch.tsx",
    "src/components/ui/table.tsx",
    "src/components/ui/tabs.tsx",
    "src/components/ui/textarea.tsx",
    "src/components/ui/toast.tsx",
    "src/components/ui/toaster.tsx",
    "src/components/ui/tooltip.tsx",
];

/// Ordered list of project-relative paths to mirror.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub files: Vec<String>,
}

impl Manifest {
    pub fn new(files: Vec<String>) -> Self {
        Self { files }
    }

    /// The file set of the project this tool was first written for.
    pub fn embedded() -> Self {
        Self::new(EMBEDDED_FILES.iter().map(|s| s.to_string()).collect())
    }

    /// Loads a manifest from disk. `.json` files hold `{"files": [...]}`,
    /// anything else is one path per line.
    pub fn from_path(path: &Path) -> Result<Self> {
        log::info!("Loading manifest from: {:?}", path);

        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let manifest = if is_json {
            Self::from_json(&text)?
        } else {
            Self::from_lines(&text)
        };

        log::info!("Manifest loaded: {} files", manifest.files.len());
        Ok(manifest)
    }

    pub fn from_url(url: &str) -> Result<Self> {
        log::info!("Fetching manifest from: {}", url);
        let response = reqwest::blocking::get(url)
            .context("Failed to fetch manifest from URL")?;

        if !response.status().is_success() {
            anyhow::bail!("Manifest fetch failed with status: {}", response.status());
        }

        let text = response.text().context("Failed to read manifest response")?;
        let manifest = Self::from_json(&text)?;

        log::info!("Manifest loaded: {} files", manifest.files.len());
        Ok(manifest)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Failed to parse manifest JSON")
    }

    pub fn from_lines(text: &str) -> Self {
        let files = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(String::from)
            .collect();
        Self::new(files)
    }

    /// Paths listed more than once, in order of their second appearance.
    pub fn duplicates(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        let mut reported = HashSet::new();
        let mut dups = Vec::new();

        for file in &self.files {
            if !seen.insert(file.as_str()) && reported.insert(file.as_str()) {
                dups.push(file.as_str());
            }
        }

        dups
    }

    pub fn warn_duplicates(&self) {
        for dup in self.duplicates() {
            log::warn!("Manifest lists {} more than once, last write wins", dup);
        }
    }
}
