use std::collections::BTreeMap;

use serde::Serialize;

use crate::PwaConfigError;

/// Square icon sizes published for both purposes.
pub const DEFAULT_ICON_SIZES: &[u32] = &[
    16, 32, 48, 72, 96, 128, 144, 152, 192, 256, 384, 512, 1024,
];

const SHORTCUT_ICON_SIZE: u32 = 96;
const SCREENSHOT_SIZE: u32 = 512;
const DISPLAY_OVERRIDE: &[&str] = &["window-controls-overlay", "standalone", "minimal-ui"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IconPurpose {
    Any,
    Maskable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestIcon {
    pub src: String,
    pub sizes: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub purpose: IconPurpose,
}

impl ManifestIcon {
    pub fn png(src: &str, size: u32, purpose: IconPurpose) -> Self {
        Self {
            src: src.to_owned(),
            sizes: format!("{size}x{size}"),
            mime_type: "image/png".to_owned(),
            purpose,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestShortcut {
    pub name: String,
    pub short_name: String,
    pub description: String,
    pub url: String,
    pub icons: Vec<ManifestIcon>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenshotForm {
    Wide,
    Narrow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestScreenshot {
    pub src: String,
    pub sizes: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub platform: ScreenshotForm,
    pub label: String,
}

/// How a launch reuses an already open app window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchHandler {
    pub client_mode: String,
}

/// Custom `web+` scheme routed into the app; `%s` receives the full link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtocolHandler {
    pub protocol: String,
    pub url: String,
}

/// Files the installed app can open, keyed by MIME type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileHandler {
    pub action: String,
    pub accept: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShareParams {
    pub title: String,
    pub text: String,
    pub url: String,
}

/// Lets the app receive shares from the OS share sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShareTarget {
    pub action: String,
    pub method: String,
    pub params: ShareParams,
}

/// Installable web app manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebManifest {
    pub name: String,
    pub short_name: String,
    pub description: String,
    pub theme_color: String,
    pub background_color: String,
    pub display: String,
    pub orientation: String,
    pub scope: String,
    pub start_url: String,
    pub lang: String,
    pub dir: String,
    pub categories: Vec<String>,
    pub prefer_related_applications: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub display_override: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launch_handler: Option<LaunchHandler>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub protocol_handlers: Vec<ProtocolHandler>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub file_handlers: Vec<FileHandler>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_target: Option<ShareTarget>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub screenshots: Vec<ManifestScreenshot>,
    pub icons: Vec<ManifestIcon>,
    pub shortcuts: Vec<ManifestShortcut>,
}

impl WebManifest {
    /// Standalone portrait app rooted at `/` with the stock booking shortcuts.
    pub fn new(name: impl Into<String>, short_name: impl Into<String>) -> Self {
        let name = name.into();
        let short_name = short_name.into();
        let description = format!("{name} - book your appointment online.");
        let mut manifest = Self {
            name,
            short_name,
            description,
            theme_color: "#1A1A1A".to_owned(),
            background_color: "#1A1A1A".to_owned(),
            display: "standalone".to_owned(),
            orientation: "portrait-primary".to_owned(),
            scope: "/".to_owned(),
            start_url: "/".to_owned(),
            lang: "en".to_owned(),
            dir: "ltr".to_owned(),
            categories: ["business", "lifestyle", "health", "beauty"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
            prefer_related_applications: false,
            display_override: DISPLAY_OVERRIDE.iter().map(|mode| (*mode).to_owned()).collect(),
            launch_handler: Some(LaunchHandler {
                client_mode: "navigate-existing".to_owned(),
            }),
            protocol_handlers: Vec::new(),
            file_handlers: vec![FileHandler {
                action: "/".to_owned(),
                accept: BTreeMap::from([("text/calendar".to_owned(), vec![".ics".to_owned()])]),
            }],
            share_target: Some(ShareTarget {
                action: "/".to_owned(),
                method: "GET".to_owned(),
                params: ShareParams {
                    title: "title".to_owned(),
                    text: "text".to_owned(),
                    url: "url".to_owned(),
                },
            }),
            screenshots: Vec::new(),
            icons: icon_set("/logo.png", DEFAULT_ICON_SIZES),
            shortcuts: Vec::new(),
        };
        manifest.protocol_handlers = vec![ProtocolHandler {
            protocol: protocol_scheme(&manifest.short_name),
            url: "/?booking=%s".to_owned(),
        }];
        manifest.screenshots = screenshots(&manifest.short_name);
        manifest.shortcuts = stock_shortcuts(&manifest.short_name);
        manifest
    }

    /// Use one colour for both the theme and the splash background.
    pub fn with_theme_color(mut self, color: impl Into<String>) -> Self {
        let color = color.into();
        self.background_color = color.clone();
        self.theme_color = color;
        self
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    pub fn to_json(&self) -> Result<String, PwaConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// One `any` and one `maskable` PNG entry per size, `any` entries first.
pub fn icon_set(src: &str, sizes: &[u32]) -> Vec<ManifestIcon> {
    [IconPurpose::Any, IconPurpose::Maskable]
        .into_iter()
        .flat_map(|purpose| sizes.iter().map(move |size| ManifestIcon::png(src, *size, purpose)))
        .collect()
}

/// `web+` followed by the ASCII letters of `app`, lowercased.
fn protocol_scheme(app: &str) -> String {
    let letters: String = app
        .chars()
        .filter(char::is_ascii_alphabetic)
        .map(|ch| ch.to_ascii_lowercase())
        .collect();
    if letters.is_empty() {
        return "web+booking".to_owned();
    }
    format!("web+{letters}")
}

fn screenshots(app: &str) -> Vec<ManifestScreenshot> {
    [
        (ScreenshotForm::Wide, format!("{app} booking interface")),
        (ScreenshotForm::Narrow, "Mobile booking experience".to_owned()),
    ]
    .into_iter()
    .map(|(platform, label)| ManifestScreenshot {
        src: "/logo.png".to_owned(),
        sizes: format!("{SCREENSHOT_SIZE}x{SCREENSHOT_SIZE}"),
        mime_type: "image/png".to_owned(),
        platform,
        label,
    })
    .collect()
}

fn stock_shortcuts(app: &str) -> Vec<ManifestShortcut> {
    [
        ("Book an appointment", "Book", format!("Book your time at {app}"), "/?action=book"),
        ("About us", "About", format!("Read more about {app}"), "/about"),
        ("Contact", "Contact", format!("Contact {app}"), "/?action=contact"),
        ("Prices", "Prices", "See our prices and services".to_owned(), "/?action=prices"),
    ]
    .into_iter()
    .map(|(name, short_name, description, url)| ManifestShortcut {
        name: name.to_owned(),
        short_name: short_name.to_owned(),
        description,
        url: url.to_owned(),
        icons: vec![ManifestIcon::png("/logo.png", SHORTCUT_ICON_SIZE, IconPurpose::Any)],
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publishes_any_and_maskable_icons_per_size() {
        let manifest = WebManifest::new("Barber 96", "Barber");
        assert_eq!(manifest.icons.len(), DEFAULT_ICON_SIZES.len() * 2);
        assert_eq!(manifest.icons[0], ManifestIcon::png("/logo.png", 16, IconPurpose::Any));
        assert_eq!(
            manifest.icons[DEFAULT_ICON_SIZES.len()],
            ManifestIcon::png("/logo.png", 16, IconPurpose::Maskable)
        );
    }

    #[test]
    fn theme_color_applies_to_background() {
        let manifest = WebManifest::new("Barber 96", "Barber").with_theme_color("#000000");
        assert_eq!(manifest.theme_color, "#000000");
        assert_eq!(manifest.background_color, "#000000");
    }

    #[test]
    fn renders_manifest_json() {
        let json = WebManifest::new("Barber 96", "Barber")
            .with_lang("sv-SE")
            .to_json()
            .expect("manifest should render");
        let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");

        assert_eq!(value["short_name"], "Barber");
        assert_eq!(value["display"], "standalone");
        assert_eq!(value["orientation"], "portrait-primary");
        assert_eq!(value["start_url"], "/");
        assert_eq!(value["lang"], "sv-SE");
        assert_eq!(value["icons"][0]["type"], "image/png");
        assert_eq!(value["icons"][0]["sizes"], "16x16");
        assert_eq!(value["icons"][13]["purpose"], "maskable");
        assert_eq!(value["shortcuts"][0]["url"], "/?action=book");
        assert_eq!(value["shortcuts"][2]["description"], "Contact Barber");
    }

    #[test]
    fn advertises_launch_share_and_file_handling() {
        let json = WebManifest::new("Barberaria 96", "Barberaria 96")
            .to_json()
            .expect("manifest should render");
        let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");

        assert_eq!(value["prefer_related_applications"], false);
        assert_eq!(
            value["display_override"],
            serde_json::json!(["window-controls-overlay", "standalone", "minimal-ui"])
        );
        assert_eq!(value["launch_handler"]["client_mode"], "navigate-existing");
        assert_eq!(value["protocol_handlers"][0]["protocol"], "web+barberaria");
        assert_eq!(value["protocol_handlers"][0]["url"], "/?booking=%s");
        assert_eq!(
            value["file_handlers"][0]["accept"],
            serde_json::json!({ "text/calendar": [".ics"] })
        );
        assert_eq!(value["share_target"]["method"], "GET");
        assert_eq!(value["share_target"]["params"]["url"], "url");
        assert_eq!(value["screenshots"][0]["platform"], "wide");
        assert_eq!(value["screenshots"][0]["label"], "Barberaria 96 booking interface");
        assert_eq!(value["screenshots"][1]["platform"], "narrow");
        assert_eq!(value["screenshots"][1]["sizes"], "512x512");
    }

    #[test]
    fn omits_unset_optional_members() {
        let mut manifest = WebManifest::new("Barber 96", "Barber");
        manifest.share_target = None;
        manifest.launch_handler = None;
        manifest.screenshots.clear();
        manifest.file_handlers.clear();

        let json = manifest.to_json().expect("manifest should render");
        let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        for key in ["share_target", "launch_handler", "screenshots", "file_handlers"] {
            assert!(value.get(key).is_none(), "{key} should be omitted");
        }
        assert_eq!(value["protocol_handlers"][0]["protocol"], "web+barber");
    }

    #[test]
    fn protocol_scheme_falls_back_without_letters() {
        assert_eq!(protocol_scheme("Barber 96"), "web+barber");
        assert_eq!(protocol_scheme("96"), "web+booking");
    }
}
