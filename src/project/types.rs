/// Project type definitions
///
/// A project is one persisted QR code: the encoded text, its display name, the
/// rendered image, colours, and how often it has been scanned. On the wire and in
/// the document store, fields are camelCase and scoped by `type: "qr_project"`.

use serde::{Deserialize, Deserializer, Serialize};

/// Discriminator shared by every project document
pub const PROJECT_TYPE: &str = "qr_project";

pub const DEFAULT_QR_COLOR: &str = "#000000";
pub const DEFAULT_BG_COLOR: &str = "#ffffff";

/// A stored QR code project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Immutable identity, `<unix-millis>-<suffix>` unless the caller chose one
    pub id: String,
    pub name: String,
    /// Encoded payload, usually a URL; scans redirect here
    pub text: String,
    /// Creation/update marker, caller-supplied on save and RFC 3339 after updates
    #[serde(default)]
    pub time: String,
    /// Base64 rendered image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_image: Option<String>,
    #[serde(default = "default_qr_color")]
    pub qr_color: String,
    #[serde(default = "default_bg_color")]
    pub bg_color: String,
    #[serde(default)]
    pub scan_count: u64,
    #[serde(rename = "type", default = "default_project_type")]
    pub doc_type: String,
}

fn default_qr_color() -> String {
    DEFAULT_QR_COLOR.to_string()
}

fn default_bg_color() -> String {
    DEFAULT_BG_COLOR.to_string()
}

fn default_project_type() -> String {
    PROJECT_TYPE.to_string()
}

/// Caller input for `create` and `save`
///
/// Every field is optional at the serde level so missing values reach the store
/// and are reported as validation failures.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewProject {
    pub id: Option<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub text: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub time: String,
    pub qr_image: Option<String>,
    pub qr_color: Option<String>,
    pub bg_color: Option<String>,
}

impl NewProject {
    pub fn new(name: impl Into<String>, text: impl Into<String>, time: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            time: time.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_qr_image(mut self, image: impl Into<String>) -> Self {
        self.qr_image = Some(image.into());
        self
    }

    /// Check required fields; `require_image` demands a non-empty `qrImage`
    pub fn validate(&self, require_image: bool) -> Result<(), String> {
        let mut missing = Vec::new();
        if self.name.trim().is_empty() {
            missing.push("name");
        }
        if self.text.trim().is_empty() {
            missing.push("text");
        }
        if self.time.trim().is_empty() {
            missing.push("time");
        }
        if require_image && self.qr_image.as_deref().map_or(true, |img| img.trim().is_empty()) {
            missing.push("qrImage");
        }
        if !missing.is_empty() {
            return Err(format!("missing required fields: {}", missing.join(", ")));
        }
        if let Some(id) = &self.id {
            if id.trim().is_empty() {
                return Err("id must not be blank".to_string());
            }
        }
        for color in [&self.qr_color, &self.bg_color].into_iter().flatten() {
            check_color(color)?;
        }
        Ok(())
    }

    /// Build the stored project for `id` with a zero scan count
    pub fn into_project(self, id: String) -> Project {
        Project {
            id,
            name: self.name,
            text: self.text,
            time: self.time,
            qr_image: self.qr_image,
            qr_color: self.qr_color.unwrap_or_else(default_qr_color),
            bg_color: self.bg_color.unwrap_or_else(default_bg_color),
            scan_count: 0,
            doc_type: default_project_type(),
        }
    }
}

/// Replacement name and text for `update`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectPatch {
    #[serde(deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub text: String,
}

impl ProjectPatch {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() || self.text.trim().is_empty() {
            return Err("name and text are required".to_string());
        }
        Ok(())
    }
}

/// Colour changes for `customize`; absent fields keep their current value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Customization {
    pub qr_color: Option<String>,
    pub bg_color: Option<String>,
}

impl Customization {
    pub fn validate(&self) -> Result<(), String> {
        if self.qr_color.is_none() && self.bg_color.is_none() {
            return Err("qrColor or bgColor is required".to_string());
        }
        for color in [&self.qr_color, &self.bg_color].into_iter().flatten() {
            check_color(color)?;
        }
        Ok(())
    }

    pub fn apply(&self, project: &mut Project) {
        if let Some(color) = &self.qr_color {
            project.qr_color = color.clone();
        }
        if let Some(color) = &self.bg_color {
            project.bg_color = color.clone();
        }
    }
}

/// `#rgb` or `#rrggbb`
fn check_color(color: &str) -> Result<(), String> {
    let hex = color
        .strip_prefix('#')
        .filter(|hex| matches!(hex.len(), 3 | 6))
        .filter(|hex| hex.chars().all(|c| c.is_ascii_hexdigit()));
    match hex {
        Some(_) => Ok(()),
        None => Err(format!("invalid colour '{}', expected #rgb or #rrggbb", color)),
    }
}

/// `null` counts as an absent field so validation reports it as missing
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}
