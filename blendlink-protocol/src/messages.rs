//! Host-instance message types
//!
//! The wire format is a flat JSON object with a direction discriminator
//! (`REQUEST` or `RESPONSE`) holding an integer opcode, plus
//! opcode-specific keys. Unrecognized opcodes decode to `Unknown` so
//! that newer peers never break an older one; documents missing the
//! discriminator are malformed.

use serde_json::{json, Value};

/// Direction discriminator key for host-originated messages
pub const KEY_REQUEST: &str = "REQUEST";
/// Direction discriminator key for instance-originated messages
pub const KEY_RESPONSE: &str = "RESPONSE";

/// Project base path carried by the plugin-folder request
pub const KEY_PROJECT_FOLDER: &str = "PROJECT_FOLDER";
/// Configured addon names carried by the plugin-folder request
pub const KEY_ADDON_NAMES: &str = "ADDON_NAMES";
/// Resolved addon root carried by the plugin-folder response
pub const KEY_PLUGIN_PATH: &str = "PLUGIN_PATH";
/// Advisory status carried by the plugin-refresh response
pub const KEY_STATUS: &str = "STATUS";
/// Addon names to reload, carried by the plugin-refresh request
pub const KEY_NAME_LIST: &str = "NAME_LIST";

/// Opcode shared by the plugin-folder request/response pair
pub const OP_PLUGIN_FOLDER: i64 = 1;
/// Opcode shared by the plugin-refresh request/response pair
pub const OP_PLUGIN_REFRESH: i64 = 2;

/// Error produced when a JSON document does not match a message shape
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Document is not an object")]
    NotAnObject,

    #[error("Document has no {0} discriminator")]
    NoDiscriminator(&'static str),

    #[error("Discriminator {0} is not an integer")]
    BadDiscriminator(&'static str),

    #[error("Missing key {0}")]
    MissingKey(&'static str),

    #[error("Key {0} has the wrong type")]
    WrongType(&'static str),
}

/// Messages sent from the host to a connected instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostRequest {
    /// Handshake: ask where the configured addons live and announce the
    /// project root
    PluginFolder {
        project_folder: String,
        addon_names: Vec<String>,
    },

    /// Reload the named addons now
    PluginRefresh { name_list: Vec<String> },

    /// A request opcode this peer does not know; receivers ignore it
    Unknown { opcode: i64 },
}

/// Messages sent from an instance back to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceResponse {
    /// Answer to [`HostRequest::PluginFolder`]
    PluginFolder { plugin_path: String },

    /// Acknowledgement of [`HostRequest::PluginRefresh`]; the status is
    /// advisory only
    PluginRefresh { status: String },

    /// A response opcode this peer does not know; receivers ignore it
    Unknown { opcode: i64 },
}

impl HostRequest {
    /// Encode into the wire document
    pub fn to_document(&self) -> Value {
        match self {
            Self::PluginFolder {
                project_folder,
                addon_names,
            } => json!({
                KEY_REQUEST: OP_PLUGIN_FOLDER,
                KEY_PROJECT_FOLDER: project_folder,
                KEY_ADDON_NAMES: addon_names,
            }),
            Self::PluginRefresh { name_list } => json!({
                KEY_REQUEST: OP_PLUGIN_REFRESH,
                KEY_NAME_LIST: name_list,
            }),
            Self::Unknown { opcode } => json!({ KEY_REQUEST: opcode }),
        }
    }

    /// Decode from a wire document
    pub fn from_document(doc: &Value) -> Result<Self, DocumentError> {
        let opcode = discriminator(doc, KEY_REQUEST)?;
        match opcode {
            OP_PLUGIN_FOLDER => Ok(Self::PluginFolder {
                project_folder: string_field(doc, KEY_PROJECT_FOLDER)?,
                addon_names: string_list_field(doc, KEY_ADDON_NAMES)?,
            }),
            OP_PLUGIN_REFRESH => Ok(Self::PluginRefresh {
                name_list: string_list_field(doc, KEY_NAME_LIST)?,
            }),
            opcode => Ok(Self::Unknown { opcode }),
        }
    }
}

impl InstanceResponse {
    /// Encode into the wire document
    pub fn to_document(&self) -> Value {
        match self {
            Self::PluginFolder { plugin_path } => json!({
                KEY_RESPONSE: OP_PLUGIN_FOLDER,
                KEY_PLUGIN_PATH: plugin_path,
            }),
            Self::PluginRefresh { status } => json!({
                KEY_RESPONSE: OP_PLUGIN_REFRESH,
                KEY_STATUS: status,
            }),
            Self::Unknown { opcode } => json!({ KEY_RESPONSE: opcode }),
        }
    }

    /// Decode from a wire document
    pub fn from_document(doc: &Value) -> Result<Self, DocumentError> {
        let opcode = discriminator(doc, KEY_RESPONSE)?;
        match opcode {
            OP_PLUGIN_FOLDER => Ok(Self::PluginFolder {
                plugin_path: string_field(doc, KEY_PLUGIN_PATH)?,
            }),
            OP_PLUGIN_REFRESH => Ok(Self::PluginRefresh {
                status: string_field(doc, KEY_STATUS)?,
            }),
            opcode => Ok(Self::Unknown { opcode }),
        }
    }
}

fn discriminator(doc: &Value, key: &'static str) -> Result<i64, DocumentError> {
    let obj = doc.as_object().ok_or(DocumentError::NotAnObject)?;
    let value = obj.get(key).ok_or(DocumentError::NoDiscriminator(key))?;
    value.as_i64().ok_or(DocumentError::BadDiscriminator(key))
}

fn string_field(doc: &Value, key: &'static str) -> Result<String, DocumentError> {
    let value = doc.get(key).ok_or(DocumentError::MissingKey(key))?;
    value
        .as_str()
        .map(str::to_owned)
        .ok_or(DocumentError::WrongType(key))
}

fn string_list_field(doc: &Value, key: &'static str) -> Result<Vec<String>, DocumentError> {
    let value = doc.get(key).ok_or(DocumentError::MissingKey(key))?;
    let items = value.as_array().ok_or(DocumentError::WrongType(key))?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_owned)
                .ok_or(DocumentError::WrongType(key))
        })
        .collect()
}
