use serde::Deserialize;
use serde_json::Value;

/// A selectable interactive avatar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvatarDescriptor {
    pub id: String,
    pub name: String,
}

impl AvatarDescriptor {
    pub fn new(id: impl Into<String>, name: Option<String>) -> Self {
        let id = id.into();
        let name = name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| id.clone());
        Self { id, name }
    }
}

// Fields probed, in order, for the avatar id.
const ID_KEYS: [&str; 4] = ["avatar_id", "avatarName", "name", "id"];
// Fields probed, in order, for the display name.
const NAME_KEYS: [&str; 2] = ["name", "pretty_name"];

/// Shapes the avatar list endpoint has been seen to answer with.
///
/// `Canonical` is what the gateway documents; the remaining variants are
/// accepted for older gateways. Variant order is the probe order.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AvatarListResponse {
    /// `{"data": {"avatars": [...]}}`
    Canonical { data: AvatarsField },
    /// `{"data": {"data": {"avatars": [...]}}}`
    DoubleNested { data: NestedData },
    /// `{"data": [...]}`, which is what the vendor itself returns.
    DataArray { data: Vec<Value> },
    /// `{"avatars": [...]}`
    TopLevel { avatars: Vec<Value> },
    /// `[...]`
    Bare(Vec<Value>),
}

#[derive(Debug, Deserialize)]
struct AvatarsField {
    avatars: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct NestedData {
    data: AvatarsField,
}

impl AvatarListResponse {
    fn into_entries(self) -> Vec<Value> {
        match self {
            AvatarListResponse::Canonical { data } => data.avatars,
            AvatarListResponse::DoubleNested { data } => data.data.avatars,
            AvatarListResponse::DataArray { data } => data,
            AvatarListResponse::TopLevel { avatars } => avatars,
            AvatarListResponse::Bare(entries) => entries,
        }
    }
}

/// Extracts descriptors from an avatar list response of any tolerated shape.
///
/// An unrecognised shape is not an error: it yields an empty list, which the
/// caller reports as "none found". Entries without any usable id are skipped.
pub fn decode_avatar_list(body: &Value) -> Vec<AvatarDescriptor> {
    let entries = match AvatarListResponse::deserialize(body) {
        Ok(response) => response.into_entries(),
        Err(_) => {
            tracing::debug!("avatar list response has no recognised shape: {}", body);
            return Vec::new();
        }
    };

    entries.iter().filter_map(descriptor_from_entry).collect()
}

fn descriptor_from_entry(entry: &Value) -> Option<AvatarDescriptor> {
    let id = first_string(entry, &ID_KEYS)?;
    let name = first_string(entry, &NAME_KEYS);
    Some(AvatarDescriptor::new(id, name))
}

fn first_string(entry: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| entry.get(*key))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}
