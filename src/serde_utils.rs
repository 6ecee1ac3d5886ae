//! Serde helpers shared by tool parameter structs.

use serde::{Deserialize, Deserializer};

/// Deserialize a nullable field of a partial update.
///
/// - Missing field → `None` (leave the column alone; needs `#[serde(default)]`)
/// - Field is `null` → `Some(None)` (clear the column)
/// - Field has value → `Some(Some(value))`
///
/// ```ignore
/// #[derive(Deserialize)]
/// struct UpdateLocationParams {
///     #[serde(default, deserialize_with = "crate::serde_utils::double_option")]
///     parent_location_id: Option<Option<i64>>,
/// }
/// ```
pub fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}
