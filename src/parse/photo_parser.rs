use serde::Deserialize;
use serde_json::Value;

use super::lenient;
use super::payload::list_records;
use crate::model::{EntityId, Photo, PhotoUri};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPhoto {
    #[serde(deserialize_with = "lenient::id")]
    id: Option<EntityId>,
    #[serde(deserialize_with = "lenient::list")]
    uris: Option<Vec<Value>>,
    #[serde(deserialize_with = "lenient::text")]
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPhotoUri {
    #[serde(rename = "type", deserialize_with = "lenient::text")]
    kind: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    url: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    uri: Option<String>,
}

/// Parse one photo record. Non-object records are rejected; URI entries
/// without a type or an address are skipped.
pub fn parse_photo(raw: &Value) -> Option<Photo> {
    if !raw.is_object() {
        return None;
    }
    let photo = RawPhoto::deserialize(raw).ok()?;
    let uris = photo
        .uris
        .unwrap_or_default()
        .iter()
        .filter_map(|u| RawPhotoUri::deserialize(u).ok())
        .filter_map(|u| {
            Some(PhotoUri {
                kind: u.kind?,
                url: u.url.or(u.uri)?,
            })
        })
        .collect();
    Some(Photo {
        id: photo.id,
        uris,
        legacy_url: photo.url,
    })
}

/// Parse a photo list payload (bare array or `{data: [...]}`)
pub fn parse_photos(raw: &Value) -> Vec<Photo> {
    list_records(raw).iter().filter_map(parse_photo).collect()
}

/// Parse a task's embedded `photos` array
pub(crate) fn parse_photo_list(items: &[Value]) -> Vec<Photo> {
    items.iter().filter_map(parse_photo).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PhotoKind;
    use serde_json::json;

    #[test]
    fn reads_typed_uris_from_url_or_uri() {
        let photo = parse_photo(&json!({
            "id": 881,
            "uris": [
                {"type": "thumbnail", "uri": "https://img.example/t.jpg"},
                {"type": "web", "url": "https://img.example/w.jpg"},
                {"type": "original"},
                "junk"
            ]
        }))
        .unwrap();
        assert_eq!(photo.id, Some("881".into()));
        assert_eq!(photo.uris.len(), 2);
        assert_eq!(photo.url(PhotoKind::Original), Some("https://img.example/w.jpg"));
        assert_eq!(photo.url(PhotoKind::Thumbnail), Some("https://img.example/t.jpg"));
    }

    #[test]
    fn legacy_single_url() {
        let photo = parse_photo(&json!({"url": "https://img.example/old.jpg"})).unwrap();
        assert!(photo.uris.is_empty());
        assert_eq!(photo.url(PhotoKind::Web), Some("https://img.example/old.jpg"));
    }

    #[test]
    fn photo_list_accepts_data_envelope() {
        let photos = parse_photos(&json!({"data": [{"id": 1}, 5, {"id": 2}]}));
        assert_eq!(photos.len(), 2);
        assert!(parse_photos(&json!({"error": "nope"})).is_empty());
    }
}
