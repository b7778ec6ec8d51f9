use serde::{Deserialize, Serialize};

use super::id::EntityId;

/// Size variant of a photo URI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoKind {
    Thumbnail,
    Web,
    Original,
}

impl PhotoKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PhotoKind::Thumbnail => "thumbnail",
            PhotoKind::Web => "web",
            PhotoKind::Original => "original",
        }
    }

    pub fn parse(s: &str) -> Option<PhotoKind> {
        match s {
            "thumbnail" => Some(PhotoKind::Thumbnail),
            "web" => Some(PhotoKind::Web),
            "original" => Some(PhotoKind::Original),
            _ => None,
        }
    }

    /// Variants to try, in order, when this one is requested
    pub fn fallback_order(self) -> [PhotoKind; 3] {
        match self {
            PhotoKind::Thumbnail => [PhotoKind::Thumbnail, PhotoKind::Web, PhotoKind::Original],
            PhotoKind::Web => [PhotoKind::Web, PhotoKind::Original, PhotoKind::Thumbnail],
            PhotoKind::Original => [PhotoKind::Original, PhotoKind::Web, PhotoKind::Thumbnail],
        }
    }
}

/// One URI variant of a photo. `kind` is kept verbatim so unknown variants survive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoUri {
    pub kind: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    #[serde(default)]
    pub uris: Vec<PhotoUri>,
    /// Single URL used by older payloads that carry no `uris`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_url: Option<String>,
}

impl Photo {
    /// A legacy single-URL photo
    pub fn from_url(url: impl Into<String>) -> Self {
        Photo {
            id: None,
            uris: Vec::new(),
            legacy_url: Some(url.into()),
        }
    }

    /// Resolve the best URL for the requested size, following the fallback order.
    pub fn url(&self, kind: PhotoKind) -> Option<&str> {
        if self.uris.is_empty() {
            return self.legacy_url.as_deref();
        }
        kind.fallback_order().into_iter().find_map(|k| {
            self.uris
                .iter()
                .find(|u| u.kind == k.as_str())
                .map(|u| u.url.as_str())
        })
    }
}
