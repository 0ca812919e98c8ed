use serde::Deserialize;
use serde_json::Value;

use crate::api::error::ApiError;

pub const IN_TOTO_ATTESTATION_MEDIA_TYPE: &str = "application/vnd.in-toto+json";
pub const SIGSTORE_BUNDLE_ARTIFACT_TYPE_PREFIX: &str = "application/vnd.dev.sigstore.bundle";

/// A parsed OCI/Docker manifest document.
///
/// Source registries hand back untyped JSON; this type classifies the
/// two shapes that matter for cleanup purposes by their `mediaType` and
/// discards everything else the document may carry.
#[derive(Debug, Clone, PartialEq)]
pub enum Manifest {
    /// A multi-architecture index (OCI image index / Docker manifest list).
    Index {
        media_type: String,
        manifests: Vec<ManifestDescriptor>,
    },
    /// A single-platform image manifest.
    Image {
        media_type: String,
        layers: Vec<LayerDescriptor>,
    },
}

impl Manifest {
    /// Parse a manifest body, classifying it by its declared `mediaType`.
    pub fn parse(body: &Value) -> Result<Self, ApiError> {
        let media_type = body
            .get("mediaType")
            .and_then(Value::as_str)
            .ok_or(ApiError::MissingMediaType)?
            .to_string();

        if is_index_media_type(&media_type) {
            let raw: RawIndex = serde_json::from_value(body.clone())
                .map_err(|err| ApiError::InvalidManifest(err.to_string()))?;
            Ok(Manifest::Index {
                media_type,
                manifests: raw.manifests,
            })
        } else {
            let raw: RawImage = serde_json::from_value(body.clone())
                .map_err(|err| ApiError::InvalidManifest(err.to_string()))?;
            Ok(Manifest::Image {
                media_type,
                layers: raw.layers,
            })
        }
    }

    pub fn media_type(&self) -> &str {
        match self {
            Manifest::Index { media_type, .. } => media_type,
            Manifest::Image { media_type, .. } => media_type,
        }
    }

    pub fn children(&self) -> &[ManifestDescriptor] {
        match self {
            Manifest::Index { manifests, .. } => manifests,
            Manifest::Image { .. } => &[],
        }
    }

    /// Clone this manifest but strip its content (`manifests[]`/`layers[]`),
    /// producing the well-formed, content-empty body the untag protocol
    /// uploads to rebind a tag off its current digest.
    pub fn emptied(&self) -> Self {
        match self {
            Manifest::Index { media_type, .. } => Manifest::Index {
                media_type: media_type.clone(),
                manifests: vec![],
            },
            Manifest::Image { media_type, .. } => Manifest::Image {
                media_type: media_type.clone(),
                layers: vec![],
            },
        }
    }

    pub fn to_body(&self) -> Value {
        match self {
            Manifest::Index {
                media_type,
                manifests,
            } => serde_json::json!({
                "schemaVersion": 2,
                "mediaType": media_type,
                "manifests": manifests,
            }),
            Manifest::Image { media_type, layers } => serde_json::json!({
                "schemaVersion": 2,
                "mediaType": media_type,
                "layers": layers,
            }),
        }
    }
}

fn is_index_media_type(media_type: &str) -> bool {
    media_type == "application/vnd.oci.image.index.v1+json"
        || media_type == "application/vnd.docker.distribution.manifest.list.v2+json"
}

#[derive(Deserialize)]
struct RawIndex {
    manifests: Vec<ManifestDescriptor>,
}

#[derive(Deserialize)]
struct RawImage {
    #[serde(default)]
    layers: Vec<LayerDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, serde::Serialize)]
pub struct ManifestDescriptor {
    pub digest: String,
    #[serde(rename = "mediaType")]
    pub media_type: String,
    #[serde(default)]
    pub size: u64,
    pub platform: Option<Platform>,
    #[serde(rename = "artifactType")]
    pub artifact_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, serde::Serialize)]
pub struct Platform {
    pub architecture: String,
    pub variant: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, serde::Serialize)]
pub struct LayerDescriptor {
    #[serde(rename = "mediaType")]
    pub media_type: String,
    pub digest: String,
    #[serde(default)]
    pub size: u64,
}

/// Derive a human label for a child manifest entry, used only for logging.
///
/// For a known platform, this is `architecture[/variant]`. For
/// `platform.architecture == "unknown"` (the convention used by
/// attestation/signature manifests), the first layer's media type or
/// artifact type identifies the attachment kind.
pub fn child_label(descriptor: &ManifestDescriptor, manifest: Option<&Manifest>) -> String {
    if let Some(platform) = &descriptor.platform {
        if platform.architecture != "unknown" {
            return match &platform.variant {
                Some(variant) => format!("{}/{variant}", platform.architecture),
                None => platform.architecture.clone(),
            };
        }
    }

    if let Some(artifact_type) = &descriptor.artifact_type {
        if artifact_type.starts_with(SIGSTORE_BUNDLE_ARTIFACT_TYPE_PREFIX) {
            return String::from("sigstore attestation");
        }
    }

    if let Some(Manifest::Image { layers, .. }) = manifest {
        if let Some(first) = layers.first() {
            if first.media_type == IN_TOTO_ATTESTATION_MEDIA_TYPE {
                return String::from("in-toto attestation");
            }
        }
    }

    descriptor.digest.clone()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_index() {
        let body = serde_json::json!({
            "schemaVersion": 2,
            "mediaType": "application/vnd.oci.image.index.v1+json",
            "manifests": [
                {"digest": "sha256:a", "mediaType": "application/vnd.oci.image.manifest.v1+json", "size": 10, "platform": {"architecture": "amd64", "variant": null}}
            ]
        });
        let manifest = Manifest::parse(&body).expect("should parse");
        match manifest {
            Manifest::Index { manifests, .. } => {
                assert_eq!(manifests.len(), 1);
                assert_eq!(manifests[0].digest, "sha256:a");
            }
            Manifest::Image { .. } => panic!("expected index"),
        }
    }

    #[test]
    fn test_parse_image() {
        let body = serde_json::json!({
            "schemaVersion": 2,
            "mediaType": "application/vnd.oci.image.manifest.v1+json",
            "layers": [{"digest": "sha256:b", "mediaType": "application/vnd.oci.image.layer.v1.tar+gzip", "size": 5}]
        });
        let manifest = Manifest::parse(&body).expect("should parse");
        match manifest {
            Manifest::Image { layers, .. } => assert_eq!(layers.len(), 1),
            Manifest::Index { .. } => panic!("expected image"),
        }
    }

    #[test]
    fn test_missing_media_type() {
        let body = serde_json::json!({"schemaVersion": 2});
        assert!(matches!(
            Manifest::parse(&body),
            Err(ApiError::MissingMediaType)
        ));
    }

    #[test]
    fn test_emptied_index_clears_children() {
        let manifest = Manifest::Index {
            media_type: String::from("application/vnd.oci.image.index.v1+json"),
            manifests: vec![ManifestDescriptor {
                digest: String::from("sha256:a"),
                media_type: String::from("application/vnd.oci.image.manifest.v1+json"),
                size: 1,
                platform: None,
                artifact_type: None,
            }],
        };
        let emptied = manifest.emptied();
        assert_eq!(emptied.children().len(), 0);
        assert_eq!(emptied.media_type(), manifest.media_type());
    }

    #[test]
    fn test_child_label_platform() {
        let descriptor = ManifestDescriptor {
            digest: String::from("sha256:a"),
            media_type: String::from("application/vnd.oci.image.manifest.v1+json"),
            size: 1,
            platform: Some(Platform {
                architecture: String::from("arm64"),
                variant: Some(String::from("v8")),
            }),
            artifact_type: None,
        };
        assert_eq!(child_label(&descriptor, None), "arm64/v8");
    }

    #[test]
    fn test_child_label_sigstore() {
        let descriptor = ManifestDescriptor {
            digest: String::from("sha256:a"),
            media_type: String::from("application/vnd.oci.image.manifest.v1+json"),
            size: 1,
            platform: Some(Platform {
                architecture: String::from("unknown"),
                variant: None,
            }),
            artifact_type: Some(String::from(
                "application/vnd.dev.sigstore.bundle.v0.3+json",
            )),
        };
        assert_eq!(child_label(&descriptor, None), "sigstore attestation");
    }

    #[test]
    fn test_child_label_in_toto() {
        let descriptor = ManifestDescriptor {
            digest: String::from("sha256:a"),
            media_type: String::from("application/vnd.oci.image.manifest.v1+json"),
            size: 1,
            platform: Some(Platform {
                architecture: String::from("unknown"),
                variant: None,
            }),
            artifact_type: None,
        };
        let manifest = Manifest::Image {
            media_type: String::from("application/vnd.oci.image.manifest.v1+json"),
            layers: vec![LayerDescriptor {
                media_type: String::from(IN_TOTO_ATTESTATION_MEDIA_TYPE),
                digest: String::from("sha256:c"),
                size: 1,
            }],
        };
        assert_eq!(
            child_label(&descriptor, Some(&manifest)),
            "in-toto attestation"
        );
    }
}
