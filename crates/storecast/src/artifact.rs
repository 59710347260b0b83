//! Versioned JSON persistence of a fitted pipeline.

use crate::error::Result;
use crate::pipeline::FittedPipeline;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use storecast_model::ModelError;
use tracing::info;

/// Artifact layout version written by this build.
pub const FORMAT_VERSION: u32 = 1;

/// On-disk envelope
#[derive(Debug, Serialize, Deserialize)]
struct Artifact<P> {
    format_version: u32,
    storecast_version: String,
    created_at: DateTime<Utc>,
    pipeline: P,
}

/// Just enough of the envelope to check the version before decoding the rest.
#[derive(Debug, Deserialize)]
struct Header {
    format_version: u32,
}

/// Artifact metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactInfo {
    /// Layout version
    pub format_version: u32,
    /// Crate version that wrote the artifact
    pub storecast_version: String,
    /// Write time
    pub created_at: DateTime<Utc>,
}

impl FittedPipeline {
    /// Serialize to an artifact JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.envelope()).map_err(ModelError::from)?)
    }

    fn envelope(&self) -> Artifact<&Self> {
        Artifact {
            format_version: FORMAT_VERSION,
            storecast_version: crate::VERSION.to_string(),
            created_at: Utc::now(),
            pipeline: self,
        }
    }

    /// Decode an artifact JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(decode(json)?.1)
    }

    /// Write the artifact to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path).map_err(ModelError::from)?);
        serde_json::to_writer(&mut writer, &self.envelope()).map_err(ModelError::from)?;
        writer.flush().map_err(ModelError::from)?;

        info!(path = %path.display(), "Saved model artifact");
        Ok(())
    }

    /// Read an artifact from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::load_with_info(path)?.1)
    }

    /// Read an artifact and its metadata from `path`.
    pub fn load_with_info(path: impl AsRef<Path>) -> Result<(ArtifactInfo, Self)> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(ModelError::from)?;

        let (info, pipeline) = decode(&json)?;
        info!(
            path = %path.display(),
            written_by = %info.storecast_version,
            created_at = %info.created_at,
            "Loaded model artifact"
        );
        Ok((info, pipeline))
    }
}

fn decode(json: &str) -> Result<(ArtifactInfo, FittedPipeline)> {
    let header: Header = serde_json::from_str(json).map_err(ModelError::from)?;
    if header.format_version != FORMAT_VERSION {
        return Err(ModelError::UnsupportedArtifact {
            found: header.format_version,
            expected: FORMAT_VERSION,
        }
        .into());
    }

    let artifact: Artifact<FittedPipeline> = serde_json::from_str(json).map_err(ModelError::from)?;
    Ok((
        ArtifactInfo {
            format_version: artifact.format_version,
            storecast_version: artifact.storecast_version,
            created_at: artifact.created_at,
        },
        artifact.pipeline,
    ))
}
