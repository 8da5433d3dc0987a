//! Image reference parsing.
//!
//! A reference has the shape `[host[:port]/]path[:tag][@digest]`. The
//! repository is everything up to the tag, so `registry.io:5000/team/app:v3`
//! belongs to repository `registry.io:5000/team/app`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tag assumed when a reference carries none.
pub const DEFAULT_TAG: &str = "latest";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageRef {
    /// Registry host (with port), if the first path component names one.
    pub host: Option<String>,
    /// Repository path below the host, e.g. `team/app`.
    pub path: String,
    pub tag: String,
    pub digest: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageRefError {
    #[error("empty image reference")]
    Empty,
    #[error("invalid image reference {reference:?}: {reason}")]
    Invalid { reference: String, reason: &'static str },
}

impl ImageRef {
    pub fn parse(reference: &str) -> Result<Self, ImageRefError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(ImageRefError::Empty);
        }
        let invalid = |reason| ImageRefError::Invalid {
            reference: reference.to_string(),
            reason,
        };
        if reference.chars().any(char::is_whitespace) {
            return Err(invalid("contains whitespace"));
        }

        let (name, digest) = match reference.split_once('@') {
            Some((name, digest)) if !digest.is_empty() => (name, Some(digest.to_string())),
            Some(_) => return Err(invalid("empty digest")),
            None => (reference, None),
        };

        // Only a colon after the last slash separates a tag; earlier ones are ports.
        let last_slash = name.rfind('/').map_or(0, |i| i + 1);
        let (repo, tag) = match name[last_slash..].rfind(':') {
            Some(i) => {
                let split = last_slash + i;
                (&name[..split], &name[split + 1..])
            }
            None => (name, DEFAULT_TAG),
        };
        if tag.is_empty() {
            return Err(invalid("empty tag"));
        }
        if repo.is_empty() || repo.ends_with('/') || repo.starts_with('/') {
            return Err(invalid("empty repository path"));
        }

        let (host, path) = match repo.split_once('/') {
            Some((first, rest)) if looks_like_host(first) => (Some(first.to_string()), rest),
            _ => (None, repo),
        };
        if path.is_empty() {
            return Err(invalid("empty repository path"));
        }

        Ok(ImageRef {
            host,
            path: path.to_string(),
            tag: tag.to_string(),
            digest,
        })
    }

    /// Repository identifier: host and path, tag and digest stripped.
    pub fn repository(&self) -> String {
        match &self.host {
            Some(host) => format!("{host}/{}", self.path),
            None => self.path.clone(),
        }
    }
}

impl std::fmt::Display for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.repository(), self.tag)?;
        if let Some(digest) = &self.digest {
            write!(f, "@{digest}")?;
        }
        Ok(())
    }
}

fn looks_like_host(component: &str) -> bool {
    component.contains('.') || component.contains(':') || component == "localhost"
}
