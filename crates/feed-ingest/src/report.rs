//! Record of the non-fatal failures of one submission.

use std::fmt;

use serde::Serialize;
use tracing::warn;

use feed_core::Platform;

/// Which named association a lookup failure concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssociationKind {
    Tag,
    Context,
    Collection,
}

impl fmt::Display for AssociationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tag => write!(f, "tag"),
            Self::Context => write!(f, "context"),
            Self::Collection => write!(f, "collection"),
        }
    }
}

/// A step that failed without aborting the submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Degradation {
    /// An embedded asset could not be loaded or stored; its reference was left as-is.
    AssetFetch { reference: String, reason: String },
    /// The featured image could not be resolved; the previous value was kept.
    FeaturedImage { reference: String, reason: String },
    /// A tag, context or collection could not be found, created or linked.
    AssociationLookup {
        kind: AssociationKind,
        name: String,
        reason: String,
    },
    /// A chapter could not be created, or the old chapters could not be cleared.
    ChapterBuild {
        title: Option<String>,
        reason: String,
    },
    /// Created assets could not be attached to the post.
    UploadLink { reason: String },
    /// A crosspost entry could not be queued.
    Crosspost { platform: Platform, reason: String },
    /// The saved post or one of its relations could not be read back for
    /// the response; that part is shown as submitted or left empty.
    RelationLoad {
        relation: &'static str,
        reason: String,
    },
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AssetFetch { reference, reason } => {
                write!(f, "asset {} skipped: {}", reference, reason)
            }
            Self::FeaturedImage { reference, reason } => {
                write!(f, "featured image {} not set: {}", reference, reason)
            }
            Self::AssociationLookup { kind, name, reason } => {
                write!(f, "{} '{}' not linked: {}", kind, name, reason)
            }
            Self::ChapterBuild {
                title: Some(title),
                reason,
            } => write!(f, "chapter '{}' not created: {}", title, reason),
            Self::ChapterBuild {
                title: None,
                reason,
            } => write!(f, "chapters not rebuilt: {}", reason),
            Self::UploadLink { reason } => write!(f, "uploads not linked: {}", reason),
            Self::Crosspost { platform, reason } => {
                write!(f, "{} crosspost not queued: {}", platform, reason)
            }
            Self::RelationLoad { relation, reason } => {
                write!(f, "{} not loaded: {}", relation, reason)
            }
        }
    }
}

/// Outcome details of one submission beyond the post itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub degradations: Vec<Degradation>,
    /// Assets stored while rewriting the body or resolving the featured image.
    pub assets_created: usize,
    /// References left alone because they were managed or not permitted.
    pub assets_skipped: usize,
}

impl IngestReport {
    /// Record a degradation and log it at WARN.
    pub fn degrade(&mut self, degradation: Degradation) {
        warn!(subsystem = "ingest", "{}", degradation);
        self.degradations.push(degradation);
    }

    pub fn is_clean(&self) -> bool {
        self.degradations.is_empty()
    }

    /// Human-readable summaries of every degradation.
    pub fn warnings(&self) -> Vec<String> {
        self.degradations.iter().map(ToString::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degradation_display() {
        let d = Degradation::AssociationLookup {
            kind: AssociationKind::Context,
            name: "essays".into(),
            reason: "context not found".into(),
        };
        assert_eq!(d.to_string(), "context 'essays' not linked: context not found");

        let d = Degradation::ChapterBuild {
            title: None,
            reason: "store offline".into(),
        };
        assert_eq!(d.to_string(), "chapters not rebuilt: store offline");

        let d = Degradation::RelationLoad {
            relation: "chapters",
            reason: "timeout".into(),
        };
        assert_eq!(d.to_string(), "chapters not loaded: timeout");
    }

    #[test]
    fn test_degradation_serializes_with_step_tag() {
        let d = Degradation::Crosspost {
            platform: Platform::Threads,
            reason: "no connected account".into(),
        };
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["step"], "crosspost");
        assert_eq!(json["platform"], "threads");
    }

    #[test]
    fn test_report_tracks_degradations() {
        let mut report = IngestReport::default();
        assert!(report.is_clean());
        report.degrade(Degradation::UploadLink {
            reason: "boom".into(),
        });
        assert!(!report.is_clean());
        assert_eq!(report.warnings(), vec!["uploads not linked: boom".to_string()]);
    }
}
