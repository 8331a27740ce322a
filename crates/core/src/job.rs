//! Conversion job descriptions and the fixture template that produces them.
//!
//! Every attempt submits a fresh [`JobBatch`] built from a
//! [`BatchTemplate`]. Destination paths embed the worker identity so
//! concurrent workers never write to the same output object.

use serde::Serialize;

use crate::error::CoreError;
use crate::types::WorkerId;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Source image every fixture variant is derived from.
pub const DEFAULT_SOURCE: &str = "s3://turbosquid-hackathon/imago/foo.png";

/// Prefix under which converted outputs are written.
pub const DEFAULT_OUTPUT_PREFIX: &str = "s3://turbosquid-hackathon/imago/out";

const DEFAULT_OUTPUT_STEM: &str = "foo";
const DEFAULT_EXTENSION: &str = "jpg";
const JPEG_MIMETYPE: &str = "image/jpeg";
// Non-standard spelling; the service accepts it alongside `image/jpeg`.
const JPG_MIMETYPE: &str = "image/jpg";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// One requested transcoding output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobDescription {
    pub infile: String,
    pub outfile: String,
    pub mimetype: String,
    pub operations: Vec<String>,
}

/// The set of conversion actions submitted together in one request.
///
/// Serializes as `{"actions": [...]}`, the body of `POST /api/v1/work`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobBatch {
    pub actions: Vec<JobDescription>,
}

impl JobBatch {
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Fixture template
// ---------------------------------------------------------------------------

/// Declarative description of one square output rendition.
///
/// `operations` is sent to the service verbatim, so a variant can carry
/// whatever operation syntax the service accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputVariant {
    /// Edge length in pixels; also names the output file.
    pub size: u32,
    pub mimetype: String,
    pub operations: Vec<String>,
}

impl OutputVariant {
    /// A JPEG rendition resized to `size`x`size`, with a separate
    /// `quality` operation when one is given.
    pub fn new(size: u32, quality: Option<u8>) -> Self {
        let mut operations = vec![format!("resize {size}x{size}")];
        if let Some(q) = quality {
            operations.push(format!("quality {q}"));
        }
        Self::with_operations(size, JPEG_MIMETYPE, operations)
    }

    pub fn with_operations<I, S>(size: u32, mimetype: impl Into<String>, operations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            size,
            mimetype: mimetype.into(),
            operations: operations.into_iter().map(Into::into).collect(),
        }
    }
}

/// Template producing one [`JobBatch`] per attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchTemplate {
    pub source: String,
    pub output_prefix: String,
    pub output_stem: String,
    pub extension: String,
    pub variants: Vec<OutputVariant>,
}

impl Default for BatchTemplate {
    fn default() -> Self {
        Self {
            source: DEFAULT_SOURCE.to_string(),
            output_prefix: DEFAULT_OUTPUT_PREFIX.to_string(),
            output_stem: DEFAULT_OUTPUT_STEM.to_string(),
            extension: DEFAULT_EXTENSION.to_string(),
            variants: vec![
                OutputVariant::new(200, Some(50)),
                OutputVariant::with_operations(400, JPG_MIMETYPE, ["resize 400x400"]),
                OutputVariant::with_operations(
                    600,
                    JPG_MIMETYPE,
                    ["resize 600x600 -quality 100"],
                ),
                OutputVariant::with_operations(
                    1200,
                    JPG_MIMETYPE,
                    ["resize 1200x1200 -quality 100"],
                ),
            ],
        }
    }
}

impl BatchTemplate {
    /// Check that the template can produce a meaningful batch.
    ///
    /// Rules:
    /// - Source and output prefix must not be empty.
    /// - At least one variant is required.
    /// - Every variant size must be non-zero.
    /// - Every variant needs a mimetype and at least one operation.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.source.trim().is_empty() {
            return Err(CoreError::Validation("source must not be empty".into()));
        }
        if self.output_prefix.trim().is_empty() {
            return Err(CoreError::Validation(
                "output prefix must not be empty".into(),
            ));
        }
        if self.variants.is_empty() {
            return Err(CoreError::Validation(
                "at least one output variant is required".into(),
            ));
        }
        if let Some(v) = self.variants.iter().find(|v| v.size == 0) {
            return Err(CoreError::Validation(format!(
                "variant size must be non-zero (mimetype {})",
                v.mimetype
            )));
        }
        for v in &self.variants {
            if v.mimetype.trim().is_empty() {
                return Err(CoreError::Validation(format!(
                    "variant {0}x{0} has no mimetype",
                    v.size
                )));
            }
            if v.operations.iter().all(|op| op.trim().is_empty()) {
                return Err(CoreError::Validation(format!(
                    "variant {0}x{0} has no operations",
                    v.size
                )));
            }
        }
        Ok(())
    }

    /// Destination locator for `variant` written by `worker_id`.
    pub fn output_path(&self, variant: &OutputVariant, worker_id: WorkerId) -> String {
        format!(
            "{}/{}{size}x{size}-{worker_id}.{}",
            self.output_prefix.trim_end_matches('/'),
            self.output_stem,
            self.extension,
            size = variant.size,
        )
    }

    /// Build a fresh batch for one attempt by `worker_id`.
    pub fn build(&self, worker_id: WorkerId) -> JobBatch {
        let actions = self
            .variants
            .iter()
            .map(|v| JobDescription {
                infile: self.source.clone(),
                outfile: self.output_path(v, worker_id),
                mimetype: v.mimetype.clone(),
                operations: v.operations.clone(),
            })
            .collect();

        JobBatch { actions }
    }
}
