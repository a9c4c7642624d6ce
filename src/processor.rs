use crate::annotate::{attach_derived_images, DerivedImage};
use crate::config::Config;
use crate::error::Result;
use crate::imaging::despeckle;
use crate::layout::{Level, PcGts, Segment};
use crate::resolution::{noise_threshold_px, resolve_dpi};
use crate::walker::{SegmentVisit, SegmentVisitor, Walker, FEATURE_SELECTOR};
use crate::workspace::{make_file_id, InputFile, Workspace};
use std::time::Instant;

/// Feature appended to every image this tool produces
pub const DESPECKLED: &str = "despeckled";
/// Suffix of derived image file IDs
pub const IMAGE_ID_SUFFIX: &str = ".IMG-DEN";

/// Output IDs of one input document, fixed before processing starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub input: InputFile,
    /// ID of the output layout document
    pub file_id: String,
    /// Base ID of the derived images
    pub image_id: String,
}

/// Result of one successfully processed document
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentReport {
    pub file_id: String,
    pub document_path: String,
    pub image_paths: Vec<String>,
    pub dpi: f64,
}

/// Outcome of a whole run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub failed: usize,
    pub artifacts: usize,
}

/// Despeckles the stop-level segments of one page and keeps the results
struct SegmentDespeckler<'a> {
    image_id: &'a str,
    threshold: f64,
    derived: Vec<DerivedImage>,
}

impl SegmentVisitor for SegmentDespeckler<'_> {
    fn visit(&mut self, visit: SegmentVisit<'_>) -> Result<()> {
        let SegmentVisit {
            level,
            segment,
            path,
            mut image,
            coords,
            description,
        } = visit;

        let stats = despeckle(&mut image, self.threshold);
        tracing::debug!(
            "Despeckled {}: {} specks removed, {} holes filled",
            description,
            stats.specks_removed,
            stats.holes_filled
        );

        let file_id = match level {
            Level::Page => format!("{}{}", self.image_id, IMAGE_ID_SUFFIX),
            _ => format!(
                "{}{}_{}",
                self.image_id,
                IMAGE_ID_SUFFIX,
                segment.segment_id()
            ),
        };
        self.derived.push(DerivedImage {
            path,
            file_id,
            image,
            features: coords.with_feature(DESPECKLED).features,
            description,
        });
        Ok(())
    }
}

/// Runs download → parse → provenance → page image and DPI → walk →
/// despeckle → store → serialize for each input document in turn. A failure
/// stops only its own document, and nothing of that document is written.
pub struct Despeckler<'a, W: Workspace + ?Sized> {
    workspace: &'a W,
    config: &'a Config,
}

impl<'a, W: Workspace + ?Sized> Despeckler<'a, W> {
    pub fn new(workspace: &'a W, config: &'a Config) -> Self {
        Self { workspace, config }
    }

    /// List the inputs and assign every output ID up front
    pub fn plan(&self) -> Result<Vec<Job>> {
        let inputs = self.workspace.input_files()?;
        Ok(inputs
            .into_iter()
            .enumerate()
            .map(|(n, input)| Job {
                file_id: make_file_id(&input, &self.config.output.page, n + 1),
                image_id: make_file_id(&input, &self.config.output.image, n + 1),
                input,
            })
            .collect())
    }

    /// Process every input document
    pub fn run(&self) -> Result<RunSummary> {
        let jobs = self.plan()?;
        let mut summary = RunSummary::default();

        for (n, job) in jobs.iter().enumerate() {
            let page_id = job.input.page_or_file_id();
            tracing::info!("INPUT FILE {} / {}", n, page_id);

            match self.process(job) {
                Ok(report) => {
                    summary.processed += 1;
                    summary.artifacts += report.image_paths.len();
                }
                Err(e) => {
                    tracing::warn!("Skipping '{}': {}", page_id, e);
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Process one document, writing its images and layout only on success
    pub fn process(&self, job: &Job) -> Result<DocumentReport> {
        let start = Instant::now();
        let page_id = job.input.page_or_file_id();
        let parameters = &self.config.parameters;

        let content = self.workspace.download(&job.input)?;
        let mut pcgts = PcGts::parse(&content)?;
        pcgts.add_metadata_item(&self.config.provenance());

        let page = pcgts.page()?;
        let (page_image, page_coords, info) =
            self.workspace
                .image_from_page(page, page_id, FEATURE_SELECTOR)?;
        let dpi = resolve_dpi(page_id, parameters.dpi, &info);
        let threshold = noise_threshold_px(parameters.maxsize, dpi);

        let mut despeckler = SegmentDespeckler {
            image_id: &job.image_id,
            threshold,
            derived: Vec::new(),
        };
        let stats = Walker::new(self.workspace, parameters.level_of_operation).walk(
            page,
            page_id,
            page_image,
            page_coords,
            &mut despeckler,
        )?;

        let image_paths = attach_derived_images(
            self.workspace,
            &mut pcgts,
            despeckler.derived,
            &self.config.output.image,
            job.input.page_id.as_deref(),
            dpi,
        )?;

        pcgts.set_pcgts_id(&job.file_id);
        let document_path = self.workspace.add_file(
            &self.config.output.page,
            &job.file_id,
            job.input.page_id.as_deref(),
            &pcgts.to_xml()?,
        )?;

        tracing::info!(
            "Page '{}': despeckled {} {} image(s) below {:.1} px in {}ms, saved as '{}'",
            page_id,
            stats.visited,
            parameters.level_of_operation.as_str(),
            threshold,
            start.elapsed().as_millis(),
            document_path
        );

        Ok(DocumentReport {
            file_id: job.file_id.clone(),
            document_path,
            image_paths,
            dpi,
        })
    }
}
