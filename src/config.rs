use crate::error::{DespeckleError, Result};
use crate::layout::{Level, MetadataItem};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const TOOL_NAME: &str = "page-despeckle";
pub const PROCESSING_STEP: &str = "preprocessing/optimization/despeckling";
/// Image group used when `-O` names only the page group
pub const FALLBACK_IMAGE_GRP: &str = "OCR-D-IMG-DEN";

#[derive(Parser, Debug)]
#[command(name = "page-despeckle")]
#[command(about = "Remove small connected components from binarized PAGE-XML page and segment images")]
#[command(version)]
pub struct Args {
    /// Workspace root directory
    #[arg(short = 'm', long, env = "DESPECKLE_WORKSPACE", default_value = ".")]
    pub workspace: PathBuf,

    /// Input file group (sub-directory of the workspace)
    #[arg(short = 'I', long, required_unless_present = "dump_json")]
    pub input_file_grp: Option<String>,

    /// Output file groups: "PAGEGRP[,IMGGRP]"
    #[arg(short = 'O', long, required_unless_present = "dump_json")]
    pub output_file_grp: Option<String>,

    /// JSON file with parameters (level-of-operation, dpi, maxsize)
    #[arg(short = 'p', long)]
    pub parameter: Option<PathBuf>,

    /// Hierarchy level to despeckle at
    #[arg(long, value_enum)]
    pub level_of_operation: Option<Level>,

    /// DPI override; zero or less uses image metadata or 300
    #[arg(long, allow_negative_numbers = true)]
    pub dpi: Option<f64>,

    /// Maximum size of noise components in points
    #[arg(long, allow_negative_numbers = true)]
    pub maxsize: Option<f64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Print the tool description as JSON and exit
    #[arg(long)]
    pub dump_json: bool,
}

/// Processing parameters, recorded verbatim in the provenance record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct Parameters {
    pub level_of_operation: Level,
    pub dpi: f64,
    pub maxsize: f64,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            level_of_operation: Level::Page,
            dpi: 0.0,
            maxsize: 1.0,
        }
    }
}

impl Parameters {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| DespeckleError::Config(format!("invalid parameters: {}", e)))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            DespeckleError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.maxsize.is_finite() || self.maxsize < 0.0 {
            return Err(DespeckleError::Config(format!(
                "maxsize must be a non-negative number, got {}",
                self.maxsize
            )));
        }
        if !self.dpi.is_finite() {
            return Err(DespeckleError::Config(format!(
                "dpi must be a finite number, got {}",
                self.dpi
            )));
        }
        Ok(())
    }

    /// (name, value) pairs sorted by name
    pub fn labels(&self) -> Vec<(String, String)> {
        let value = match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => return Vec::new(),
        };
        let mut labels: Vec<(String, String)> = value
            .into_iter()
            .map(|(name, value)| {
                let value = match value {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                (name, value)
            })
            .collect();
        labels.sort();
        labels
    }
}

/// Page and image output groups
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputGroups {
    pub page: String,
    pub image: String,
}

impl OutputGroups {
    /// Parse `"PAGEGRP"` or `"PAGEGRP,IMGGRP"`
    pub fn parse(spec: &str) -> Result<Self> {
        let groups: Vec<&str> = spec.split(',').map(str::trim).collect();
        match groups.as_slice() {
            [page] if !page.is_empty() => Ok(Self {
                page: page.to_string(),
                image: FALLBACK_IMAGE_GRP.to_string(),
            }),
            [page, image] if !page.is_empty() && !image.is_empty() => Ok(Self {
                page: page.to_string(),
                image: image.to_string(),
            }),
            _ => Err(DespeckleError::Config(format!(
                "output file group must be \"PAGEGRP[,IMGGRP]\", got \"{}\"",
                spec
            ))),
        }
    }
}

/// Identity recorded in provenance records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInfo {
    pub name: String,
    pub version: String,
    pub step: String,
}

impl Default for ToolInfo {
    fn default() -> Self {
        Self {
            name: TOOL_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            step: PROCESSING_STEP.to_string(),
        }
    }
}

/// Run configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub workspace: PathBuf,
    pub input_grp: String,
    pub output: OutputGroups,
    pub parameters: Parameters,
    pub tool: ToolInfo,
}

impl Config {
    /// Provenance record appended to every output document
    pub fn provenance(&self) -> MetadataItem {
        MetadataItem::processing_step(
            &self.tool.step,
            &format!("{} {}", self.tool.name, self.tool.version),
            self.parameters.labels(),
        )
    }
}

impl TryFrom<Args> for Config {
    type Error = DespeckleError;

    fn try_from(args: Args) -> Result<Self> {
        let input_grp = args
            .input_file_grp
            .filter(|g| !g.trim().is_empty())
            .ok_or_else(|| DespeckleError::Config("missing input file group".to_string()))?;
        let output = args
            .output_file_grp
            .ok_or_else(|| DespeckleError::Config("missing output file group".to_string()))
            .and_then(|spec| OutputGroups::parse(&spec))?;

        let mut parameters = match &args.parameter {
            Some(path) => Parameters::from_file(path)?,
            None => Parameters::default(),
        };
        if let Some(level) = args.level_of_operation {
            parameters.level_of_operation = level;
        }
        if let Some(dpi) = args.dpi {
            parameters.dpi = dpi;
        }
        if let Some(maxsize) = args.maxsize {
            parameters.maxsize = maxsize;
        }
        parameters.validate()?;

        Ok(Self {
            workspace: args.workspace,
            input_grp,
            output,
            parameters,
            tool: ToolInfo::default(),
        })
    }
}

/// Tool description printed by `--dump-json`
pub fn tool_description() -> serde_json::Value {
    let defaults = Parameters::default();
    serde_json::json!({
        "executable": TOOL_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Denoise binarized page or segment images by removing small connected components",
        "steps": [PROCESSING_STEP],
        "input_file_grp": ["OCR-D-BIN"],
        "output_file_grp": ["OCR-D-DEN", FALLBACK_IMAGE_GRP],
        "parameters": {
            "level-of-operation": {
                "type": "string",
                "enum": ["page", "region", "line", "word", "glyph"],
                "default": defaults.level_of_operation,
                "description": "hierarchy level which to despeckle images for"
            },
            "dpi": {
                "type": "number",
                "format": "float",
                "default": defaults.dpi,
                "description": "pixel density in dots per inch (overrides any meta-data in the images); disabled when zero or negative"
            },
            "maxsize": {
                "type": "number",
                "format": "float",
                "default": defaults.maxsize,
                "description": "maximum component size of (bg holes or fg specks) noise in pt"
            }
        }
    })
}
