use image::{GrayImage, Luma};
use page_despeckle::config::{Config, OutputGroups, Parameters, ToolInfo};
use page_despeckle::coords::{Affine, CoordContext};
use page_despeckle::layout::{describe, Element};
use page_despeckle::resolution::{ImageInfo, ResolutionUnit};
use page_despeckle::workspace::{ImageResolver, ImageTarget, InputFile, Workspace};
use page_despeckle::{DespeckleError, Despeckler, Level, Result};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::PathBuf;

const INK: u8 = 0;
const PAPER: u8 = 255;

/// In-memory workspace handing out one page raster for every document
struct MemoryWorkspace {
    documents: BTreeMap<String, String>,
    image: GrayImage,
    features: Vec<String>,
    info: ImageInfo,
    /// Pages whose image cannot be provided as binarized
    unavailable: Option<&'static str>,
    images: RefCell<Vec<(String, GrayImage, Option<f64>)>>,
    saved: RefCell<Vec<(String, String)>>,
}

impl MemoryWorkspace {
    fn new(image: GrayImage) -> Self {
        Self {
            documents: BTreeMap::new(),
            image,
            features: vec!["binarized".to_string()],
            info: ImageInfo::unknown(),
            unavailable: None,
            images: RefCell::new(Vec::new()),
            saved: RefCell::new(Vec::new()),
        }
    }

    fn with_document(mut self, id: &str, xml: &str) -> Self {
        self.documents.insert(id.to_string(), xml.to_string());
        self
    }

    fn image_paths(&self) -> Vec<String> {
        self.images.borrow().iter().map(|(p, _, _)| p.clone()).collect()
    }

    fn document(&self, path: &str) -> String {
        self.saved
            .borrow()
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, content)| content.clone())
            .unwrap_or_else(|| panic!("{} was not saved", path))
    }
}

impl ImageResolver for MemoryWorkspace {
    fn image_from_page(
        &self,
        page: &Element,
        page_id: &str,
        features: &[&str],
    ) -> Result<(GrayImage, CoordContext, ImageInfo)> {
        if page.attr("imageFilename") == self.unavailable {
            return Err(DespeckleError::MissingFeature {
                segment: format!("page '{}'", page_id),
                features: features.join(","),
            });
        }
        Ok((
            self.image.clone(),
            CoordContext::new(Affine::identity(), 0.0, self.features.clone()),
            self.info,
        ))
    }

    fn image_from_segment(
        &self,
        segment: &Element,
        parent_image: &GrayImage,
        parent_coords: &CoordContext,
        _features: &[&str],
    ) -> Result<(GrayImage, CoordContext)> {
        assert!(!describe(segment).is_empty());
        Ok((parent_image.clone(), parent_coords.clone()))
    }
}

impl Workspace for MemoryWorkspace {
    fn input_files(&self) -> Result<Vec<InputFile>> {
        Ok(self
            .documents
            .keys()
            .map(|id| InputFile {
                id: id.clone(),
                file_grp: "OCR-D-BIN".to_string(),
                page_id: None,
            })
            .collect())
    }

    fn download(&self, file: &InputFile) -> Result<String> {
        Ok(self.documents[&file.id].clone())
    }

    fn save_image(&self, image: &GrayImage, target: &ImageTarget<'_>) -> Result<String> {
        let path = format!("{}/{}.png", target.file_grp, target.file_id);
        self.images
            .borrow_mut()
            .push((path.clone(), image.clone(), target.dpi));
        Ok(path)
    }

    fn add_file(
        &self,
        file_grp: &str,
        file_id: &str,
        _page_id: Option<&str>,
        content: &str,
    ) -> Result<String> {
        let path = format!("{}/{}.xml", file_grp, file_id);
        self.saved
            .borrow_mut()
            .push((path.clone(), content.to_string()));
        Ok(path)
    }
}

fn config(level: Level) -> Config {
    Config {
        workspace: PathBuf::from("."),
        input_grp: "OCR-D-BIN".to_string(),
        output: OutputGroups::parse("OCR-D-DEN").unwrap(),
        parameters: Parameters {
            level_of_operation: level,
            ..Parameters::default()
        },
        tool: ToolInfo::default(),
    }
}

fn blank() -> GrayImage {
    GrayImage::from_pixel(40, 40, Luma([PAPER]))
}

const TWO_BY_THREE: &str = r#"<PcGts><Page imageFilename="p.png">
    <TextRegion id="r1">
        <TextLine id="r1l1"><Word id="w1"><Glyph id="g1"/></Word></TextLine>
        <TextLine id="r1l2"/>
        <TextLine id="r1l3"/>
    </TextRegion>
    <TableRegion id="t1"/>
    <TextRegion id="r2">
        <TextLine id="r2l1"/>
        <TextLine id="r2l2"/>
        <TextLine id="r2l3"/>
    </TextRegion>
    <TextRegion id="empty"/>
</Page></PcGts>"#;

#[test]
fn test_line_level_produces_one_artifact_per_line() {
    let mut ws = MemoryWorkspace::new(blank()).with_document("OCR-D-BIN_0001", TWO_BY_THREE);
    ws.features = vec!["binarized".to_string(), "deskewed".to_string()];
    let config = config(Level::Line);

    let summary = Despeckler::new(&ws, &config).run().unwrap();
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.artifacts, 6);

    let expected: Vec<String> = ["r1l1", "r1l2", "r1l3", "r2l1", "r2l2", "r2l3"]
        .iter()
        .map(|id| format!("OCR-D-IMG-DEN/OCR-D-IMG-DEN_0001.IMG-DEN_{}.png", id))
        .collect();
    assert_eq!(ws.image_paths(), expected);

    let xml = ws.document("OCR-D-DEN/OCR-D-DEN_0001.xml");
    assert_eq!(
        xml.matches(r#"comments="binarized,deskewed,despeckled""#).count(),
        6
    );
    // Nothing below the stop level gets an image
    assert!(!xml.contains("<Glyph id=\"g1\"><AlternativeImage"));
    assert!(xml.contains(r#"<Glyph id="g1"/>"#));
}

#[test]
fn test_page_without_text_regions_is_still_written() {
    let ws = MemoryWorkspace::new(blank()).with_document(
        "OCR-D-BIN_0001",
        r#"<PcGts><Page imageFilename="p.png"><ImageRegion id="fig"/></Page></PcGts>"#,
    );
    let config = config(Level::Region);

    let summary = Despeckler::new(&ws, &config).run().unwrap();
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.artifacts, 0);
    assert!(ws.image_paths().is_empty());

    let xml = ws.document("OCR-D-DEN/OCR-D-DEN_0001.xml");
    assert!(xml.contains(r#"pcGtsId="OCR-D-DEN_0001""#));
    assert!(xml.contains(r#"type="processingStep""#));
    assert!(!xml.contains("AlternativeImage"));
}

#[test]
fn test_failed_document_writes_nothing() {
    let page = |image: &str| {
        format!(
            r#"<PcGts><Page imageFilename="{}"><TextRegion id="r1"/></Page></PcGts>"#,
            image
        )
    };
    let mut ws = MemoryWorkspace::new(blank())
        .with_document("OCR-D-BIN_0001", &page("bad.png"))
        .with_document("OCR-D-BIN_0002", &page("good.png"));
    ws.unavailable = Some("bad.png");
    let config = config(Level::Page);

    let summary = Despeckler::new(&ws, &config).run().unwrap();
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 1);

    assert_eq!(
        ws.image_paths(),
        vec!["OCR-D-IMG-DEN/OCR-D-IMG-DEN_0002.IMG-DEN.png"]
    );
    let saved: Vec<String> = ws.saved.borrow().iter().map(|(p, _)| p.clone()).collect();
    assert_eq!(saved, vec!["OCR-D-DEN/OCR-D-DEN_0002.xml"]);
}

#[test]
fn test_metadata_resolution_drives_threshold() {
    // A 2x2 speck and a single pixel
    let mut image = blank();
    for (x, y) in [(10, 10), (11, 10), (10, 11), (11, 11), (30, 30)] {
        image.put_pixel(x, y, Luma([INK]));
    }
    let mut ws = MemoryWorkspace::new(image).with_document(
        "OCR-D-BIN_0001",
        r#"<PcGts><Page imageFilename="p.png"/></PcGts>"#,
    );
    // 59.055 px/cm is 150 DPI, so the threshold is about 2.1 px
    ws.info = ImageInfo {
        resolution: 59.055,
        unit: ResolutionUnit::Centimeter,
    };
    let config = config(Level::Page);

    let despeckler = Despeckler::new(&ws, &config);
    let jobs = despeckler.plan().unwrap();
    let report = despeckler.process(&jobs[0]).unwrap();
    assert_eq!(report.dpi, 150.0);
    assert_eq!(report.document_path, "OCR-D-DEN/OCR-D-DEN_0001.xml");

    let images = ws.images.borrow();
    let (_, cleaned, dpi) = &images[0];
    assert_eq!(*dpi, Some(150.0));
    assert_eq!(cleaned.get_pixel(10, 10)[0], INK);
    assert_eq!(cleaned.get_pixel(30, 30)[0], PAPER);
}

#[test]
fn test_output_ids_fixed_before_processing() {
    let doc = r#"<PcGts><Page imageFilename="p.png"/></PcGts>"#;
    let ws = MemoryWorkspace::new(blank())
        .with_document("scan-a", doc)
        .with_document("scan-b", doc);
    let config = config(Level::Page);

    let jobs = Despeckler::new(&ws, &config).plan().unwrap();
    let ids: Vec<(&str, &str)> = jobs
        .iter()
        .map(|j| (j.file_id.as_str(), j.image_id.as_str()))
        .collect();
    assert_eq!(
        ids,
        vec![
            ("OCR-D-DEN_0001", "OCR-D-IMG-DEN_0001"),
            ("OCR-D-DEN_0002", "OCR-D-IMG-DEN_0002"),
        ]
    );
}
