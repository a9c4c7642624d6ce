use crate::error::{DespeckleError, Result};
use crate::layout::{AlternativeImage, PcGts, Segment};
use crate::workspace::{ImageTarget, Workspace};
use image::GrayImage;

/// A cleaned raster waiting to be stored and attached
#[derive(Debug, Clone)]
pub struct DerivedImage {
    /// Child-index path from the page element
    pub path: Vec<usize>,
    pub file_id: String,
    pub image: GrayImage,
    pub features: Vec<String>,
    pub description: String,
}

/// Store every derived image and attach a reference to its segment
///
/// Returns the stored paths in document order.
pub fn attach_derived_images<W: Workspace + ?Sized>(
    workspace: &W,
    pcgts: &mut PcGts,
    derived: Vec<DerivedImage>,
    image_grp: &str,
    page_id: Option<&str>,
    dpi: f64,
) -> Result<Vec<String>> {
    let mut stored = Vec::with_capacity(derived.len());
    for item in &derived {
        let target = ImageTarget {
            file_id: &item.file_id,
            file_grp: image_grp,
            page_id,
            dpi: Some(dpi),
        };
        let path = workspace.save_image(&item.image, &target)?;
        tracing::debug!("Despeckled image for {} saved as '{}'", item.description, path);
        stored.push(path);
    }

    // Inserting shifts later siblings, so attach from the last node backwards
    let mut order: Vec<usize> = (0..derived.len()).collect();
    order.sort_by(|&a, &b| derived[b].path.cmp(&derived[a].path));

    let page = pcgts.page_mut()?;
    for index in order {
        let item = &derived[index];
        let segment = page.descendant_mut(&item.path).ok_or_else(|| {
            DespeckleError::Layout(format!("{} vanished from the document", item.description))
        })?;
        segment.add_alternative_image(&AlternativeImage::new(
            stored[index].as_str(),
            &item.features,
        ));
    }

    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::CoordContext;
    use crate::resolution::ImageInfo;
    use crate::workspace::{ImageResolver, InputFile};
    use image::Luma;
    use std::cell::RefCell;

    #[derive(Default)]
    struct MemoryWorkspace {
        images: RefCell<Vec<(String, Option<f64>)>>,
    }

    impl ImageResolver for MemoryWorkspace {
        fn image_from_page(
            &self,
            _page: &crate::layout::Element,
            _page_id: &str,
            _features: &[&str],
        ) -> Result<(GrayImage, CoordContext, ImageInfo)> {
            unreachable!("not used by the writer")
        }

        fn image_from_segment(
            &self,
            _segment: &crate::layout::Element,
            _parent_image: &GrayImage,
            _parent_coords: &CoordContext,
            _features: &[&str],
        ) -> Result<(GrayImage, CoordContext)> {
            unreachable!("not used by the writer")
        }
    }

    impl Workspace for MemoryWorkspace {
        fn input_files(&self) -> Result<Vec<InputFile>> {
            Ok(Vec::new())
        }

        fn download(&self, _file: &InputFile) -> Result<String> {
            Ok(String::new())
        }

        fn save_image(&self, _image: &GrayImage, target: &ImageTarget<'_>) -> Result<String> {
            let path = format!("{}/{}.png", target.file_grp, target.file_id);
            self.images.borrow_mut().push((path.clone(), target.dpi));
            Ok(path)
        }

        fn add_file(&self, _: &str, _: &str, _: Option<&str>, _: &str) -> Result<String> {
            Ok(String::new())
        }
    }

    #[test]
    fn test_nested_segments_keep_their_paths_valid() {
        let mut pcgts = PcGts::parse(
            r#"<PcGts><Page imageFilename="p.png"><TextRegion id="outer"><Coords points="0,0 1,0 1,1"/><TextRegion id="inner"><Coords points="0,0 1,0 1,1"/></TextRegion></TextRegion></Page></PcGts>"#,
        )
        .unwrap();
        let page = pcgts.page().unwrap();
        let outer = vec![0];
        let inner = vec![0, 1];
        assert_eq!(page.descendant(&inner).unwrap().segment_id(), "inner");

        let derived = |path: &Vec<usize>, id: &str| DerivedImage {
            path: path.clone(),
            file_id: format!("OUT_0001.IMG-DEN_{}", id),
            image: GrayImage::from_pixel(1, 1, Luma([255])),
            features: vec!["binarized".to_string(), "despeckled".to_string()],
            description: format!("region '{}'", id),
        };

        let workspace = MemoryWorkspace::default();
        let stored = attach_derived_images(
            &workspace,
            &mut pcgts,
            vec![derived(&outer, "outer"), derived(&inner, "inner")],
            "IMG",
            None,
            300.0,
        )
        .unwrap();

        assert_eq!(
            stored,
            vec!["IMG/OUT_0001.IMG-DEN_outer.png", "IMG/OUT_0001.IMG-DEN_inner.png"]
        );
        assert_eq!(workspace.images.borrow()[0].1, Some(300.0));

        let page = pcgts.page().unwrap();
        let outer_el = page.descendant(&outer).unwrap();
        let inner_el = outer_el.child("TextRegion").unwrap();
        assert_eq!(
            outer_el.alternative_images()[0].filename,
            "IMG/OUT_0001.IMG-DEN_outer.png"
        );
        assert_eq!(
            inner_el.alternative_images()[0].comments,
            "binarized,despeckled"
        );
        assert_eq!(inner_el.alternative_images().len(), 1);
    }
}
