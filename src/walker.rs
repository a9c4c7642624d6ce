use crate::coords::CoordContext;
use crate::error::Result;
use crate::layout::{describe, Element, Level};
use crate::workspace::{ImageResolver, BINARIZED};
use image::GrayImage;

/// Features requested for every page and segment image
pub const FEATURE_SELECTOR: &[&str] = &[BINARIZED];

/// A node of the stop level, with its private raster and context
pub struct SegmentVisit<'a> {
    pub level: Level,
    pub segment: &'a Element,
    /// Child-index path from the page element (empty for the page itself)
    pub path: Vec<usize>,
    pub image: GrayImage,
    pub coords: CoordContext,
    /// Description for logs, e.g. `line 'l1'`
    pub description: String,
}

pub trait SegmentVisitor {
    fn visit(&mut self, visit: SegmentVisit<'_>) -> Result<()>;
}

/// Counters from one traversal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub visited: usize,
    /// Intermediate nodes skipped because they had no children
    pub empty_collections: usize,
}

/// Descends page → region → line → word → glyph down to a stop level,
/// deriving each node's raster from its parent's. Nothing below the stop
/// level is touched.
pub struct Walker<'a, R: ImageResolver + ?Sized> {
    resolver: &'a R,
    stop: Level,
}

impl<'a, R: ImageResolver + ?Sized> Walker<'a, R> {
    pub fn new(resolver: &'a R, stop: Level) -> Self {
        Self { resolver, stop }
    }

    /// Visit every node of the stop level below `page`, in document order
    pub fn walk<V: SegmentVisitor>(
        &self,
        page: &Element,
        page_id: &str,
        page_image: GrayImage,
        page_coords: CoordContext,
        visitor: &mut V,
    ) -> Result<WalkStats> {
        let mut stats = WalkStats::default();
        let page_name = format!("page '{}'", page_id);

        if self.stop == Level::Page {
            visitor.visit(SegmentVisit {
                level: Level::Page,
                segment: page,
                path: Vec::new(),
                image: page_image,
                coords: page_coords,
                description: page_name,
            })?;
            stats.visited += 1;
            return Ok(stats);
        }

        self.descend(
            page,
            &page_name,
            &[],
            Level::Page,
            &page_image,
            &page_coords,
            visitor,
            &mut stats,
        )?;
        Ok(stats)
    }

    #[allow(clippy::too_many_arguments)]
    fn descend<V: SegmentVisitor>(
        &self,
        parent: &Element,
        parent_name: &str,
        parent_path: &[usize],
        parent_level: Level,
        parent_image: &GrayImage,
        parent_coords: &CoordContext,
        visitor: &mut V,
        stats: &mut WalkStats,
    ) -> Result<()> {
        let Some(level) = parent_level.child() else {
            return Ok(());
        };

        let children = level.select(parent);
        if children.is_empty() {
            tracing::warn!("{} contains no {}", parent_name, level.plural());
            stats.empty_collections += 1;
            return Ok(());
        }

        for relative in children {
            let Some(child) = parent.descendant(&relative) else {
                continue;
            };
            let (image, coords) =
                self.resolver
                    .image_from_segment(child, parent_image, parent_coords, FEATURE_SELECTOR)?;
            let path = [parent_path, relative.as_slice()].concat();
            let description = describe(child);

            if level == self.stop {
                visitor.visit(SegmentVisit {
                    level,
                    segment: child,
                    path,
                    image,
                    coords,
                    description,
                })?;
                stats.visited += 1;
            } else {
                self.descend(
                    child,
                    &description,
                    &path,
                    level,
                    &image,
                    &coords,
                    visitor,
                    stats,
                )?;
            }
        }
        Ok(())
    }
}
