//! Canonical landscape size solving.
//!
//! A landscape axis holds `components * sections * quads + 1` vertices with
//! `quads` one of the supported section sizes, one or two sections per
//! component, at most 32 components and at most 8191 quads per axis.

use serde::{Deserialize, Serialize};

use crate::error::{ConversionError, ConversionResult, ConversionWarning};

/// Supported quads per section, ascending
pub const SECTION_SIZES: [u32; 6] = [7, 15, 31, 63, 127, 255];

/// Supported sections per component, ascending
pub const SECTIONS_PER_COMPONENT: [u32; 2] = [1, 2];

/// Maximum components per axis
pub const MAX_COMPONENTS: u32 = 32;

/// Maximum quads per axis (vertex count stays below 8192)
pub const MAX_QUADS_PER_AXIS: u32 = 8191;

/// Solved landscape layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalSize {
    pub quads_per_section: u32,
    pub sections_per_component: u32,
    pub components_x: u32,
    pub components_y: u32,
}

impl CanonicalSize {
    #[inline]
    pub fn quads_per_component(&self) -> u32 {
        self.quads_per_section * self.sections_per_component
    }

    /// Vertex count along X
    pub fn width(&self) -> u32 {
        self.components_x * self.quads_per_component() + 1
    }

    /// Vertex count along Y
    pub fn height(&self) -> u32 {
        self.components_y * self.quads_per_component() + 1
    }

    pub fn dims(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    pub fn is_valid(&self) -> bool {
        SECTION_SIZES.contains(&self.quads_per_section)
            && SECTIONS_PER_COMPONENT.contains(&self.sections_per_component)
            && (1..=MAX_COMPONENTS).contains(&self.components_x)
            && (1..=MAX_COMPONENTS).contains(&self.components_y)
            && self.width() <= MAX_QUADS_PER_AXIS + 1
            && self.height() <= MAX_QUADS_PER_AXIS + 1
    }
}

/// Caller-fixed section layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeOverride {
    pub sections_per_component: u32,
    pub quads_per_section: u32,
}

/// Outcome of a solve: the layout plus any fallback notice
#[derive(Debug, Clone, PartialEq)]
pub struct SizeSolution {
    pub size: CanonicalSize,
    pub warnings: Vec<ConversionWarning>,
}

/// Largest component count allowed for a section layout
fn max_components(quads_per_component: u32) -> u32 {
    MAX_COMPONENTS.min(MAX_QUADS_PER_AXIS / quads_per_component).max(1)
}

fn clamp_components(count: u32, quads_per_component: u32) -> u32 {
    count.clamp(1, max_components(quads_per_component))
}

/// Stateless canonical size solver
#[derive(Debug, Clone, Copy, Default)]
pub struct SizeSolver;

impl SizeSolver {
    /// Solve the nearest canonical size for a `width x height` source.
    ///
    /// Exact matches are searched from the largest section layout down, so
    /// the fewest components win. Failing that, the smallest section size
    /// whose component count fits is used with one section per component.
    /// The last resort is the largest layout with clamped component counts,
    /// reported as a `SizeFallback` warning.
    pub fn solve(width: u32, height: u32) -> ConversionResult<SizeSolution> {
        if width < 2 || height < 2 {
            return Err(ConversionError::invalid_grid(width, height));
        }
        let (qx, qy) = (width - 1, height - 1);

        for &quads in SECTION_SIZES.iter().rev() {
            for &sections in SECTIONS_PER_COMPONENT.iter().rev() {
                let per_component = quads * sections;
                let limit = max_components(per_component);
                if qx % per_component == 0
                    && qy % per_component == 0
                    && qx / per_component <= limit
                    && qy / per_component <= limit
                {
                    let size = CanonicalSize {
                        quads_per_section: quads,
                        sections_per_component: sections,
                        components_x: qx / per_component,
                        components_y: qy / per_component,
                    };
                    log::debug!("Exact landscape size for {}x{}: {:?}", width, height, size);
                    return Ok(SizeSolution {
                        size,
                        warnings: Vec::new(),
                    });
                }
            }
        }

        let sections = SECTIONS_PER_COMPONENT[0];
        for &quads in SECTION_SIZES.iter() {
            let per_component = quads * sections;
            let cx = qx.div_ceil(per_component);
            let cy = qy.div_ceil(per_component);
            let limit = max_components(per_component);
            if cx <= limit && cy <= limit {
                let size = CanonicalSize {
                    quads_per_section: quads,
                    sections_per_component: sections,
                    components_x: cx,
                    components_y: cy,
                };
                log::debug!("Nearest larger landscape size for {}x{}: {:?}", width, height, size);
                return Ok(SizeSolution {
                    size,
                    warnings: Vec::new(),
                });
            }
        }

        let quads = SECTION_SIZES[SECTION_SIZES.len() - 1];
        let sections = SECTIONS_PER_COMPONENT[SECTIONS_PER_COMPONENT.len() - 1];
        let per_component = quads * sections;
        let size = CanonicalSize {
            quads_per_section: quads,
            sections_per_component: sections,
            components_x: clamp_components(qx.div_ceil(per_component), per_component),
            components_y: clamp_components(qy.div_ceil(per_component), per_component),
        };
        let warning = ConversionWarning::SizeFallback {
            source: (width, height),
            canonical: size.dims(),
        }
        .emit();
        Ok(SizeSolution {
            size,
            warnings: vec![warning],
        })
    }

    /// Use a caller-fixed section layout; component counts cover the source.
    pub fn solve_with_override(width: u32, height: u32, layout: SizeOverride) -> ConversionResult<SizeSolution> {
        if width < 2 || height < 2 {
            return Err(ConversionError::invalid_grid(width, height));
        }
        if !SECTION_SIZES.contains(&layout.quads_per_section) {
            return Err(ConversionError::SizeSolveFailed(format!(
                "unsupported quads per section {}",
                layout.quads_per_section
            )));
        }
        if !SECTIONS_PER_COMPONENT.contains(&layout.sections_per_component) {
            return Err(ConversionError::SizeSolveFailed(format!(
                "unsupported sections per component {}",
                layout.sections_per_component
            )));
        }

        let per_component = layout.quads_per_section * layout.sections_per_component;
        let cx = (width - 1).div_ceil(per_component);
        let cy = (height - 1).div_ceil(per_component);
        let size = CanonicalSize {
            quads_per_section: layout.quads_per_section,
            sections_per_component: layout.sections_per_component,
            components_x: clamp_components(cx, per_component),
            components_y: clamp_components(cy, per_component),
        };

        let mut warnings = Vec::new();
        if size.components_x != cx || size.components_y != cy {
            warnings.push(
                ConversionWarning::SizeFallback {
                    source: (width, height),
                    canonical: size.dims(),
                }
                .emit(),
            );
        }
        Ok(SizeSolution { size, warnings })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_single_component() {
        let s = SizeSolver::solve(128, 128).unwrap();
        assert_eq!(
            s.size,
            CanonicalSize {
                quads_per_section: 127,
                sections_per_component: 1,
                components_x: 1,
                components_y: 1
            }
        );
        assert!(s.warnings.is_empty());
        assert_eq!(s.size.dims(), (128, 128));
    }

    #[test]
    fn exact_prefers_fewer_larger_components() {
        // 1020 quads divide by 510, 255 and 15; two 510-quad components win.
        let s = SizeSolver::solve(1021, 1021).unwrap().size;
        assert_eq!(s.quads_per_section, 255);
        assert_eq!(s.sections_per_component, 2);
        assert_eq!(s.components_x, 2);
    }

    #[test]
    fn nearest_larger_when_no_exact_match() {
        let s = SizeSolver::solve(129, 129).unwrap();
        assert!(s.warnings.is_empty());
        assert_eq!(s.size.quads_per_section, 7);
        assert_eq!(s.size.sections_per_component, 1);
        assert_eq!(s.size.components_x, 19);
        assert!(s.size.width() >= 129);
    }

    #[test]
    fn mixed_axes_share_layout() {
        let s = SizeSolver::solve(64, 127).unwrap().size;
        assert_eq!(s.quads_per_section, 63);
        assert_eq!(s.sections_per_component, 1);
        assert_eq!((s.components_x, s.components_y), (1, 2));
        assert_eq!(s.dims(), (64, 127));

        let s = SizeSolver::solve(64, 128).unwrap().size;
        assert_eq!(s.quads_per_section, 7);
        assert_eq!((s.components_x, s.components_y), (9, 19));
    }

    #[test]
    fn huge_sources_fall_back_loudly() {
        let s = SizeSolver::solve(20000, 9000).unwrap();
        assert_eq!(s.warnings.len(), 1);
        assert!(s.warnings[0].is_precision_loss());
        assert_eq!(s.size.quads_per_section, 255);
        assert_eq!(s.size.sections_per_component, 2);
        assert!(s.size.is_valid());
        assert!(s.size.width() <= 8192);
    }

    #[test]
    fn every_solution_is_valid() {
        for w in (2..600).step_by(7) {
            for h in [2u32, 9, 64, 255, 511, 1000] {
                let s = SizeSolver::solve(w, h).unwrap().size;
                assert!(s.is_valid(), "{}x{} -> {:?}", w, h, s);
            }
        }
    }

    #[test]
    fn rejects_degenerate_sources() {
        assert!(matches!(
            SizeSolver::solve(1, 100),
            Err(ConversionError::InvalidGrid { .. })
        ));
    }

    #[test]
    fn override_validates_and_covers() {
        let layout = SizeOverride {
            sections_per_component: 2,
            quads_per_section: 63,
        };
        let s = SizeSolver::solve_with_override(300, 200, layout).unwrap().size;
        assert_eq!((s.components_x, s.components_y), (3, 2));
        assert!(s.width() >= 300 && s.height() >= 200);

        let bad = SizeOverride {
            sections_per_component: 3,
            quads_per_section: 63,
        };
        assert!(matches!(
            SizeSolver::solve_with_override(300, 200, bad),
            Err(ConversionError::SizeSolveFailed(_))
        ));
    }

    #[test]
    fn extreme_dimensions_fall_back_without_overflow() {
        let s = SizeSolver::solve(u32::MAX, 2).unwrap();
        assert!(matches!(s.warnings[..], [ConversionWarning::SizeFallback { .. }]));
        assert!(s.size.is_valid());
        assert_eq!(s.size.components_y, 1);

        let layout = SizeOverride {
            sections_per_component: 1,
            quads_per_section: 7,
        };
        let s = SizeSolver::solve_with_override(u32::MAX, u32::MAX, layout).unwrap();
        assert_eq!(s.warnings.len(), 1);
        assert!(s.size.is_valid());
    }
}
