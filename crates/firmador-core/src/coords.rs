//! Coordinate transformation between the viewer and the signing gateway
//!
//! The viewer reports the signature marker as a pixel offset from the top-left
//! of the rendered page (Y grows downward). The gateway expects the placement
//! from the bottom-left of the page (Y grows upward).

/// Page height the signing workflow submits when no page geometry is known
pub const DEFAULT_PAGE_HEIGHT: f64 = 796.0;

/// Constants of one viewer configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MappingConstants {
    /// Page height in gateway units
    pub page_height: f64,
    /// Horizontal margin between the viewer origin and the page edge
    pub margin_x: f64,
}

impl Default for MappingConstants {
    fn default() -> Self {
        Self {
            page_height: DEFAULT_PAGE_HEIGHT,
            margin_x: 0.0,
        }
    }
}

impl MappingConstants {
    pub fn new(page_height: f64, margin_x: f64) -> Self {
        Self {
            page_height,
            margin_x,
        }
    }

    /// Constants for a page described by its MediaBox `[x, y, width, height]`
    ///
    /// The top edge of the page (`y + height`) becomes the flip axis and the
    /// left edge becomes the horizontal margin.
    pub fn for_media_box(media_box: [f64; 4], margin_x: f64) -> Self {
        let [mb_x, mb_y, _, mb_height] = media_box;
        Self {
            page_height: mb_y + mb_height,
            margin_x: mb_x + margin_x,
        }
    }
}

/// Convert a viewer offset (top-left origin, Y down) to gateway coordinates
/// (bottom-left origin, Y up)
pub fn map_to_gateway(raw_x: f64, raw_y: f64, constants: MappingConstants) -> (f64, f64) {
    let x = raw_x + constants.margin_x;
    let y = -raw_y + constants.page_height;
    (x, y)
}

/// Convert gateway coordinates back to a viewer offset
pub fn unmap_from_gateway(x: f64, y: f64, constants: MappingConstants) -> (f64, f64) {
    let raw_x = x - constants.margin_x;
    let raw_y = -(y - constants.page_height);
    (raw_x, raw_y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_maps_to_top_of_page() {
        let (x, y) = map_to_gateway(0.0, 0.0, MappingConstants::default());
        assert_eq!(x, 0.0);
        assert_eq!(y, 796.0);
    }

    #[test]
    fn test_dragging_down_lowers_gateway_y() {
        let c = MappingConstants::default();
        let (_, y1) = map_to_gateway(10.0, 100.0, c);
        let (_, y2) = map_to_gateway(10.0, 300.0, c);
        assert_eq!(y1, 696.0);
        assert_eq!(y2, 496.0);
    }

    #[test]
    fn test_negative_offsets() {
        // Marker dragged above and left of the viewer origin
        let (x, y) = map_to_gateway(-15.0, -20.0, MappingConstants::new(770.0, 5.0));
        assert_eq!(x, -10.0);
        assert_eq!(y, 790.0);
    }

    #[test]
    fn test_media_box_constants() {
        let letter = MappingConstants::for_media_box([0.0, 0.0, 612.0, 792.0], 0.0);
        assert_eq!(letter.page_height, 792.0);
        assert_eq!(letter.margin_x, 0.0);

        let offset = MappingConstants::for_media_box([10.0, 20.0, 595.0, 842.0], 2.0);
        assert_eq!(offset.page_height, 862.0);
        assert_eq!(offset.margin_x, 12.0);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    // Drag offsets observed in practice, including past the origin
    fn offset() -> impl Strategy<Value = f64> {
        -2000.0f64..2000.0
    }

    fn page_height() -> impl Strategy<Value = f64> {
        100.0f64..2000.0
    }

    proptest! {
        /// Property: viewer -> gateway -> viewer returns the original offset
        #[test]
        fn roundtrip_viewer_to_gateway(
            raw_x in offset(),
            raw_y in offset(),
            height in page_height(),
            margin in 0.0f64..50.0,
        ) {
            let c = MappingConstants::new(height, margin);
            let (x, y) = map_to_gateway(raw_x, raw_y, c);
            let (back_x, back_y) = unmap_from_gateway(x, y, c);

            let tolerance = 1e-9;
            prop_assert!(
                (back_x - raw_x).abs() < tolerance,
                "X roundtrip failed: {} -> {} -> {}",
                raw_x, x, back_x
            );
            prop_assert!(
                (back_y - raw_y).abs() < tolerance,
                "Y roundtrip failed: {} -> {} -> {}",
                raw_y, y, back_y
            );
        }

        /// Property: -(-y + K) + K recovers y
        #[test]
        fn y_flip_is_an_involution(raw_y in offset(), k in page_height()) {
            let flipped = -raw_y + k;
            let recovered = -flipped + k;
            prop_assert!((recovered - raw_y).abs() < 1e-9);
        }

        /// Property: same input, same output
        #[test]
        fn mapping_is_deterministic(raw_x in offset(), raw_y in offset(), k in page_height()) {
            let c = MappingConstants::new(k, 0.0);
            prop_assert_eq!(map_to_gateway(raw_x, raw_y, c), map_to_gateway(raw_x, raw_y, c));
        }

        /// Property: moving down in the viewer moves down on the page
        #[test]
        fn y_axis_direction(raw_y in offset(), delta in 0.1f64..500.0, k in page_height()) {
            let c = MappingConstants::new(k, 0.0);
            let (_, y1) = map_to_gateway(0.0, raw_y, c);
            let (_, y2) = map_to_gateway(0.0, raw_y + delta, c);
            prop_assert!(y2 < y1);
        }

        /// Property: X is a pure translation by the margin
        #[test]
        fn x_axis_translation(raw_x in offset(), margin in 0.0f64..50.0) {
            let c = MappingConstants::new(DEFAULT_PAGE_HEIGHT, margin);
            let (x, _) = map_to_gateway(raw_x, 0.0, c);
            prop_assert!((x - (raw_x + margin)).abs() < 1e-9);
        }
    }
}
