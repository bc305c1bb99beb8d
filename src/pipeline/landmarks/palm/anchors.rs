//! SSD anchor centres for the MediaPipe palm detector.

pub const NUM_ANCHORS: usize = 2016;

const STRIDES: &[u32] = &[8, 16, 16, 16];
const ANCHORS_PER_LAYER: usize = 2;

/// Anchor centres in `[0, 1]`, ordered row by row, cell by cell. Layers that
/// share a stride share one feature map, so their anchors sit on the same
/// cell back to back.
pub fn generate(input_size: u32) -> Vec<[f32; 2]> {
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);

    let mut layer = 0;
    while layer < STRIDES.len() {
        let stride = STRIDES[layer];
        let mut per_cell = 0;
        while layer < STRIDES.len() && STRIDES[layer] == stride {
            per_cell += ANCHORS_PER_LAYER;
            layer += 1;
        }

        let cells = input_size.div_ceil(stride);
        for y in 0..cells {
            for x in 0..cells {
                let center = [
                    (x as f32 + 0.5) / cells as f32,
                    (y as f32 + 0.5) / cells as f32,
                ];
                anchors.extend(std::iter::repeat_n(center, per_cell));
            }
        }
    }

    anchors
}
