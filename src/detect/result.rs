/// Axis-aligned bounding box in frame pixel coordinates.
///
/// Corners are normalized at construction: `left <= right` and
/// `top <= bottom` always hold.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl BoundingBox {
    /// Build a box from two corners in any order.
    pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            left: x1.min(x2),
            top: y1.min(y2),
            right: x1.max(x2),
            bottom: y1.max(y2),
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection-over-union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix = (self.right.min(other.right) - self.left.max(other.left)).max(0.0);
        let iy = (self.bottom.min(other.bottom) - self.top.max(other.top)).max(0.0);
        let intersection = ix * iy;
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}

/// One recognized object instance.
#[derive(Clone, Debug)]
pub struct Detection {
    pub class_id: usize,
    /// Resolved class label; "unknown" when the class id is out of the
    /// labels table range.
    pub label: String,
    /// Confidence score in [0, 1], at or above the configured threshold.
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Ordered detections for one frame. Insertion order is the detector's
/// output order. May be empty.
#[derive(Clone, Debug, Default)]
pub struct DetectionBatch {
    detections: Vec<Detection>,
}

impl DetectionBatch {
    pub fn push(&mut self, detection: Detection) {
        self.detections.push(detection);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
        self.detections.iter()
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

impl<'a> IntoIterator for &'a DetectionBatch {
    type Item = &'a Detection;
    type IntoIter = std::slice::Iter<'a, Detection>;

    fn into_iter(self) -> Self::IntoIter {
        self.detections.iter()
    }
}
