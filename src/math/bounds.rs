use glam::Vec3;

/// Axis-aligned bounding volume of a loaded model
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BoundingVolume {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingVolume {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: max.max(min),
        }
    }

    /// Smallest volume containing every point, or None for an empty set
    pub fn from_points<I: IntoIterator<Item = Vec3>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;

        let (min, max) = iter.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        Some(Self { min, max })
    }

    pub fn union(&self, other: &BoundingVolume) -> BoundingVolume {
        BoundingVolume {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Grow every face outward by `padding`. Negative padding shrinks the
    /// volume but never past its center.
    pub fn expand(&self, padding: f32) -> BoundingVolume {
        let center = self.center();
        let min = (self.min - Vec3::splat(padding)).min(center);
        let max = (self.max + Vec3::splat(padding)).max(center);
        BoundingVolume { min, max }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    pub fn clamp_point(&self, point: Vec3) -> Vec3 {
        point.clamp(self.min, self.max)
    }
}
