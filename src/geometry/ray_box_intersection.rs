use crate::geometry::{FloatType, Ray, WorldBox};

impl WorldBox {
    /// Calculates first and last distance along the ray where it is inside the box.
    /// The ray intersects the box iff min <= max. Distances may be negative, the ray is not
    /// limited to its positive half here.
    pub fn intersect_interval(&self, ray: &Ray) -> (FloatType, FloatType) {
        let mut min_t = FloatType::NEG_INFINITY;
        let mut max_t = FloatType::INFINITY;

        for axis in 0..3 {
            // The multiplication is NAN if the ray is starting inside the slab bounding plane
            // and is parallel to it. In this case we replace it by +-infinity, so that the range
            // becomes infinite
            let to_box_min = (self.min[axis] - ray.origin[axis]) * ray.inv_direction[axis];
            let to_box_min = if to_box_min.is_nan() {
                FloatType::NEG_INFINITY
            } else {
                to_box_min
            };
            let to_box_max = (self.max[axis] - ray.origin[axis]) * ray.inv_direction[axis];
            let to_box_max = if to_box_max.is_nan() {
                FloatType::INFINITY
            } else {
                to_box_max
            };

            min_t = min_t.max(to_box_min.min(to_box_max));
            max_t = max_t.min(to_box_min.max(to_box_max));
        }

        (min_t, max_t)
    }

    /// Returns the distance along the ray where it enters the box, or None if the ray misses.
    /// The distance is negative if the ray origin is inside the box.
    /// It is a lower bound for the distance of any intersection inside the box.
    pub fn intersect(&self, ray: &Ray) -> Option<FloatType> {
        let (min_t, max_t) = self.intersect_interval(ray);
        if max_t >= 0.0 && min_t <= max_t {
            Some(min_t)
        } else {
            None
        }
    }
}
