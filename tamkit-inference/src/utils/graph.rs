use num::{Num, NumCast};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Point<T: Num> {
    pub x: T,
    pub y: T,
}

/// Corner-form box; the ordering of the corners is the caller's business.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BoundingBox<T: Num> {
    pub x_min: T,
    pub y_min: T,
    pub x_max: T,
    pub y_max: T,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PointLabel {
    Exclude,
    Include,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LabeledPoint<T: Num> {
    pub point: Point<T>,
    pub label: PointLabel,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SamPrompt<T: Num> {
    Box(BoundingBox<T>),
    Points(Vec<LabeledPoint<T>>),
    Both(Vec<LabeledPoint<T>>, BoundingBox<T>),
}

impl PointLabel {
    /// `1` includes, `0` excludes; anything else is not a label.
    pub fn from_flag(flag: i64) -> Option<Self> {
        match flag {
            1 => Some(PointLabel::Include),
            0 => Some(PointLabel::Exclude),
            _ => None,
        }
    }

    pub fn flag(&self) -> i64 {
        match self {
            PointLabel::Include => 1,
            PointLabel::Exclude => 0,
        }
    }
}

impl<T: Num + Copy> Point<T> {
    pub fn new(x: T, y: T) -> Self {
        Self { x, y }
    }

    pub fn cast<U: Num + NumCast>(self) -> Option<Point<U>>
    where
        T: NumCast,
    {
        Some(Point {
            x: <U as NumCast>::from(self.x)?,
            y: <U as NumCast>::from(self.y)?,
        })
    }
}

impl<T: Num + Copy> BoundingBox<T> {
    pub fn new(x_min: T, y_min: T, x_max: T, y_max: T) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    pub fn top_left(&self) -> Point<T> {
        Point::new(self.x_min, self.y_min)
    }

    pub fn bottom_right(&self) -> Point<T> {
        Point::new(self.x_max, self.y_max)
    }

    pub fn cast<U: Num + NumCast>(self) -> Option<BoundingBox<U>>
    where
        T: NumCast,
    {
        Some(BoundingBox {
            x_min: <U as NumCast>::from(self.x_min)?,
            y_min: <U as NumCast>::from(self.y_min)?,
            x_max: <U as NumCast>::from(self.x_max)?,
            y_max: <U as NumCast>::from(self.y_max)?,
        })
    }
}

impl<T: Num + Copy> LabeledPoint<T> {
    pub fn include(x: T, y: T) -> Self {
        Self {
            point: Point::new(x, y),
            label: PointLabel::Include,
        }
    }

    pub fn exclude(x: T, y: T) -> Self {
        Self {
            point: Point::new(x, y),
            label: PointLabel::Exclude,
        }
    }
}

impl<T: Num + Copy> SamPrompt<T> {
    pub fn points(&self) -> &[LabeledPoint<T>] {
        match self {
            SamPrompt::Box(_) => &[],
            SamPrompt::Points(points) | SamPrompt::Both(points, _) => points,
        }
    }

    pub fn bounding_box(&self) -> Option<BoundingBox<T>> {
        match self {
            SamPrompt::Box(boxed) | SamPrompt::Both(_, boxed) => Some(*boxed),
            SamPrompt::Points(_) => None,
        }
    }

    /// Combines two prompts for the same object and frame: points concatenate, the later box wins.
    pub fn merge(self, other: SamPrompt<T>) -> SamPrompt<T> {
        let boxed = other.bounding_box().or(self.bounding_box());
        let mut points = self.points().to_vec();
        points.extend_from_slice(other.points());

        match (points.is_empty(), boxed) {
            (_, None) => SamPrompt::Points(points),
            (true, Some(boxed)) => SamPrompt::Box(boxed),
            (false, Some(boxed)) => SamPrompt::Both(points, boxed),
        }
    }
}
