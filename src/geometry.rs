use serde::{Deserialize, Serialize};
use tracing::info;

/// Integer pixel coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        (dx * dx + dy * dy).sqrt()
    }
}

/// Axis-aligned box in pixel units: top-left corner plus size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build from corner coordinates (x1, y1) - (x2, y2)
    pub fn from_corners(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self::new(x1, y1, x2 - x1, y2 - y1)
    }

    /// Center point, rounded toward negative infinity
    pub fn center(&self) -> Point {
        let x2 = self.x + self.width;
        let y2 = self.y + self.height;
        Point::new((self.x + x2).div_euclid(2), (self.y + y2).div_euclid(2))
    }

    /// Reflect the box across the vertical center line of a frame
    pub fn mirrored(&self, frame_width: i32) -> Self {
        Self::new(frame_width - (self.x + self.width), self.y, self.width, self.height)
    }
}

/// Rectangular region of the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

/// Which side of the counting line a point lies on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSide {
    /// x < line
    Exit,
    /// x > line
    Entry,
    /// x == line; belongs to neither side
    OnLine,
}

/// Vertical counting line at a fixed x coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountingLine {
    pub x: i32,
}

impl CountingLine {
    pub fn new(x: i32) -> Self {
        Self { x }
    }

    pub fn side_of(&self, x: i32) -> LineSide {
        match x.cmp(&self.x) {
            std::cmp::Ordering::Less => LineSide::Exit,
            std::cmp::Ordering::Greater => LineSide::Entry,
            std::cmp::Ordering::Equal => LineSide::OnLine,
        }
    }
}

/// Counting line plus the exit (left) and entry (right) halves of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountingZones {
    pub frame_width: u32,
    pub frame_height: u32,
    pub line: CountingLine,
    pub exit_zone: Zone,
    pub entry_zone: Zone,
}

impl CountingZones {
    /// Split the frame down the middle
    pub fn from_frame(frame_width: u32, frame_height: u32) -> Self {
        let width = frame_width as i32;
        let height = frame_height as i32;
        let line_x = width / 2;

        let zones = Self {
            frame_width,
            frame_height,
            line: CountingLine::new(line_x),
            exit_zone: Zone {
                x1: 0,
                y1: 0,
                x2: line_x,
                y2: height,
            },
            entry_zone: Zone {
                x1: line_x,
                y1: 0,
                x2: width,
                y2: height,
            },
        };

        info!("Counting zones set up - line at x: {}", line_x);
        zones
    }

    /// True if these zones were derived from the given frame geometry
    pub fn matches(&self, frame_width: u32, frame_height: u32) -> bool {
        self.frame_width == frame_width && self.frame_height == frame_height
    }
}
