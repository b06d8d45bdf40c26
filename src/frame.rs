/// Which callback mechanism delivered a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameSource {
    /// Regular display refresh
    #[default]
    Display,
    /// Immersive session frame loop
    Session,
}

/// Frame metadata - carries frame number, timing and source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    pub number: u64,
    pub time: f32,
    pub delta: f32,
    pub source: FrameSource,
}

impl FrameInfo {
    pub fn new(number: u64, time: f32, delta: f32, source: FrameSource) -> Self {
        Self {
            number,
            time,
            delta,
            source,
        }
    }
}
