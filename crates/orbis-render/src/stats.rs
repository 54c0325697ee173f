use std::time::Duration;

/// Counters for the most recent frame. Updated by the scene controller as the
/// frame progresses and left intact until the next frame starts.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameStatistics {
    /// Frames (render and pick) started since the controller was created.
    pub frame_count: u64,
    pub frame_time: Duration,
    pub terrain_time: Duration,
    pub terrain_tile_count: usize,
    /// Layers that were enabled and invoked this frame.
    pub layer_count: usize,
    pub ordered_renderable_count: usize,
    pub gpu_cache_used: usize,
    pub gpu_cache_capacity: usize,
    /// GPU resources deleted after eviction at the end of the frame.
    pub gpu_resources_released: usize,
}

impl FrameStatistics {
    /// Frame time in milliseconds.
    #[must_use]
    pub fn frame_time_ms(&self) -> f64 {
        self.frame_time.as_secs_f64() * 1000.0
    }

    /// Frames per second implied by the last frame time; zero before the
    /// first timed frame.
    #[must_use]
    pub fn fps(&self) -> f64 {
        let secs = self.frame_time.as_secs_f64();
        if secs > 0.0 { 1.0 / secs } else { 0.0 }
    }

    /// Clears the per-frame counters, keeping the running frame count.
    pub(crate) fn begin(&mut self) {
        *self = Self {
            frame_count: self.frame_count + 1,
            ..Self::default()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_keeps_frame_count() {
        let mut stats = FrameStatistics {
            frame_count: 4,
            terrain_tile_count: 12,
            ..Default::default()
        };
        stats.begin();
        assert_eq!(stats.frame_count, 5);
        assert_eq!(stats.terrain_tile_count, 0);
    }

    #[test]
    fn test_fps() {
        let stats = FrameStatistics {
            frame_time: Duration::from_millis(20),
            ..Default::default()
        };
        assert!((stats.fps() - 50.0).abs() < 1e-9);
        assert!((stats.frame_time_ms() - 20.0).abs() < 1e-9);
        assert_eq!(FrameStatistics::default().fps(), 0.0);
    }
}
