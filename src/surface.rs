//! Aspect-preserving viewport and the rendering-host adapter.

use std::sync::Arc;

use tracing::{debug, info};

use crate::engine_sink::EngineSink;
use crate::relay::ExitFlag;

/// Largest size with the content's aspect ratio that fits the container.
///
/// Unknown content size (either dimension non-positive) yields the full
/// container. Integer cross-multiplication keeps the ratio comparison exact;
/// the derived dimension is floored, so the result never exceeds the
/// container.
pub fn compute_viewport(
    container_w: i32,
    container_h: i32,
    content_w: i32,
    content_h: i32,
) -> (i32, i32) {
    let cw = container_w.max(0) as i64;
    let ch = container_h.max(0) as i64;
    if content_w <= 0 || content_h <= 0 {
        return (cw as i32, ch as i32);
    }
    let gw = content_w as i64;
    let gh = content_h as i64;

    if cw * gh > ch * gw {
        // container relatively wider: height binds
        ((ch * gw / gh) as i32, ch as i32)
    } else {
        (cw as i32, (cw * gh / gw) as i32)
    }
}

/// Capability interface registered with the platform rendering host
pub trait SurfaceCallbacks {
    fn on_create(&mut self);
    fn on_resize(&mut self, width: i32, height: i32);
    fn on_frame(&mut self);
}

/// Arguments for the engine's one-time init call
#[derive(Debug, Clone, PartialEq)]
pub struct EngineLaunch {
    pub game_dir: Option<String>,
    pub flags: Vec<String>,
}

pub struct SurfaceAdapter {
    sink: Arc<dyn EngineSink>,
    exit: ExitFlag,
    launch: Option<EngineLaunch>,
    last_size: Option<(i32, i32)>,
}

impl SurfaceAdapter {
    pub fn new(sink: Arc<dyn EngineSink>, exit: ExitFlag, launch: EngineLaunch) -> Self {
        Self {
            sink,
            exit,
            launch: Some(launch),
            last_size: None,
        }
    }

    pub fn viewport(&self, container_w: i32, container_h: i32) -> (i32, i32) {
        let (gw, gh) = self.sink.content_size();
        compute_viewport(container_w, container_h, gw, gh)
    }

    /// Layout measurement; sticks to the last positive size once exiting
    pub fn measure(&mut self, container_w: i32, container_h: i32) -> (i32, i32) {
        if self.exit.is_set() {
            if let Some(size) = self.last_size {
                return size;
            }
        }
        let size = self.viewport(container_w, container_h);
        if size.0 > 0 && size.1 > 0 {
            self.last_size = Some(size);
        }
        size
    }

    pub fn launched(&self) -> bool {
        self.launch.is_none()
    }
}

impl SurfaceCallbacks for SurfaceAdapter {
    fn on_create(&mut self) {
        debug!("surface created");
    }

    fn on_resize(&mut self, width: i32, height: i32) {
        let (w, h) = self.viewport(width, height);
        debug!(width, height, viewport_w = w, viewport_h = h, "surface resized");
        self.sink.resize(w, h);
    }

    fn on_frame(&mut self) {
        if let Some(launch) = self.launch.take() {
            info!(game_dir = ?launch.game_dir, flags = ?launch.flags, "launching engine");
            self.sink.init(launch.game_dir.as_deref(), &launch.flags);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_sink::{RecordingSink, SinkCall};

    #[test]
    fn test_unknown_content_fills_container() {
        assert_eq!(compute_viewport(1920, 1080, 0, 600), (1920, 1080));
        assert_eq!(compute_viewport(1920, 1080, 800, -1), (1920, 1080));
    }

    #[test]
    fn test_wide_container_binds_height() {
        assert_eq!(compute_viewport(1920, 1080, 800, 600), (1440, 1080));
    }

    #[test]
    fn test_tall_container_binds_width() {
        assert_eq!(compute_viewport(1080, 1920, 800, 600), (1080, 810));
    }

    #[test]
    fn test_viewport_fits_and_keeps_ratio() {
        for (cw, ch) in [(1, 1), (7, 3), (1280, 720), (720, 1280), (1001, 999), (333, 2000)] {
            for (gw, gh) in [(640, 480), (800, 600), (1, 7), (1920, 1080), (3, 3)] {
                let (w, h) = compute_viewport(cw, ch, gw, gh);
                assert!(w <= cw && h <= ch, "{}x{} in {}x{}", w, h, cw, ch);
                // one dimension matches the container exactly
                assert!(w == cw || h == ch);
                // floor on the derived side: error below one pixel
                let err = (w as f64 * gh as f64 - h as f64 * gw as f64).abs();
                assert!(err < gw.max(gh) as f64, "{}x{} vs {}x{}", w, h, gw, gh);
            }
        }
    }

    #[test]
    fn test_resize_and_single_launch() {
        let sink = Arc::new(RecordingSink::with_content_size(800, 600));
        let launch = EngineLaunch {
            game_dir: Some("/games/demo".to_string()),
            flags: vec!["--audio-hq".to_string()],
        };
        let mut adapter = SurfaceAdapter::new(sink.clone(), ExitFlag::new(), launch);
        adapter.on_create();
        adapter.on_resize(1920, 1080);
        adapter.on_frame();
        adapter.on_frame();
        assert!(adapter.launched());
        assert_eq!(
            sink.calls(),
            vec![
                SinkCall::Resize(1440, 1080),
                SinkCall::Init(Some("/games/demo".to_string()), vec!["--audio-hq".to_string()]),
            ]
        );
    }

    #[test]
    fn test_measure_sticks_after_exit() {
        let sink = Arc::new(RecordingSink::with_content_size(800, 600));
        let exit = ExitFlag::new();
        let mut adapter = SurfaceAdapter::new(
            sink.clone(),
            exit.clone(),
            EngineLaunch {
                game_dir: None,
                flags: Vec::new(),
            },
        );
        assert_eq!(adapter.measure(1920, 1080), (1440, 1080));
        exit.set();
        sink.set_content_size(0, 0);
        assert_eq!(adapter.measure(500, 500), (1440, 1080));
    }
}
