//! Deterministic renderer for tests
//!
//! Advances a fixed number of frames per row regardless of the render rate,
//! so tests can reason in rows. The probe is shared so tests can inspect
//! what the engine did after the renderer has been boxed and installed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::{LoadError, ModuleLoader, ModuleRenderer};
use crate::types::Position;

/// Frames rendered per row (two 256-frame buffers)
pub const FRAMES_PER_ROW: usize = 512;

/// Sample value written to every rendered frame
pub const FAKE_SAMPLE: i16 = 1000;

#[derive(Debug, Default)]
pub struct FakeProbe {
    pub last_rate: u32,
    pub channel_volumes: Vec<f32>,
    pub seeks: Vec<(usize, usize)>,
    pub frames_rendered: usize,
}

pub struct FakeRenderer {
    orders: Vec<usize>,
    pattern_rows: Vec<usize>,
    channels: usize,
    order: usize,
    row: usize,
    frame_in_row: usize,
    probe: Arc<Mutex<FakeProbe>>,
}

impl FakeRenderer {
    /// `orders` maps order index to pattern index; every pattern has `rows` rows
    pub fn new(orders: Vec<usize>, rows: usize) -> Self {
        let num_patterns = orders.iter().copied().max().map_or(0, |p| p + 1);
        Self::with_pattern_rows(orders, vec![rows; num_patterns])
    }

    pub fn with_pattern_rows(orders: Vec<usize>, pattern_rows: Vec<usize>) -> Self {
        let channels = 4;
        Self {
            orders,
            pattern_rows,
            channels,
            order: 0,
            row: 0,
            frame_in_row: 0,
            probe: Arc::new(Mutex::new(FakeProbe {
                channel_volumes: vec![1.0; channels],
                ..Default::default()
            })),
        }
    }

    pub fn probe(&self) -> Arc<Mutex<FakeProbe>> {
        self.probe.clone()
    }

    fn rows_here(&self) -> usize {
        self.orders
            .get(self.order)
            .and_then(|&p| self.pattern_rows.get(p))
            .copied()
            .unwrap_or(1)
            .max(1)
    }
}

impl ModuleRenderer for FakeRenderer {
    fn render(&mut self, sample_rate: u32, out: &mut [i16]) -> usize {
        let frames = out.len() / 2;
        out.fill(FAKE_SAMPLE);

        let mut total = self.frame_in_row + frames;
        while total >= FRAMES_PER_ROW {
            total -= FRAMES_PER_ROW;
            self.row += 1;
            if self.row >= self.rows_here() {
                self.row = 0;
                self.order = (self.order + 1) % self.orders.len().max(1);
            }
        }
        self.frame_in_row = total;

        let mut probe = self.probe.lock().unwrap();
        probe.last_rate = sample_rate;
        probe.frames_rendered += frames;
        frames
    }

    fn num_orders(&self) -> usize {
        self.orders.len()
    }

    fn num_patterns(&self) -> usize {
        self.pattern_rows.len()
    }

    fn num_channels(&self) -> usize {
        self.channels
    }

    fn pattern_at_order(&self, order: usize) -> Option<usize> {
        self.orders.get(order).copied()
    }

    fn pattern_rows(&self, pattern: usize) -> usize {
        self.pattern_rows.get(pattern).copied().unwrap_or(0)
    }

    fn position(&self) -> Position {
        Position::new(self.order, self.orders.get(self.order).copied().unwrap_or(0), self.row)
    }

    fn set_position(&mut self, order: usize, row: usize) {
        self.order = order;
        self.row = row;
        self.frame_in_row = 0;
        self.probe.lock().unwrap().seeks.push((order, row));
    }

    fn set_channel_volume(&mut self, channel: usize, volume: f32) {
        if let Some(v) = self.probe.lock().unwrap().channel_volumes.get_mut(channel) {
            *v = volume;
        }
    }

    fn title(&self) -> &str {
        "fake"
    }
}

/// Loader that serves fake modules for registered paths
#[derive(Default)]
pub struct FakeLoader {
    modules: HashMap<PathBuf, (Vec<usize>, usize)>,
}

impl FakeLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, path: impl Into<PathBuf>, orders: Vec<usize>, rows: usize) -> Self {
        self.modules.insert(path.into(), (orders, rows));
        self
    }
}

impl ModuleLoader for FakeLoader {
    fn load(&self, path: &Path) -> Result<Box<dyn ModuleRenderer>, LoadError> {
        match self.modules.get(path) {
            Some((orders, _)) if orders.is_empty() => Err(LoadError::Empty),
            Some((orders, rows)) => Ok(Box::new(FakeRenderer::new(orders.clone(), *rows))),
            None => Err(LoadError::Decode(format!("not a module: {}", path.display()))),
        }
    }
}
