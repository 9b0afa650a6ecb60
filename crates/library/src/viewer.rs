//! Document viewer state.
//!
//! One state machine serves PDFs and images alike; an image is simply a
//! one-page document. Every transition is bounds-checked and reports whether
//! anything changed, so a front end only re-renders when it must.

use docshelf_model::FileKind;

pub const MIN_ZOOM: f32 = 0.5;
pub const MAX_ZOOM: f32 = 3.0;
pub const ZOOM_STEP: f32 = 0.25;
const DEFAULT_ZOOM: f32 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ViewerState {
    kind: FileKind,
    /// 1-based.
    page: usize,
    page_count: usize,
    zoom: f32,
    pan: (f32, f32),
    fullscreen: bool,
}

impl ViewerState {
    /// A viewer on the first page. Images always have exactly one page; a
    /// PDF with an unknown or zero page count is treated as one page until
    /// [`set_page_count`](Self::set_page_count) says otherwise.
    pub fn new(kind: FileKind, page_count: usize) -> Self {
        let page_count = match kind {
            FileKind::Image => 1,
            FileKind::Pdf => page_count.max(1),
        };
        Self {
            kind,
            page: 1,
            page_count,
            zoom: DEFAULT_ZOOM,
            pan: (0.0, 0.0),
            fullscreen: false,
        }
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn pan(&self) -> (f32, f32) {
        self.pan
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    /// Zoom as a whole percentage, for display.
    pub fn zoom_percent(&self) -> u32 {
        (self.zoom * 100.0).round() as u32
    }

    /// Late page count, once the document has loaded. The current page is
    /// clamped into the new range.
    pub fn set_page_count(&mut self, page_count: usize) -> bool {
        if self.kind == FileKind::Image {
            return false;
        }
        let page_count = page_count.max(1);
        if page_count == self.page_count {
            return false;
        }
        self.page_count = page_count;
        if self.page > page_count {
            self.page = page_count;
            self.pan = (0.0, 0.0);
        }
        true
    }

    pub fn go_to(&mut self, page: usize) -> bool {
        if page == 0 || page > self.page_count || page == self.page {
            return false;
        }
        self.page = page;
        self.pan = (0.0, 0.0);
        true
    }

    pub fn next_page(&mut self) -> bool {
        self.go_to(self.page + 1)
    }

    pub fn previous_page(&mut self) -> bool {
        self.go_to(self.page.saturating_sub(1))
    }

    pub fn set_zoom(&mut self, zoom: f32) -> bool {
        if !zoom.is_finite() {
            return false;
        }
        let zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        if (zoom - self.zoom).abs() < f32::EPSILON {
            return false;
        }
        self.zoom = zoom;
        true
    }

    pub fn zoom_in(&mut self) -> bool {
        self.set_zoom(self.zoom + ZOOM_STEP)
    }

    pub fn zoom_out(&mut self) -> bool {
        self.set_zoom(self.zoom - ZOOM_STEP)
    }

    /// Back to 100% and centred.
    pub fn reset_zoom(&mut self) -> bool {
        let changed = (self.zoom - DEFAULT_ZOOM).abs() >= f32::EPSILON || self.pan != (0.0, 0.0);
        self.zoom = DEFAULT_ZOOM;
        self.pan = (0.0, 0.0);
        changed
    }

    pub fn pan_by(&mut self, dx: f32, dy: f32) -> bool {
        if !dx.is_finite() || !dy.is_finite() || (dx == 0.0 && dy == 0.0) {
            return false;
        }
        self.pan = (self.pan.0 + dx, self.pan.1 + dy);
        true
    }

    pub fn toggle_fullscreen(&mut self) -> bool {
        self.fullscreen = !self.fullscreen;
        self.fullscreen
    }

    /// Leave fullscreen, e.g. on Escape.
    pub fn exit_fullscreen(&mut self) -> bool {
        std::mem::replace(&mut self.fullscreen, false)
    }
}
