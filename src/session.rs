//! In-memory session state for the grid overlay utility.
//!
//! The session owns at most one decoded source image at a time and the last
//! render produced from it. All failure modes at this boundary degrade to
//! silent no-ops: a non-image file, an undecodable file, or an action with no
//! image loaded leave the prior state untouched.

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, GenericImageView, ImageFormat, RgbaImage};
use tracing::*;

use crate::render;
use crate::{GridError, RenderParams};

/// Base name used when a file name yields an empty stem.
pub const FALLBACK_BASE_NAME: &str = "image";

/// A PNG export ready to be offered for save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Drag-and-drop ingestion depth counter.
///
/// Enter and leave events fire for every nested child element, so a plain
/// depth counter decides when the single visual "dragging" state toggles:
/// enter increments, leave decrements (floored at zero), drop forces idle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DragState {
    depth: u32,
}

impl DragState {
    pub fn enter(&mut self) {
        self.depth += 1;
    }

    pub fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// A drop resets the counter regardless of how many enters were seen.
    pub fn release(&mut self) {
        self.depth = 0;
    }

    pub fn is_dragging(&self) -> bool {
        self.depth > 0
    }
}

/// Single-user session: current source image, render parameters and the last
/// composited result.
#[derive(Debug, Default)]
pub struct Session {
    image: Option<DynamicImage>,
    file_name: Option<String>,
    base_name: Option<String>,
    params: RenderParams,
    rendered: Option<RgbaImage>,
    drag: DragState,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a new source image, replacing the current one on success.
    ///
    /// Files whose declared type is not `image/*` are ignored, as are files
    /// that fail to decode; in both cases the prior image, metadata and
    /// render are retained and `false` is returned.
    pub fn load(&mut self, file_name: &str, declared_type: &str, bytes: &[u8]) -> bool {
        if !declared_type.starts_with("image/") {
            trace!(file_name, declared_type, "ignoring non-image file");
            return false;
        }
        let decoded = match image::load_from_memory(bytes) {
            Ok(img) => img,
            Err(err) => {
                warn!(file_name, %err, "image decode failed, keeping previous state");
                return false;
            }
        };
        self.base_name = Some(derive_base_name(file_name));
        self.file_name = Some(file_name.to_string());
        self.image = Some(decoded);
        self.redraw();
        true
    }

    /// Stores new render parameters and re-renders if an image is loaded.
    /// Every change triggers a full recompute; nothing is cached or diffed.
    pub fn set_params(&mut self, params: RenderParams) {
        self.params = params;
        self.redraw();
    }

    pub fn params(&self) -> &RenderParams {
        &self.params
    }

    /// Restores the default parameters and re-renders if an image is loaded.
    /// The loaded image is never cleared by a reset.
    pub fn reset(&mut self) {
        self.params = RenderParams::default();
        self.redraw();
    }

    /// Encodes the current render as a PNG named `"{base_name}-grid.png"`.
    /// Returns `Ok(None)` when no image has been loaded.
    pub fn export(&self) -> Result<Option<ExportFile>, GridError> {
        let Some(rendered) = &self.rendered else {
            return Ok(None);
        };
        let mut bytes = Vec::new();
        rendered
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|err| GridError::PngEncoding(err.to_string()))?;
        Ok(Some(ExportFile {
            file_name: format!("{}-grid.png", self.base_name()),
            bytes,
        }))
    }

    pub fn rendered(&self) -> Option<&RgbaImage> {
        self.rendered.as_ref()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn base_name(&self) -> &str {
        self.base_name.as_deref().unwrap_or(FALLBACK_BASE_NAME)
    }

    /// Rendered pixel dimensions, formatted as `"{width} x {height}px"`.
    pub fn dimensions_label(&self) -> Option<String> {
        self.image.as_ref().map(|img| {
            let (width, height) = img.dimensions();
            format!("{width} x {height}px")
        })
    }

    pub fn drag_enter(&mut self) {
        self.drag.enter();
    }

    pub fn drag_leave(&mut self) {
        self.drag.leave();
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_dragging()
    }

    /// Handles a drop: forces the drag state idle, then loads the file.
    pub fn drop_file(&mut self, file_name: &str, declared_type: &str, bytes: &[u8]) -> bool {
        self.drag.release();
        self.load(file_name, declared_type, bytes)
    }

    fn redraw(&mut self) {
        let Some(image) = &self.image else {
            return;
        };
        match render::render(image, &self.params) {
            Ok(result) => self.rendered = Some(result),
            Err(err) => warn!(%err, "render failed, keeping previous result"),
        }
    }
}

/// Strips the final extension from a file name, falling back to
/// [`FALLBACK_BASE_NAME`] when the stem comes out empty. Only the last
/// `.ext` is removed; a trailing dot or an extension containing `/` is not
/// treated as one.
pub fn derive_base_name(file_name: &str) -> String {
    let stem = match file_name.rfind('.') {
        Some(idx) => {
            let ext = &file_name[idx + 1..];
            if !ext.is_empty() && !ext.contains('/') {
                &file_name[..idx]
            } else {
                file_name
            }
        }
        None => file_name,
    };
    if stem.is_empty() {
        FALLBACK_BASE_NAME.to_string()
    } else {
        stem.to_string()
    }
}

/// Declared MIME type for a path, derived from its extension. Unknown
/// extensions are reported as a non-image type so the load gate rejects them.
pub fn declared_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("tif") | Some("tiff") => "image/tiff",
        Some("ico") => "image/x-icon",
        Some("avif") => "image/avif",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::make_params;
    use crate::Rgb;
    use image::codecs::png::PngEncoder;
    use image::{ExtendedColorType, ImageEncoder, Rgba};
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([40, 50, 60, 255]));
        let mut bytes = Vec::new();
        PngEncoder::new(&mut bytes)
            .write_image(img.as_raw(), width, height, ExtendedColorType::Rgba8)
            .unwrap();
        bytes
    }

    #[test_case("vacation.photo.jpg", "vacation.photo")]
    #[test_case("photo.png", "photo")]
    #[test_case("archive.tar.gz", "archive.tar")]
    #[test_case("noext", "noext")]
    #[test_case(".jpg", "image" ; "bare extension falls back")]
    #[test_case("", "image" ; "empty name falls back")]
    #[test_case("name.", "name." ; "trailing dot kept")]
    fn test_derive_base_name(input: &str, expected: &str) {
        assert_eq!(derive_base_name(input), expected);
    }

    #[test]
    fn test_load_and_metadata() {
        let mut session = Session::new();
        assert!(session.load("holiday.png", "image/png", &png_bytes(100, 50)));
        assert_eq!(session.file_name(), Some("holiday.png"));
        assert_eq!(session.base_name(), "holiday");
        assert_eq!(session.dimensions_label().as_deref(), Some("100 x 50px"));
        assert_eq!(session.rendered().unwrap().dimensions(), (100, 50));
    }

    #[test]
    fn test_non_image_type_is_ignored() {
        let mut session = Session::new();
        assert!(session.load("first.png", "image/png", &png_bytes(10, 10)));
        assert!(!session.load("notes.txt", "text/plain", b"hello"));
        // Prior image and metadata unchanged.
        assert_eq!(session.file_name(), Some("first.png"));
        assert_eq!(session.dimensions_label().as_deref(), Some("10 x 10px"));
    }

    #[test]
    fn test_decode_failure_is_silent() {
        let mut session = Session::new();
        assert!(session.load("first.png", "image/png", &png_bytes(10, 10)));
        assert!(!session.load("broken.png", "image/png", b"not a png"));
        assert_eq!(session.file_name(), Some("first.png"));
        assert_eq!(session.base_name(), "first");
    }

    #[test]
    fn test_actions_without_image_are_no_ops() {
        let mut session = Session::new();
        session.reset();
        session.set_params(make_params!(rows: 7));
        assert!(session.rendered().is_none());
        assert_eq!(session.export().unwrap(), None);
        assert_eq!(session.dimensions_label(), None);
    }

    #[test]
    fn test_reset_restores_exact_defaults() {
        let mut session = Session::new();
        session.load("a.png", "image/png", &png_bytes(20, 20));
        session.set_params(make_params!(
            rows: 9,
            cols: 11,
            thickness: 5,
            color: Rgb::BLACK,
            opacity: 1.0,
            show_numbers: true,
        ));
        session.reset();
        assert_eq!(session.params(), &RenderParams::default());
        // The image stays loaded.
        assert!(session.rendered().is_some());
    }

    #[test]
    fn test_export_filename_strips_final_extension_only() {
        let mut session = Session::new();
        session.load("vacation.photo.jpg", "image/jpeg", &png_bytes(8, 8));
        let export = session.export().unwrap().unwrap();
        assert_eq!(export.file_name, "vacation.photo-grid.png");
    }

    #[test]
    fn test_export_round_trips_through_png() {
        let mut session = Session::new();
        session.load("a.png", "image/png", &png_bytes(33, 21));
        let export = session.export().unwrap().unwrap();
        let decoded = image::load_from_memory(&export.bytes).unwrap();
        assert_eq!(decoded.dimensions(), (33, 21));
    }

    #[test]
    fn test_param_change_triggers_rerender() {
        let mut session = Session::new();
        session.load("a.png", "image/png", &png_bytes(50, 50));
        let before = session.rendered().unwrap().as_raw().clone();
        session.set_params(make_params!(rows: 5, cols: 5, color: Rgb::BLACK, opacity: 1.0));
        let after = session.rendered().unwrap().as_raw().clone();
        assert_ne!(before, after);
    }

    #[test]
    fn test_drag_depth_counter() {
        let mut session = Session::new();
        assert!(!session.is_dragging());

        // Nested child elements fire extra enter/leave pairs.
        session.drag_enter();
        session.drag_enter();
        assert!(session.is_dragging());
        session.drag_leave();
        assert!(session.is_dragging());
        session.drag_leave();
        assert!(!session.is_dragging());

        // Leave below zero is floored.
        session.drag_leave();
        assert!(!session.is_dragging());

        // Drop forces idle no matter the depth.
        session.drag_enter();
        session.drag_enter();
        session.drop_file("a.png", "image/png", &png_bytes(5, 5));
        assert!(!session.is_dragging());
        assert_eq!(session.file_name(), Some("a.png"));
    }

    #[test]
    fn test_declared_type_for_path() {
        assert_eq!(declared_type_for_path(Path::new("a.PNG")), "image/png");
        assert_eq!(declared_type_for_path(Path::new("a.jpeg")), "image/jpeg");
        assert_eq!(
            declared_type_for_path(Path::new("notes.txt")),
            "application/octet-stream"
        );
        assert_eq!(
            declared_type_for_path(Path::new("noext")),
            "application/octet-stream"
        );
    }
}
