//! Font resolution and glyph outline sources.
//!
//! Fonts are an external resource that resolves asynchronously. A loader hands
//! back a [`Deferred`] immediately and resolves it from a background thread
//! through a [`Resolver`]; the render loop polls the gate once per frame and
//! never waits on it.

use std::path::PathBuf;
use std::sync::{Arc, Weak};

use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use lyon::math::point;
use lyon::path::Path;
use parking_lot::Mutex;

/// Errors produced while resolving a font.
#[derive(Debug, thiserror::Error)]
pub enum FontError {
    #[error("no fonts found on this system")]
    NoFontsAvailable,

    #[error("failed to resolve a font face for query: {0:?}")]
    ResolveFailed(FontQuery),

    #[error("failed to read font file {path}: {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse font face")]
    ParseFailed,

    #[error("failed to spawn font loader: {0}")]
    Spawn(#[source] std::io::Error),
}

// ============================================================================
// Deferred resource gate
// ============================================================================

/// Resolution state of a [`Deferred`].
#[derive(Debug, Clone)]
pub enum DeferredState<T> {
    Pending,
    Ready(T),
    /// Resolution failed; the message is kept for display.
    Failed(String),
}

/// A value that becomes available later, shared between a loader and its consumer.
#[derive(Debug)]
pub struct Deferred<T> {
    inner: Arc<Mutex<DeferredState<T>>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Write side of a [`Deferred`]. Holds only a weak reference, so resolving
/// after every consumer has been dropped is a harmless no-op.
#[derive(Debug)]
pub struct Resolver<T> {
    inner: Weak<Mutex<DeferredState<T>>>,
}

impl<T: Clone> Deferred<T> {
    /// Creates a pending gate and the resolver that completes it.
    pub fn pending() -> (Self, Resolver<T>) {
        let inner = Arc::new(Mutex::new(DeferredState::Pending));
        let resolver = Resolver {
            inner: Arc::downgrade(&inner),
        };
        (Self { inner }, resolver)
    }

    /// Creates an already-resolved gate.
    pub fn ready(value: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(DeferredState::Ready(value))),
        }
    }

    /// Creates an already-failed gate.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(DeferredState::Failed(message.into()))),
        }
    }

    pub fn state(&self) -> DeferredState<T> {
        self.inner.lock().clone()
    }

    /// Returns the value if the gate is ready.
    pub fn get(&self) -> Option<T> {
        match &*self.inner.lock() {
            DeferredState::Ready(value) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(*self.inner.lock(), DeferredState::Pending)
    }

    pub fn is_failed(&self) -> bool {
        matches!(*self.inner.lock(), DeferredState::Failed(_))
    }
}

impl<T> Resolver<T> {
    /// Completes the gate with a value.
    ///
    /// Returns `false` if no consumer is left or the gate was already settled.
    pub fn resolve(self, value: T) -> bool {
        self.settle(DeferredState::Ready(value))
    }

    /// Completes the gate with a failure.
    pub fn fail(self, message: impl Into<String>) -> bool {
        self.settle(DeferredState::Failed(message.into()))
    }

    fn settle(self, next: DeferredState<T>) -> bool {
        let Some(inner) = self.inner.upgrade() else {
            tracing::debug!("[font] resolution arrived after consumer was dropped; ignored");
            return false;
        };
        let mut state = inner.lock();
        if !matches!(*state, DeferredState::Pending) {
            return false;
        }
        *state = next;
        true
    }
}

// ============================================================================
// Glyph sources
// ============================================================================

/// Provides glyph outlines in em units (y up, baseline at 0).
pub trait GlyphSource: Send + Sync {
    /// Human-readable name used in logs.
    fn name(&self) -> &str;

    /// Outline of `glyph`, or `None` if the glyph has no visible contour.
    fn outline(&self, glyph: char) -> Option<Path>;
}

/// Glyph source shared between the loader thread and the render loop.
pub type SharedGlyphSource = Arc<dyn GlyphSource>;

/// Glyph source backed by a parsed TrueType/OpenType face.
pub struct TtfGlyphSource {
    name: String,
    bytes: Arc<[u8]>,
    index: u32,
    units_per_em: f32,
}

impl std::fmt::Debug for TtfGlyphSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtfGlyphSource")
            .field("name", &self.name)
            .field("index", &self.index)
            .field("units_per_em", &self.units_per_em)
            .finish_non_exhaustive()
    }
}

impl TtfGlyphSource {
    /// Validates the face and keeps its bytes for outline extraction.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>, index: u32) -> Result<Self, FontError> {
        let face = ttf_parser::Face::parse(&bytes, index).map_err(|_| FontError::ParseFailed)?;
        let units_per_em = f32::from(face.units_per_em());
        Ok(Self {
            name: name.into(),
            bytes: Arc::from(bytes),
            index,
            units_per_em,
        })
    }
}

impl GlyphSource for TtfGlyphSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn outline(&self, glyph: char) -> Option<Path> {
        let face = ttf_parser::Face::parse(&self.bytes, self.index).ok()?;
        let id = face.glyph_index(glyph)?;
        let mut builder = LyonOutlineBuilder::new(1.0 / self.units_per_em);
        face.outline_glyph(id, &mut builder)?;
        Some(builder.build())
    }
}

/// Converts `ttf-parser` outline callbacks into a `lyon` path scaled to em units.
struct LyonOutlineBuilder {
    builder: lyon::path::path::Builder,
    scale: f32,
    contour_open: bool,
}

impl LyonOutlineBuilder {
    fn new(scale: f32) -> Self {
        Self {
            builder: Path::builder(),
            scale,
            contour_open: false,
        }
    }

    fn build(mut self) -> Path {
        if self.contour_open {
            self.builder.close();
        }
        self.builder.build()
    }

    fn pt(&self, x: f32, y: f32) -> lyon::math::Point {
        point(x * self.scale, y * self.scale)
    }
}

impl ttf_parser::OutlineBuilder for LyonOutlineBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        if self.contour_open {
            self.builder.close();
        }
        let p = self.pt(x, y);
        self.builder.begin(p);
        self.contour_open = true;
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let p = self.pt(x, y);
        self.builder.line_to(p);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (c, p) = (self.pt(x1, y1), self.pt(x, y));
        self.builder.quadratic_bezier_to(c, p);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (c1, c2, p) = (self.pt(x1, y1), self.pt(x2, y2), self.pt(x, y));
        self.builder.cubic_bezier_to(c1, c2, p);
    }

    fn close(&mut self) {
        if self.contour_open {
            self.builder.close();
            self.contour_open = false;
        }
    }
}

/// Deterministic box-shaped glyphs that need no font files.
///
/// Every non-whitespace character becomes a rectangle whose width depends on
/// the code point; alphanumerics also get a rectangular counter (hole) so the
/// tessellator sees multiple contours.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockGlyphs;

impl BlockGlyphs {
    pub fn shared() -> SharedGlyphSource {
        Arc::new(Self)
    }

    /// Advance width of `glyph` in em units.
    pub fn width(glyph: char) -> f32 {
        let bucket = u32::from(glyph) % 5;
        #[allow(clippy::cast_precision_loss)]
        let step = bucket as f32 * 0.05;
        0.5 + step
    }
}

impl GlyphSource for BlockGlyphs {
    fn name(&self) -> &str {
        "block"
    }

    fn outline(&self, glyph: char) -> Option<Path> {
        if glyph.is_whitespace() || glyph.is_control() {
            return None;
        }
        let w = Self::width(glyph);
        let h = 0.7;

        let mut b = Path::builder();
        // Outer contour, counter-clockwise.
        b.begin(point(0.0, 0.0));
        b.line_to(point(w, 0.0));
        b.line_to(point(w, h));
        b.line_to(point(0.0, h));
        b.close();

        if glyph.is_alphanumeric() {
            // Counter, clockwise.
            let inset = 0.15;
            b.begin(point(inset, inset));
            b.line_to(point(inset, h - inset));
            b.line_to(point(w - inset, h - inset));
            b.line_to(point(w - inset, inset));
            b.close();
        }
        Some(b.build())
    }
}

// ============================================================================
// Loaders
// ============================================================================

/// Font selection for [`load_system_font`].
#[derive(Debug, Clone)]
pub struct FontQuery {
    /// Preferred family names in priority order. `serif`, `sans-serif` and
    /// `monospace` map to the generic families.
    pub families: Vec<String>,
    /// CSS-style weight (100..900).
    pub weight: u16,
    pub italic: bool,
}

impl Default for FontQuery {
    fn default() -> Self {
        Self {
            families: vec!["Helvetica".to_string(), "sans-serif".to_string()],
            weight: 400,
            italic: false,
        }
    }
}

/// Resolves a system font on a background thread.
pub fn load_system_font(query: FontQuery) -> Deferred<SharedGlyphSource> {
    spawn_loader("system", move || resolve_system_font(&query))
}

/// Loads the first face of a font file on a background thread.
pub fn load_font_file(path: impl Into<PathBuf>) -> Deferred<SharedGlyphSource> {
    let path = path.into();
    spawn_loader("file", move || {
        let bytes = std::fs::read(&path).map_err(|source| FontError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        let name = path
            .file_stem()
            .map_or_else(|| "font".to_string(), |s| s.to_string_lossy().into_owned());
        let source: SharedGlyphSource = Arc::new(TtfGlyphSource::from_bytes(name, bytes, 0)?);
        Ok(source)
    })
}

fn spawn_loader<F>(kind: &'static str, load: F) -> Deferred<SharedGlyphSource>
where
    F: FnOnce() -> Result<SharedGlyphSource, FontError> + Send + 'static,
{
    let (deferred, resolver) = Deferred::pending();
    let resolver = Arc::new(Mutex::new(Some(resolver)));
    let thread_resolver = Arc::clone(&resolver);

    let spawned = std::thread::Builder::new()
        .name(format!("letterfall-font-{kind}"))
        .spawn(move || {
            let Some(resolver) = thread_resolver.lock().take() else {
                return;
            };
            match load() {
                Ok(source) => {
                    tracing::info!("[font] resolved {} font '{}'", kind, source.name());
                    resolver.resolve(source);
                }
                Err(e) => {
                    tracing::warn!("[font] failed to resolve {} font: {}", kind, e);
                    resolver.fail(e.to_string());
                }
            }
        });

    if let Err(e) = spawned {
        let err = FontError::Spawn(e);
        tracing::warn!("[font] {}", err);
        if let Some(resolver) = resolver.lock().take() {
            resolver.fail(err.to_string());
        }
    }

    deferred
}

fn resolve_system_font(query: &FontQuery) -> Result<SharedGlyphSource, FontError> {
    let mut db = Database::new();
    db.load_system_fonts();
    if db.faces().next().is_none() {
        return Err(FontError::NoFontsAvailable);
    }

    let families: Vec<Family<'_>> = query
        .families
        .iter()
        .map(|f| f.trim())
        .filter(|f| !f.is_empty())
        .map(|f| {
            if f.eq_ignore_ascii_case("serif") {
                Family::Serif
            } else if f.eq_ignore_ascii_case("sans-serif") || f.eq_ignore_ascii_case("sans") {
                Family::SansSerif
            } else if f.eq_ignore_ascii_case("monospace") {
                Family::Monospace
            } else {
                Family::Name(f)
            }
        })
        .collect();

    let id = db
        .query(&Query {
            families: &families,
            weight: Weight(query.weight.clamp(1, 1000)),
            style: if query.italic { Style::Italic } else { Style::Normal },
            stretch: Stretch::Normal,
        })
        .ok_or_else(|| FontError::ResolveFailed(query.clone()))?;

    let name = db
        .face(id)
        .and_then(|face| face.families.first().map(|(family, _)| family.clone()))
        .unwrap_or_else(|| "system".to_string());

    let source = db
        .with_face_data(id, |data, index| {
            TtfGlyphSource::from_bytes(name, data.to_vec(), index)
        })
        .ok_or_else(|| FontError::ResolveFailed(query.clone()))??;

    Ok(Arc::new(source))
}
