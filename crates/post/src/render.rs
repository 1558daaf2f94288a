/// Body markup translation seam.
///
/// The indexing engine treats rendered output as opaque text; consumers
/// plug in whatever markdown-to-HTML translator their presentation layer
/// uses. [`PlainRenderer`] passes the source through untouched.
pub trait Renderer: Send + Sync {
    fn render(&self, source: &str) -> String;
}

/// Identity renderer: the body is stored as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainRenderer;

impl Renderer for PlainRenderer {
    fn render(&self, source: &str) -> String {
        source.to_string()
    }
}
