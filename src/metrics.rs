#[derive(Debug, Clone, Default)]
pub struct PageMetrics {
    pub page_number: usize,
    /// Uncompressed content stream size.
    pub content_bytes: usize,
    /// Size of the stream as written.
    pub stream_bytes: usize,
    pub compressed: bool,
    pub link_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct DocumentMetrics {
    pub pages: Vec<PageMetrics>,
    pub font_count: usize,
    pub image_count: usize,
    pub object_count: usize,
    pub total_bytes: usize,
    pub serialize_ms: f64,
}
