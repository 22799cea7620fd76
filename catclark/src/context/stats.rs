//! Render statistics counters.

/// Counters the core increments while working.  Purely additive; the
/// renderer prints them at end of frame.
#[derive(Debug, Default, Clone)]
pub struct Stats {
    subdivision_meshes: u64,
    texture_hits: u64,
    texture_misses: u64,
    tile_reads: u64,
    texture_memory: i64,
    texture_memory_peak: i64,
}

impl Stats {
    /// A fresh set of counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a subdivision mesh declaration.
    pub fn inc_subdivision_meshes(&mut self) {
        self.subdivision_meshes += 1;
    }

    /// Count a texture cache hit.
    pub fn inc_texture_hits(&mut self) {
        self.texture_hits += 1;
    }

    /// Count a texture cache miss.
    pub fn inc_texture_misses(&mut self) {
        self.texture_misses += 1;
    }

    /// Count a tile read from disk.
    pub fn inc_tile_reads(&mut self) {
        self.tile_reads += 1;
    }

    /// Adjust the held texture memory by `delta` bytes.
    pub fn add_texture_memory(&mut self, delta: i64) {
        self.texture_memory += delta;
        self.texture_memory_peak = self.texture_memory_peak.max(self.texture_memory);
    }

    /// Bytes of texture tiles currently held.
    pub fn texture_memory(&self) -> i64 {
        self.texture_memory
    }

    /// Largest number of tile bytes held at once.
    pub fn texture_memory_peak(&self) -> i64 {
        self.texture_memory_peak
    }

    /// Number of texture cache hits.
    pub fn texture_hits(&self) -> u64 {
        self.texture_hits
    }

    /// Number of texture cache misses.
    pub fn texture_misses(&self) -> u64 {
        self.texture_misses
    }

    /// Number of tile reads from disk.
    pub fn tile_reads(&self) -> u64 {
        self.tile_reads
    }

    /// Number of subdivision mesh declarations.
    pub fn subdivision_meshes(&self) -> u64 {
        self.subdivision_meshes
    }
}
