//! The texture cache: map registry, memory budget, eviction.
//!
//! One cache serves the whole renderer.  Maps are loaded on first
//! request and stay registered; their tiles come and go under a byte
//! budget taken from the `"limits" "texturememory"` option.  Budget
//! pressure is detected on allocation and relieved on the next sample
//! entry, freeing the level-0 buffers of each registered map first and
//! then the coarser levels until a quarter of the budget is clear.
//! Allocations may run past the budget (with a single warning);
//! protected buffers -- MIPMAP build inputs and derived levels -- are
//! never evicted.

use std::path::Path;

use glam::Vec3;
use log::{info, warn};

use super::environment::EnvironmentMap;
use super::map::{write_mip_map, SampleOptions, TexFormat, TextureMap, WrapMode};
use super::filter::Filter;
use crate::context::Stats;
use crate::error::{Error, Result};

/// Byte accounting for the cache.
#[derive(Debug)]
pub struct CacheMemory {
    limit: usize,
    critical: bool,
    warned: bool,
}

impl CacheMemory {
    fn new(limit: usize) -> Self {
        info!("texture cache limit set to {} bytes", limit);
        CacheMemory {
            limit,
            critical: false,
            warned: false,
        }
    }

    /// Budget in bytes.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Account for an allocation.  Crossing the budget flags the
    /// cache critical (unless the allocation is protected) and warns
    /// once; the allocation itself always proceeds.
    pub(crate) fn acquire(&mut self, stats: &mut Stats, bytes: usize, protected: bool) {
        let held = stats.texture_memory() + bytes as i64;
        if held > self.limit as i64 && !protected {
            if !self.warned {
                warn!(
                    "exceeding allocated texture memory by {} bytes",
                    held - self.limit as i64
                );
                self.warned = true;
            }
            self.critical = true;
        }
        stats.add_texture_memory(bytes as i64);
    }

    /// Account for freed tiles.
    pub(crate) fn release(&mut self, stats: &mut Stats, bytes: usize) {
        stats.add_texture_memory(-(bytes as i64));
    }
}

/// A registered map.
#[derive(Debug)]
enum CacheEntry {
    Texture(TextureMap),
    Environment(EnvironmentMap),
}

impl CacheEntry {
    fn name(&self) -> &str {
        match self {
            CacheEntry::Texture(map) => map.name(),
            CacheEntry::Environment(map) => map.name(),
        }
    }

    fn map_mut(&mut self) -> &mut TextureMap {
        match self {
            CacheEntry::Texture(map) => map,
            CacheEntry::Environment(env) => &mut env.map,
        }
    }
}

/// The process-wide texture cache.
#[derive(Debug)]
pub struct TextureCache {
    entries: Vec<CacheEntry>,
    memory: CacheMemory,
    lerp_default: bool,
}

impl TextureCache {
    /// A cache with the given byte budget.  `lerp_default` is the
    /// scene-wide trilinear toggle (`"texture" "lerp"`).
    pub fn new(budget_bytes: usize, lerp_default: bool) -> Self {
        TextureCache {
            entries: Vec::new(),
            memory: CacheMemory::new(budget_bytes),
            lerp_default,
        }
    }

    /// Number of registered maps.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if no maps are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The byte accounting.
    pub fn memory(&self) -> &CacheMemory {
        &self.memory
    }

    /// Find a registered texture, loading it on first request.  A
    /// plain texture gets its MIPMAP chain derived in memory right
    /// away, with the build's buffers protected from eviction.
    /// Returns `None` when the name is registered as a different map
    /// kind.
    pub fn texture_handle(&mut self, stats: &mut Stats, name: &str) -> Option<usize> {
        if let Some(index) = self.entries.iter().position(|e| e.name() == name) {
            return match &self.entries[index] {
                CacheEntry::Texture(_) => {
                    stats.inc_texture_hits();
                    Some(index)
                }
                CacheEntry::Environment(_) => {
                    warn!("\"{}\" is registered as an environment map", name);
                    None
                }
            };
        }
        stats.inc_texture_misses();

        let mut map = TextureMap::open(name, name);
        if map.is_valid() && map.format() != TexFormat::MipMap {
            if map.create_mip_map(&mut self.memory, stats).is_err() {
                map.set_invalid();
            }
        }
        map.close();
        self.entries.push(CacheEntry::Texture(map));
        Some(self.entries.len() - 1)
    }

    /// Find a registered environment map, loading it on first
    /// request.
    pub fn environment_handle(&mut self, stats: &mut Stats, name: &str) -> Option<usize> {
        if let Some(index) = self.entries.iter().position(|e| e.name() == name) {
            return match &self.entries[index] {
                CacheEntry::Environment(_) => {
                    stats.inc_texture_hits();
                    Some(index)
                }
                CacheEntry::Texture(_) => {
                    warn!("\"{}\" is registered as a plain texture", name);
                    None
                }
            };
        }
        stats.inc_texture_misses();

        let map = TextureMap::open(name, name);
        self.entries
            .push(CacheEntry::Environment(EnvironmentMap::new(map)));
        Some(self.entries.len() - 1)
    }

    /// Free tiles when an allocation has pushed the cache over its
    /// budget.  Runs on the sampling entry points, never in the
    /// middle of a lookup, so a caller's freshly loaded tile cannot
    /// be pulled out from under it.
    pub fn critical_measure(&mut self, stats: &mut Stats) {
        if !self.memory.critical {
            return;
        }

        let target = self.memory.limit / 4;
        let mut freed = 0usize;

        'outer: for entry in self.entries.iter_mut() {
            info!(
                "texture cache: freeing memory used by \"{}\"",
                entry.name()
            );
            let map = entry.map_mut();
            // The finest level goes first; it holds the bulk of the
            // bytes.
            freed += map.free_directory(&mut self.memory, stats, 0);
            if freed > target {
                break 'outer;
            }
            for directory in 1..256 {
                freed += map.free_directory(&mut self.memory, stats, directory);
                if freed > target {
                    break 'outer;
                }
            }
        }

        if freed > 0 {
            info!("texture cache: evicted {} bytes", freed);
        }
        self.memory.critical = false;
    }

    /// Sample a texture map.  `out` is sized to the map's channel
    /// count; a missing or invalid map yields zeros.
    #[allow(clippy::too_many_arguments)]
    pub fn sample_texture(
        &mut self,
        stats: &mut Stats,
        name: &str,
        s: f32,
        t: f32,
        s_footprint: f32,
        t_footprint: f32,
        options: &SampleOptions,
        out: &mut Vec<f32>,
    ) {
        self.critical_measure(stats);

        let Some(index) = self.texture_handle(stats, name) else {
            out.clear();
            return;
        };
        let lerp_default = self.lerp_default;
        let TextureCache {
            entries, memory, ..
        } = self;
        let CacheEntry::Texture(map) = &mut entries[index] else {
            out.clear();
            return;
        };
        out.resize(map.samples_per_pixel() as usize, 0.0);
        map.sample_map(
            memory,
            stats,
            options,
            lerp_default,
            s,
            t,
            s_footprint,
            t_footprint,
            out,
        );
    }

    /// Sample an environment map along the reflection cone spanned by
    /// four corner directions.
    pub fn sample_environment(
        &mut self,
        stats: &mut Stats,
        name: &str,
        directions: [Vec3; 4],
        options: &SampleOptions,
        out: &mut Vec<f32>,
    ) {
        self.critical_measure(stats);

        let Some(index) = self.environment_handle(stats, name) else {
            out.clear();
            return;
        };
        let lerp_default = self.lerp_default;
        let TextureCache {
            entries, memory, ..
        } = self;
        let CacheEntry::Environment(map) = &mut entries[index] else {
            out.clear();
            return;
        };
        out.resize(map.samples_per_pixel() as usize, 0.0);
        map.sample(memory, stats, options, lerp_default, directions, out);
    }

    /// Convert a plain scanline image into a MIPMAP texture file,
    /// stamping the wrap modes, filter and widths into the output.
    #[allow(clippy::too_many_arguments)]
    pub fn make_texture(
        &mut self,
        stats: &mut Stats,
        input: &Path,
        output: &Path,
        s_mode: WrapMode,
        t_mode: WrapMode,
        filter: Filter,
        s_width: f32,
        t_width: f32,
    ) -> Result<()> {
        let name = input.display().to_string();
        let mut map = TextureMap::open(name.clone(), input);
        if !map.is_valid() {
            return Err(Error::MissingTile(name));
        }
        if map.format() == TexFormat::MipMap {
            // Nothing to do beyond restamping; reuse the levels as
            // they are read.
            info!("\"{}\" is already a MIPMAP", name);
        }
        map.set_sampling(s_mode, t_mode, filter, s_width, t_width);
        map.create_mip_map(&mut self.memory, stats)?;

        let levels = map.resident_levels();
        let wrap_modes = format!(
            "{} {} {} {:.6} {:.6}",
            wrap_name(s_mode),
            wrap_name(t_mode),
            filter.name(),
            s_width,
            t_width
        );
        let written = write_mip_map(
            output,
            &levels,
            map.samples_per_pixel(),
            "MIP Map",
            &wrap_modes,
        );
        map.release_all(&mut self.memory, stats);
        written
    }
}

fn wrap_name(mode: WrapMode) -> &'static str {
    match mode {
        WrapMode::Periodic => "periodic",
        WrapMode::Clamp => "clamp",
        WrapMode::Black => "black",
    }
}
