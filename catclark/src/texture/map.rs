//! TIFF-backed texture maps: lazy tile residency, MIPMAP level
//! selection, and filtered sampling.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use log::{error, info, warn};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

use super::buffer::TileBuffer;
use super::cache::CacheMemory;
use super::filter::Filter;
use crate::context::Stats;
use crate::error::{Error, Result};

/// Pixar texture-format tag: `"Plain Texture"`, `"MIP Map"`,
/// `"LatLong Environment"` or `"CubeFace Environment"`.
pub(crate) const TAG_TEXTURE_FORMAT: u16 = 33302;
/// Pixar wrap-modes tag: `"smode tmode filter swidth twidth"`.
pub(crate) const TAG_WRAP_MODES: u16 = 33303;

/// Layout of a texture file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TexFormat {
    /// A plain image; MIPMAP levels are derived in memory on load.
    Plain,
    /// A pre-built multi-directory MIPMAP.
    MipMap,
}

/// What a map samples as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapType {
    /// A plain colour texture.
    Texture,
    /// A cube-face environment atlas.
    Environment,
    /// A latitude-longitude environment; not sampled by this cache.
    LatLong,
}

/// Per-axis wrap behaviour outside `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WrapMode {
    /// Repeat with period one.
    Periodic,
    /// Clamp to the edge.
    #[default]
    Clamp,
    /// Return zero outside.
    Black,
}

impl WrapMode {
    /// Look up a wrap mode by its interface name.  Returns `None` for
    /// an unknown name; callers fall back to [`WrapMode::Clamp`].
    pub fn from_name(name: &str) -> Option<WrapMode> {
        match name {
            "periodic" => Some(WrapMode::Periodic),
            "clamp" => Some(WrapMode::Clamp),
            "black" => Some(WrapMode::Black),
            _ => None,
        }
    }
}

/// Shader-controlled sampling parameters.
///
/// Unset fields fall back to the map's own state (filter, widths) or
/// cache defaults (trilinear blending).
#[derive(Debug, Clone)]
pub struct SampleOptions {
    /// Blur added to the footprint along s, in texture coordinates.
    pub s_blur: f32,
    /// Blur added to the footprint along t.
    pub t_blur: f32,
    /// Footprint width multiplier along s.
    pub s_width: f32,
    /// Footprint width multiplier along t.
    pub t_width: f32,
    /// Number of stochastic sub-samples (sample 0 is always the
    /// deterministic centre).
    pub samples: u32,
    /// Filter override; `None` uses the filter baked into the map.
    pub filter: Option<Filter>,
    /// Sub-samples whose filter weight falls below this are skipped.
    pub pixel_variance: f32,
    /// Trilinear blend override; `None` follows the
    /// `"texture" "lerp"` option.
    pub lerp: Option<bool>,
}

impl Default for SampleOptions {
    fn default() -> Self {
        SampleOptions {
            s_blur: 0.0,
            t_blur: 0.0,
            s_width: 1.0,
            t_width: 1.0,
            samples: 8,
            filter: None,
            pixel_variance: 0.0,
            lerp: None,
        }
    }
}

/// The deterministic sequence of 2D sub-sample offsets, shared by all
/// sampling paths.  A small linear congruential generator fills it on
/// first use; the sequence is fixed across runs.
pub(crate) fn sample_offsets() -> &'static [[f32; 2]; 128] {
    static OFFSETS: OnceLock<[[f32; 2]; 128]> = OnceLock::new();
    OFFSETS.get_or_init(|| {
        let mut state: u32 = 0x2545_f491;
        let mut next = || {
            state = state.wrapping_mul(1664525).wrapping_add(1013904223);
            (state >> 8) as f32 / 16_777_216.0
        };
        let mut offsets = [[0.0f32; 2]; 128];
        for pair in offsets.iter_mut() {
            pair[0] = next();
            pair[1] = next();
        }
        offsets
    })
}

/// The MIPMAP level chosen for a sample footprint.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LevelChoice {
    pub level: usize,
    /// Trilinear blend weight towards the next coarser level.
    pub interp: f32,
    pub u_size: u32,
    pub v_size: u32,
}

type TiffReader = Decoder<BufReader<File>>;

/// A texture file with its resident tiles.
pub struct TextureMap {
    name: String,
    path: PathBuf,
    x_res: u32,
    y_res: u32,
    samples_per_pixel: u32,
    bits_per_sample: u32,
    planar_config: u32,
    format: TexFormat,
    map_type: MapType,
    s_mode: WrapMode,
    t_mode: WrapMode,
    filter: Filter,
    s_width: f32,
    t_width: f32,
    /// Number of usable MIPMAP levels (file directories, or derived
    /// levels for a plain texture).
    levels: usize,
    /// Per-directory resident tiles, most recently used first.
    tiles: Vec<Vec<TileBuffer>>,
    valid: bool,
    reader: Option<TiffReader>,
}

impl std::fmt::Debug for TextureMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureMap")
            .field("name", &self.name)
            .field("x_res", &self.x_res)
            .field("y_res", &self.y_res)
            .field("samples_per_pixel", &self.samples_per_pixel)
            .field("format", &self.format)
            .field("map_type", &self.map_type)
            .field("levels", &self.levels)
            .field("valid", &self.valid)
            .finish_non_exhaustive()
    }
}

impl TextureMap {
    /// Open a texture file and read its header state.  The map is
    /// marked invalid (sampling returns zero) when the file cannot be
    /// opened or decoded.
    pub fn open(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let name = name.into();
        let path = path.into();
        let mut map = TextureMap {
            name: name.clone(),
            path: path.clone(),
            x_res: 0,
            y_res: 0,
            samples_per_pixel: 1,
            bits_per_sample: 8,
            planar_config: 1,
            format: TexFormat::Plain,
            map_type: MapType::Texture,
            s_mode: WrapMode::Clamp,
            t_mode: WrapMode::Clamp,
            filter: Filter::Box,
            s_width: 1.0,
            t_width: 1.0,
            levels: 1,
            tiles: vec![Vec::new(); 256],
            valid: false,
            reader: None,
        };
        match map.read_header() {
            Ok(()) => {
                info!("texture map \"{}\" is open", map.name);
                map.valid = true;
            }
            Err(e) => {
                error!("cannot open texture file \"{}\": {}", name, e);
            }
        }
        map
    }

    fn read_header(&mut self) -> Result<()> {
        let file = File::open(&self.path)?;
        let mut decoder = Decoder::new(BufReader::new(file))?;

        let (width, height) = decoder.dimensions()?;
        self.x_res = width;
        self.y_res = height;

        let (samples, bits) = match decoder.colortype()? {
            tiff::ColorType::Gray(bits) => (1, bits),
            tiff::ColorType::GrayA(bits) => (2, bits),
            tiff::ColorType::RGB(bits) => (3, bits),
            tiff::ColorType::RGBA(bits) => (4, bits),
            tiff::ColorType::CMYK(bits) => (4, bits),
            other => {
                warn!(
                    "texture \"{}\" has unsupported colour layout {:?}; treating as grey",
                    self.name, other
                );
                (1, 8)
            }
        };
        self.samples_per_pixel = samples;
        self.bits_per_sample = bits as u32;
        self.planar_config =
            read_u32_tag(&mut decoder, Tag::PlanarConfiguration).unwrap_or(1);

        let format_tag = read_ascii_tag(&mut decoder, Tag::Unknown(TAG_TEXTURE_FORMAT));
        let wrap_tag = read_ascii_tag(&mut decoder, Tag::Unknown(TAG_WRAP_MODES));
        if let Some(modes) = wrap_tag {
            self.interpret_wrap_modes(&modes);
        }

        let tiled = decoder.find_tag(Tag::TileWidth).ok().flatten().is_some();

        // Count the directories in the file.
        let mut directories = 1usize;
        while decoder.more_images() {
            decoder.next_image()?;
            directories += 1;
        }
        decoder.seek_to_image(0)?;

        self.map_type = MapType::Texture;
        self.format = match format_tag.as_deref() {
            Some("MIP Map") => TexFormat::MipMap,
            Some("Plain Texture") => TexFormat::Plain,
            Some("CubeFace Environment") => {
                self.map_type = MapType::Environment;
                TexFormat::MipMap
            }
            Some("LatLong Environment") => {
                self.map_type = MapType::LatLong;
                TexFormat::MipMap
            }
            _ => {
                // No format tag: accept multi-directory tiled files as
                // MIPMAPs regardless of who wrote them.
                let expected = (self.x_res.min(self.y_res) as f32).log2() as usize;
                if tiled && directories + 1 >= expected {
                    TexFormat::MipMap
                } else {
                    TexFormat::Plain
                }
            }
        };
        self.levels = match self.format {
            TexFormat::MipMap => directories,
            TexFormat::Plain => 1,
        };

        self.reader = Some(decoder);
        Ok(())
    }

    /// Parse a `"smode tmode filter swidth twidth"` wrap-modes string.
    fn interpret_wrap_modes(&mut self, modes: &str) {
        let mut tokens = modes.split([' ', ',', '\t']).filter(|t| !t.is_empty());
        if let Some(smode) = tokens.next() {
            self.s_mode = WrapMode::from_name(smode).unwrap_or_else(|| {
                warn!("unknown wrap mode \"{}\", using clamp", smode);
                WrapMode::Clamp
            });
        }
        if let Some(tmode) = tokens.next() {
            self.t_mode = WrapMode::from_name(tmode).unwrap_or_else(|| {
                warn!("unknown wrap mode \"{}\", using clamp", tmode);
                WrapMode::Clamp
            });
        }
        if let Some(filter) = tokens.next() {
            self.filter = Filter::from_name(filter).unwrap_or_else(|| {
                warn!("unknown filter \"{}\", using box", filter);
                Filter::Box
            });
        }
        if let Some(swidth) = tokens.next() {
            self.s_width = swidth.parse().unwrap_or(1.0);
        }
        if let Some(twidth) = tokens.next() {
            self.t_width = twidth.parse().unwrap_or(1.0);
        }
    }

    /// Name the map was requested under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `true` while the backing file decodes correctly.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Mark the map unusable; later samples return zero.
    pub fn set_invalid(&mut self) {
        self.valid = false;
    }

    /// Horizontal resolution of level 0.
    pub fn x_res(&self) -> u32 {
        self.x_res
    }

    /// Vertical resolution of level 0.
    pub fn y_res(&self) -> u32 {
        self.y_res
    }

    /// Channels per texel.
    pub fn samples_per_pixel(&self) -> u32 {
        self.samples_per_pixel
    }

    /// Bits per sample of the backing file.
    pub fn bits_per_sample(&self) -> u32 {
        self.bits_per_sample
    }

    /// Planar configuration of the backing file (1 is interleaved).
    pub fn planar_config(&self) -> u32 {
        self.planar_config
    }

    /// File layout.
    pub fn format(&self) -> TexFormat {
        self.format
    }

    /// What the map samples as.
    pub fn map_type(&self) -> MapType {
        self.map_type
    }

    /// Number of usable MIPMAP levels.
    pub fn level_count(&self) -> usize {
        self.levels
    }

    /// The reconstruction filter baked into the map.
    pub fn filter(&self) -> Filter {
        self.filter
    }

    /// Override the wrap modes, filter and filter widths, as a
    /// texture conversion request specifies them.
    pub(crate) fn set_sampling(
        &mut self,
        s_mode: WrapMode,
        t_mode: WrapMode,
        filter: Filter,
        s_width: f32,
        t_width: f32,
    ) {
        self.s_mode = s_mode;
        self.t_mode = t_mode;
        self.filter = filter;
        self.s_width = s_width;
        self.t_width = t_width;
    }

    /// Release every resident tile, subtracting the bytes from the
    /// cache total.
    pub(crate) fn release_all(&mut self, memory: &mut CacheMemory, stats: &mut Stats) {
        for list in self.tiles.iter_mut() {
            let bytes: usize = list.iter().map(TileBuffer::byte_size).sum();
            list.clear();
            memory.release(stats, bytes);
        }
    }

    /// Close the backing file; resident tiles stay usable.
    pub fn close(&mut self) {
        self.reader = None;
    }

    /// Drop tiles of the given directory, subtracting their bytes
    /// from the cache total.  Protected tiles stay.  Returns the
    /// bytes freed.
    pub(crate) fn free_directory(&mut self, memory: &mut CacheMemory, stats: &mut Stats, directory: usize) -> usize {
        let list = &mut self.tiles[directory % 256];
        let mut freed = 0;
        list.retain(|tile| {
            if tile.protected {
                true
            } else {
                freed += tile.byte_size();
                false
            }
        });
        memory.release(stats, freed);
        freed
    }

    /// Find (or load) the tile holding texel `(s, t)` of `directory`,
    /// promote it to the front of the directory list and return its
    /// slot.  `None` invalidates the map.
    fn fetch_slot(
        &mut self,
        memory: &mut CacheMemory,
        stats: &mut Stats,
        s: u32,
        t: u32,
        directory: usize,
    ) -> Option<usize> {
        let list_index = directory % 256;

        // Fast path: the most recently used tile of this directory.
        if let Some(first) = self.tiles[list_index].first() {
            if first.is_valid_for(s, t, directory) {
                stats.inc_texture_hits();
                return Some(0);
            }
        }

        // Scan the resident list; a hit is promoted so spatial
        // coherence keeps the fast path warm.
        if let Some(position) = self.tiles[list_index]
            .iter()
            .position(|tile| tile.is_valid_for(s, t, directory))
        {
            let tile = self.tiles[list_index].remove(position);
            self.tiles[list_index].insert(0, tile);
            stats.inc_texture_hits();
            return Some(0);
        }

        stats.inc_texture_misses();
        match self.load_tile(memory, stats, s, t, directory) {
            Ok(()) => Some(0),
            Err(e) => {
                error!("cannot read tile from texture \"{}\": {}", self.name, e);
                self.valid = false;
                None
            }
        }
    }

    fn load_tile(
        &mut self,
        memory: &mut CacheMemory,
        stats: &mut Stats,
        s: u32,
        t: u32,
        directory: usize,
    ) -> Result<()> {
        stats.inc_tile_reads();
        if self.reader.is_none() {
            let file = File::open(&self.path)?;
            self.reader = Some(Decoder::new(BufReader::new(file))?);
        }

        let tile = {
            let decoder = self.reader.as_mut().ok_or_else(|| Error::MissingTile(self.name.clone()))?;
            decoder.seek_to_image(directory)?;
            let (width, height) = decoder.dimensions()?;

            let tile_width = read_u32_tag(decoder, Tag::TileWidth);
            if let (Some(tile_width), Some(tile_height)) =
                (tile_width, read_u32_tag(decoder, Tag::TileLength))
            {
                // Tiled directory: read the single tile containing
                // (s, t), origin snapped to the tile grid.
                let s_origin = (s / tile_width) * tile_width;
                let t_origin = (t / tile_height) * tile_height;
                let across = width.div_ceil(tile_width);
                let chunk = (t / tile_height) * across + s / tile_width;
                let data = decode_to_f32(decoder.read_chunk(chunk)?);
                let data_width = tile_width.min(width - s_origin);
                let data_height = tile_height.min(height - t_origin);
                TileBuffer::from_data(
                    s_origin,
                    t_origin,
                    data_width,
                    data_height,
                    self.samples_per_pixel,
                    directory,
                    false,
                    data,
                )
            } else {
                // Scanline directory: hold the whole thing.  These
                // buffers are protected; re-reading a full directory
                // on every eviction would defeat the cache.
                let data = decode_to_f32(decoder.read_image()?);
                TileBuffer::from_data(
                    0,
                    0,
                    width,
                    height,
                    self.samples_per_pixel,
                    directory,
                    true,
                    data,
                )
            }
        };

        memory.acquire(stats, tile.byte_size(), tile.protected);
        self.tiles[directory % 256].insert(0, tile);
        Ok(())
    }

    /// Read the channels of one texel into `out`.
    fn texel(
        &mut self,
        memory: &mut CacheMemory,
        stats: &mut Stats,
        s: u32,
        t: u32,
        directory: usize,
        out: &mut [f32],
    ) -> bool {
        let Some(slot) = self.fetch_slot(memory, stats, s, t, directory) else {
            return false;
        };
        let tile = &self.tiles[directory % 256][slot];
        let x = s - tile.s_origin();
        let y = t - tile.t_origin();
        for (channel, value) in out.iter_mut().enumerate() {
            *value = tile.value(x, y, channel as u32);
        }
        true
    }

    /// Choose the MIPMAP level for a footprint of `(ds, dt)` in
    /// texture coordinates.
    pub(crate) fn calculate_level(&self, ds: f32, dt: f32) -> LevelChoice {
        let mut choice = LevelChoice {
            level: 0,
            interp: 0.0,
            u_size: self.x_res,
            v_size: self.y_res,
        };

        let area = (ds * self.x_res as f32 * dt * self.y_res as f32).abs();
        if area <= 0.0 {
            return choice;
        }
        let l = (area.log2() / 2.0).max(0.0);
        let mut target = l.floor() as usize;
        choice.interp = (l - l.floor()).min(1.0);

        if target >= self.levels {
            target = self.levels - 1;
            choice.interp = 0.0;
        }

        while choice.level < target {
            choice.u_size >>= 1;
            choice.v_size >>= 1;
            choice.level += 1;
            if choice.u_size < 8 || choice.v_size < 8 {
                break;
            }
        }
        choice
    }

    /// Bilinear lookup at `(u, v)` on the given level.  Returns
    /// `false` (and zeros `out`) when a tile cannot be read.
    pub(crate) fn bilinear(
        &mut self,
        memory: &mut CacheMemory,
        stats: &mut Stats,
        u: f32,
        v: f32,
        u_size: u32,
        v_size: u32,
        directory: usize,
        out: &mut [f32],
    ) -> bool {
        let u_max = u_size.saturating_sub(1);
        let v_max = v_size.saturating_sub(1);

        let fu = u * u_max as f32;
        let fv = v * v_max as f32;
        let iu = (fu.floor().max(0.0) as u32).min(u_max);
        let iv = (fv.floor().max(0.0) as u32).min(v_max);
        let iu_n = (iu + 1).min(u_max);
        let iv_n = (iv + 1).min(v_max);
        let ru = (fu - fu.floor()).clamp(0.0, 1.0);
        let rv = (fv - fv.floor()).clamp(0.0, 1.0);

        let channels = self.samples_per_pixel as usize;
        let mut v00 = vec![0.0f32; channels];
        let mut v01 = vec![0.0f32; channels];
        let mut v10 = vec![0.0f32; channels];
        let mut v11 = vec![0.0f32; channels];

        let ok = self.texel(memory, stats, iu, iv, directory, &mut v00)
            && self.texel(memory, stats, iu_n, iv, directory, &mut v01)
            && self.texel(memory, stats, iu, iv_n, directory, &mut v10)
            && self.texel(memory, stats, iu_n, iv_n, directory, &mut v11);
        if !ok {
            out.fill(0.0);
            return false;
        }

        for c in 0..channels {
            let top = v00[c] + ru * (v01[c] - v00[c]);
            let bottom = v10[c] + ru * (v11[c] - v10[c]);
            out[c] = top + rv * (bottom - top);
        }
        true
    }

    /// Accumulate stochastic sub-samples over the footprint
    /// `(u1, v1)..(u2, v2)`, bilinear per sub-sample and trilinear
    /// across levels when `lerp` is set.
    fn sample_without_blur(
        &mut self,
        memory: &mut CacheMemory,
        stats: &mut Stats,
        options: &SampleOptions,
        lerp: bool,
        u1: f32,
        v1: f32,
        u2: f32,
        v2: f32,
        out: &mut [f32],
    ) {
        let choice = self.calculate_level(u2 - u1, v2 - v1);
        let lerp = lerp && choice.level + 1 < self.levels;
        let filter = options.filter.unwrap_or(self.filter);

        let channels = self.samples_per_pixel as usize;
        let mut level_a = vec![0.0f32; channels];
        let mut level_b = vec![0.0f32; channels];
        let mut accum = vec![0.0f32; channels];
        let mut contrib = 0.0f32;

        let offsets = sample_offsets();
        for i in 0..=options.samples {
            // Sample 0 is always the footprint centre; the rest take
            // the deterministic offset sequence.
            let (du, dv) = if i == 0 {
                (0.5, 0.5)
            } else {
                let pair = offsets[(i as usize - 1) % offsets.len()];
                (pair[0], pair[1])
            };

            let weight = filter.eval(du - 0.5, dv - 0.5, 1.0, 1.0);
            if weight < options.pixel_variance {
                continue;
            }

            let u = u1 + (u2 - u1) * du;
            let v = v1 + (v2 - v1) * dv;

            if !self.bilinear(
                memory,
                stats,
                u,
                v,
                choice.u_size,
                choice.v_size,
                choice.level,
                &mut level_a,
            ) {
                out.fill(0.0);
                return;
            }
            if lerp {
                self.bilinear(
                    memory,
                    stats,
                    u,
                    v,
                    choice.u_size / 2,
                    choice.v_size / 2,
                    choice.level + 1,
                    &mut level_b,
                );
            }

            contrib += weight;
            for c in 0..channels {
                let value = if lerp {
                    level_a[c] + choice.interp * (level_b[c] - level_a[c])
                } else {
                    level_a[c]
                };
                accum[c] += weight * value;
            }
        }

        if contrib > 0.0 {
            for c in 0..channels {
                out[c] = accum[c] / contrib;
            }
        } else {
            out.fill(0.0);
        }
    }

    /// Integrate bilinear lookups over the blurred footprint on a
    /// texel-spaced grid, weighted by the filter.
    #[allow(clippy::too_many_arguments)]
    fn sample_with_blur(
        &mut self,
        memory: &mut CacheMemory,
        stats: &mut Stats,
        options: &SampleOptions,
        u1: f32,
        v1: f32,
        u2: f32,
        v2: f32,
        out: &mut [f32],
    ) {
        let choice = self.calculate_level(u2 - u1, v2 - v1);
        let filter = options.filter.unwrap_or(self.filter);

        let u = (u1 + u2) * 0.5;
        let v = (v1 + v2) * 0.5;
        let width_u = (u2 - u1).max(f32::EPSILON);
        let width_v = (v2 - v1).max(f32::EPSILON);

        let delta_u = 1.0 / (options.s_width.max(f32::EPSILON) * choice.u_size as f32);
        let delta_v = 1.0 / (options.t_width.max(f32::EPSILON) * choice.v_size as f32);

        let channels = self.samples_per_pixel as usize;
        let mut value = vec![0.0f32; channels];
        let mut accum = vec![0.0f32; channels];
        let mut total = 0.0f32;

        let mut cu = u1;
        while cu <= u2 {
            let mut cv = v1;
            while cv <= v2 {
                let weight = filter.eval(cu - u, cv - v, width_u, width_v);
                if weight >= options.pixel_variance && weight != 0.0 {
                    if !self.bilinear(
                        memory,
                        stats,
                        cu,
                        cv,
                        choice.u_size,
                        choice.v_size,
                        choice.level,
                        &mut value,
                    ) {
                        out.fill(0.0);
                        return;
                    }
                    total += weight;
                    for c in 0..channels {
                        accum[c] += weight * value[c];
                    }
                }
                cv += delta_v;
            }
            cu += delta_u;
        }

        if total > 0.0 {
            for c in 0..channels {
                out[c] = accum[c] / total;
            }
        } else {
            out.fill(0.0);
        }
    }

    /// Sample the map at `(s, t)` with the given footprint widths.
    ///
    /// Wrap modes apply to the centre point; the footprint is then
    /// clamped into `[0, 1]` and handed to the blurred or unblurred
    /// integrator.  An invalid map leaves `out` zeroed.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn sample_map(
        &mut self,
        memory: &mut CacheMemory,
        stats: &mut Stats,
        options: &SampleOptions,
        lerp_default: bool,
        s: f32,
        t: f32,
        s_footprint: f32,
        t_footprint: f32,
        out: &mut [f32],
    ) {
        out.fill(0.0);
        if !self.valid {
            return;
        }

        let mut s = s;
        let mut t = t;
        let s_width = s_footprint * options.s_width;
        let t_width = t_footprint * options.t_width;

        if self.s_mode == WrapMode::Periodic {
            s = s.rem_euclid(1.0);
        }
        if self.t_mode == WrapMode::Periodic {
            t = t.rem_euclid(1.0);
        }
        if self.s_mode == WrapMode::Black && !(0.0..=1.0).contains(&s) {
            return;
        }
        if self.t_mode == WrapMode::Black && !(0.0..=1.0).contains(&t) {
            return;
        }
        if self.s_mode == WrapMode::Clamp || self.map_type == MapType::Environment {
            s = s.clamp(0.0, 1.0);
        }
        if self.t_mode == WrapMode::Clamp || self.map_type == MapType::Environment {
            t = t.clamp(0.0, 1.0);
        }

        let ss1 = (s - s_width * 0.5 - options.s_blur * 0.5).clamp(0.0, 1.0);
        let tt1 = (t - t_width * 0.5 - options.t_blur * 0.5).clamp(0.0, 1.0);
        let ss2 = (s + s_width * 0.5 + options.s_blur * 0.5).clamp(0.0, 1.0);
        let tt2 = (t + t_width * 0.5 + options.t_blur * 0.5).clamp(0.0, 1.0);

        let (ss1, ss2) = (ss1.min(ss2), ss1.max(ss2));
        let (tt1, tt2) = (tt1.min(tt2), tt1.max(tt2));

        let lerp = options.lerp.unwrap_or(lerp_default);
        if options.s_blur != 0.0 || options.t_blur != 0.0 {
            self.sample_with_blur(memory, stats, options, ss1, tt1, ss2, tt2, out);
        } else {
            self.sample_without_blur(memory, stats, options, lerp, ss1, tt1, ss2, tt2, out);
        }
    }

    /// Derive the MIPMAP chain of a plain texture in memory.
    ///
    /// The source must be a scanline file; building a pyramid over an
    /// already tiled image is refused.  Levels are built by repeated
    /// 2x downsampling with the map's filter (box 1x1 averages the
    /// four parents exactly) and held as protected buffers, so the
    /// build cannot evict its own data.
    pub(crate) fn create_mip_map(
        &mut self,
        memory: &mut CacheMemory,
        stats: &mut Stats,
    ) -> Result<()> {
        {
            let decoder = self
                .reader
                .as_mut()
                .ok_or_else(|| Error::MissingTile(self.name.clone()))?;
            decoder.seek_to_image(0)?;
            if decoder.find_tag(Tag::TileWidth).ok().flatten().is_some() {
                error!("cannot build a MIPMAP over tiled image \"{}\"", self.name);
                return Err(Error::UnsupportedFormat(self.name.clone()));
            }
        }

        // Pull the whole level 0 in as a protected buffer.
        if self
            .fetch_slot(memory, stats, 0, 0, 0)
            .is_none()
        {
            return Err(Error::MissingTile(self.name.clone()));
        }

        let mut parent = self.tiles[0][0].data().to_vec();
        let mut parent_width = self.x_res;
        let mut parent_height = self.y_res;

        let mut directory = 1usize;
        loop {
            let width = self.x_res >> directory;
            let height = self.y_res >> directory;
            if width <= 2 || height <= 2 {
                break;
            }
            let data = downsample(
                &parent,
                parent_width,
                parent_height,
                width,
                height,
                self.samples_per_pixel,
                self.filter,
                self.s_width,
                self.t_width,
            );
            let tile = TileBuffer::from_data(
                0,
                0,
                width,
                height,
                self.samples_per_pixel,
                directory,
                true,
                data.clone(),
            );
            memory.acquire(stats, tile.byte_size(), true);
            self.tiles[directory % 256].insert(0, tile);

            parent = data;
            parent_width = width;
            parent_height = height;
            directory += 1;
        }
        self.levels = directory;
        Ok(())
    }

    /// All derived levels, finest first, for the MIPMAP writer.
    pub(crate) fn resident_levels(&self) -> Vec<(u32, u32, Vec<f32>)> {
        let mut levels = Vec::new();
        for directory in 0..self.levels {
            if let Some(tile) = self.tiles[directory % 256]
                .iter()
                .find(|t| t.s_origin() == 0 && t.t_origin() == 0 && t.directory() == directory)
            {
                levels.push((tile.width(), tile.height(), tile.data().to_vec()));
            }
        }
        levels
    }
}

/// Downsample one MIPMAP level to half resolution with the given
/// filter.  The window around each pair of parent texels grows with
/// the filter width; a 1x1 box reduces to the mean of the four
/// parents.
#[allow(clippy::too_many_arguments)]
fn downsample(
    parent: &[f32],
    parent_width: u32,
    parent_height: u32,
    width: u32,
    height: u32,
    samples: u32,
    filter: Filter,
    s_width: f32,
    t_width: f32,
) -> Vec<f32> {
    let mut out = vec![0.0f32; (width * height * samples) as usize];
    let extend_x = (s_width.ceil() as i64 - 1).max(0);
    let extend_y = (t_width.ceil() as i64 - 1).max(0);

    for y in 0..height as i64 {
        for x in 0..width as i64 {
            let mut total = 0.0f32;
            let mut accum = vec![0.0f32; samples as usize];
            for py in (2 * y - extend_y)..=(2 * y + 1 + extend_y) {
                if py < 0 || py >= parent_height as i64 {
                    continue;
                }
                for px in (2 * x - extend_x)..=(2 * x + 1 + extend_x) {
                    if px < 0 || px >= parent_width as i64 {
                        continue;
                    }
                    let weight = filter.eval(
                        px as f32 - (2 * x) as f32 - 0.5,
                        py as f32 - (2 * y) as f32 - 0.5,
                        2.0 * s_width,
                        2.0 * t_width,
                    );
                    if weight == 0.0 {
                        continue;
                    }
                    total += weight;
                    let base = ((py as u32 * parent_width + px as u32) * samples) as usize;
                    for (c, a) in accum.iter_mut().enumerate() {
                        *a += weight * parent[base + c];
                    }
                }
            }
            let base = ((y as u32 * width + x as u32) * samples) as usize;
            if total > 0.0 {
                for (c, a) in accum.iter().enumerate() {
                    out[base + c] = a / total;
                }
            }
        }
    }
    out
}

/// Write a MIPMAP chain to a TIFF file, one directory per level,
/// stamping the Pixar format and wrap-mode tags.
pub(crate) fn write_mip_map(
    path: &Path,
    levels: &[(u32, u32, Vec<f32>)],
    samples: u32,
    format_tag: &str,
    wrap_modes: &str,
) -> Result<()> {
    let file = File::create(path)?;
    let mut encoder = TiffEncoder::new(std::io::BufWriter::new(file))?;

    for (width, height, data) in levels {
        match samples {
            1 => {
                let mut image = encoder.new_image::<colortype::Gray32Float>(*width, *height)?;
                image
                    .encoder()
                    .write_tag(Tag::Unknown(TAG_TEXTURE_FORMAT), format_tag)?;
                image
                    .encoder()
                    .write_tag(Tag::Unknown(TAG_WRAP_MODES), wrap_modes)?;
                image.write_data(data)?;
            }
            3 => {
                let mut image = encoder.new_image::<colortype::RGB32Float>(*width, *height)?;
                image
                    .encoder()
                    .write_tag(Tag::Unknown(TAG_TEXTURE_FORMAT), format_tag)?;
                image
                    .encoder()
                    .write_tag(Tag::Unknown(TAG_WRAP_MODES), wrap_modes)?;
                image.write_data(data)?;
            }
            4 => {
                let mut image = encoder.new_image::<colortype::RGBA32Float>(*width, *height)?;
                image
                    .encoder()
                    .write_tag(Tag::Unknown(TAG_TEXTURE_FORMAT), format_tag)?;
                image
                    .encoder()
                    .write_tag(Tag::Unknown(TAG_WRAP_MODES), wrap_modes)?;
                image.write_data(data)?;
            }
            other => {
                error!("cannot write a {}-channel texture", other);
                return Err(Error::UnsupportedFormat(path.display().to_string()));
            }
        }
    }
    Ok(())
}

fn read_ascii_tag(decoder: &mut TiffReader, tag: Tag) -> Option<String> {
    match decoder.find_tag(tag) {
        Ok(Some(tiff::decoder::ifd::Value::Ascii(s))) => Some(s),
        _ => None,
    }
}

fn read_u32_tag(decoder: &mut TiffReader, tag: Tag) -> Option<u32> {
    decoder
        .find_tag(tag)
        .ok()
        .flatten()
        .and_then(|value| value.into_u32().ok())
}

/// Flatten any decoded sample format into raw-valued `f32`.
fn decode_to_f32(result: DecodingResult) -> Vec<f32> {
    match result {
        DecodingResult::U8(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U16(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I8(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I16(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
        #[allow(unreachable_patterns)]
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_downsample_averages_four_parents() {
        // A 4x2 single-channel image halves to 2x1.
        let parent = vec![0.0, 4.0, 8.0, 12.0, 2.0, 6.0, 10.0, 14.0];
        let out = downsample(&parent, 4, 2, 2, 1, 1, Filter::Box, 1.0, 1.0);
        assert_eq!(out, vec![3.0, 11.0]);
    }

    #[test]
    fn offsets_are_deterministic_and_unit_range() {
        let a = sample_offsets();
        let b = sample_offsets();
        assert_eq!(a[0], b[0]);
        assert!(a.iter().all(|p| (0.0..1.0).contains(&p[0]) && (0.0..1.0).contains(&p[1])));
    }

    #[test]
    fn wrap_names() {
        assert_eq!(WrapMode::from_name("periodic"), Some(WrapMode::Periodic));
        assert_eq!(WrapMode::from_name("mirror"), None);
    }
}
